//! Ad Server control loop (SPEC_FULL.md §4.7).
//!
//! Ties together the candidate fetcher, scorer, and reservation writer: on
//! a budget race lost to another request, it is cheaper to drop the
//! candidate and try the next-best one than to fail the whole request, so
//! `serve` retries across the scored list before giving up.

use chrono::{DateTime, Duration, Utc};
use primitives::{
    dto::{ServeRequest, ServedAd, ServeResponse},
    error::CoreError,
    ids::ImpressionId,
    Config, UserId,
};

use crate::{
    candidate, client_info::ClientInfo, db::DbPool, db::impression::NewReservation, scorer,
    token::{self, TokenSecret},
};

/// How many of the scorer's ranked candidates to try reserving before
/// giving up - guards against a pathological case where every candidate
/// loses its budget race to a concurrent request.
const MAX_RESERVE_ATTEMPTS: usize = 5;

fn parse_viewer(request: &ServeRequest) -> Result<(Option<UserId>, Option<String>), CoreError> {
    match &request.user_id {
        Some(raw) => {
            let user_id = raw
                .parse::<UserId>()
                .map_err(|_| CoreError::validation("userId must be a valid UUID"))?;
            Ok((Some(user_id), None))
        }
        None => Ok((None, request.anon_id.clone())),
    }
}

/// Runs the full serve algorithm: fetch, score, reserve. Returns `Ok(None)`
/// when no ad can be served (§4.7's `no_eligible_ads` outcome), which the
/// HTTP layer maps to its own response shape rather than an error.
pub async fn serve(
    pool: &DbPool,
    config: &Config,
    token_secret: &TokenSecret,
    request: &ServeRequest,
    client_info: ClientInfo,
    now: DateTime<Utc>,
) -> Result<Option<ServeResponse>, CoreError> {
    let (viewer_id, anon_id) = parse_viewer(request)?;
    let cost = primitives::money::Money::from_cents(config.cost_per_view_cents);
    let tags = request.tags.clone().unwrap_or_default();

    let candidates = candidate::fetch_candidates(
        pool,
        now,
        request.category.as_deref(),
        Some(&tags),
        config.max_candidates,
    )
    .await?;

    let scored = scorer::score_candidates(candidates, request.category.as_deref(), &tags, config);
    let expires_at = now + Duration::minutes(config.impression_ttl_minutes);

    // `scorer::select` consumes its input and hands back only the winner,
    // so a retry re-selects from the full scored list minus whichever
    // candidates have already lost a budget race this request.
    let mut excluded = std::collections::HashSet::new();

    for _ in 0..MAX_RESERVE_ATTEMPTS {
        let attempt_pool: Vec<_> = scored
            .iter()
            .filter(|c| !excluded.contains(&c.ad.id))
            .cloned()
            .collect();

        let Some(winner) = scorer::select(attempt_pool, config.min_score, cost) else {
            return Ok(None);
        };

        let impression_id = ImpressionId::new();
        let impression_token = token::encode(token_secret, impression_id, expires_at);

        let reservation = NewReservation {
            id: impression_id,
            token: impression_token.clone(),
            ad_id: winner.ad.id,
            campaign_id: winner.campaign.id,
            cost,
            expires_at,
            viewer_id,
            anon_id: anon_id.clone(),
            session_id: request.session_id.clone(),
            video_id: request.video_id.clone(),
            category: request.category.clone(),
            tags: tags.clone(),
            device_type: client_info.device_type,
            os_type: client_info.os_type,
            user_agent: client_info.user_agent.clone(),
            ip_address: client_info.ip_address.clone(),
        };

        match crate::db::impression::reserve(pool, reservation, now).await {
            Ok(_impression) => {
                return Ok(Some(ServeResponse {
                    ad: ServedAd {
                        id: winner.ad.id,
                        title: winner.ad.title,
                        description: winner.ad.description,
                        video_url: winner.ad.video_url,
                        thumbnail_url: winner.ad.thumbnail_url,
                        categories: winner.ad.categories,
                        tags: winner.ad.tags,
                        cta_link: winner.ad.cta_link,
                    },
                    impression_token,
                    cost_cents: cost.to_cents(),
                    expires_at,
                }));
            }
            // Lost the budget race to a concurrent reservation: drop this
            // candidate and try the next-best one rather than failing.
            Err(CoreError::Validation(_) | CoreError::BudgetExceeded { .. }) => {
                excluded.insert(winner.ad.id);
                continue;
            }
            Err(other) => return Err(other),
        }
    }

    Ok(None)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_viewer_rejects_a_malformed_user_id() {
        let request = ServeRequest {
            video_id: "vid-1".into(),
            category: Some("sports".into()),
            tags: None,
            user_id: Some("not-a-uuid".into()),
            anon_id: None,
            session_id: None,
        };

        assert!(parse_viewer(&request).is_err());
    }

    #[test]
    fn parse_viewer_accepts_anon_id_when_no_user_id() {
        let request = ServeRequest {
            video_id: "vid-1".into(),
            category: Some("sports".into()),
            tags: None,
            user_id: None,
            anon_id: Some("anon-1".into()),
            session_id: None,
        };

        let (user_id, anon_id) = parse_viewer(&request).unwrap();
        assert_eq!(None, user_id);
        assert_eq!(Some("anon-1".to_string()), anon_id);
    }
}
