//! Impression Confirmer (SPEC_FULL.md §4.8).
//!
//! Verifies the token, re-fetches the canonical impression row, validates
//! the requested event against the state machine, and — for the billing
//! event only — charges whichever of the ad or campaign owns the budget.
//! The creator-revenue notification fires only after that commit succeeds,
//! and only on a best-effort basis: its own failures are logged and
//! swallowed, never surfaced to the caller (§6).

use chrono::{DateTime, Utc};
use primitives::{
    dto::{BillingDetails, ConfirmRequest, ConfirmResponse},
    error::CoreError,
    AdBudget, ConfirmEvent, Impression, UserId, ViewerIdentity,
};
use slog::Logger;

use crate::{
    creator_revenue::CreatorRevenueClient,
    db::{self, DbPool},
    token::{self, TokenSecret},
};

fn parse_identity(request: &ConfirmRequest) -> Result<Option<ViewerIdentity>, CoreError> {
    if let Some(raw) = &request.user_id {
        let user_id = raw
            .parse::<UserId>()
            .map_err(|_| CoreError::validation("userId must be a valid UUID"))?;
        return Ok(Some(ViewerIdentity::User(user_id)));
    }
    if let Some(anon_id) = &request.anon_id {
        return Ok(Some(ViewerIdentity::Anonymous(anon_id.clone())));
    }
    Ok(None)
}

/// Bills whichever of the ad or campaign owns the budget for this ad: the
/// ad's own non-zero explicit budget if it has one, the parent campaign
/// otherwise (§4.8 step 5).
async fn apply_billing(
    pool: &DbPool,
    impression: &Impression,
) -> Result<Option<u64>, CoreError> {
    let ad = db::ad::fetch_ad(pool, impression.ad_id)
        .await
        .map_err(|err| CoreError::internal(format!("database error: {err}")))?
        .ok_or(CoreError::NotFound("ad"))?;

    let cost = impression.cost_cents as i64;

    match ad.budget {
        AdBudget::Amount(amount) if amount.to_cents() > 0 => {
            let updated = db::ad::adjust_ad_spent(pool, impression.ad_id, cost).await?;
            Ok(updated.budget.amount().map(|budget| {
                budget.saturating_sub(&updated.spent).to_cents()
            }))
        }
        _ => {
            let updated =
                db::campaign::adjust_campaign_spent(pool, impression.campaign_id, cost).await?;
            Ok(updated.budget.map(|budget| {
                budget.saturating_sub(&updated.spent).to_cents()
            }))
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn confirm(
    pool: &DbPool,
    token_secret: &TokenSecret,
    creator_revenue: &CreatorRevenueClient,
    logger: &Logger,
    request: &ConfirmRequest,
    now: DateTime<Utc>,
) -> Result<ConfirmResponse, CoreError> {
    let decoded = token::decode(token_secret, &request.token)?;

    let impression = db::impression::fetch_by_token(pool, &request.token)
        .await
        .map_err(|err| CoreError::internal(format!("database error: {err}")))?
        .ok_or(CoreError::NotFound("impression"))?;

    if impression.is_expired(now) || decoded.expires_at < now {
        if impression.status == primitives::ImpressionStatus::Reserved {
            db::impression::mark_expired(pool, impression.id)
                .await
                .map_err(|err| CoreError::internal(format!("database error: {err}")))?;
        }
        return Err(CoreError::Expired);
    }

    impression.validate_transition(request.event)?;

    let identity = parse_identity(request)?;
    let user_agent = request
        .metadata
        .as_ref()
        .and_then(|meta| meta.user_agent.as_deref());
    let ip_address = request
        .metadata
        .as_ref()
        .and_then(|meta| meta.ip_address.as_deref());

    let billing_details = if request.event.is_billing_event() {
        let remaining = apply_billing(pool, &impression).await?;
        Some(BillingDetails {
            cost_cents: impression.cost_cents,
            remaining_budget_cents: remaining,
        })
    } else {
        None
    };

    let mut reconciled = impression.clone();
    reconciled.reconcile_identity(identity);

    let updated = db::impression::apply_confirm(
        pool,
        &reconciled,
        request.event,
        user_agent,
        ip_address,
    )
    .await?;

    if request.event.is_billing_event() {
        let client = creator_revenue.clone();
        let logger = logger.clone();
        let video_id = updated.video_id.clone();
        let viewer_id = updated.viewer_id;
        let ad_id = updated.ad_id;
        let cost = primitives::money::Money::from_cents(updated.cost_cents);

        tokio::spawn(async move {
            if let Err(err) = client
                .notify_ad_confirmed(&video_id, viewer_id, ad_id, cost)
                .await
            {
                slog::warn!(logger, "creator revenue notification failed"; "error" => %err, "ad_id" => %ad_id);
            }
        });
    }

    Ok(ConfirmResponse {
        success: true,
        message: "impression confirmed".to_string(),
        billing_details,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_identity_prefers_user_id_over_anon_id() {
        let request = ConfirmRequest {
            token: "tok".into(),
            event: ConfirmEvent::Served,
            user_id: Some(UserId::new().to_string()),
            anon_id: None,
            metadata: None,
        };

        assert!(matches!(
            parse_identity(&request).unwrap(),
            Some(ViewerIdentity::User(_))
        ));
    }

    #[test]
    fn parse_identity_rejects_a_malformed_user_id() {
        let request = ConfirmRequest {
            token: "tok".into(),
            event: ConfirmEvent::Served,
            user_id: Some("not-a-uuid".into()),
            anon_id: None,
            metadata: None,
        };

        assert!(parse_identity(&request).is_err());
    }
}
