//! Candidate fetcher (SPEC_FULL.md §4.5).
//!
//! Pushes the category/tag targeting predicate into the SQL `WHERE` clause,
//! built dynamically depending on which of category/tags the caller
//! supplied, the way the teacher's `db/campaign.rs` builds its own
//! conditional predicates. Falls back to a second, unfiltered query - still
//! random, still limited - when the targeted predicate matches nothing.

use chrono::{DateTime, Utc};
use primitives::{error::CoreError, Ad, AdBudget, Campaign};
use tokio_postgres::{types::ToSql, Row};

use crate::db::DbPool;

fn row_to_candidate(row: &Row) -> (Ad, Campaign) {
    let ad_budget_cents: i64 = row.get("a_budget_cents");

    let ad = Ad {
        id: row.get("a_id"),
        campaign_id: row.get("a_campaign_id"),
        status: row.get("a_status"),
        budget: AdBudget::from_sentinel(ad_budget_cents).unwrap_or(AdBudget::Inherit),
        spent: row.get("a_spent_cents"),
        categories: row.get("a_categories"),
        tags: row.get("a_tags"),
        title: row.get("a_title"),
        description: row.get("a_description"),
        video_url: row.get("a_video_url"),
        thumbnail_url: row.get("a_thumbnail_url"),
        cta_link: row.get("a_cta_link"),
        created: row.get("a_created_at"),
        updated: row.get("a_updated_at"),
    };

    let campaign = Campaign {
        id: row.get("c_id"),
        team_id: row.get("c_team_id"),
        owner_user_id: row.get("c_owner_user_id"),
        status: row.get("c_status"),
        budget: row.get("c_budget_cents"),
        spent: row.get("c_spent_cents"),
        start_date: row.get("c_start_date"),
        end_date: row.get("c_end_date"),
        created: row.get("c_created_at"),
        updated: row.get("c_updated_at"),
    };

    (ad, campaign)
}

const BASE_QUERY: &str = "
    SELECT
        a.id AS a_id, a.campaign_id AS a_campaign_id, a.status AS a_status,
        a.budget_cents AS a_budget_cents, a.spent_cents AS a_spent_cents,
        a.categories AS a_categories, a.tags AS a_tags, a.title AS a_title,
        a.description AS a_description, a.video_url AS a_video_url,
        a.thumbnail_url AS a_thumbnail_url, a.cta_link AS a_cta_link,
        a.created_at AS a_created_at, a.updated_at AS a_updated_at,
        c.id AS c_id, c.team_id AS c_team_id, c.owner_user_id AS c_owner_user_id,
        c.status AS c_status, c.budget_cents AS c_budget_cents, c.spent_cents AS c_spent_cents,
        c.start_date AS c_start_date, c.end_date AS c_end_date,
        c.created_at AS c_created_at, c.updated_at AS c_updated_at
    FROM ads a
    JOIN campaigns c ON c.id = a.campaign_id
    WHERE a.status = 'active'
      AND c.status = 'active'
      AND (c.start_date IS NULL OR c.start_date <= $1)
      AND (c.end_date IS NULL OR c.end_date >= $1)";

/// Appends the category/tag eligibility predicate (§4.5) as `WHERE`
/// clauses, case-insensitively matching against the unnested array columns
/// per §4.6, and registers their parameters starting after `$1` (`now`).
fn targeting_clauses<'a>(
    category_lower: &'a Option<String>,
    tags_lower: &'a Option<Vec<String>>,
    params: &mut Vec<&'a (dyn ToSql + Sync)>,
) -> Vec<String> {
    let mut clauses = Vec::new();

    if let Some(category) = category_lower {
        params.push(category);
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM unnest(a.categories) cat WHERE lower(cat) = ${})",
            params.len()
        ));
    }

    if let Some(tags) = tags_lower {
        params.push(tags);
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM unnest(a.tags) tg WHERE lower(tg) = ANY(${}))",
            params.len()
        ));
    }

    clauses
}

async fn query_pool(
    pool: &DbPool,
    now: &DateTime<Utc>,
    targeting: Option<(&Option<String>, &Option<Vec<String>>)>,
    limit: i64,
) -> Result<Vec<(Ad, Campaign)>, CoreError> {
    let client = pool
        .get()
        .await
        .map_err(|err| CoreError::internal(format!("database error: {err}")))?;

    let mut params: Vec<&(dyn ToSql + Sync)> = vec![now];
    let mut query = BASE_QUERY.to_string();

    if let Some((category_lower, tags_lower)) = targeting {
        let clauses = targeting_clauses(category_lower, tags_lower, &mut params);
        match clauses.len() {
            0 => {}
            1 => query.push_str(&format!(" AND {}", clauses[0])),
            _ => query.push_str(&format!(" AND ({})", clauses.join(" OR "))),
        }
    }

    params.push(&limit);
    query.push_str(&format!(" ORDER BY random() LIMIT ${}", params.len()));

    let stmt = client
        .prepare(&query)
        .await
        .map_err(|err| CoreError::internal(format!("database error: {err}")))?;
    let rows = client
        .query(&stmt, &params)
        .await
        .map_err(|err| CoreError::internal(format!("database error: {err}")))?;

    Ok(rows.iter().map(row_to_candidate).collect())
}

/// Fetches at most `limit` eligible candidates matching `category`/`tags`,
/// with the predicate evaluated in SQL rather than in process, so it
/// applies to the whole active/in-window inventory regardless of size.
/// Falls back to the unfiltered pool - still random, still limited - when
/// the targeted query matches nothing (§4.5).
pub async fn fetch_candidates(
    pool: &DbPool,
    now: DateTime<Utc>,
    category: Option<&str>,
    tags: Option<&[String]>,
    limit: u32,
) -> Result<Vec<(Ad, Campaign)>, CoreError> {
    let limit = limit as i64;
    let category_lower = category.map(|category| category.to_lowercase());
    let tags_lower = tags
        .filter(|tags| !tags.is_empty())
        .map(|tags| tags.iter().map(|tag| tag.to_lowercase()).collect::<Vec<_>>());

    if category_lower.is_none() && tags_lower.is_none() {
        return query_pool(pool, &now, None, limit).await;
    }

    let targeted = query_pool(pool, &now, Some((&category_lower, &tags_lower)), limit).await?;
    if !targeted.is_empty() {
        return Ok(targeted);
    }

    query_pool(pool, &now, None, limit).await
}

/// Whether `ad` matches the request's targeting, per the eligibility
/// predicate in §4.5. Mirrors `targeting_clauses`' SQL semantics so the
/// matching rule can be unit tested without a database.
#[cfg(test)]
fn matches_targeting(ad: &Ad, category: Option<&str>, tags: Option<&[String]>) -> bool {
    let category_match = category.map(|category| {
        ad.categories_lower()
            .iter()
            .any(|c| c == &category.to_lowercase())
    });
    let tag_match = tags.filter(|tags| !tags.is_empty()).map(|tags| {
        let ad_tags = ad.tags_lower();
        tags.iter().any(|tag| ad_tags.contains(&tag.to_lowercase()))
    });

    match (category_match, tag_match) {
        (Some(c), Some(t)) => c || t,
        (Some(c), None) => c,
        (None, Some(t)) => t,
        (None, None) => true,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use primitives::test_util::{dummy_ad, dummy_campaign};

    #[test]
    fn matches_targeting_ors_category_and_tags_when_both_given() {
        let campaign = dummy_campaign();
        let mut ad = dummy_ad(campaign.id);
        ad.categories = vec!["tech".to_string()];
        ad.tags = vec!["reviews".to_string()];

        assert!(matches_targeting(&ad, Some("tech"), Some(&["unrelated".to_string()])));
        assert!(matches_targeting(&ad, Some("unrelated"), Some(&["reviews".to_string()])));
        assert!(!matches_targeting(
            &ad,
            Some("unrelated"),
            Some(&["also-unrelated".to_string()])
        ));
    }

    #[test]
    fn matches_targeting_is_case_insensitive() {
        let campaign = dummy_campaign();
        let mut ad = dummy_ad(campaign.id);
        ad.categories = vec!["Tech".to_string()];

        assert!(matches_targeting(&ad, Some("TECH"), None));
    }

    #[test]
    fn matches_targeting_single_dimension_only_checks_that_dimension() {
        let campaign = dummy_campaign();
        let ad = dummy_ad(campaign.id);

        assert!(matches_targeting(&ad, Some("sports"), None));
        assert!(matches_targeting(&ad, None, Some(&["highlights".to_string()])));
        assert!(!matches_targeting(&ad, Some("finance"), None));
    }
}
