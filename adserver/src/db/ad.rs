//! Ad row access: CRUD plus the row-locked `spent` adjustment used by both
//! the lifecycle coordinator (allocation bookkeeping) and the confirmer
//! (billing).

use chrono::Utc;
use primitives::{
    error::CoreError, ids::AdId, money::Money, Ad, AdBudget, AdStatus, CampaignId,
};
use tokio_postgres::{IsolationLevel, Row};

use super::{DbPool, PoolError};

impl From<&Row> for Ad {
    fn from(row: &Row) -> Self {
        let budget_cents: i64 = row.get("budget_cents");

        Self {
            id: row.get("id"),
            campaign_id: row.get("campaign_id"),
            status: row.get("status"),
            budget: AdBudget::from_sentinel(budget_cents).unwrap_or(AdBudget::Inherit),
            spent: row.get("spent_cents"),
            categories: row.get("categories"),
            tags: row.get("tags"),
            title: row.get("title"),
            description: row.get("description"),
            video_url: row.get("video_url"),
            thumbnail_url: row.get("thumbnail_url"),
            cta_link: row.get("cta_link"),
            created: row.get("created_at"),
            updated: row.get("updated_at"),
        }
    }
}

const SELECT_COLUMNS: &str = "id, campaign_id, status, budget_cents, spent_cents, categories, tags, title, description, video_url, thumbnail_url, cta_link, created_at, updated_at";

#[allow(clippy::too_many_arguments)]
pub async fn insert_ad(
    pool: &DbPool,
    campaign_id: CampaignId,
    budget: AdBudget,
    categories: &[String],
    tags: &[String],
    title: &str,
    description: &str,
    video_url: &str,
    thumbnail_url: &str,
    cta_link: Option<&str>,
) -> Result<Ad, PoolError> {
    let client = pool.get().await?;
    let id = AdId::new();
    let now = Utc::now();

    let stmt = client
        .prepare(&format!(
            "INSERT INTO ads (id, campaign_id, status, budget_cents, spent_cents, categories, tags, title, description, video_url, thumbnail_url, cta_link, created_at, updated_at) VALUES ($1, $2, 'active', $3, 0, $4, $5, $6, $7, $8, $9, $10, $11, $11) RETURNING {SELECT_COLUMNS}"
        ))
        .await?;

    let row = client
        .query_one(
            &stmt,
            &[
                &id,
                &campaign_id,
                &budget.to_sentinel(),
                &categories,
                &tags,
                &title,
                &description,
                &video_url,
                &thumbnail_url,
                &cta_link,
                &now,
            ],
        )
        .await?;

    Ok(Ad::from(&row))
}

pub async fn fetch_ad(pool: &DbPool, ad_id: AdId) -> Result<Option<Ad>, PoolError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare(&format!("SELECT {SELECT_COLUMNS} FROM ads WHERE id = $1"))
        .await?;
    let row = client.query_opt(&stmt, &[&ad_id]).await?;

    Ok(row.as_ref().map(Ad::from))
}

pub async fn delete_ad(pool: &DbPool, ad_id: AdId) -> Result<(), PoolError> {
    let client = pool.get().await?;
    let stmt = client.prepare("DELETE FROM ads WHERE id = $1").await?;
    client.execute(&stmt, &[&ad_id]).await?;

    Ok(())
}

pub async fn update_ad_fields(
    pool: &DbPool,
    ad_id: AdId,
    status: Option<AdStatus>,
    budget: Option<AdBudget>,
    categories: Option<Vec<String>>,
    tags: Option<Vec<String>>,
    title: Option<String>,
    description: Option<String>,
    cta_link: Option<Option<String>>,
) -> Result<Ad, PoolError> {
    let client = pool.get().await?;
    let existing = fetch_ad(pool, ad_id)
        .await?
        .expect("caller has already verified the ad exists");

    let next_status = status.unwrap_or(existing.status);
    let next_budget = budget.unwrap_or(existing.budget);
    let next_categories = categories.unwrap_or(existing.categories);
    let next_tags = tags.unwrap_or(existing.tags);
    let next_title = title.unwrap_or(existing.title);
    let next_description = description.unwrap_or(existing.description);
    let next_cta = cta_link.unwrap_or(existing.cta_link);
    let now = Utc::now();

    let stmt = client
        .prepare(&format!(
            "UPDATE ads SET status = $1, budget_cents = $2, categories = $3, tags = $4, title = $5, description = $6, cta_link = $7, updated_at = $8 WHERE id = $9 RETURNING {SELECT_COLUMNS}"
        ))
        .await?;
    let row = client
        .query_one(
            &stmt,
            &[
                &next_status,
                &next_budget.to_sentinel(),
                &next_categories,
                &next_tags,
                &next_title,
                &next_description,
                &next_cta,
                &now,
                &ad_id,
            ],
        )
        .await?;

    Ok(Ad::from(&row))
}

/// Sum of `budget_cents` over every ad in `campaign_id` that carries its
/// own explicit (non-inherited) budget. Backs `validate_ad_budget`.
pub async fn sum_allocated_ad_budget(
    pool: &DbPool,
    campaign_id: CampaignId,
) -> Result<Money, PoolError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare("SELECT COALESCE(SUM(budget_cents), 0) FROM ads WHERE campaign_id = $1 AND budget_cents >= 0")
        .await?;
    let row = client.query_one(&stmt, &[&campaign_id]).await?;
    let total: i64 = row.get(0);

    Ok(Money::from_cents(total as u64))
}

/// Locks the ad row and atomically applies `delta` (positive or negative)
/// to `spent_cents`, rejecting the update if it would exceed the ad's own
/// budget (when the ad doesn't inherit).
pub async fn adjust_ad_spent(pool: &DbPool, ad_id: AdId, delta: i64) -> Result<Ad, CoreError> {
    let mut client = pool.get().await.map_err(db_err)?;
    let db_txn = client
        .build_transaction()
        .isolation_level(IsolationLevel::Serializable)
        .start()
        .await
        .map_err(db_err)?;

    let lock_stmt = db_txn
        .prepare(&format!("SELECT {SELECT_COLUMNS} FROM ads WHERE id = $1 FOR UPDATE"))
        .await
        .map_err(db_err)?;
    let row = db_txn.query_one(&lock_stmt, &[&ad_id]).await.map_err(db_err)?;
    let ad = Ad::from(&row);

    let new_spent = if delta >= 0 {
        ad.spent
            .checked_add(&Money::from_cents(delta as u64))
            .ok_or_else(|| CoreError::internal("ad spent overflow"))?
    } else {
        ad.spent
            .checked_sub(&Money::from_cents(delta.unsigned_abs()))
            .ok_or_else(|| CoreError::internal("ad spent underflow"))?
    };

    if let Some(budget) = ad.budget.amount() {
        if new_spent > budget {
            return Err(CoreError::BudgetExceeded {
                entity: "ad",
                id: ad.id.to_string(),
                spent: new_spent.to_string(),
                budget: budget.to_string(),
            });
        }
    }

    let update_stmt = db_txn
        .prepare(&format!(
            "UPDATE ads SET spent_cents = $1, updated_at = $2 WHERE id = $3 RETURNING {SELECT_COLUMNS}"
        ))
        .await
        .map_err(db_err)?;
    let updated_row = db_txn
        .query_one(&update_stmt, &[&new_spent, &Utc::now(), &ad_id])
        .await
        .map_err(db_err)?;

    db_txn.commit().await.map_err(db_err)?;

    Ok(Ad::from(&updated_row))
}

fn db_err<E: std::fmt::Display>(error: E) -> CoreError {
    CoreError::internal(format!("database error: {error}"))
}
