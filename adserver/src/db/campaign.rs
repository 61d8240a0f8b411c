//! Campaign row access: row-locked reads and atomic `spent` adjustments.
//!
//! Grounded on the teacher's `UPDATE_ACCOUNTING_STATEMENT` read-lock/update
//! style in `db/accounting.rs`, applied to the `campaigns` table instead of
//! a two-sided accounting row.

use chrono::{DateTime, Utc};
use primitives::{error::CoreError, money::Money, Campaign, CampaignId, CampaignStatus, TeamId};
use tokio_postgres::{IsolationLevel, Row};

use super::{DbPool, PoolError};

impl From<&Row> for Campaign {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            team_id: row.get("team_id"),
            owner_user_id: row.get("owner_user_id"),
            status: row.get("status"),
            budget: row.get("budget_cents"),
            spent: row.get("spent_cents"),
            start_date: row.get("start_date"),
            end_date: row.get("end_date"),
            created: row.get("created_at"),
            updated: row.get("updated_at"),
        }
    }
}

const SELECT_COLUMNS: &str =
    "id, team_id, owner_user_id, status, budget_cents, spent_cents, start_date, end_date, created_at, updated_at";

pub async fn insert_campaign(
    pool: &DbPool,
    team_id: TeamId,
    owner_user_id: primitives::UserId,
    budget: Option<Money>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
) -> Result<Campaign, PoolError> {
    let client = pool.get().await?;
    let id = primitives::CampaignId::new();
    let now = Utc::now();

    let stmt = client
        .prepare(&format!(
            "INSERT INTO campaigns (id, team_id, owner_user_id, status, budget_cents, spent_cents, start_date, end_date, created_at, updated_at) VALUES ($1, $2, $3, 'draft', $4, 0, $5, $6, $7, $7) RETURNING {SELECT_COLUMNS}"
        ))
        .await?;

    let row = client
        .query_one(
            &stmt,
            &[
                &id,
                &team_id,
                &owner_user_id,
                &budget,
                &start_date,
                &end_date,
                &now,
            ],
        )
        .await?;

    Ok(Campaign::from(&row))
}

pub async fn fetch_campaign(
    pool: &DbPool,
    campaign_id: CampaignId,
) -> Result<Option<Campaign>, PoolError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare(&format!("SELECT {SELECT_COLUMNS} FROM campaigns WHERE id = $1"))
        .await?;
    let row = client.query_opt(&stmt, &[&campaign_id]).await?;

    Ok(row.as_ref().map(Campaign::from))
}

pub async fn delete_campaign(pool: &DbPool, campaign_id: CampaignId) -> Result<(), PoolError> {
    let client = pool.get().await?;
    let stmt = client.prepare("DELETE FROM campaigns WHERE id = $1").await?;
    client.execute(&stmt, &[&campaign_id]).await?;

    Ok(())
}

pub async fn update_campaign_fields(
    pool: &DbPool,
    campaign_id: CampaignId,
    status: Option<CampaignStatus>,
    budget: Option<Option<Money>>,
    start_date: Option<Option<DateTime<Utc>>>,
    end_date: Option<Option<DateTime<Utc>>>,
) -> Result<Campaign, PoolError> {
    let client = pool.get().await?;
    let now = Utc::now();

    let existing = client
        .query_one(
            &client
                .prepare(&format!("SELECT {SELECT_COLUMNS} FROM campaigns WHERE id = $1"))
                .await?,
            &[&campaign_id],
        )
        .await
        .map(|row| Campaign::from(&row))?;

    let next_status = status.unwrap_or(existing.status);
    let next_budget = budget.unwrap_or(existing.budget);
    let next_start = start_date.unwrap_or(existing.start_date);
    let next_end = end_date.unwrap_or(existing.end_date);

    let stmt = client
        .prepare(&format!(
            "UPDATE campaigns SET status = $1, budget_cents = $2, start_date = $3, end_date = $4, updated_at = $5 WHERE id = $6 RETURNING {SELECT_COLUMNS}"
        ))
        .await?;
    let row = client
        .query_one(
            &stmt,
            &[
                &next_status,
                &next_budget,
                &next_start,
                &next_end,
                &now,
                &campaign_id,
            ],
        )
        .await?;

    Ok(Campaign::from(&row))
}

/// Locks the campaign row and atomically applies `delta` (positive or
/// negative) to `spent_cents`, rejecting the update if it would push
/// `spent` outside `[0, budget]`.
pub async fn adjust_campaign_spent(
    pool: &DbPool,
    campaign_id: CampaignId,
    delta: i64,
) -> Result<Campaign, CoreError> {
    let mut client = pool.get().await.map_err(db_err)?;
    let db_txn = client
        .build_transaction()
        .isolation_level(IsolationLevel::Serializable)
        .start()
        .await
        .map_err(db_err)?;

    let lock_stmt = db_txn
        .prepare(&format!("SELECT {SELECT_COLUMNS} FROM campaigns WHERE id = $1 FOR UPDATE"))
        .await
        .map_err(db_err)?;
    let row = db_txn
        .query_one(&lock_stmt, &[&campaign_id])
        .await
        .map_err(db_err)?;
    let campaign = Campaign::from(&row);

    let new_spent = apply_delta(campaign.spent, delta)?;
    if let Some(budget) = campaign.budget {
        if new_spent > budget {
            return Err(CoreError::BudgetExceeded {
                entity: "campaign",
                id: campaign.id.to_string(),
                spent: new_spent.to_string(),
                budget: budget.to_string(),
            });
        }
    }

    let update_stmt = db_txn
        .prepare(&format!(
            "UPDATE campaigns SET spent_cents = $1, updated_at = $2 WHERE id = $3 RETURNING {SELECT_COLUMNS}"
        ))
        .await
        .map_err(db_err)?;
    let updated_row = db_txn
        .query_one(&update_stmt, &[&new_spent, &Utc::now(), &campaign_id])
        .await
        .map_err(db_err)?;

    db_txn.commit().await.map_err(db_err)?;

    Ok(Campaign::from(&updated_row))
}

fn apply_delta(spent: Money, delta: i64) -> Result<Money, CoreError> {
    if delta >= 0 {
        spent
            .checked_add(&Money::from_cents(delta as u64))
            .ok_or_else(|| CoreError::internal("campaign spent overflow"))
    } else {
        spent
            .checked_sub(&Money::from_cents(delta.unsigned_abs()))
            .ok_or_else(|| CoreError::internal("campaign spent underflow"))
    }
}

fn db_err<E: std::fmt::Display>(error: E) -> CoreError {
    CoreError::internal(format!("database error: {error}"))
}
