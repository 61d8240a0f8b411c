//! Impression row access: insert on reservation, lookup by token, and the
//! state-machine-guarded update applied by the confirmer.

use chrono::{DateTime, Utc};
use primitives::{
    error::CoreError, ids::ImpressionId, money::Money, AdBudget, AdId, AdStatus, CampaignId,
    CampaignStatus, ConfirmEvent, DeviceType, Impression, ImpressionAction, ImpressionStatus,
    OsType, UserId,
};
use tokio_postgres::{IsolationLevel, Row};

use super::{DbPool, PoolError};

impl From<&Row> for Impression {
    fn from(row: &Row) -> Self {
        let cost_cents: i64 = row.get("cost_cents");

        Self {
            id: row.get("id"),
            token: row.get("token"),
            ad_id: row.get("ad_id"),
            campaign_id: row.get("campaign_id"),
            status: row.get("status"),
            action: row.get("action"),
            cost_cents: cost_cents as u64,
            expires_at: row.get("expires_at"),
            viewer_id: row.get("viewer_id"),
            anon_id: row.get("anon_id"),
            session_id: row.get("session_id"),
            video_id: row.get("video_id"),
            category: row.get("category"),
            tags: row.get("tags"),
            device_type: row.get("device_type"),
            os_type: row.get("os_type"),
            user_agent: row.get("user_agent"),
            ip_address: row.get("ip_address"),
            served_at: row.get("served_at"),
            confirmed_at: row.get("confirmed_at"),
            created: row.get("created_at"),
            updated: row.get("updated_at"),
        }
    }
}

const SELECT_COLUMNS: &str = "id, token, ad_id, campaign_id, status, action, cost_cents, expires_at, viewer_id, anon_id, session_id, video_id, category, tags, device_type, os_type, user_agent, ip_address, served_at, confirmed_at, created_at, updated_at";

/// Parameters for a fresh reservation. The token is already computed (see
/// `crate::token`) before this insert, collapsing the two-step
/// provisional-token dance into a single write.
#[allow(clippy::too_many_arguments)]
pub struct NewReservation {
    pub id: ImpressionId,
    pub token: String,
    pub ad_id: AdId,
    pub campaign_id: CampaignId,
    pub cost: Money,
    pub expires_at: DateTime<Utc>,
    pub viewer_id: Option<UserId>,
    pub anon_id: Option<String>,
    pub session_id: Option<String>,
    pub video_id: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub device_type: DeviceType,
    pub os_type: OsType,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Locks the candidate's ad and campaign rows, re-verifies they are still
/// eligible and budgeted (SPEC_FULL.md §4.7 step 4), and — only if that
/// check passes — inserts the reservation in the same transaction.
///
/// The impression id is a client-generated UUID (`ImpressionId::new`), so
/// the token can be computed before this call; there is no provisional
/// token/rewrite step to collapse (see DESIGN.md's note on §4.2).
pub async fn reserve(
    pool: &DbPool,
    reservation: NewReservation,
    now: DateTime<Utc>,
) -> Result<Impression, CoreError> {
    let mut client = pool.get().await.map_err(db_err)?;
    let db_txn = client
        .build_transaction()
        .isolation_level(IsolationLevel::Serializable)
        .start()
        .await
        .map_err(db_err)?;

    let ad_row = db_txn
        .query_one(
            "SELECT status, budget_cents, spent_cents FROM ads WHERE id = $1 FOR UPDATE",
            &[&reservation.ad_id],
        )
        .await
        .map_err(db_err)?;
    let ad_status: AdStatus = ad_row.get(0);
    let ad_budget_cents: i64 = ad_row.get(1);
    let ad_spent: Money = ad_row.get(2);

    let campaign_row = db_txn
        .query_one(
            "SELECT status, budget_cents, spent_cents, start_date, end_date FROM campaigns WHERE id = $1 FOR UPDATE",
            &[&reservation.campaign_id],
        )
        .await
        .map_err(db_err)?;
    let campaign_status: CampaignStatus = campaign_row.get(0);
    let campaign_budget: Option<Money> = campaign_row.get(1);
    let campaign_spent: Money = campaign_row.get(2);
    let start_date: Option<DateTime<Utc>> = campaign_row.get(3);
    let end_date: Option<DateTime<Utc>> = campaign_row.get(4);

    let campaign_eligible = campaign_status.is_active()
        && start_date.map_or(true, |start| start <= now)
        && end_date.map_or(true, |end| end >= now);

    if !ad_status.is_active() || !campaign_eligible {
        return Err(CoreError::validation(
            "selected ad is no longer eligible for reservation",
        ));
    }

    let ad_budget = AdBudget::from_sentinel(ad_budget_cents).unwrap_or(AdBudget::Inherit);
    let available = match ad_budget.amount() {
        Some(budget) => budget.saturating_sub(&ad_spent),
        None => match campaign_budget {
            Some(budget) => budget.saturating_sub(&campaign_spent),
            None => reservation.cost,
        },
    };

    if available < reservation.cost {
        return Err(CoreError::BudgetExceeded {
            entity: "ad",
            id: reservation.ad_id.to_string(),
            spent: ad_spent.to_string(),
            budget: ad_budget
                .amount()
                .map(|budget| budget.to_string())
                .unwrap_or_else(|| "unlimited".to_string()),
        });
    }

    let stmt = db_txn
        .prepare(&format!(
            "INSERT INTO impressions (id, token, ad_id, campaign_id, status, action, cost_cents, expires_at, viewer_id, anon_id, session_id, video_id, category, tags, device_type, os_type, user_agent, ip_address, served_at, confirmed_at, created_at, updated_at) VALUES ($1, $2, $3, $4, 'reserved', 'view', $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, NULL, $17, $17) RETURNING {SELECT_COLUMNS}"
        ))
        .await
        .map_err(db_err)?;

    let row = db_txn
        .query_one(
            &stmt,
            &[
                &reservation.id,
                &reservation.token,
                &reservation.ad_id,
                &reservation.campaign_id,
                &(reservation.cost.to_cents() as i64),
                &reservation.expires_at,
                &reservation.viewer_id,
                &reservation.anon_id,
                &reservation.session_id,
                &reservation.video_id,
                &reservation.category,
                &reservation.tags,
                &reservation.device_type,
                &reservation.os_type,
                &reservation.user_agent,
                &reservation.ip_address,
                &now,
            ],
        )
        .await
        .map_err(db_err)?;

    db_txn.commit().await.map_err(db_err)?;

    Ok(Impression::from(&row))
}

pub async fn fetch_by_token(pool: &DbPool, token: &str) -> Result<Option<Impression>, PoolError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare(&format!("SELECT {SELECT_COLUMNS} FROM impressions WHERE token = $1"))
        .await?;
    let row = client.query_opt(&stmt, &[&token]).await?;

    Ok(row.as_ref().map(Impression::from))
}

pub async fn mark_expired(pool: &DbPool, impression_id: ImpressionId) -> Result<(), PoolError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare("UPDATE impressions SET status = 'expired', updated_at = $1 WHERE id = $2")
        .await?;
    client.execute(&stmt, &[&Utc::now(), &impression_id]).await?;

    Ok(())
}

/// Applies a validated `ConfirmEvent` to the impression row: the caller
/// must have already called `Impression::validate_transition`. Records
/// identity reconciliation and the resulting `action`/`status`.
pub async fn apply_confirm(
    pool: &DbPool,
    impression: &Impression,
    event: ConfirmEvent,
    user_agent: Option<&str>,
    ip_address: Option<&str>,
) -> Result<Impression, CoreError> {
    let client = pool.get().await.map_err(db_err)?;

    let next_status = if event.is_billing_event() {
        ImpressionStatus::Served
    } else {
        ImpressionStatus::Confirmed
    };
    let next_action = event.resulting_action();
    let now = Utc::now();

    let stmt = client
        .prepare(&format!(
            "UPDATE impressions SET status = $1, action = $2, viewer_id = $3, anon_id = $4, user_agent = COALESCE($5, user_agent), ip_address = COALESCE($6, ip_address), served_at = COALESCE(served_at, $7), confirmed_at = $7, updated_at = $7 WHERE id = $8 RETURNING {SELECT_COLUMNS}"
        ))
        .await
        .map_err(db_err)?;

    let row = client
        .query_one(
            &stmt,
            &[
                &next_status,
                &next_action,
                &impression.viewer_id,
                &impression.anon_id,
                &user_agent,
                &ip_address,
                &now,
                &impression.id,
            ],
        )
        .await
        .map_err(db_err)?;

    Ok(Impression::from(&row))
}

fn db_err<E: std::fmt::Display>(error: E) -> CoreError {
    CoreError::internal(format!("database error: {error}"))
}

/// Not currently constructed anywhere; the `ImpressionAction` variant list
/// is exhaustively matched through `ConfirmEvent::resulting_action`, kept
/// here so this module still type-checks if that ever changes.
#[allow(dead_code)]
fn _exhaustive(action: ImpressionAction) -> ImpressionAction {
    action
}
