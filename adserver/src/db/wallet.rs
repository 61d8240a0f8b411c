//! Wallet ledger: `transact` and its convenience wrappers.
//!
//! Grounded on `db/accounting.rs`'s row-locked, transactional
//! read-then-update pattern, generalized from a two-sided accounting
//! entry to a single-wallet balance with an append-only transaction log.

use chrono::Utc;
use primitives::{
    error::CoreError,
    ids::WalletId,
    money::Money,
    wallet::{Transaction, TransactionKind, TransactionMeta, TransactionStatus, Wallet},
    CampaignId, UserId,
};
use tokio_postgres::{IsolationLevel, Row};
use uuid::Uuid;

use super::{DbPool, PoolError};

impl From<&Row> for Wallet {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            owner_user_id: row.get("owner_user_id"),
            balance: row.get("balance_cents"),
            currency: row.get("currency"),
            created: row.get("created_at"),
            updated: row.get("updated_at"),
        }
    }
}

impl From<&Row> for Transaction {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            wallet_id: row.get("wallet_id"),
            kind: row.get("kind"),
            amount: row.get("amount_cents"),
            status: row.get("status"),
            campaign_id: row.get("campaign_id"),
            ad_id: row.get("ad_id"),
            payment_method: row.get("payment_method"),
            reference_id: row.get("reference_id"),
            description: row.get("description"),
            created: row.get("created_at"),
            updated: row.get("updated_at"),
        }
    }
}

/// Fetches a user's wallet, creating it with a zero balance if it doesn't
/// exist yet. Wallets are lazy per the data model.
pub async fn get_or_create_wallet(
    pool: &DbPool,
    owner_user_id: UserId,
    currency: &str,
) -> Result<Wallet, PoolError> {
    let client = pool.get().await?;

    let select = client
        .prepare("SELECT id, owner_user_id, balance_cents, currency, created_at, updated_at FROM wallets WHERE owner_user_id = $1")
        .await?;
    if let Some(row) = client.query_opt(&select, &[&owner_user_id]).await? {
        return Ok(Wallet::from(&row));
    }

    let now = Utc::now();
    let wallet = Wallet::new(owner_user_id, currency, now);

    let insert = client
        .prepare("INSERT INTO wallets (id, owner_user_id, balance_cents, currency, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (owner_user_id) DO UPDATE SET owner_user_id = wallets.owner_user_id RETURNING id, owner_user_id, balance_cents, currency, created_at, updated_at")
        .await?;
    let row = client
        .query_one(
            &insert,
            &[
                &wallet.id,
                &wallet.owner_user_id,
                &wallet.balance,
                &wallet.currency,
                &wallet.created,
                &wallet.updated,
            ],
        )
        .await?;

    Ok(Wallet::from(&row))
}

/// Opens a transaction with a row lock on the wallet, applies `kind`
/// against `amount`, and records the ledger entry — all three writes
/// (insert pending, update balance, mark completed) commit atomically.
pub async fn transact(
    pool: &DbPool,
    wallet_id: WalletId,
    kind: TransactionKind,
    amount: Money,
    meta: TransactionMeta,
) -> Result<Transaction, CoreError> {
    let mut client = pool.get().await.map_err(db_err)?;
    let db_txn = client
        .build_transaction()
        .isolation_level(IsolationLevel::Serializable)
        .start()
        .await
        .map_err(db_err)?;

    let lock_stmt = db_txn
        .prepare("SELECT balance_cents FROM wallets WHERE id = $1 FOR UPDATE")
        .await
        .map_err(db_err)?;
    let balance_row = db_txn
        .query_one(&lock_stmt, &[&wallet_id])
        .await
        .map_err(db_err)?;
    let balance: Money = balance_row.get(0);

    let new_balance = match kind {
        TransactionKind::Credit => balance.checked_add(&amount).ok_or_else(|| {
            CoreError::internal("wallet balance overflow while crediting funds")
        })?,
        TransactionKind::Debit => balance.checked_sub(&amount).ok_or_else(|| {
            CoreError::InsufficientFunds {
                wallet: wallet_id.to_string(),
                balance: balance.to_string(),
                requested: amount.to_string(),
            }
        })?,
    };

    let txn_id = Uuid::new_v4();
    let now = Utc::now();

    let insert_stmt = db_txn
        .prepare("INSERT INTO wallet_transactions (id, wallet_id, kind, amount_cents, status, campaign_id, ad_id, payment_method, reference_id, description, created_at, updated_at) VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7, $8, $9, $10, $10)")
        .await
        .map_err(db_err)?;
    db_txn
        .execute(
            &insert_stmt,
            &[
                &txn_id,
                &wallet_id,
                &kind,
                &amount,
                &meta.campaign_id,
                &meta.ad_id,
                &meta.payment_method,
                &meta.reference_id,
                &meta.description,
                &now,
            ],
        )
        .await
        .map_err(db_err)?;

    let update_balance_stmt = db_txn
        .prepare("UPDATE wallets SET balance_cents = $1, updated_at = $2 WHERE id = $3")
        .await
        .map_err(db_err)?;
    db_txn
        .execute(&update_balance_stmt, &[&new_balance, &now, &wallet_id])
        .await
        .map_err(db_err)?;

    let complete_stmt = db_txn
        .prepare("UPDATE wallet_transactions SET status = 'completed', updated_at = $1 WHERE id = $2 RETURNING id, wallet_id, kind, amount_cents, status, campaign_id, ad_id, payment_method, reference_id, description, created_at, updated_at")
        .await
        .map_err(db_err)?;
    let row = db_txn
        .query_one(&complete_stmt, &[&now, &txn_id])
        .await
        .map_err(db_err)?;

    db_txn.commit().await.map_err(db_err)?;

    Ok(Transaction::from(&row))
}

pub async fn add_funds(
    pool: &DbPool,
    wallet_id: WalletId,
    amount: Money,
) -> Result<Transaction, CoreError> {
    transact(
        pool,
        wallet_id,
        TransactionKind::Credit,
        amount,
        TransactionMeta::wallet_adjustment("manual funds deposit"),
    )
    .await
}

pub async fn deduct_campaign_budget(
    pool: &DbPool,
    wallet_id: WalletId,
    campaign_id: CampaignId,
    amount: Money,
) -> Result<Transaction, CoreError> {
    transact(
        pool,
        wallet_id,
        TransactionKind::Debit,
        amount,
        TransactionMeta::campaign_allocation(campaign_id, "campaign budget allocation"),
    )
    .await
}

pub async fn refund_campaign_budget(
    pool: &DbPool,
    wallet_id: WalletId,
    campaign_id: CampaignId,
    amount: Money,
) -> Result<Transaction, CoreError> {
    transact(
        pool,
        wallet_id,
        TransactionKind::Credit,
        amount,
        TransactionMeta::campaign_allocation(campaign_id, "campaign budget refund"),
    )
    .await
}

pub async fn deduct_ad_budget(
    pool: &DbPool,
    wallet_id: WalletId,
    campaign_id: CampaignId,
    ad_id: primitives::AdId,
    amount: Money,
) -> Result<Transaction, CoreError> {
    transact(
        pool,
        wallet_id,
        TransactionKind::Debit,
        amount,
        TransactionMeta::ad_allocation(campaign_id, ad_id, "ad budget allocation"),
    )
    .await
}

pub async fn refund_ad_budget(
    pool: &DbPool,
    wallet_id: WalletId,
    campaign_id: CampaignId,
    ad_id: primitives::AdId,
    amount: Money,
) -> Result<Transaction, CoreError> {
    transact(
        pool,
        wallet_id,
        TransactionKind::Credit,
        amount,
        TransactionMeta::ad_allocation(campaign_id, ad_id, "ad budget refund"),
    )
    .await
}

fn db_err<E: std::fmt::Display>(error: E) -> CoreError {
    CoreError::internal(format!("database error: {error}"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn debit_exceeding_balance_is_rejected_before_touching_the_database() {
        let balance = Money::from_cents(500);
        let requested = Money::from_cents(600);

        assert_eq!(None, balance.checked_sub(&requested));
    }
}
