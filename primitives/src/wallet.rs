use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ids::WalletId, money::Money, AdId, CampaignId, UserId};

/// A user's balance. Created lazily on first access; mutated only through
/// [`crate::wallet::Transaction`] entries applied by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: WalletId,
    pub owner_user_id: UserId,
    pub balance: Money,
    pub currency: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Wallet {
    pub fn new(owner_user_id: UserId, currency: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: WalletId::new(),
            owner_user_id,
            balance: Money::ZERO,
            currency: currency.into(),
            created: now,
            updated: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(postgres_types::ToSql, postgres_types::FromSql))]
#[cfg_attr(feature = "postgres", postgres(name = "transaction_kind"))]
pub enum TransactionKind {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(postgres_types::ToSql, postgres_types::FromSql))]
#[cfg_attr(feature = "postgres", postgres(name = "transaction_status"))]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

/// An append-only ledger entry. Once `status` reaches `Completed` the row
/// is never mutated again; corrections happen by inserting a new,
/// opposite-signed transaction, not by editing history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: uuid::Uuid,
    pub wallet_id: WalletId,
    pub kind: TransactionKind,
    pub amount: Money,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<CampaignId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_id: Option<AdId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Parameters for opening a new ledger entry; everything except
/// `wallet_id`/`kind`/`amount` describes where the money is going to or
/// coming from, for audit purposes.
#[derive(Debug, Clone)]
pub struct TransactionMeta {
    pub campaign_id: Option<CampaignId>,
    pub ad_id: Option<AdId>,
    pub payment_method: Option<String>,
    pub reference_id: Option<String>,
    pub description: Option<String>,
}

impl TransactionMeta {
    pub fn wallet_adjustment(description: impl Into<String>) -> Self {
        Self {
            campaign_id: None,
            ad_id: None,
            payment_method: Some("wallet".to_string()),
            reference_id: None,
            description: Some(description.into()),
        }
    }

    pub fn campaign_allocation(campaign_id: CampaignId, description: impl Into<String>) -> Self {
        Self {
            campaign_id: Some(campaign_id),
            ad_id: None,
            payment_method: Some("wallet".to_string()),
            reference_id: None,
            description: Some(description.into()),
        }
    }

    pub fn ad_allocation(
        campaign_id: CampaignId,
        ad_id: AdId,
        description: impl Into<String>,
    ) -> Self {
        Self {
            campaign_id: Some(campaign_id),
            ad_id: Some(ad_id),
            payment_method: Some("wallet".to_string()),
            reference_id: None,
            description: Some(description.into()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_wallet_starts_at_zero_balance() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let wallet = Wallet::new(UserId::new(), "USD", now);

        assert_eq!(Money::ZERO, wallet.balance);
        assert_eq!(now, wallet.created);
    }
}
