use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::{ids::AdId, money::Money, CampaignId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(postgres_types::ToSql, postgres_types::FromSql))]
#[cfg_attr(feature = "postgres", postgres(name = "ad_status"))]
pub enum AdStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Rejected,
    UnderReview,
}

impl AdStatus {
    pub fn is_active(self) -> bool {
        matches!(self, AdStatus::Active)
    }
}

/// An ad's own budget allocation. `Inherit` is the domain name for what
/// the wire format and the `ads.budget_cents` column represent with the
/// sentinel value `-1`: "use whatever the parent campaign has left".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdBudget {
    Inherit,
    Amount(Money),
}

impl AdBudget {
    pub const INHERIT_SENTINEL: i64 = -1;

    pub fn amount(self) -> Option<Money> {
        match self {
            AdBudget::Inherit => None,
            AdBudget::Amount(money) => Some(money),
        }
    }

    /// Decodes the `-1`-means-inherit convention used on the wire and in
    /// storage. Any other negative value is rejected by the caller before
    /// it reaches here.
    pub fn from_sentinel(value: i64) -> Option<Self> {
        if value == Self::INHERIT_SENTINEL {
            Some(AdBudget::Inherit)
        } else {
            u64::try_from(value).ok().map(|cents| AdBudget::Amount(Money::from_cents(cents)))
        }
    }

    pub fn to_sentinel(self) -> i64 {
        match self {
            AdBudget::Inherit => Self::INHERIT_SENTINEL,
            AdBudget::Amount(money) => money.to_cents() as i64,
        }
    }
}

/// Serializes as the same `-1`-means-inherit sentinel used on the wire and
/// in storage, so API responses carry it under `budgetCents` without a
/// separate response DTO.
impl Serialize for AdBudget {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.to_sentinel())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ad {
    pub id: AdId,
    pub campaign_id: CampaignId,
    pub status: AdStatus,
    #[serde(rename = "budgetCents")]
    pub budget: AdBudget,
    pub spent: Money,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub thumbnail_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_link: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Ad {
    pub fn is_eligible(&self, campaign_eligible: bool) -> bool {
        self.status.is_active() && campaign_eligible
    }

    /// The ad's own remaining budget, if it has one. `None` means "ask
    /// the campaign" (either the ad inherits, or has no cap of its own).
    pub fn own_remaining(&self) -> Option<Money> {
        match self.budget {
            AdBudget::Inherit => None,
            AdBudget::Amount(budget) => Some(budget.saturating_sub(&self.spent)),
        }
    }

    pub fn categories_lower(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.to_lowercase()).collect()
    }

    pub fn tags_lower(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.to_lowercase()).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ad_budget_sentinel_round_trips() {
        assert_eq!(Some(AdBudget::Inherit), AdBudget::from_sentinel(-1));
        assert_eq!(
            Some(AdBudget::Amount(Money::from_cents(500))),
            AdBudget::from_sentinel(500)
        );
        assert_eq!(-1, AdBudget::Inherit.to_sentinel());
        assert_eq!(500, AdBudget::Amount(Money::from_cents(500)).to_sentinel());
    }

    #[test]
    fn own_remaining_is_none_when_inheriting() {
        let ad = Ad {
            id: AdId::new(),
            campaign_id: CampaignId::new(),
            status: AdStatus::Active,
            budget: AdBudget::Inherit,
            spent: Money::ZERO,
            categories: vec!["sports".into()],
            tags: vec![],
            title: "t".into(),
            description: "d".into(),
            video_url: "https://example.com/v.mp4".into(),
            thumbnail_url: "https://example.com/t.jpg".into(),
            cta_link: None,
            created: Utc::now(),
            updated: Utc::now(),
        };

        assert_eq!(None, ad.own_remaining());
    }
}
