use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ids::CampaignId, money::Money, TeamId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(postgres_types::ToSql, postgres_types::FromSql))]
#[cfg_attr(feature = "postgres", postgres(name = "campaign_status"))]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn is_active(self) -> bool {
        matches!(self, CampaignStatus::Active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: CampaignId,
    pub team_id: TeamId,
    pub owner_user_id: UserId,
    pub status: CampaignStatus,
    /// Absent means uncapped: ads under this campaign must then carry
    /// their own explicit budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Money>,
    pub spent: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Campaign {
    /// Whether `now` falls within the campaign's configured validity
    /// window. An absent bound is treated as unbounded on that side.
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.start_date.map_or(true, |start| start <= now)
            && self.end_date.map_or(true, |end| end >= now)
    }

    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status.is_active() && self.is_within_window(now)
    }

    /// Remaining budget, or `None` if the campaign is uncapped.
    pub fn remaining(&self) -> Option<Money> {
        self.budget.map(|budget| budget.saturating_sub(&self.spent))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn dummy_campaign(now: DateTime<Utc>) -> Campaign {
        Campaign {
            id: CampaignId::new(),
            team_id: TeamId::new(),
            owner_user_id: UserId::new(),
            status: CampaignStatus::Active,
            budget: Some(Money::from_cents(10_000)),
            spent: Money::from_cents(2_000),
            start_date: None,
            end_date: None,
            created: now,
            updated: now,
        }
    }

    #[test]
    fn is_eligible_respects_status_and_window() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        let mut campaign = dummy_campaign(now);
        assert!(campaign.is_eligible(now));

        campaign.status = CampaignStatus::Paused;
        assert!(!campaign.is_eligible(now));

        campaign.status = CampaignStatus::Active;
        campaign.start_date = Some(now + Duration::days(1));
        assert!(!campaign.is_eligible(now));

        campaign.start_date = None;
        campaign.end_date = Some(now - Duration::days(1));
        assert!(!campaign.is_eligible(now));
    }

    #[test]
    fn remaining_is_none_when_uncapped() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        let mut campaign = dummy_campaign(now);
        assert_eq!(Some(Money::from_cents(8_000)), campaign.remaining());

        campaign.budget = None;
        assert_eq!(None, campaign.remaining());
    }
}
