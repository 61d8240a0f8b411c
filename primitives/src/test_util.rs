use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

use crate::{
    ad::{Ad, AdBudget, AdStatus},
    campaign::{Campaign, CampaignStatus},
    clock::FixedClock,
    ids::{AdId, CampaignId, TeamId, UserId},
    money::Money,
    wallet::Wallet,
};

/// A clock fixed at a point safely in the future of every other fixture's
/// `created`/`updated` timestamps, so `IMPRESSION_TTL`-style comparisons
/// in tests are deterministic.
pub static NOW: Lazy<DateTime<Utc>> = Lazy::new(|| "2026-01-15T12:00:00Z".parse().unwrap());

pub static DUMMY_TEAM: Lazy<TeamId> = Lazy::new(TeamId::new);
pub static DUMMY_OWNER: Lazy<UserId> = Lazy::new(UserId::new);
pub static DUMMY_VIEWER: Lazy<UserId> = Lazy::new(UserId::new);

pub fn fixed_clock() -> FixedClock {
    FixedClock(*NOW)
}

pub fn dummy_wallet() -> Wallet {
    Wallet::new(*DUMMY_OWNER, "USD", *NOW)
}

pub fn dummy_campaign() -> Campaign {
    Campaign {
        id: CampaignId::new(),
        team_id: *DUMMY_TEAM,
        owner_user_id: *DUMMY_OWNER,
        status: CampaignStatus::Active,
        budget: Some(Money::from_cents(100_000)),
        spent: Money::ZERO,
        start_date: None,
        end_date: None,
        created: *NOW,
        updated: *NOW,
    }
}

pub fn dummy_ad(campaign_id: CampaignId) -> Ad {
    Ad {
        id: AdId::new(),
        campaign_id,
        status: AdStatus::Active,
        budget: AdBudget::Inherit,
        spent: Money::ZERO,
        categories: vec!["sports".to_string()],
        tags: vec!["highlights".to_string(), "news".to_string()],
        title: "Dummy Ad".to_string(),
        description: "A dummy ad used in tests.".to_string(),
        video_url: "https://cdn.example.com/ad.mp4".to_string(),
        thumbnail_url: "https://cdn.example.com/ad.jpg".to_string(),
        cta_link: Some("https://example.com".to_string()),
        created: *NOW,
        updated: *NOW,
    }
}
