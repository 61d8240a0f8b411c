use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::CoreError, ids::AdId, impression::ConfirmEvent, money::Money};

/// `POST /ad/serve` request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServeRequest {
    pub video_id: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub anon_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ServeRequest {
    /// Validates the cross-field rules the request schema describes:
    /// at least one of category/tags, and exactly one of user_id/anon_id.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.video_id.trim().is_empty() {
            return Err(CoreError::validation("videoId must not be empty"));
        }

        let has_targeting = self.category.is_some()
            || self.tags.as_ref().map_or(false, |tags| !tags.is_empty());
        if !has_targeting {
            return Err(CoreError::validation(
                "at least one of category or tags is required",
            ));
        }

        match (&self.user_id, &self.anon_id) {
            (Some(_), Some(_)) => Err(CoreError::validation(
                "exactly one of user_id or anon_id must be set, not both",
            )),
            (None, None) => Err(CoreError::validation(
                "exactly one of user_id or anon_id must be set",
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServedAd {
    pub id: AdId,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub thumbnail_url: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta_link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServeResponse {
    pub ad: ServedAd,
    pub impression_token: String,
    pub cost_cents: u64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "reason")]
pub enum NoAdResponse {
    #[serde(rename = "no_eligible_ads")]
    NoEligibleAds,
}

/// Optional context reported alongside a confirm event; none of these
/// fields gate the transition, they only enrich the stored impression.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmMetadata {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub view_duration: Option<u32>,
    #[serde(default)]
    pub video_progress: Option<u8>,
}

/// `POST /impression/confirm` request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub token: String,
    pub event: ConfirmEvent,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub anon_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<ConfirmMetadata>,
}

impl ConfirmRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.token.trim().is_empty() {
            return Err(CoreError::validation("token must not be empty"));
        }

        if self.user_id.is_some() && self.anon_id.is_some() {
            return Err(CoreError::validation(
                "providing both user_id and anon_id is not allowed",
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingDetails {
    pub cost_cents: u64,
    /// `None` when the charged entity (ad or campaign) is uncapped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_budget_cents: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_details: Option<BillingDetails>,
}

/// Fields accepted when creating or updating a campaign. `budget` absent
/// means uncapped; explicitly setting it to `None` on update is not
/// distinguishable from "not supplied" by design - callers that want to
/// uncap a campaign must do so deliberately via a dedicated flag, which
/// this core does not currently expose.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub team_id: String,
    #[serde(default)]
    pub budget: Option<Money>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaignRequest {
    #[serde(default)]
    pub budget: Option<Money>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdRequest {
    /// `None`/absent or `-1` means "inherit the campaign's budget".
    #[serde(default)]
    pub budget_cents: Option<i64>,
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub thumbnail_url: String,
    #[serde(default)]
    pub cta_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAdRequest {
    #[serde(default)]
    pub budget_cents: Option<i64>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cta_link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn serve_request_requires_targeting_and_single_identity() {
        let mut request = ServeRequest {
            video_id: "vid-1".into(),
            category: None,
            tags: None,
            user_id: Some("u1".into()),
            anon_id: None,
            session_id: None,
        };
        assert!(request.validate().is_err(), "no category/tags");

        request.category = Some("sports".into());
        assert!(request.validate().is_ok());

        request.anon_id = Some("a1".into());
        assert!(request.validate().is_err(), "both user_id and anon_id set");
    }

    #[test]
    fn confirm_request_rejects_both_identities() {
        let request = ConfirmRequest {
            token: "tok".into(),
            event: ConfirmEvent::Served,
            user_id: Some("u1".into()),
            anon_id: Some("a1".into()),
            metadata: None,
        };

        assert!(request.validate().is_err());
    }
}
