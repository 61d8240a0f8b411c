use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::CoreError, ids::ImpressionId, money::Money, AdId, CampaignId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(postgres_types::ToSql, postgres_types::FromSql))]
#[cfg_attr(feature = "postgres", postgres(name = "impression_status"))]
pub enum ImpressionStatus {
    Reserved,
    Served,
    Confirmed,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(postgres_types::ToSql, postgres_types::FromSql))]
#[cfg_attr(feature = "postgres", postgres(name = "impression_action"))]
pub enum ImpressionAction {
    View,
    Click,
    Skip,
    Complete,
    Pause,
    Resume,
    Mute,
    Unmute,
}

/// The confirmable events a client can report for a reserved impression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmEvent {
    Served,
    Clicked,
    Completed,
    Skipped,
}

impl ConfirmEvent {
    /// Whether this event opens the billing path (the only transition out
    /// of `Reserved`) versus the tracking-only path.
    pub fn is_billing_event(self) -> bool {
        matches!(self, ConfirmEvent::Served)
    }

    pub fn resulting_action(self) -> ImpressionAction {
        match self {
            ConfirmEvent::Served => ImpressionAction::View,
            ConfirmEvent::Clicked => ImpressionAction::Click,
            ConfirmEvent::Completed => ImpressionAction::Complete,
            ConfirmEvent::Skipped => ImpressionAction::Skip,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(postgres_types::ToSql, postgres_types::FromSql))]
#[cfg_attr(feature = "postgres", postgres(name = "device_type"))]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
    Tv,
    #[default]
    Unknown,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(postgres_types::ToSql, postgres_types::FromSql))]
#[cfg_attr(feature = "postgres", postgres(name = "os_type"))]
pub enum OsType {
    Windows,
    MacOs,
    Linux,
    Ios,
    Android,
    #[default]
    Unknown,
}

/// Identity carried by a reservation: exactly one of `viewer`/`anon` is
/// ever set, mirroring the "exactly one of user_id/anon_id" invariant on
/// the serve request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerIdentity {
    User(UserId),
    Anonymous(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Impression {
    pub id: ImpressionId,
    pub token: String,
    pub ad_id: AdId,
    pub campaign_id: CampaignId,
    pub status: ImpressionStatus,
    pub action: ImpressionAction,
    pub cost_cents: u64,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anon_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub video_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub device_type: DeviceType,
    pub os_type: OsType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Impression {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ImpressionStatus::Expired || self.expires_at < now
    }

    /// Validates `event` against the impression's current state, per the
    /// transition table: `reserved -> served`, then `served -> confirmed`
    /// for any of clicked/completed/skipped. Every other combination -
    /// including re-confirming a terminal state - is rejected.
    pub fn validate_transition(&self, event: ConfirmEvent) -> Result<(), CoreError> {
        let allowed = matches!(
            (self.status, event),
            (ImpressionStatus::Reserved, ConfirmEvent::Served)
                | (
                    ImpressionStatus::Served,
                    ConfirmEvent::Clicked | ConfirmEvent::Completed | ConfirmEvent::Skipped
                )
        );

        if allowed {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                from: format!("{:?}", self.status),
                event: format!("{:?}", event),
            })
        }
    }

    /// Reconciles the carried identity with a newly supplied one:
    /// promoting an anonymous viewer to a known user clears `anon_id`;
    /// an anonymous id is only recorded when no user is already known.
    pub fn reconcile_identity(&mut self, identity: Option<ViewerIdentity>) {
        match identity {
            Some(ViewerIdentity::User(user_id)) => {
                self.viewer_id = Some(user_id);
                self.anon_id = None;
            }
            Some(ViewerIdentity::Anonymous(anon_id)) if self.viewer_id.is_none() => {
                self.anon_id = Some(anon_id);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;

    fn reserved(now: DateTime<Utc>) -> Impression {
        Impression {
            id: ImpressionId::new(),
            token: "tok".into(),
            ad_id: AdId::new(),
            campaign_id: CampaignId::new(),
            status: ImpressionStatus::Reserved,
            action: ImpressionAction::View,
            cost_cents: 100,
            expires_at: now + Duration::minutes(10),
            viewer_id: None,
            anon_id: Some("anon-1".into()),
            session_id: None,
            video_id: "vid-1".into(),
            category: Some("sports".into()),
            tags: vec!["news".into()],
            device_type: DeviceType::Mobile,
            os_type: OsType::Ios,
            user_agent: None,
            ip_address: None,
            served_at: Some(now),
            confirmed_at: None,
            created: now,
            updated: now,
        }
    }

    #[test]
    fn reserved_to_served_is_the_only_exit_from_reserved() {
        let now = Utc::now();
        let impression = reserved(now);

        assert!(impression.validate_transition(ConfirmEvent::Served).is_ok());
        assert!(impression
            .validate_transition(ConfirmEvent::Clicked)
            .is_err());
    }

    #[test]
    fn served_accepts_any_terminal_tracking_event_once() {
        let now = Utc::now();
        let mut impression = reserved(now);
        impression.status = ImpressionStatus::Served;

        assert!(impression.validate_transition(ConfirmEvent::Clicked).is_ok());
        assert!(impression
            .validate_transition(ConfirmEvent::Completed)
            .is_ok());

        impression.status = ImpressionStatus::Confirmed;
        assert!(impression
            .validate_transition(ConfirmEvent::Clicked)
            .is_err());
    }

    #[test]
    fn reconcile_identity_promotes_anon_to_user_and_clears_anon_id() {
        let now = Utc::now();
        let mut impression = reserved(now);
        assert_eq!(Some("anon-1".to_string()), impression.anon_id);

        let user_id = UserId::new();
        impression.reconcile_identity(Some(ViewerIdentity::User(user_id)));

        assert_eq!(Some(user_id), impression.viewer_id);
        assert_eq!(None, impression.anon_id);
    }

    #[test]
    fn is_expired_checks_both_status_and_deadline() {
        let now = Utc::now();
        let mut impression = reserved(now);
        assert!(!impression.is_expired(now));

        impression.expires_at = now - Duration::seconds(1);
        assert!(impression.is_expired(now));
    }
}
