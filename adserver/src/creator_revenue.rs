//! Creator Revenue notification client (SPEC_FULL.md §4.8 step 6, §6).
//!
//! Grounded on `platform.rs`'s `PlatformApi`/`PlatformApiInner` split: a
//! cheap-to-clone handle wrapping the real `reqwest::Client` in an `Arc`.
//! Unlike `PlatformApi`, every call here is fire-and-forget — failures are
//! logged by the caller and never propagated, per the external-collaborator
//! contract in §6.

use primitives::{ids::AdId, money::Money, util::ApiUrl, UserId};
use reqwest::Client;
use serde::Serialize;
use std::{sync::Arc, time::Duration};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdConfirmedPayload {
    video_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    viewer_id: Option<UserId>,
    ad_id: AdId,
    cost_cents: u64,
}

/// Cheap to clone: wraps the real `reqwest::Client` and endpoint in an `Arc`.
#[derive(Debug, Clone)]
pub struct CreatorRevenueClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    base_url: ApiUrl,
    api_key: String,
    client: Client,
}

impl CreatorRevenueClient {
    pub fn new(base_url: ApiUrl, api_key: impl Into<String>) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                base_url,
                api_key: api_key.into(),
                client,
            }),
        })
    }

    /// Notifies the monetization endpoint that `ad_id` was billed for
    /// `video_id`. Returns the underlying reqwest error to the caller so it
    /// can be logged with context; the caller MUST NOT propagate it as a
    /// request failure (see `confirm::confirm_impression`).
    pub async fn notify_ad_confirmed(
        &self,
        video_id: &str,
        viewer_id: Option<UserId>,
        ad_id: AdId,
        cost: Money,
    ) -> reqwest::Result<()> {
        let url = self
            .inner
            .base_url
            .join("api/monetization/ad-confirmed")
            .expect("creator revenue endpoint should always be joinable");

        let payload = AdConfirmedPayload {
            video_id: video_id.to_string(),
            viewer_id,
            ad_id,
            cost_cents: cost.to_cents(),
        };

        self.inner
            .client
            .post(url)
            .header("x-api-key", &self.inner.api_key)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payload_serializes_viewer_id_only_when_present() {
        let payload = AdConfirmedPayload {
            video_id: "vid-1".to_string(),
            viewer_id: None,
            ad_id: AdId::new(),
            cost_cents: 50,
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("viewerId").is_none());
    }
}
