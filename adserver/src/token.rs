//! Impression token codec (SPEC_FULL.md §4.2).
//!
//! A token is an opaque, HMAC-signed string carrying `{impression_id,
//! expires_at, type}`. Callers never decode it themselves; the server
//! re-looks-up the canonical impression row by the token string. Signing
//! (rather than plain lookup-by-id) keeps an attacker who guesses a UUID
//! from forging a valid-looking token for an impression they don't own.

use base64::{decode_config, encode_config, URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use primitives::{error::CoreError, ids::ImpressionId};
use sha2::Sha256;

const TOKEN_TYPE: &str = "impression";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct TokenSecret(Vec<u8>);

impl TokenSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }
}

pub struct DecodedToken {
    pub impression_id: ImpressionId,
    pub expires_at: DateTime<Utc>,
}

/// Encodes `payload.signature` where `payload` is
/// `base64(impression_id|expires_at_millis|type)` and `signature` is the
/// base64-encoded HMAC-SHA256 of `payload` under `secret`.
pub fn encode(secret: &TokenSecret, impression_id: ImpressionId, expires_at: DateTime<Utc>) -> String {
    let payload = format!("{}|{}|{}", impression_id, expires_at.timestamp_millis(), TOKEN_TYPE);
    let payload_b64 = encode_config(&payload, URL_SAFE_NO_PAD);

    let mut mac = HmacSha256::new_from_slice(&secret.0).expect("HMAC accepts keys of any length");
    mac.update(payload_b64.as_bytes());
    let signature = encode_config(mac.finalize().into_bytes(), URL_SAFE_NO_PAD);

    format!("{payload_b64}.{signature}")
}

/// Verifies the signature, type tag, and structure; expiry against `now`
/// is the caller's responsibility (`CoreError::Expired` is the confirmer's
/// concern, not the codec's — see §4.8 step 3, which also needs to
/// distinguish "already marked expired in the row" from "token says so").
pub fn decode(secret: &TokenSecret, token: &str) -> Result<DecodedToken, CoreError> {
    let (payload_b64, signature) = token
        .split_once('.')
        .ok_or_else(|| CoreError::validation("malformed impression token"))?;

    let mut mac = HmacSha256::new_from_slice(&secret.0).expect("HMAC accepts keys of any length");
    mac.update(payload_b64.as_bytes());
    let expected_signature = decode_config(signature, URL_SAFE_NO_PAD)
        .map_err(|_| CoreError::validation("malformed impression token"))?;
    mac.verify_slice(&expected_signature)
        .map_err(|_| CoreError::validation("invalid impression token signature"))?;

    let payload = decode_config(payload_b64, URL_SAFE_NO_PAD)
        .map_err(|_| CoreError::validation("malformed impression token"))?;
    let payload = String::from_utf8(payload)
        .map_err(|_| CoreError::validation("malformed impression token"))?;

    let mut parts = payload.splitn(3, '|');
    let impression_id = parts
        .next()
        .ok_or_else(|| CoreError::validation("malformed impression token"))?
        .parse::<ImpressionId>()
        .map_err(|_| CoreError::validation("malformed impression token"))?;
    let expires_at_millis = parts
        .next()
        .ok_or_else(|| CoreError::validation("malformed impression token"))?
        .parse::<i64>()
        .map_err(|_| CoreError::validation("malformed impression token"))?;
    let token_type = parts
        .next()
        .ok_or_else(|| CoreError::validation("malformed impression token"))?;

    if token_type != TOKEN_TYPE {
        return Err(CoreError::validation("unexpected impression token type"));
    }

    let expires_at = Utc
        .timestamp_millis_opt(expires_at_millis)
        .single()
        .ok_or_else(|| CoreError::validation("malformed impression token"))?;

    Ok(DecodedToken {
        impression_id,
        expires_at,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;

    fn secret() -> TokenSecret {
        TokenSecret::new(b"test-secret-key".to_vec())
    }

    #[test]
    fn round_trips_a_valid_token() {
        let impression_id = ImpressionId::new();
        let expires_at = Utc::now() + Duration::minutes(10);
        let token = encode(&secret(), impression_id, expires_at);

        let decoded = decode(&secret(), &token).unwrap();
        assert_eq!(impression_id, decoded.impression_id);
        assert_eq!(expires_at.timestamp_millis(), decoded.expires_at.timestamp_millis());
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let impression_id = ImpressionId::new();
        let expires_at = Utc::now() + Duration::minutes(10);
        let token = encode(&secret(), impression_id, expires_at);

        let (payload, signature) = token.split_once('.').unwrap();
        let forged = format!("{payload}x.{signature}");

        assert!(decode(&secret(), &forged).is_err());
    }

    #[test]
    fn rejects_a_token_signed_with_a_different_secret() {
        let token = encode(&secret(), ImpressionId::new(), Utc::now() + Duration::minutes(10));
        let other = TokenSecret::new(b"a-different-secret".to_vec());

        assert!(decode(&other, &token).is_err());
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(decode(&secret(), "not-a-token").is_err());
        assert!(decode(&secret(), "").is_err());
    }
}
