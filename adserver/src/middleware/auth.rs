//! Bearer auth boundary (SPEC_FULL.md §6, §4.10).
//!
//! SSO and session verification live entirely outside this core; by the
//! time a request reaches here, the upstream auth layer has already
//! validated the caller and forwards its claim as an opaque
//! `Authorization: Bearer <opaque-session-id>` value. `AuthRequired`
//! treats that value as a pre-validated `"<team_id>:<user_id>"` claim —
//! no cryptographic verification happens here, mirroring the teacher's
//! `middleware/auth.rs::for_request`, which likewise only extracts the
//! Bearer token and resolves it against an already-trusted session store.
//!
//! A missing or malformed header is `401`; matching it against a
//! resource's owning team is a separate check (`require_team`, grounded
//! on the teacher's `middleware/campaign.rs::CalledByCreator`) that
//! callers apply once they've loaded the resource.

use async_trait::async_trait;
use axum::{extract::FromRequest, http::header::AUTHORIZATION, RequestParts};
use primitives::{TeamId, UserId};

use crate::response::ResponseError;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub team_id: TeamId,
}

pub struct AuthRequired(pub Session);

fn parse_claim(raw: &str) -> Option<Session> {
    let (team_id, user_id) = raw.split_once(':')?;

    Some(Session {
        team_id: team_id.parse().ok()?,
        user_id: user_id.parse().ok()?,
    })
}

#[async_trait]
impl<B: Send> FromRequest<B> for AuthRequired {
    type Rejection = ResponseError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .ok_or(ResponseError::Unauthorized)?;
        let header = header.to_str().map_err(|_| ResponseError::Unauthorized)?;
        let token = header
            .strip_prefix(BEARER_PREFIX)
            .ok_or(ResponseError::Unauthorized)?;

        let session = parse_claim(token).ok_or(ResponseError::Unauthorized)?;

        Ok(AuthRequired(session))
    }
}

/// 403s when `session`'s team doesn't own the resource, mirroring the
/// teacher's `CalledByCreator` guard (`auth.uid.to_address() !=
/// campaign.creator`).
pub fn require_team(session: &Session, owning_team: TeamId) -> Result<(), ResponseError> {
    if session.team_id == owning_team {
        Ok(())
    } else {
        Err(ResponseError::Forbidden(
            "not a member of the team that owns this resource".to_string(),
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_a_well_formed_claim() {
        let team_id = TeamId::new();
        let user_id = UserId::new();
        let raw = format!("{team_id}:{user_id}");

        let session = parse_claim(&raw).unwrap();
        assert_eq!(team_id, session.team_id);
        assert_eq!(user_id, session.user_id);
    }

    #[test]
    fn rejects_a_claim_missing_the_separator() {
        assert!(parse_claim("not-a-valid-claim").is_none());
    }

    #[test]
    fn require_team_matches_only_the_owning_team() {
        let owning_team = TeamId::new();
        let session = Session {
            user_id: UserId::new(),
            team_id: owning_team,
        };
        assert!(require_team(&session, owning_team).is_ok());
        assert!(require_team(&session, TeamId::new()).is_err());
    }
}
