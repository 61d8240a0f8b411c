//! Campaign CRUD (SPEC_FULL.md §6): thin axum handlers over
//! `crate::lifecycle`, gated by the bearer session and a team-ownership
//! check against the campaign's actual `team_id`.

use std::sync::Arc;

use axum::{extract::Path, http::StatusCode, response::IntoResponse, Extension, Json};
use primitives::{
    dto::{CreateCampaignRequest, UpdateCampaignRequest},
    CampaignId, TeamId,
};

use crate::{
    db,
    lifecycle,
    middleware::auth::{require_team, AuthRequired},
    response::ResponseError,
    Application,
};

/// `POST /teams/:team_id/campaigns`
pub async fn create(
    Extension(app): Extension<Arc<Application>>,
    Path(team_id): Path<TeamId>,
    AuthRequired(session): AuthRequired,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<impl IntoResponse, ResponseError> {
    require_team(&session, team_id)?;

    let now = app.clock.now();
    let campaign = lifecycle::create_campaign(&app.pool, team_id, session.user_id, &request, now)
        .await
        .map_err(ResponseError::from)?;

    Ok((StatusCode::CREATED, Json(campaign)))
}

async fn fetch_owned_campaign(
    app: &Application,
    team_id: TeamId,
    campaign_id: CampaignId,
) -> Result<primitives::Campaign, ResponseError> {
    let campaign = db::campaign::fetch_campaign(&app.pool, campaign_id)
        .await
        .map_err(|err| ResponseError::Internal(err.to_string()))?
        .ok_or(ResponseError::NotFound)?;

    if campaign.team_id != team_id {
        return Err(ResponseError::NotFound);
    }

    Ok(campaign)
}

/// `PUT /teams/:team_id/campaigns/:campaign_id`
pub async fn update(
    Extension(app): Extension<Arc<Application>>,
    Path((team_id, campaign_id)): Path<(TeamId, CampaignId)>,
    AuthRequired(session): AuthRequired,
    Json(request): Json<UpdateCampaignRequest>,
) -> Result<impl IntoResponse, ResponseError> {
    let campaign = fetch_owned_campaign(&app, team_id, campaign_id).await?;
    require_team(&session, campaign.team_id)?;

    let now = app.clock.now();
    let updated = lifecycle::update_campaign(&app.pool, campaign_id, &request, now)
        .await
        .map_err(ResponseError::from)?;

    Ok((StatusCode::OK, Json(updated)))
}

/// `DELETE /teams/:team_id/campaigns/:campaign_id`
pub async fn delete(
    Extension(app): Extension<Arc<Application>>,
    Path((team_id, campaign_id)): Path<(TeamId, CampaignId)>,
    AuthRequired(session): AuthRequired,
) -> Result<impl IntoResponse, ResponseError> {
    let campaign = fetch_owned_campaign(&app, team_id, campaign_id).await?;
    require_team(&session, campaign.team_id)?;

    lifecycle::delete_campaign(&app.pool, campaign_id)
        .await
        .map_err(ResponseError::from)?;

    Ok(StatusCode::NO_CONTENT)
}
