//! Ad CRUD (SPEC_FULL.md §6): thin axum handlers over `crate::lifecycle`,
//! scoped through the parent campaign's team so a caller can't reach an ad
//! that isn't theirs by guessing its id.

use std::sync::Arc;

use axum::{extract::Path, http::StatusCode, response::IntoResponse, Extension, Json};
use primitives::{
    dto::{CreateAdRequest, UpdateAdRequest},
    Ad, AdId, Campaign, CampaignId, TeamId,
};

use crate::{
    db,
    lifecycle,
    middleware::auth::{require_team, AuthRequired},
    response::ResponseError,
    Application,
};

async fn fetch_owned_campaign(
    app: &Application,
    team_id: TeamId,
    campaign_id: CampaignId,
) -> Result<Campaign, ResponseError> {
    let campaign = db::campaign::fetch_campaign(&app.pool, campaign_id)
        .await
        .map_err(|err| ResponseError::Internal(err.to_string()))?
        .ok_or(ResponseError::NotFound)?;

    if campaign.team_id != team_id {
        return Err(ResponseError::NotFound);
    }

    Ok(campaign)
}

async fn fetch_owned_ad(
    app: &Application,
    team_id: TeamId,
    campaign_id: CampaignId,
    ad_id: AdId,
) -> Result<(Campaign, Ad), ResponseError> {
    let campaign = fetch_owned_campaign(app, team_id, campaign_id).await?;

    let ad = db::ad::fetch_ad(&app.pool, ad_id)
        .await
        .map_err(|err| ResponseError::Internal(err.to_string()))?
        .ok_or(ResponseError::NotFound)?;

    if ad.campaign_id != campaign_id {
        return Err(ResponseError::NotFound);
    }

    Ok((campaign, ad))
}

/// `POST /teams/:team_id/campaigns/:campaign_id/ads`
pub async fn create(
    Extension(app): Extension<Arc<Application>>,
    Path((team_id, campaign_id)): Path<(TeamId, CampaignId)>,
    AuthRequired(session): AuthRequired,
    Json(request): Json<CreateAdRequest>,
) -> Result<impl IntoResponse, ResponseError> {
    let campaign = fetch_owned_campaign(&app, team_id, campaign_id).await?;
    require_team(&session, campaign.team_id)?;

    let ad = lifecycle::create_ad(&app.pool, campaign_id, &request)
        .await
        .map_err(ResponseError::from)?;

    Ok((StatusCode::CREATED, Json(ad)))
}

/// `PUT /teams/:team_id/campaigns/:campaign_id/ads/:ad_id`
pub async fn update(
    Extension(app): Extension<Arc<Application>>,
    Path((team_id, campaign_id, ad_id)): Path<(TeamId, CampaignId, AdId)>,
    AuthRequired(session): AuthRequired,
    Json(request): Json<UpdateAdRequest>,
) -> Result<impl IntoResponse, ResponseError> {
    let (campaign, ad) = fetch_owned_ad(&app, team_id, campaign_id, ad_id).await?;
    require_team(&session, campaign.team_id)?;

    let updated = lifecycle::update_ad(&app.pool, ad.id, &request)
        .await
        .map_err(ResponseError::from)?;

    Ok((StatusCode::OK, Json(updated)))
}

/// `DELETE /teams/:team_id/campaigns/:campaign_id/ads/:ad_id`
pub async fn delete(
    Extension(app): Extension<Arc<Application>>,
    Path((team_id, campaign_id, ad_id)): Path<(TeamId, CampaignId, AdId)>,
    AuthRequired(session): AuthRequired,
) -> Result<impl IntoResponse, ResponseError> {
    let (campaign, ad) = fetch_owned_ad(&app, team_id, campaign_id, ad_id).await?;
    require_team(&session, campaign.team_id)?;

    lifecycle::delete_ad(&app.pool, ad.id)
        .await
        .map_err(ResponseError::from)?;

    Ok(StatusCode::NO_CONTENT)
}
