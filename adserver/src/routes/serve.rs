//! `POST /ad/serve` - the public ad decisioning endpoint.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::ConnectInfo,
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use primitives::dto::{NoAdResponse, ServeRequest};

use crate::{client_info, response::ResponseError, Application};

pub async fn serve(
    Extension(app): Extension<Arc<Application>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<ServeRequest>,
) -> Result<impl IntoResponse, ResponseError> {
    request.validate().map_err(ResponseError::from)?;

    let user_agent = headers.get(USER_AGENT).and_then(|value| value.to_str().ok());
    let client_info = client_info::parse(user_agent, Some(addr.ip().to_string()));
    let now = app.clock.now();

    let served = crate::serve::serve(
        &app.pool,
        &app.config,
        &app.token_secret,
        &request,
        client_info,
        now,
    )
    .await
    .map_err(ResponseError::from)?;

    match served {
        Some(response) => Ok((StatusCode::OK, Json(response)).into_response()),
        None => Ok((StatusCode::OK, Json(NoAdResponse::NoEligibleAds)).into_response()),
    }
}
