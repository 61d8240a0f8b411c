//! `POST /impression/confirm` and the debug `GET /impression/:token` lookup.

use std::sync::Arc;

use axum::{extract::Path, http::StatusCode, response::IntoResponse, Extension, Json};
use primitives::dto::ConfirmRequest;

use crate::{response::ResponseError, Application};

pub async fn confirm(
    Extension(app): Extension<Arc<Application>>,
    Json(request): Json<ConfirmRequest>,
) -> Result<impl IntoResponse, ResponseError> {
    request.validate().map_err(ResponseError::from)?;

    let now = app.clock.now();
    let response = crate::confirm::confirm(
        &app.pool,
        &app.token_secret,
        &app.creator_revenue,
        &app.logger,
        &request,
        now,
    )
    .await
    .map_err(ResponseError::from)?;

    Ok((StatusCode::OK, Json(response)))
}

/// Lets an operator or the front-end poll an impression's current state by
/// its opaque token, mainly for debugging a stuck reservation.
pub async fn lookup(
    Extension(app): Extension<Arc<Application>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ResponseError> {
    let impression = crate::db::impression::fetch_by_token(&app.pool, &token)
        .await
        .map_err(|err| ResponseError::Internal(err.to_string()))?
        .ok_or(ResponseError::NotFound)?;

    Ok((StatusCode::OK, Json(impression)))
}
