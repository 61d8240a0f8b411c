//! `GET /cfg` - exposes the business configuration currently in effect.

use std::sync::Arc;

use axum::{response::IntoResponse, Extension, Json};

use crate::Application;

pub async fn config(Extension(app): Extension<Arc<Application>>) -> impl IntoResponse {
    Json(app.config.clone())
}
