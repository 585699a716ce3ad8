use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::app::errors;
use crate::context::PrincipalContext;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> axum::response::Response {
    errors::success(
        StatusCode::OK,
        "Authenticated",
        json!({ "username": principal.username() }),
    )
}
