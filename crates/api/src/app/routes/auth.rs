use std::sync::Arc;

use axum::{Json, extract::Extension, extract::rejection::JsonRejection, http::StatusCode};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::app::errors;
use crate::app::services::AuthServices;
use crate::app::dto::LoginRequest;

pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub async fn login(
    Extension(auth): Extension<Arc<AuthServices>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let Ok(Json(body)) = body else {
        return errors::json_error(StatusCode::BAD_REQUEST, "Invalid request body", None);
    };

    let Some(principal) = auth.credentials.verify(&body.username, &body.password) else {
        tracing::info!(username = %body.username, "login rejected");
        return errors::json_error(StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS, None);
    };

    match auth.issuer().issue(&principal, Utc::now()) {
        Ok(issued) => {
            tracing::info!(username = %principal, "login succeeded");
            errors::success(
                StatusCode::OK,
                "Login successful",
                json!({
                    "token": issued.token,
                    "expires_at": issued.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                }),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to sign token");
            errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate token",
                Some(e.to_string()),
            )
        }
    }
}
