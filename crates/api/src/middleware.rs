use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use warehouse_auth::JwtValidator;

use crate::app::errors;
use crate::context::PrincipalContext;

pub const MISSING_HEADER: &str = "Authorization header required";
pub const MALFORMED_HEADER: &str = "Invalid authorization header format";
pub const INVALID_TOKEN: &str = "Invalid or expired token";

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())
        .map_err(|msg| errors::json_error(StatusCode::UNAUTHORIZED, msg, None))?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        errors::json_error(StatusCode::UNAUTHORIZED, INVALID_TOKEN, None)
    })?;

    req.extensions_mut().insert(PrincipalContext::new(claims.sub));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, &'static str> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(MISSING_HEADER)?;

    let header = header.to_str().map_err(|_| MALFORMED_HEADER)?;
    if header.trim().is_empty() {
        return Err(MISSING_HEADER);
    }

    let token = header.strip_prefix("Bearer ").ok_or(MALFORMED_HEADER)?.trim();
    if token.is_empty() || token.contains(' ') {
        return Err(MALFORMED_HEADER);
    }

    Ok(token)
}
