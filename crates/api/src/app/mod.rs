//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the services handlers share
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request DTOs, query parsing, and JSON mapping helpers
//! - `errors.rs`: the response envelope

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, AuthServices};

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub fn build_app(services: Arc<AppServices>, auth: Arc<AuthServices>) -> Router {
    // Protected routes: require a valid bearer token.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth.auth_state(),
            middleware::auth_middleware,
        ));

    let public = Router::new()
        .route("/auth/login", post(routes::auth::login))
        .layer(Extension(auth));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", public.merge(protected))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
