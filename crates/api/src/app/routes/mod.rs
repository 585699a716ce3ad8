use axum::{Router, routing::get};

pub mod auth;
pub mod locations;
pub mod movements;
pub mod products;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/products", products::router())
        .nest("/locations", locations::router())
        .nest("/stock-movements", movements::router())
}
