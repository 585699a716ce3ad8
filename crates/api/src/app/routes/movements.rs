use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};
use serde_json::json;

use crate::app::dto::{self, CreateMovementRequest, MovementListQuery};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/", get(list_movements).post(create_movement))
}

pub async fn create_movement(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CreateMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match dto::json_body(body).and_then(CreateMovementRequest::into_request) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.movements.record_movement(request).await {
        Ok(movement) => errors::success(
            StatusCode::CREATED,
            "Stock movement created successfully",
            dto::movement_to_json(&movement),
        ),
        Err(e) => errors::inventory_error_to_response(e, "Failed to create stock movement"),
    }
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<MovementListQuery>,
) -> axum::response::Response {
    let filter = match query.filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    match services
        .movements
        .list_movements(&filter, query.pagination())
        .await
    {
        Ok(page) => errors::success(
            StatusCode::OK,
            "Stock movements retrieved successfully",
            json!({
                "movements": page.items.iter().map(dto::movement_to_json).collect::<Vec<_>>(),
                "pagination": dto::pagination_to_json(page.pagination, page.total),
            }),
        ),
        Err(e) => errors::inventory_error_to_response(e, "Failed to get stock movements"),
    }
}
