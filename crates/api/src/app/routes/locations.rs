use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};

use warehouse_core::LocationId;
use warehouse_inventory::LocationUsage;

use crate::app::dto::{self, CreateLocationRequest};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_locations).post(create_location))
        .route("/:id", get(get_location))
}

pub async fn list_locations(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.locations.list().await {
        Ok(rows) => errors::success(
            StatusCode::OK,
            "Locations retrieved successfully",
            serde_json::Value::Array(
                rows.iter()
                    .map(|(location, usage)| dto::location_to_json(location, Some(*usage)))
                    .collect(),
            ),
        ),
        Err(e) => errors::inventory_error_to_response(e, "Failed to get locations"),
    }
}

pub async fn create_location(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CreateLocationRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services
        .locations
        .create(&body.code, &body.name, body.capacity)
        .await
    {
        Ok(location) => {
            // A new location has no movements yet.
            let usage = LocationUsage::from_net(location.capacity, 0);
            errors::success(
                StatusCode::CREATED,
                "Location created successfully",
                dto::location_to_json(&location, Some(usage)),
            )
        }
        Err(e) => errors::inventory_error_to_response(e, "Failed to create location"),
    }
}

pub async fn get_location(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Ok(id) = id.parse::<LocationId>() else {
        return dto::bad_request("Invalid location ID");
    };

    match services.locations.get(id).await {
        Ok((location, usage)) => errors::success(
            StatusCode::OK,
            "Location retrieved successfully",
            dto::location_to_json(&location, Some(usage)),
        ),
        Err(e) => errors::inventory_error_to_response(e, "Failed to get location"),
    }
}
