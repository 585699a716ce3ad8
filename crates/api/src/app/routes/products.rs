use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};
use serde_json::json;

use warehouse_core::ProductId;
use warehouse_infra::ProductFilter;

use crate::app::dto::{self, ProductListQuery, ProductRequest};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product).put(update_product))
}

fn parse_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse().map_err(|_| dto::bad_request("Invalid product ID"))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ProductListQuery>,
) -> axum::response::Response {
    let filter = ProductFilter {
        search: query.search(),
    };
    match services.products.list(&filter, query.pagination()).await {
        Ok(page) => errors::success(
            StatusCode::OK,
            "Products retrieved successfully",
            json!({
                "products": page.items.iter().map(dto::product_to_json).collect::<Vec<_>>(),
                "pagination": dto::pagination_to_json(page.pagination, page.total),
            }),
        ),
        Err(e) => errors::inventory_error_to_response(e, "Failed to get products"),
    }
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<ProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.products.create(&body.sku_name, body.quantity).await {
        Ok(product) => errors::success(
            StatusCode::CREATED,
            "Product created successfully",
            dto::product_to_json(&product),
        ),
        Err(e) => errors::inventory_error_to_response(e, "Failed to create product"),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.products.get(id).await {
        Ok(product) => errors::success(
            StatusCode::OK,
            "Product retrieved successfully",
            dto::product_to_json(&product),
        ),
        Err(e) => errors::inventory_error_to_response(e, "Failed to get product"),
    }
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<ProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let body = match dto::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.products.update(id, &body.sku_name, body.quantity).await {
        Ok(product) => errors::success(
            StatusCode::OK,
            "Product updated successfully",
            dto::product_to_json(&product),
        ),
        Err(e) => errors::inventory_error_to_response(e, "Failed to update product"),
    }
}
