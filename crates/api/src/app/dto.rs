use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use warehouse_core::{LocationId, ProductId};
use warehouse_infra::{MovementFilter, Pagination};
use warehouse_inventory::{
    Location, LocationUsage, MovementDirection, MovementQuantity, MovementRequest, Product,
    StockMovement,
};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub sku_name: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateLocationRequest {
    pub code: String,
    pub name: String,
    pub capacity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateMovementRequest {
    pub product_id: i64,
    pub location_id: i64,
    #[serde(rename = "type")]
    pub direction: String,
    pub quantity: i64,
}

impl CreateMovementRequest {
    /// Shape validation; runs before the movement engine sees the request.
    pub fn into_request(self) -> Result<MovementRequest, axum::response::Response> {
        let direction = self
            .direction
            .parse::<MovementDirection>()
            .map_err(|e| bad_request(format!("Invalid request body: {e}")))?;
        let quantity = MovementQuantity::new(self.quantity)
            .map_err(|e| bad_request(format!("Invalid request body: {e}")))?;

        Ok(MovementRequest {
            product_id: ProductId::new(self.product_id),
            location_id: LocationId::new(self.location_id),
            direction,
            quantity,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
}

impl ProductListQuery {
    pub fn pagination(&self) -> Pagination {
        pagination(self.page.as_deref(), self.limit.as_deref())
    }

    pub fn search(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementListQuery {
    pub product_id: Option<String>,
    pub location_id: Option<String>,
    #[serde(rename = "type")]
    pub direction: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl MovementListQuery {
    pub fn pagination(&self) -> Pagination {
        pagination(self.page.as_deref(), self.limit.as_deref())
    }

    /// Parse the filter parameters; malformed values are a 400.
    pub fn filter(&self) -> Result<MovementFilter, axum::response::Response> {
        Ok(MovementFilter {
            product_id: non_empty(&self.product_id)
                .map(|raw| raw.parse::<ProductId>())
                .transpose()
                .map_err(|_| bad_request("Invalid product_id filter"))?,
            location_id: non_empty(&self.location_id)
                .map(|raw| raw.parse::<LocationId>())
                .transpose()
                .map_err(|_| bad_request("Invalid location_id filter"))?,
            direction: non_empty(&self.direction)
                .map(|raw| raw.parse::<MovementDirection>())
                .transpose()
                .map_err(|_| bad_request("Invalid type filter: expected IN or OUT"))?,
            created_from: non_empty(&self.start_date)
                .map(|raw| parse_date_bound(raw).ok_or(()))
                .transpose()
                .map_err(|_| bad_request("Invalid start_date: expected RFC 3339 or YYYY-MM-DD"))?,
            created_to: non_empty(&self.end_date)
                .map(|raw| parse_date_bound(raw).ok_or(()))
                .transpose()
                .map_err(|_| bad_request("Invalid end_date: expected RFC 3339 or YYYY-MM-DD"))?,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Lenient like the listing endpoints have always been: unparsable numbers
/// fall back to the defaults.
fn pagination(page: Option<&str>, limit: Option<&str>) -> Pagination {
    let parse = |raw: Option<&str>| raw.and_then(|s| s.trim().parse::<i64>().ok());
    Pagination::new(parse(page), parse(limit))
}

/// Accept RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date_bound(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

pub fn bad_request(message: impl Into<String>) -> axum::response::Response {
    errors::json_error(StatusCode::BAD_REQUEST, message, None)
}

/// Unwrap a JSON body or answer 400 with the decoder's message.
pub fn json_body<T>(
    body: Result<axum::Json<T>, JsonRejection>,
) -> Result<T, axum::response::Response> {
    body.map(|axum::Json(value)| value)
        .map_err(|rejection| bad_request(format!("Invalid request body: {}", rejection.body_text())))
}

// -------------------------
// Response mapping
// -------------------------

/// Full stored precision, so a returned timestamp round-trips through the
/// date filters.
fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn product_to_json(p: &Product) -> Value {
    json!({
        "id": p.id,
        "sku_name": p.sku_name,
        "quantity": p.quantity,
        "created_at": timestamp(p.created_at),
        "updated_at": timestamp(p.updated_at),
    })
}

pub fn location_to_json(l: &Location, usage: Option<LocationUsage>) -> Value {
    let mut value = json!({
        "id": l.id,
        "code": l.code,
        "name": l.name,
        "capacity": l.capacity,
        "created_at": timestamp(l.created_at),
    });
    if let Some(usage) = usage {
        value["current_usage"] = json!(usage.current_usage);
        value["available"] = json!(usage.available);
    }
    value
}

pub fn movement_to_json(m: &StockMovement) -> Value {
    json!({
        "id": m.id,
        "product_id": m.product_id,
        "location_id": m.location_id,
        "type": m.direction.as_str(),
        "quantity": m.quantity,
        "created_at": timestamp(m.created_at),
    })
}

pub fn pagination_to_json(pagination: Pagination, total: u64) -> Value {
    json!({
        "page": pagination.page,
        "limit": pagination.limit,
        "total": total,
    })
}
