use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use warehouse_infra::InventoryError;

/// Success envelope: `{"success": true, "message", "data"}`.
pub fn success(status: StatusCode, message: &str, data: Value) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": true,
            "message": message,
            "data": data,
        })),
    )
        .into_response()
}

/// Error envelope: `{"success": false, "message", "error"?}`.
pub fn json_error(
    status: StatusCode,
    message: impl Into<String>,
    error: Option<String>,
) -> axum::response::Response {
    let mut body = json!({
        "success": false,
        "message": message.into(),
    });
    if let Some(error) = error {
        body["error"] = Value::String(error);
    }
    (status, axum::Json(body)).into_response()
}

/// Map a service error to its HTTP response.
///
/// Client-facing failures carry their own message; storage failures report
/// `context` as the message and the cause in `error`.
pub fn inventory_error_to_response(
    err: InventoryError,
    context: &'static str,
) -> axum::response::Response {
    match err {
        InventoryError::NotFound(_) => json_error(StatusCode::NOT_FOUND, err.to_string(), None),
        InventoryError::InvalidOperation(msg) | InventoryError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, msg, None)
        }
        InventoryError::Conflict(msg) => json_error(StatusCode::CONFLICT, msg, None),
        InventoryError::Persistence(e) => {
            tracing::error!(error = %e, "{context}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, context, Some(e.to_string()))
        }
    }
}
