use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warehouse_core::{DomainError, DomainResult, LocationId, MovementId, ProductId};

use crate::{Location, Product};

pub const INSUFFICIENT_QUANTITY: &str = "insufficient product quantity";
pub const CAPACITY_EXCEEDED: &str = "location capacity exceeded";

/// Direction of a stock movement. Persisted as the literal tokens `IN`/`OUT`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementDirection {
    In,
    Out,
}

impl MovementDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementDirection::In => "IN",
            MovementDirection::Out => "OUT",
        }
    }
}

impl core::fmt::Display for MovementDirection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(MovementDirection::In),
            "OUT" => Ok(MovementDirection::Out),
            other => Err(DomainError::validation(format!(
                "type must be IN or OUT, got '{other}'"
            ))),
        }
    }
}

/// Strictly positive quantity moved in a single movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MovementQuantity(i64);

impl MovementQuantity {
    pub fn new(value: i64) -> DomainResult<Self> {
        if value <= 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

/// A validated request to move stock. Reaching the engine implies the shape is valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRequest {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub direction: MovementDirection,
    pub quantity: MovementQuantity,
}

/// A recorded movement. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub direction: MovementDirection,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Signed contribution of this movement to its location's net usage.
    pub fn signed_quantity(&self) -> i64 {
        match self.direction {
            MovementDirection::In => self.quantity,
            MovementDirection::Out => -self.quantity,
        }
    }
}

/// OUT rule: the product must hold at least the requested quantity.
pub fn check_outbound(product: &Product, quantity: MovementQuantity) -> DomainResult<()> {
    if product.quantity < quantity.get() {
        return Err(DomainError::invalid_operation(INSUFFICIENT_QUANTITY));
    }
    Ok(())
}

/// IN rule: current usage plus the requested quantity must fit the capacity.
pub fn check_inbound(
    location: &Location,
    current_usage: i64,
    quantity: MovementQuantity,
) -> DomainResult<()> {
    let fits = current_usage
        .checked_add(quantity.get())
        .is_some_and(|after| after <= location.capacity);
    if !fits {
        return Err(DomainError::invalid_operation(CAPACITY_EXCEEDED));
    }
    Ok(())
}

/// Product quantity after applying a movement.
pub fn next_product_quantity(
    product: &Product,
    direction: MovementDirection,
    quantity: MovementQuantity,
) -> DomainResult<i64> {
    match direction {
        MovementDirection::In => product
            .quantity
            .checked_add(quantity.get())
            .ok_or_else(|| DomainError::invalid_operation("product quantity overflow")),
        MovementDirection::Out => {
            check_outbound(product, quantity)?;
            Ok(product.quantity - quantity.get())
        }
    }
}
