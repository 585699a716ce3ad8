//! Inventory domain module.
//!
//! This crate contains the business rules for products, locations and stock
//! movements, implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage). The infra crate wraps these rules in transactions.

pub mod location;
pub mod movement;
pub mod product;

pub use location::{Location, LocationDraft, LocationUsage, clamp_usage};
pub use movement::{
    CAPACITY_EXCEEDED, INSUFFICIENT_QUANTITY, MovementDirection, MovementQuantity,
    MovementRequest, StockMovement, check_inbound, check_outbound, next_product_quantity,
};
pub use product::{Product, ProductDraft};
