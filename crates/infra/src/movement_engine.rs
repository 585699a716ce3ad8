//! Stock movement execution pipeline.
//!
//! The `MovementEngine` runs the inventory rules inside one store transaction:
//!
//! ```text
//! MovementRequest
//!   ↓
//! 1. Begin transaction
//!   ↓
//! 2. Lock product row        (missing → NotFound("product"))
//!   ↓
//! 3. Lock location row       (missing → NotFound("location"))
//!   ↓
//! 4. OUT: product.quantity ≥ quantity
//!    IN:  usage(location) + quantity ≤ capacity
//!   ↓
//! 5. Update product quantity + insert movement
//!   ↓
//! 6. Commit (any earlier return drops the transaction and rolls back)
//! ```
//!
//! The rules themselves live in `warehouse_inventory`; this module only
//! sequences them against storage.

use std::sync::Arc;

use tracing::{Instrument, info, info_span, warn};

use warehouse_core::LocationId;
use warehouse_inventory::{
    MovementDirection, MovementRequest, StockMovement, check_inbound, clamp_usage,
    next_product_quantity,
};

use crate::error::InventoryError;
use crate::store::{Ledger, LocationStore, MovementFilter, MovementStore, Page, Pagination};

/// Records stock movements and reports location usage.
pub struct MovementEngine<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for MovementEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> MovementEngine<S>
where
    S: Ledger + LocationStore + MovementStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Validate and record one movement atomically.
    ///
    /// On success the product quantity has been adjusted and the returned
    /// movement is persisted. On any failure nothing was written.
    pub async fn record_movement(
        &self,
        request: MovementRequest,
    ) -> Result<StockMovement, InventoryError> {
        let span = info_span!(
            "record_movement",
            product_id = %request.product_id,
            location_id = %request.location_id,
            direction = %request.direction,
            quantity = request.quantity.get(),
        );

        async move {
            match self.apply(&request).await {
                Ok(movement) => {
                    info!(movement_id = %movement.id, "stock movement recorded");
                    Ok(movement)
                }
                Err(err @ InventoryError::Persistence(_)) => {
                    warn!(error = %err, "stock movement failed in storage");
                    Err(err)
                }
                Err(err) => {
                    info!(reason = %err, "stock movement rejected");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn apply(&self, request: &MovementRequest) -> Result<StockMovement, InventoryError> {
        let mut tx = self.store.begin().await?;

        let product = tx
            .product_for_update(request.product_id)
            .await?
            .ok_or(InventoryError::NotFound("product"))?;
        let location = tx
            .location_for_update(request.location_id)
            .await?
            .ok_or(InventoryError::NotFound("location"))?;

        if request.direction == MovementDirection::In {
            let net = tx.location_net_usage(location.id).await?;
            check_inbound(&location, reported_usage(location.id, net), request.quantity)?;
        }
        let quantity = next_product_quantity(&product, request.direction, request.quantity)?;

        tx.update_product_quantity(product.id, quantity).await?;
        let movement = tx.insert_movement(request).await?;
        tx.commit().await?;

        Ok(movement)
    }

    /// Current usage of a location: `max(0, ΣIN − ΣOUT)`. Read-only.
    pub async fn compute_location_usage(
        &self,
        location_id: LocationId,
    ) -> Result<i64, InventoryError> {
        let net = self.store.location_net_usage(location_id).await?;
        Ok(reported_usage(location_id, net))
    }

    pub async fn list_movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<Page<StockMovement>, InventoryError> {
        Ok(self.store.list_movements(filter, pagination).await?)
    }
}

/// Clamp a raw net usage at zero, logging when the history was inconsistent.
pub(crate) fn reported_usage(location_id: LocationId, net: i64) -> i64 {
    if net < 0 {
        warn!(location_id = %location_id, net_usage = net, "negative location usage clamped to zero");
    }
    clamp_usage(net)
}
