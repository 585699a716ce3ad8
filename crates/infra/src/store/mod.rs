//! Inventory storage boundary.
//!
//! Reads and single-row writes go through [`ProductStore`], [`LocationStore`]
//! and [`MovementStore`]. Stock movements go through a [`Ledger`] transaction
//! so the product quantity update and the movement insert commit together.
//!
//! Two backends implement every trait: [`InMemoryInventoryStore`] (tests/dev)
//! and [`PostgresInventoryStore`].

pub mod in_memory;
pub mod postgres;
pub mod query;

use async_trait::async_trait;

use warehouse_core::{LocationId, ProductId};
use warehouse_inventory::{
    Location, LocationDraft, MovementRequest, Product, ProductDraft, StockMovement,
};

use crate::error::StoreError;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use query::{MovementFilter, Page, Pagination, ProductFilter};

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Insert a new product. Fails with `UniqueViolation` on a duplicate SKU.
    async fn insert_product(&self, draft: &ProductDraft) -> Result<Product, StoreError>;

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn product_by_sku(&self, sku_name: &str) -> Result<Option<Product>, StoreError>;

    /// Products ordered by id, newest first.
    async fn list_products(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<Page<Product>, StoreError>;

    /// Replace SKU and quantity. Returns `None` when the product does not exist.
    async fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, StoreError>;
}

#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Insert a new location. Fails with `UniqueViolation` on a duplicate code.
    async fn insert_location(&self, draft: &LocationDraft) -> Result<Location, StoreError>;

    async fn location_by_id(&self, id: LocationId) -> Result<Option<Location>, StoreError>;

    async fn location_by_code(&self, code: &str) -> Result<Option<Location>, StoreError>;

    /// All locations ordered by id, each paired with its raw (unclamped) net usage.
    async fn list_locations(&self) -> Result<Vec<(Location, i64)>, StoreError>;

    /// Raw net usage: sum of IN quantities minus sum of OUT quantities.
    async fn location_net_usage(&self, id: LocationId) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait MovementStore: Send + Sync {
    /// Movements ordered by `created_at` then id, newest first.
    async fn list_movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<Page<StockMovement>, StoreError>;
}

/// Opens movement transactions.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError>;
}

/// A single movement transaction.
///
/// Lock order is product first, then location. Dropping the transaction
/// without calling [`LedgerTx::commit`] rolls it back.
#[async_trait]
pub trait LedgerTx: Send {
    /// Load and lock a product row for the rest of the transaction.
    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Load and lock a location row for the rest of the transaction.
    async fn location_for_update(&mut self, id: LocationId)
    -> Result<Option<Location>, StoreError>;

    async fn location_net_usage(&mut self, id: LocationId) -> Result<i64, StoreError>;

    async fn update_product_quantity(
        &mut self,
        id: ProductId,
        quantity: i64,
    ) -> Result<(), StoreError>;

    /// Append the movement; id and timestamp are assigned by the store.
    async fn insert_movement(
        &mut self,
        request: &MovementRequest,
    ) -> Result<StockMovement, StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;
}

/// Everything the services need from a backend.
pub trait InventoryStore: ProductStore + LocationStore + MovementStore + Ledger {}

impl<T> InventoryStore for T where T: ProductStore + LocationStore + MovementStore + Ledger + ?Sized {}
