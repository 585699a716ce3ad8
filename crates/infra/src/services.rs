//! Product and location ledgers.
//!
//! Thin services over the store traits: they validate input through the
//! domain drafts, enforce uniqueness with a friendly message, and attach
//! derived usage to locations.

use std::sync::Arc;

use tracing::info;

use warehouse_core::{LocationId, ProductId};
use warehouse_inventory::{Location, LocationDraft, LocationUsage, Product, ProductDraft};

use crate::error::{InventoryError, StoreError};
use crate::movement_engine::reported_usage;
use crate::store::{LocationStore, Page, Pagination, ProductFilter, ProductStore};

pub const SKU_EXISTS: &str = "SKU name already exists";
pub const LOCATION_CODE_EXISTS: &str = "location code already exists";

/// Map a unique violation raced past the pre-check to the same conflict.
fn conflict_on_duplicate(err: StoreError, message: &str) -> InventoryError {
    if err.is_unique_violation() {
        InventoryError::Conflict(message.to_string())
    } else {
        InventoryError::Persistence(err)
    }
}

pub struct ProductService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for ProductService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> ProductService<S>
where
    S: ProductStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Register a new product. The SKU must be unused.
    pub async fn create(&self, sku_name: &str, quantity: i64) -> Result<Product, InventoryError> {
        let draft = ProductDraft::new(sku_name, quantity)?;
        if self.store.product_by_sku(draft.sku_name()).await?.is_some() {
            return Err(InventoryError::Conflict(SKU_EXISTS.to_string()));
        }

        let product = self
            .store
            .insert_product(&draft)
            .await
            .map_err(|e| conflict_on_duplicate(e, SKU_EXISTS))?;
        info!(product_id = %product.id, sku_name = %product.sku_name, "product created");
        Ok(product)
    }

    pub async fn get(&self, id: ProductId) -> Result<Product, InventoryError> {
        self.store
            .product_by_id(id)
            .await?
            .ok_or(InventoryError::NotFound("product"))
    }

    pub async fn find_by_sku(&self, sku_name: &str) -> Result<Option<Product>, InventoryError> {
        Ok(self.store.product_by_sku(sku_name).await?)
    }

    pub async fn list(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<Page<Product>, InventoryError> {
        Ok(self.store.list_products(filter, pagination).await?)
    }

    /// Replace SKU and quantity. Uniqueness is re-checked only when the SKU changes.
    pub async fn update(
        &self,
        id: ProductId,
        sku_name: &str,
        quantity: i64,
    ) -> Result<Product, InventoryError> {
        let draft = ProductDraft::new(sku_name, quantity)?;
        let existing = self.get(id).await?;

        if existing.sku_name != draft.sku_name() {
            if let Some(other) = self.store.product_by_sku(draft.sku_name()).await? {
                if other.id != id {
                    return Err(InventoryError::Conflict(SKU_EXISTS.to_string()));
                }
            }
        }

        let product = self
            .store
            .update_product(id, &draft)
            .await
            .map_err(|e| conflict_on_duplicate(e, SKU_EXISTS))?
            .ok_or(InventoryError::NotFound("product"))?;
        info!(product_id = %product.id, "product updated");
        Ok(product)
    }
}

pub struct LocationService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for LocationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> LocationService<S>
where
    S: LocationStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Register a new location. The code must be unused.
    pub async fn create(
        &self,
        code: &str,
        name: &str,
        capacity: i64,
    ) -> Result<Location, InventoryError> {
        let draft = LocationDraft::new(code, name, capacity)?;
        if self.store.location_by_code(draft.code()).await?.is_some() {
            return Err(InventoryError::Conflict(LOCATION_CODE_EXISTS.to_string()));
        }

        let location = self
            .store
            .insert_location(&draft)
            .await
            .map_err(|e| conflict_on_duplicate(e, LOCATION_CODE_EXISTS))?;
        info!(location_id = %location.id, code = %location.code, "location created");
        Ok(location)
    }

    pub async fn get(&self, id: LocationId) -> Result<(Location, LocationUsage), InventoryError> {
        let location = self
            .store
            .location_by_id(id)
            .await?
            .ok_or(InventoryError::NotFound("location"))?;
        let net = self.store.location_net_usage(id).await?;
        let usage = LocationUsage::from_net(location.capacity, reported_usage(id, net));
        Ok((location, usage))
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<Location>, InventoryError> {
        Ok(self.store.location_by_code(code).await?)
    }

    /// All locations ordered by id, with current usage and available space.
    pub async fn list(&self) -> Result<Vec<(Location, LocationUsage)>, InventoryError> {
        let rows = self.store.list_locations().await?;
        Ok(rows
            .into_iter()
            .map(|(location, net)| {
                let usage = LocationUsage::from_net(location.capacity, reported_usage(location.id, net));
                (location, usage)
            })
            .collect())
    }
}
