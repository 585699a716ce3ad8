use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use warehouse_core::{LocationId, MovementId, ProductId};
use warehouse_inventory::{
    Location, LocationDraft, MovementDirection, MovementRequest, Product, ProductDraft,
    StockMovement,
};

use super::query::{MovementFilter, Page, Pagination, ProductFilter};
use super::{Ledger, LedgerTx, LocationStore, MovementStore, ProductStore};
use crate::error::StoreError;

#[derive(Debug, Clone, Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    locations: BTreeMap<LocationId, Location>,
    movements: Vec<StockMovement>,
    last_product_id: i64,
    last_location_id: i64,
    last_movement_id: i64,
}

impl State {
    fn net_usage(&self, id: LocationId) -> i64 {
        self.movements
            .iter()
            .filter(|m| m.location_id == id)
            .map(StockMovement::signed_quantity)
            .sum()
    }

    fn sku_taken(&self, sku_name: &str, except: Option<ProductId>) -> bool {
        self.products
            .values()
            .any(|p| p.sku_name == sku_name && Some(p.id) != except)
    }
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// In-memory inventory store.
///
/// Intended for tests/dev. Not optimized for performance: a movement
/// transaction holds the store lock for its whole lifetime and stages its
/// writes on a copy of the state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded movements (all locations).
    pub async fn movement_count(&self) -> usize {
        self.state.lock().await.movements.len()
    }
}

#[async_trait]
impl ProductStore for InMemoryInventoryStore {
    async fn insert_product(&self, draft: &ProductDraft) -> Result<Product, StoreError> {
        let mut state = self.state.lock().await;
        if state.sku_taken(draft.sku_name(), None) {
            return Err(StoreError::UniqueViolation(format!(
                "products.sku_name '{}'",
                draft.sku_name()
            )));
        }

        let now = Utc::now();
        let product = Product {
            id: ProductId::new(next_id(&mut state.last_product_id)),
            sku_name: draft.sku_name().to_string(),
            quantity: draft.quantity(),
            created_at: now,
            updated_at: now,
        };
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn product_by_sku(&self, sku_name: &str) -> Result<Option<Product>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.products.values().find(|p| p.sku_name == sku_name).cloned())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<Page<Product>, StoreError> {
        let state = self.state.lock().await;
        let matching: Vec<Product> = state
            .products
            .values()
            .rev()
            .filter(|p| filter.matches(&p.sku_name))
            .cloned()
            .collect();
        Ok(Page::from_sorted(matching, pagination))
    }

    async fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, StoreError> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&id) {
            return Ok(None);
        }
        if state.sku_taken(draft.sku_name(), Some(id)) {
            return Err(StoreError::UniqueViolation(format!(
                "products.sku_name '{}'",
                draft.sku_name()
            )));
        }

        let Some(product) = state.products.get_mut(&id) else {
            return Ok(None);
        };
        product.sku_name = draft.sku_name().to_string();
        product.quantity = draft.quantity();
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }
}

#[async_trait]
impl LocationStore for InMemoryInventoryStore {
    async fn insert_location(&self, draft: &LocationDraft) -> Result<Location, StoreError> {
        let mut state = self.state.lock().await;
        if state.locations.values().any(|l| l.code == draft.code()) {
            return Err(StoreError::UniqueViolation(format!(
                "locations.code '{}'",
                draft.code()
            )));
        }

        let location = Location {
            id: LocationId::new(next_id(&mut state.last_location_id)),
            code: draft.code().to_string(),
            name: draft.name().to_string(),
            capacity: draft.capacity(),
            created_at: Utc::now(),
        };
        state.locations.insert(location.id, location.clone());
        Ok(location)
    }

    async fn location_by_id(&self, id: LocationId) -> Result<Option<Location>, StoreError> {
        Ok(self.state.lock().await.locations.get(&id).cloned())
    }

    async fn location_by_code(&self, code: &str) -> Result<Option<Location>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.locations.values().find(|l| l.code == code).cloned())
    }

    async fn list_locations(&self) -> Result<Vec<(Location, i64)>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .locations
            .values()
            .map(|l| (l.clone(), state.net_usage(l.id)))
            .collect())
    }

    async fn location_net_usage(&self, id: LocationId) -> Result<i64, StoreError> {
        Ok(self.state.lock().await.net_usage(id))
    }
}

#[async_trait]
impl MovementStore for InMemoryInventoryStore {
    async fn list_movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<Page<StockMovement>, StoreError> {
        let state = self.state.lock().await;
        let mut matching: Vec<StockMovement> = state
            .movements
            .iter()
            .filter(|m| filter.product_id.is_none_or(|id| m.product_id == id))
            .filter(|m| filter.location_id.is_none_or(|id| m.location_id == id))
            .filter(|m| filter.direction.is_none_or(|d| m.direction == d))
            .filter(|m| filter.created_from.is_none_or(|from| m.created_at >= from))
            .filter(|m| filter.created_to.is_none_or(|to| m.created_at <= to))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(Page::from_sorted(matching, pagination))
    }
}

#[async_trait]
impl Ledger for InMemoryInventoryStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = (*guard).clone();
        Ok(Box::new(InMemoryTx {
            guard: Some(guard),
            staged,
        }))
    }
}

/// Holds the store lock; writes go to `staged` and replace the shared state on commit.
struct InMemoryTx {
    guard: Option<OwnedMutexGuard<State>>,
    staged: State,
}

impl InMemoryTx {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.guard.is_none() {
            return Err(StoreError::TransactionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for InMemoryTx {
    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.ensure_open()?;
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn location_for_update(
        &mut self,
        id: LocationId,
    ) -> Result<Option<Location>, StoreError> {
        self.ensure_open()?;
        Ok(self.staged.locations.get(&id).cloned())
    }

    async fn location_net_usage(&mut self, id: LocationId) -> Result<i64, StoreError> {
        self.ensure_open()?;
        Ok(self.staged.net_usage(id))
    }

    async fn update_product_quantity(
        &mut self,
        id: ProductId,
        quantity: i64,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        if quantity < 0 {
            return Err(StoreError::Constraint(format!(
                "products.quantity must be non-negative, got {quantity}"
            )));
        }
        let product = self.staged.products.get_mut(&id).ok_or_else(|| StoreError::Database {
            operation: "update_product_quantity",
            message: format!("product {id} vanished inside transaction"),
        })?;
        product.quantity = quantity;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_movement(
        &mut self,
        request: &MovementRequest,
    ) -> Result<StockMovement, StoreError> {
        self.ensure_open()?;
        if !self.staged.products.contains_key(&request.product_id)
            || !self.staged.locations.contains_key(&request.location_id)
        {
            return Err(StoreError::Constraint(
                "stock_movements foreign key violation".to_string(),
            ));
        }

        let movement = StockMovement {
            id: MovementId::new(next_id(&mut self.staged.last_movement_id)),
            product_id: request.product_id,
            location_id: request.location_id,
            direction: request.direction,
            quantity: request.quantity.get(),
            created_at: Utc::now(),
        };
        self.staged.movements.push(movement.clone());
        Ok(movement)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let mut guard = self.guard.take().ok_or(StoreError::TransactionClosed)?;
        *guard = std::mem::take(&mut self.staged);
        Ok(())
    }
}
