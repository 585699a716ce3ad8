//! Postgres-backed inventory store.
//!
//! Movement transactions lock the product row and then the location row with
//! `SELECT ... FOR UPDATE`, so two OUT movements on one product (or two IN
//! movements into one location) serialize on that row until commit. Location
//! usage is aggregated after the location lock is held.
//!
//! SQLx errors are mapped to [`StoreError`] by SQLSTATE; see the table on
//! [`StoreError`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use warehouse_core::{LocationId, MovementId, ProductId};
use warehouse_inventory::{
    Location, LocationDraft, MovementRequest, Product, ProductDraft, StockMovement,
};

use super::query::{MovementFilter, Page, Pagination, ProductFilter};
use super::{Ledger, LedgerTx, LocationStore, MovementStore, ProductStore};
use crate::error::StoreError;

const PRODUCT_COLUMNS: &str = "id, sku_name, quantity, created_at, updated_at";
const LOCATION_COLUMNS: &str = "id, code, name, capacity, created_at";
const MOVEMENT_COLUMNS: &str = "id, product_id, location_id, type, quantity, created_at";

const NET_USAGE_SQL: &str = r#"
    SELECT COALESCE(SUM(CASE WHEN type = 'IN' THEN quantity ELSE -quantity END), 0)::BIGINT AS net_usage
    FROM stock_movements
    WHERE location_id = $1
"#;

/// Postgres inventory store. Cheap to clone; shares the connection pool.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl ProductStore for PostgresInventoryStore {
    #[instrument(skip(self, draft), fields(sku_name = draft.sku_name()), err)]
    async fn insert_product(&self, draft: &ProductDraft) -> Result<Product, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO products (sku_name, quantity) VALUES ($1, $2) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(draft.sku_name())
        .bind(draft.quantity())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        decode_product(&row)
    }

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("product_by_id", e))?;

        row.as_ref().map(decode_product).transpose()
    }

    async fn product_by_sku(&self, sku_name: &str) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku_name = $1"
        ))
        .bind(sku_name)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_by_sku", e))?;

        row.as_ref().map(decode_product).transpose()
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<Page<Product>, StoreError> {
        let search = filter.search.as_deref();

        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM products
            WHERE ($1::text IS NULL OR sku_name ILIKE '%' || $1 || '%')
            "#,
        )
        .bind(search)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_products", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_products", e))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE ($1::text IS NULL OR sku_name ILIKE '%' || $1 || '%')
            ORDER BY id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(search)
        .bind(i64::from(pagination.limit))
        .bind(pagination.offset() as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        Ok(Page {
            items: rows.iter().map(decode_product).collect::<Result<_, _>>()?,
            total: total.max(0) as u64,
            pagination,
        })
    }

    #[instrument(skip(self, draft), fields(product_id = %id), err)]
    async fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET sku_name = $2, quantity = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.get())
        .bind(draft.sku_name())
        .bind(draft.quantity())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;

        row.as_ref().map(decode_product).transpose()
    }
}

#[async_trait]
impl LocationStore for PostgresInventoryStore {
    #[instrument(skip(self, draft), fields(code = draft.code()), err)]
    async fn insert_location(&self, draft: &LocationDraft) -> Result<Location, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO locations (code, name, capacity) VALUES ($1, $2, $3) RETURNING {LOCATION_COLUMNS}"
        ))
        .bind(draft.code())
        .bind(draft.name())
        .bind(draft.capacity())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_location", e))?;

        decode_location(&row)
    }

    async fn location_by_id(&self, id: LocationId) -> Result<Option<Location>, StoreError> {
        let row = sqlx::query(&format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("location_by_id", e))?;

        row.as_ref().map(decode_location).transpose()
    }

    async fn location_by_code(&self, code: &str) -> Result<Option<Location>, StoreError> {
        let row = sqlx::query(&format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE code = $1"))
            .bind(code)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("location_by_code", e))?;

        row.as_ref().map(decode_location).transpose()
    }

    async fn list_locations(&self) -> Result<Vec<(Location, i64)>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                l.id, l.code, l.name, l.capacity, l.created_at,
                COALESCE(SUM(CASE WHEN m.type = 'IN' THEN m.quantity ELSE -m.quantity END), 0)::BIGINT AS net_usage
            FROM locations l
            LEFT JOIN stock_movements m ON m.location_id = l.id
            GROUP BY l.id
            ORDER BY l.id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_locations", e))?;

        rows.iter()
            .map(|row| -> Result<(Location, i64), StoreError> {
                let location = decode_location(row)?;
                let net: i64 = row
                    .try_get("net_usage")
                    .map_err(|e| map_sqlx_error("list_locations", e))?;
                Ok((location, net))
            })
            .collect()
    }

    async fn location_net_usage(&self, id: LocationId) -> Result<i64, StoreError> {
        let row = sqlx::query(NET_USAGE_SQL)
            .bind(id.get())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("location_net_usage", e))?;

        row.try_get("net_usage")
            .map_err(|e| map_sqlx_error("location_net_usage", e))
    }
}

#[async_trait]
impl MovementStore for PostgresInventoryStore {
    async fn list_movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<Page<StockMovement>, StoreError> {
        const WHERE_CLAUSE: &str = r#"
            WHERE ($1::bigint IS NULL OR product_id = $1)
                AND ($2::bigint IS NULL OR location_id = $2)
                AND ($3::text IS NULL OR type = $3)
                AND ($4::timestamptz IS NULL OR created_at >= $4)
                AND ($5::timestamptz IS NULL OR created_at <= $5)
        "#;

        let product_id = filter.product_id.map(ProductId::get);
        let location_id = filter.location_id.map(LocationId::get);
        let direction = filter.direction.map(|d| d.as_str());

        let count_row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM stock_movements {WHERE_CLAUSE}"
        ))
        .bind(product_id)
        .bind(location_id)
        .bind(direction)
        .bind(filter.created_from)
        .bind(filter.created_to)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_movements", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_movements", e))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {MOVEMENT_COLUMNS}
            FROM stock_movements
            {WHERE_CLAUSE}
            ORDER BY created_at DESC, id DESC
            LIMIT $6 OFFSET $7
            "#
        ))
        .bind(product_id)
        .bind(location_id)
        .bind(direction)
        .bind(filter.created_from)
        .bind(filter.created_to)
        .bind(i64::from(pagination.limit))
        .bind(pagination.offset() as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        Ok(Page {
            items: rows.iter().map(decode_movement).collect::<Result<_, _>>()?,
            total: total.max(0) as u64,
            pagination,
        })
    }
}

#[async_trait]
impl Ledger for PostgresInventoryStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTx { tx: Some(tx) }))
    }
}

/// An open movement transaction. Dropping it without commit rolls back.
struct PostgresTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresTx {
    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.tx.as_deref_mut().ok_or(StoreError::TransactionClosed)
    }
}

#[async_trait]
impl LedgerTx for PostgresTx {
    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("product_for_update", e))?;

        row.as_ref().map(decode_product).transpose()
    }

    async fn location_for_update(
        &mut self,
        id: LocationId,
    ) -> Result<Option<Location>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("location_for_update", e))?;

        row.as_ref().map(decode_location).transpose()
    }

    async fn location_net_usage(&mut self, id: LocationId) -> Result<i64, StoreError> {
        let row = sqlx::query(NET_USAGE_SQL)
            .bind(id.get())
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("location_net_usage", e))?;

        row.try_get("net_usage")
            .map_err(|e| map_sqlx_error("location_net_usage", e))
    }

    async fn update_product_quantity(
        &mut self,
        id: ProductId,
        quantity: i64,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE products SET quantity = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.get())
            .bind(quantity)
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("update_product_quantity", e))?;
        Ok(())
    }

    async fn insert_movement(
        &mut self,
        request: &MovementRequest,
    ) -> Result<StockMovement, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO stock_movements (product_id, location_id, type, quantity)
            VALUES ($1, $2, $3, $4)
            RETURNING {MOVEMENT_COLUMNS}
            "#
        ))
        .bind(request.product_id.get())
        .bind(request.location_id.get())
        .bind(request.direction.as_str())
        .bind(request.quantity.get())
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;

        decode_movement(&row)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                Some("40001") | Some("40P01") => StoreError::Serialization(msg),
                Some("23503") | Some("23514") => StoreError::Constraint(msg),
                _ => StoreError::Database {
                    operation,
                    message: db_err.message().to_string(),
                },
            }
        }
        sqlx::Error::PoolClosed => StoreError::PoolClosed,
        err @ (sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)) => StoreError::Decode(format!("{operation}: {err}")),
        other => StoreError::Database {
            operation,
            message: other.to_string(),
        },
    }
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: i64,
    sku_name: String,
    quantity: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            sku_name: row.try_get("sku_name")?,
            quantity: row.try_get("quantity")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::new(row.id),
            sku_name: row.sku_name,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug)]
struct LocationRow {
    id: i64,
    code: String,
    name: String,
    capacity: i64,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for LocationRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(LocationRow {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            capacity: row.try_get("capacity")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location {
            id: LocationId::new(row.id),
            code: row.code,
            name: row.name,
            capacity: row.capacity,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug)]
struct MovementRow {
    id: i64,
    product_id: i64,
    location_id: i64,
    direction: String,
    quantity: i64,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for MovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            location_id: row.try_get("location_id")?,
            direction: row.try_get("type")?,
            quantity: row.try_get("quantity")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let direction = row
            .direction
            .parse()
            .map_err(|_| StoreError::Decode(format!("unknown movement type '{}'", row.direction)))?;
        Ok(StockMovement {
            id: MovementId::new(row.id),
            product_id: ProductId::new(row.product_id),
            location_id: LocationId::new(row.location_id),
            direction,
            quantity: row.quantity,
            created_at: row.created_at,
        })
    }
}

fn decode_product(row: &PgRow) -> Result<Product, StoreError> {
    ProductRow::from_row(row)
        .map(Product::from)
        .map_err(|e| map_sqlx_error("decode_product", e))
}

fn decode_location(row: &PgRow) -> Result<Location, StoreError> {
    LocationRow::from_row(row)
        .map(Location::from)
        .map_err(|e| map_sqlx_error("decode_location", e))
}

fn decode_movement(row: &PgRow) -> Result<StockMovement, StoreError> {
    let row = MovementRow::from_row(row).map_err(|e| map_sqlx_error("decode_movement", e))?;
    StockMovement::try_from(row)
}

/// These run against a real server: `DATABASE_URL=postgres://... cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db;
    use crate::error::InventoryError;
    use crate::movement_engine::MovementEngine;
    use warehouse_inventory::{MovementDirection, MovementQuantity};

    async fn store() -> Arc<PostgresInventoryStore> {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
        let config = DatabaseConfig {
            connect: url.parse().expect("valid DATABASE_URL"),
            max_connections: 12,
        };
        let pool = db::connect(&config).await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        Arc::new(PostgresInventoryStore::new(pool))
    }

    /// Unique per run so tests never collide on SKU or location code.
    fn unique(prefix: &str) -> String {
        format!("{prefix}-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
    }

    fn request(
        product_id: ProductId,
        location_id: LocationId,
        direction: MovementDirection,
        qty: i64,
    ) -> MovementRequest {
        MovementRequest {
            product_id,
            location_id,
            direction,
            quantity: MovementQuantity::new(qty).unwrap(),
        }
    }

    async fn movements_for_location(store: &PostgresInventoryStore, location_id: LocationId) -> u64 {
        store
            .list_movements(
                &MovementFilter {
                    location_id: Some(location_id),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap()
            .total
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires DATABASE_URL"]
    async fn concurrent_outbound_movements_never_oversell() {
        let store = store().await;
        let product = store
            .insert_product(&ProductDraft::new(unique("OVERSELL"), 10).unwrap())
            .await
            .unwrap();
        let location = store
            .insert_location(&LocationDraft::new(unique("OS"), "Oversell", 100).unwrap())
            .await
            .unwrap();
        let engine = MovementEngine::new(store.clone());

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let engine = engine.clone();
                let request = request(product.id, location.id, MovementDirection::Out, 2);
                tokio::spawn(async move { engine.record_movement(request).await })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(e) => assert!(matches!(e, InventoryError::InvalidOperation(_)), "{e}"),
            }
        }

        assert_eq!(accepted, 5);
        let product = store.product_by_id(product.id).await.unwrap().unwrap();
        assert_eq!(product.quantity, 0);
        assert_eq!(movements_for_location(&store, location.id).await, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires DATABASE_URL"]
    async fn concurrent_inbound_movements_never_exceed_capacity() {
        let store = store().await;
        let location = store
            .insert_location(&LocationDraft::new(unique("CAP"), "Capacity", 20).unwrap())
            .await
            .unwrap();
        // Distinct products, so only the location row lock serializes them.
        let mut products = Vec::new();
        for i in 0..10 {
            let product = store
                .insert_product(&ProductDraft::new(unique(&format!("CAP-{i}")), 0).unwrap())
                .await
                .unwrap();
            products.push(product);
        }
        let engine = MovementEngine::new(store.clone());

        let handles: Vec<_> = products
            .iter()
            .map(|product| {
                let engine = engine.clone();
                let request = request(product.id, location.id, MovementDirection::In, 3);
                tokio::spawn(async move { engine.record_movement(request).await })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 6);
        assert_eq!(store.location_net_usage(location.id).await.unwrap(), 18);
        assert_eq!(movements_for_location(&store, location.id).await, 6);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn rejected_movement_leaves_no_trace() {
        let store = store().await;
        let product = store
            .insert_product(&ProductDraft::new(unique("ROLLBACK"), 5).unwrap())
            .await
            .unwrap();
        let location = store
            .insert_location(&LocationDraft::new(unique("RB"), "Rollback", 10).unwrap())
            .await
            .unwrap();
        let engine = MovementEngine::new(store.clone());

        let err = engine
            .record_movement(request(product.id, location.id, MovementDirection::Out, 7))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::InvalidOperation(_)));

        let err = engine
            .record_movement(request(product.id, location.id, MovementDirection::In, 11))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::InvalidOperation(_)));

        let unchanged = store.product_by_id(product.id).await.unwrap().unwrap();
        assert_eq!(unchanged.quantity, 5);
        assert_eq!(movements_for_location(&store, location.id).await, 0);

        // Corrected input goes through exactly once.
        engine
            .record_movement(request(product.id, location.id, MovementDirection::Out, 5))
            .await
            .unwrap();
        let product = store.product_by_id(product.id).await.unwrap().unwrap();
        assert_eq!(product.quantity, 0);
        assert_eq!(movements_for_location(&store, location.id).await, 1);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn duplicate_sku_maps_to_unique_violation() {
        let store = store().await;
        let sku = unique("DUP");
        store
            .insert_product(&ProductDraft::new(sku.clone(), 1).unwrap())
            .await
            .unwrap();

        let err = store
            .insert_product(&ProductDraft::new(sku, 1).unwrap())
            .await
            .unwrap_err();
        assert!(err.is_unique_violation(), "{err}");
    }
}
