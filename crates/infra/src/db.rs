//! Postgres pool setup and schema bootstrap.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, instrument};

use crate::config::DatabaseConfig;
use crate::error::StoreError;

/// Schema statements, applied in order. Every statement is idempotent.
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id BIGSERIAL PRIMARY KEY,
        sku_name VARCHAR(100) NOT NULL UNIQUE,
        quantity BIGINT NOT NULL DEFAULT 0 CHECK (quantity >= 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS locations (
        id BIGSERIAL PRIMARY KEY,
        code VARCHAR(50) NOT NULL UNIQUE,
        name VARCHAR(100) NOT NULL,
        capacity BIGINT NOT NULL CHECK (capacity > 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_movements (
        id BIGSERIAL PRIMARY KEY,
        product_id BIGINT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        location_id BIGINT NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
        type VARCHAR(3) NOT NULL CHECK (type IN ('IN', 'OUT')),
        quantity BIGINT NOT NULL CHECK (quantity > 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_stock_movements_product_id ON stock_movements(product_id)",
    "CREATE INDEX IF NOT EXISTS idx_stock_movements_location_id ON stock_movements(location_id)",
    "CREATE INDEX IF NOT EXISTS idx_stock_movements_created_at ON stock_movements(created_at)",
];

/// Open a connection pool and verify it with a round trip.
#[instrument(
    skip(config),
    fields(
        host = config.connect.get_host(),
        database = config.connect.get_database(),
        max_connections = config.max_connections,
    ),
    err
)]
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(config.connect.clone())
        .await
        .map_err(|e| StoreError::Database {
            operation: "connect",
            message: e.to_string(),
        })?;

    info!("database connection established");
    Ok(pool)
}

/// Create tables and indexes if they do not exist yet.
#[instrument(skip(pool), err)]
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    for statement in SCHEMA {
        sqlx::query(*statement)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Database {
                operation: "run_migrations",
                message: e.to_string(),
            })?;
    }
    info!(statements = SCHEMA.len(), "schema is up to date");
    Ok(())
}
