//! Infrastructure layer: storage backends, configuration, and the services
//! that run inventory rules inside store transactions.

pub mod config;
pub mod db;
pub mod error;
pub mod movement_engine;
pub mod services;
pub mod store;

pub use config::{AppConfig, ConfigError, DatabaseConfig};
pub use error::{InventoryError, StoreError};
pub use movement_engine::MovementEngine;
pub use services::{LOCATION_CODE_EXISTS, LocationService, ProductService, SKU_EXISTS};
pub use store::{
    InMemoryInventoryStore, InventoryStore, Ledger, LedgerTx, LocationStore, MovementFilter,
    MovementStore, Page, Pagination, PostgresInventoryStore, ProductFilter, ProductStore,
};
