use std::sync::Arc;

use warehouse_auth::{CredentialVerifier, Hs256TokenService, JwtIssuer, StaticCredentials};
use warehouse_infra::{
    AppConfig, InMemoryInventoryStore, InventoryStore, LocationService, MovementEngine,
    PostgresInventoryStore, ProductService, StoreError, db,
};

use crate::middleware::AuthState;

/// Inventory services shared by every protected handler.
#[derive(Clone)]
pub struct AppServices {
    pub products: ProductService<dyn InventoryStore>,
    pub locations: LocationService<dyn InventoryStore>,
    pub movements: MovementEngine<dyn InventoryStore>,
}

impl AppServices {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self {
            products: ProductService::new(store.clone()),
            locations: LocationService::new(store.clone()),
            movements: MovementEngine::new(store),
        }
    }

    /// Services over a fresh in-memory store. Intended for tests/dev.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryInventoryStore::new()))
    }
}

/// Pick the backing store from configuration.
///
/// A configured database is connected and migrated before the server starts;
/// without one, state lives in memory and is lost on restart.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    match &config.database {
        Some(db_config) => {
            let pool = db::connect(db_config).await?;
            db::run_migrations(&pool).await?;
            Ok(AppServices::new(Arc::new(PostgresInventoryStore::new(pool))))
        }
        None => {
            tracing::warn!("no database configured; using in-memory store (data is not persisted)");
            Ok(AppServices::in_memory())
        }
    }
}

/// Token issuing/validation and the login credential check.
#[derive(Clone)]
pub struct AuthServices {
    pub tokens: Arc<Hs256TokenService>,
    pub credentials: Arc<dyn CredentialVerifier>,
}

impl AuthServices {
    pub fn new(tokens: Hs256TokenService, credentials: impl CredentialVerifier + 'static) -> Self {
        Self {
            tokens: Arc::new(tokens),
            credentials: Arc::new(credentials),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Hs256TokenService::new(config.jwt_secret.as_bytes(), config.jwt_ttl),
            StaticCredentials::new(&config.admin_username, &config.admin_password),
        )
    }

    pub fn issuer(&self) -> &dyn JwtIssuer {
        self.tokens.as_ref()
    }

    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt: self.tokens.clone(),
        }
    }
}
