//! Storage and service error types.
//!
//! `StoreError` is what a backend can fail with; `InventoryError` is what the
//! services hand to callers (HTTP layer, tests). Domain rule failures arrive as
//! `DomainError` and are folded into `InventoryError` without losing their kind.

use thiserror::Error;

use warehouse_core::DomainError;

/// Storage backend failure.
///
/// ## Error Mapping (Postgres)
///
/// | SQLx error | SQLSTATE | StoreError |
/// |------------|----------|------------|
/// | Database (unique violation) | `23505` | `UniqueViolation` |
/// | Database (serialization failure / deadlock) | `40001`, `40P01` | `Serialization` |
/// | Database (foreign key / check violation) | `23503`, `23514` | `Constraint` |
/// | Database (other) | any other | `Database` |
/// | PoolClosed | n/a | `PoolClosed` |
/// | ColumnDecode / Decode | n/a | `Decode` |
/// | Other | n/a | `Database` |
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("transaction serialization conflict: {0}")]
    Serialization(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("connection pool closed")]
    PoolClosed,

    #[error("failed to decode row: {0}")]
    Decode(String),

    #[error("transaction already finished")]
    TransactionClosed,

    #[error("database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }
}

/// Service-level inventory failure.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The named entity (`product`, `location`) does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A business rule rejected the operation.
    #[error("{0}")]
    InvalidOperation(String),

    /// A uniqueness rule was violated.
    #[error("{0}")]
    Conflict(String),

    /// Input was rejected before any rule ran.
    #[error("{0}")]
    Validation(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl From<DomainError> for InventoryError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            DomainError::InvalidOperation(msg) => Self::InvalidOperation(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_keep_their_kind() {
        let err: InventoryError = DomainError::invalid_operation("insufficient product quantity").into();
        assert!(matches!(err, InventoryError::InvalidOperation(ref m) if m == "insufficient product quantity"));

        let err: InventoryError = DomainError::invalid_id("abc").into();
        assert!(matches!(err, InventoryError::Validation(ref m) if m == "abc"));

        let err: InventoryError = DomainError::validation("quantity must be positive").into();
        assert!(matches!(err, InventoryError::Validation(_)));
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn store_errors_become_persistence_failures() {
        let err: InventoryError = StoreError::PoolClosed.into();
        assert!(matches!(err, InventoryError::Persistence(StoreError::PoolClosed)));
    }
}
