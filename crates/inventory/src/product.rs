use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warehouse_core::{DomainError, DomainResult, ProductId};

/// Longest SKU name the schema accepts.
pub const MAX_SKU_LEN: usize = 100;

/// A stocked product type.
///
/// `quantity` is never negative; only the movement engine and full-record
/// updates change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku_name: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated product fields, used both for registration and full-record updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    sku_name: String,
    quantity: i64,
}

impl ProductDraft {
    pub fn new(sku_name: impl Into<String>, quantity: i64) -> DomainResult<Self> {
        let sku_name = sku_name.into().trim().to_string();
        if sku_name.is_empty() {
            return Err(DomainError::validation("sku_name cannot be empty"));
        }
        if sku_name.chars().count() > MAX_SKU_LEN {
            return Err(DomainError::validation(format!(
                "sku_name cannot exceed {MAX_SKU_LEN} characters"
            )));
        }
        if quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        Ok(Self { sku_name, quantity })
    }

    pub fn sku_name(&self) -> &str {
        &self.sku_name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }
}
