use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warehouse_core::{DomainError, DomainResult, LocationId};

pub const MAX_CODE_LEN: usize = 50;
pub const MAX_NAME_LEN: usize = 100;

/// A storage location with a fixed capacity.
///
/// Usage is not stored here; it is derived from the movement history (see
/// [`LocationUsage`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub code: String,
    pub name: String,
    pub capacity: i64,
    pub created_at: DateTime<Utc>,
}

/// Validated fields for registering a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationDraft {
    code: String,
    name: String,
    capacity: i64,
}

impl LocationDraft {
    pub fn new(code: impl Into<String>, name: impl Into<String>, capacity: i64) -> DomainResult<Self> {
        let code = code.into().trim().to_string();
        let name = name.into().trim().to_string();

        if code.is_empty() {
            return Err(DomainError::validation("code cannot be empty"));
        }
        if code.chars().count() > MAX_CODE_LEN {
            return Err(DomainError::validation(format!(
                "code cannot exceed {MAX_CODE_LEN} characters"
            )));
        }
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::validation(format!(
                "name cannot exceed {MAX_NAME_LEN} characters"
            )));
        }
        if capacity <= 0 {
            return Err(DomainError::validation("capacity must be greater than zero"));
        }

        Ok(Self { code, name, capacity })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> i64 {
        self.capacity
    }
}

/// Derived occupancy of a location.
///
/// `net` is the signed sum of IN minus OUT quantities recorded against the
/// location. Both derived values are floored at zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationUsage {
    pub current_usage: i64,
    pub available: i64,
}

impl LocationUsage {
    pub fn from_net(capacity: i64, net: i64) -> Self {
        let current_usage = clamp_usage(net);
        Self {
            current_usage,
            available: capacity.saturating_sub(current_usage).max(0),
        }
    }
}

/// Floor a raw net usage at zero.
///
/// A negative net means OUT movements outweigh recorded IN movements, which
/// only happens with inconsistent history.
pub fn clamp_usage(net: i64) -> i64 {
    net.max(0)
}
