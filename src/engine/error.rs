//! Failure taxonomy of inventory operations.
//!
//! `Display` output is what operators read, so every variant names the key,
//! rack, location or quantity they need to correct their input.

use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// No stock row for this key in this rack
    RecordNotFound {
        location: String,
        key: String,
        rack: String,
    },
    /// Requested more than the rack holds
    InsufficientStock {
        location: String,
        key: String,
        rack: String,
        available: i64,
        requested: i64,
    },
    /// The transfer was already received or cancelled by another session
    AlreadyResolved { key: String, created_at: String },
    /// The store kept failing transiently until the attempts ran out
    TransientStoreFailure { attempts: u32, source: StoreError },
    /// Missing field, non-positive quantity, identical source and destination
    Validation(String),
    /// The session may not act on this location or run this operation
    AccessDenied { user: String, target: String },
    /// Non-transient store failure; never retried
    Store(StoreError),
    /// A multi-step operation applied some steps and could not undo them
    PartialFailure {
        applied: String,
        failure: Box<InventoryError>,
    },
}

impl InventoryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        InventoryError::Validation(msg.into())
    }

    /// Transient store failure that a retry may still get past.
    pub fn is_retryable(&self) -> bool {
        matches!(self, InventoryError::Store(e) if e.is_transient())
    }

    /// Stable short name for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            InventoryError::RecordNotFound { .. } => "record_not_found",
            InventoryError::InsufficientStock { .. } => "insufficient_stock",
            InventoryError::AlreadyResolved { .. } => "already_resolved",
            InventoryError::TransientStoreFailure { .. } => "transient_store_failure",
            InventoryError::Validation(_) => "validation",
            InventoryError::AccessDenied { .. } => "access_denied",
            InventoryError::Store(_) => "store",
            InventoryError::PartialFailure { .. } => "partial_failure",
        }
    }
}

impl std::fmt::Display for InventoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InventoryError::RecordNotFound { location, key, rack } => {
                write!(f, "Key {key} was not found in rack {rack} at {location}.")
            }
            InventoryError::InsufficientStock {
                location,
                key,
                rack,
                available,
                requested,
            } => write!(
                f,
                "Insufficient stock of {key} in rack {rack} at {location}: \
                 {available} available, {requested} requested."
            ),
            InventoryError::AlreadyResolved { key, created_at } => write!(
                f,
                "The transfer of {key} sent {created_at} is no longer pending; \
                 it was already received or cancelled."
            ),
            InventoryError::TransientStoreFailure { attempts, source } => write!(
                f,
                "The inventory store did not respond after {attempts} attempt(s) ({source}). \
                 Refresh and try again."
            ),
            InventoryError::Validation(msg) => f.write_str(msg),
            InventoryError::AccessDenied { user, target } => {
                write!(f, "User {user} is not allowed to act on {target}.")
            }
            InventoryError::Store(e) => write!(f, "Inventory store error: {e}."),
            InventoryError::PartialFailure { applied, failure } => write!(
                f,
                "{applied}, but a follow-up step failed: {failure} Manual correction is required."
            ),
        }
    }
}

impl std::error::Error for InventoryError {}

impl From<StoreError> for InventoryError {
    fn from(err: StoreError) -> Self {
        InventoryError::Store(err)
    }
}
