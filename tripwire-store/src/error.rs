//! Storage layer errors

use thiserror::Error;
use tripwire_domain::OrderStatus;

/// Errors that can occur in the storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity (order, position)
        entity_type: String,
        /// Entity ID
        id: String,
    },

    /// Conditional transition lost a race: the stored status did not
    /// match the expected status at the moment of update
    #[error("Conflict on order {id}: expected {expected}, found {actual}")]
    Conflict {
        /// Order ID
        id: i64,
        /// Status the caller expected
        expected: OrderStatus,
        /// Status actually stored
        actual: OrderStatus,
    },

    /// No price observation has been recorded yet
    #[error("No reference price available")]
    PriceUnavailable,

    /// Domain error passthrough
    #[error("Domain error: {0}")]
    Domain(#[from] tripwire_domain::DomainError),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// True if this error is a lost conditional transition
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}
