//! Daemon error types.

use thiserror::Error;
use tripwire_domain::{DomainError, OrderId, UserId};
use tripwire_feed::FeedError;
use tripwire_store::StoreError;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Domain error (validation)
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Feed error
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    /// Order not found
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Requesting user does not own the order
    #[error("User {user_id} is not authorized for order {order_id}")]
    Unauthorized {
        /// The order being acted on
        order_id: OrderId,
        /// The requesting user
        user_id: UserId,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broadcaster error
    #[error("Broadcast error: {0}")]
    Broadcast(String),

    /// Shutdown requested
    #[error("Shutdown requested")]
    Shutdown,
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
