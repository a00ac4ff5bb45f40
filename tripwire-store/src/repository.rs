//! Repository trait definitions (Ports)
//!
//! These traits define the storage interface for the domain.
//! Implementations can be in-memory or backed by an external database.

use crate::error::StoreError;
use async_trait::async_trait;
use tripwire_domain::{Order, OrderId, OrderKind, OrderStatus, Position, Price, UserId};

/// Repository for conditional orders
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Create a new active order with a fresh id
    async fn create(
        &self,
        user_id: UserId,
        kind: OrderKind,
        trigger_price: Price,
    ) -> Result<Order, StoreError>;

    /// Find an order by ID
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Find all orders for a user, in creation order
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError>;

    /// Snapshot of all active orders across users
    async fn find_active(&self) -> Result<Vec<Order>, StoreError>;

    /// Conditional transition: succeeds only if the stored status equals
    /// `expected` at the moment of update, otherwise fails with
    /// [`StoreError::Conflict`] and performs no mutation.
    ///
    /// Two racing attempts to execute the same order serialize on this
    /// call; exactly one wins.
    async fn transition(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<Order, StoreError>;
}

/// Read access to a user's position and its current reference price
#[async_trait]
pub trait PositionReader: Send + Sync {
    /// Resolve the user's open position, if any
    async fn position_for_user(&self, user_id: UserId) -> Result<Option<Position>, StoreError>;

    /// Current reference price for the user's position
    ///
    /// Fails with [`StoreError::NotFound`] if the user has no position and
    /// [`StoreError::PriceUnavailable`] before the first observation.
    async fn price_for_user(&self, user_id: UserId) -> Result<Price, StoreError>;

    /// Close the user's position: quantity drops to zero, the record stays
    async fn close_position(&self, user_id: UserId) -> Result<(), StoreError>;
}
