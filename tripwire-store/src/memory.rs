//! In-memory store implementation
//!
//! Backs the daemon and the test suite without a database.
//! Thread-safe using RwLock for concurrent access; the conditional
//! transition runs under a single write lock, which makes it atomic
//! with respect to every other reader and writer.

use crate::error::StoreError;
use crate::repository::{OrderRepository, PositionReader};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;
use tripwire_domain::{Order, OrderId, OrderKind, OrderStatus, Position, Price, UserId};

/// In-memory store for orders, positions, and the latest reference price
pub struct MemoryStore {
    orders: RwLock<HashMap<OrderId, Order>>,
    order_seq: AtomicI64,
    positions: RwLock<HashMap<UserId, Position>>,
    mark_price: RwLock<Option<Price>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            order_seq: AtomicI64::new(0),
            positions: RwLock::new(HashMap::new()),
            mark_price: RwLock::new(None),
        }
    }

    /// Seed or replace a user's position (the account system's entry point)
    pub fn upsert_position(&self, position: Position) {
        let mut positions = self.positions.write().unwrap();
        positions.insert(position.user_id, position);
    }

    /// Record the most recent price observation as the reference price
    pub fn record_mark_price(&self, price: Price) {
        let mut mark = self.mark_price.write().unwrap();
        *mark = Some(price);
    }

    /// Get the number of orders
    pub fn order_count(&self) -> usize {
        self.orders.read().unwrap().len()
    }

    /// Get the number of positions
    pub fn position_count(&self) -> usize {
        self.positions.read().unwrap().len()
    }

    /// Clear all data (useful for test setup)
    pub fn clear(&self) {
        self.orders.write().unwrap().clear();
        self.positions.write().unwrap().clear();
        *self.mark_price.write().unwrap() = None;
        self.order_seq.store(0, Ordering::SeqCst);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Order Repository Implementation
// =============================================================================

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create(
        &self,
        user_id: UserId,
        kind: OrderKind,
        trigger_price: Price,
    ) -> Result<Order, StoreError> {
        let id = self.order_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let order = Order::new(id, user_id, kind, trigger_price);

        let mut orders = self.orders.write().unwrap();
        orders.insert(id, order.clone());
        Ok(order)
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let orders = self.orders.read().unwrap();
        Ok(orders.get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().unwrap();
        let mut found: Vec<Order> = orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        // Ids are monotonic, so ascending id is creation order
        found.sort_by_key(|o| o.id);
        Ok(found)
    }

    async fn find_active(&self) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().unwrap();
        let mut found: Vec<Order> = orders
            .values()
            .filter(|o| o.status == OrderStatus::Active)
            .cloned()
            .collect();
        found.sort_by_key(|o| o.id);
        Ok(found)
    }

    async fn transition(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().unwrap();
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("order", id.to_string()))?;

        if order.status != expected {
            return Err(StoreError::Conflict {
                id,
                expected,
                actual: order.status,
            });
        }

        order.status = new;
        Ok(order.clone())
    }
}

// =============================================================================
// Position Reader Implementation
// =============================================================================

#[async_trait]
impl PositionReader for MemoryStore {
    async fn position_for_user(&self, user_id: UserId) -> Result<Option<Position>, StoreError> {
        let positions = self.positions.read().unwrap();
        Ok(positions.get(&user_id).cloned())
    }

    async fn price_for_user(&self, user_id: UserId) -> Result<Price, StoreError> {
        {
            let positions = self.positions.read().unwrap();
            if !positions.contains_key(&user_id) {
                return Err(StoreError::not_found("position", user_id.to_string()));
            }
        }

        let mark = self.mark_price.read().unwrap();
        (*mark).ok_or(StoreError::PriceUnavailable)
    }

    async fn close_position(&self, user_id: UserId) -> Result<(), StoreError> {
        let mut positions = self.positions.write().unwrap();
        let position = positions
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::not_found("position", user_id.to_string()))?;

        position.close();
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
