//! Ephemeral values and emitted facts
//!
//! A `PriceObservation` is consumed once per evaluation pass and never
//! persisted. An `ExecutionEvent` is the immutable record of one order
//! firing; delivery to observers is best-effort.

use crate::entities::{Order, OrderId, OrderKind, OrderStatus, UserId};
use crate::value_objects::{Price, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Price Observation
// =============================================================================

/// One tick from a price feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Observed instrument
    pub symbol: Symbol,
    /// Observed price
    pub price: Price,
    /// When the feed produced this observation
    pub observed_at: DateTime<Utc>,
}

impl PriceObservation {
    /// Create an observation stamped with the current time
    pub fn now(symbol: Symbol, price: Price) -> Self {
        Self {
            symbol,
            price,
            observed_at: Utc::now(),
        }
    }
}

// =============================================================================
// Execution Event
// =============================================================================

/// Emitted fact: an order fired and its transition was confirmed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEvent {
    /// The fired order
    pub order_id: OrderId,
    /// Its owner
    pub user_id: UserId,
    /// Stop-loss or take-profit
    pub kind: OrderKind,
    /// Resulting status (always executed)
    pub status: OrderStatus,
    /// When the transition was confirmed
    pub executed_at: DateTime<Utc>,
}

impl ExecutionEvent {
    /// Build the event for an order whose transition just succeeded
    pub fn for_order(order: &Order) -> Self {
        Self {
            order_id: order.id,
            user_id: order.user_id,
            kind: order.kind,
            status: order.status,
            executed_at: Utc::now(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
