//! Domain Entities for Tripwire
//!
//! Conditional orders and the positions they guard.
//! Identity for both is an integer id assigned by the store.

use crate::value_objects::{DomainError, Price, Quantity, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for an Order (store-assigned, never reused)
pub type OrderId = i64;

/// Unique identifier for a User
pub type UserId = i64;

// =============================================================================
// Order Kind
// =============================================================================

/// The two recognized conditional order kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Fires when the reference price falls to or below the trigger
    #[serde(rename = "stop-loss")]
    StopLoss,
    /// Fires when the reference price rises to or above the trigger
    #[serde(rename = "take-profit")]
    TakeProfit,
}

impl OrderKind {
    /// The trigger predicate: does `reference` satisfy `trigger` for this kind?
    ///
    /// The boundary is inclusive for both kinds: a reference price exactly
    /// equal to the trigger price matches.
    pub fn is_triggered_at(&self, reference: Price, trigger: Price) -> bool {
        match self {
            OrderKind::StopLoss => reference <= trigger,
            OrderKind::TakeProfit => reference >= trigger,
        }
    }
}

impl FromStr for OrderKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop-loss" => Ok(OrderKind::StopLoss),
            "take-profit" => Ok(OrderKind::TakeProfit),
            other => Err(DomainError::InvalidOrderKind(format!(
                "{}. Expected: stop-loss or take-profit",
                other
            ))),
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::StopLoss => write!(f, "stop-loss"),
            OrderKind::TakeProfit => write!(f, "take-profit"),
        }
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Order lifecycle state machine
///
/// `Active -> Executed` and `Active -> Cancelled` are the only legal
/// transitions; both targets are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Waiting for its trigger condition
    Active,
    /// Fired exactly once by a winning conditional transition
    Executed,
    /// Withdrawn by its owner before firing
    Cancelled,
}

impl OrderStatus {
    /// True if no further transition is permitted out of this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Executed | OrderStatus::Cancelled)
    }

    /// Get the name of the state for display
    pub fn name(&self) -> &str {
        match self {
            OrderStatus::Active => "active",
            OrderStatus::Executed => "executed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Order
// =============================================================================

/// A standing instruction to act when a price condition is met
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Store-assigned identity
    pub id: OrderId,
    /// Owning user
    pub user_id: UserId,
    /// Stop-loss or take-profit
    pub kind: OrderKind,
    /// The price threshold that activates the order
    pub trigger_price: Price,
    /// Lifecycle state
    pub status: OrderStatus,
    /// When the store created the order
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create a new active order
    pub fn new(id: OrderId, user_id: UserId, kind: OrderKind, trigger_price: Price) -> Self {
        Self {
            id,
            user_id,
            kind,
            trigger_price,
            status: OrderStatus::Active,
            created_at: Utc::now(),
        }
    }

    /// True if the order is still waiting for its trigger
    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Active
    }
}

// =============================================================================
// Position
// =============================================================================

/// A user's open holding in an instrument
///
/// Quantity is >= 0; a position with quantity 0 is closed. Closing keeps
/// the record (audit trail), it never deletes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Owning user
    pub user_id: UserId,
    /// Held instrument
    pub token: Symbol,
    /// Holding size; zero means closed
    pub quantity: Quantity,
    /// Price at which the holding was opened
    pub entry_price: Price,
}

impl Position {
    /// Create a new open position
    pub fn new(user_id: UserId, token: Symbol, quantity: Quantity, entry_price: Price) -> Self {
        Self {
            user_id,
            token,
            quantity,
            entry_price,
        }
    }

    /// Close the position: quantity drops to zero, the record is kept
    pub fn close(&mut self) {
        self.quantity = Quantity::zero();
    }

    /// True if the position has been closed
    pub fn is_closed(&self) -> bool {
        self.quantity.is_zero()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn price(v: rust_decimal::Decimal) -> Price {
        Price::new(v).unwrap()
    }

    #[test]
    fn test_order_kind_parse() {
        assert_eq!("stop-loss".parse::<OrderKind>().unwrap(), OrderKind::StopLoss);
        assert_eq!("take-profit".parse::<OrderKind>().unwrap(), OrderKind::TakeProfit);
        assert!("limit".parse::<OrderKind>().is_err());
    }

    #[test]
    fn test_stop_loss_trigger_boundary_inclusive() {
        let trigger = price(dec!(100));

        assert!(OrderKind::StopLoss.is_triggered_at(price(dec!(100)), trigger));
        assert!(OrderKind::StopLoss.is_triggered_at(price(dec!(99.99)), trigger));
        assert!(!OrderKind::StopLoss.is_triggered_at(price(dec!(100.01)), trigger));
    }

    #[test]
    fn test_take_profit_trigger_boundary_inclusive() {
        let trigger = price(dec!(200));

        assert!(OrderKind::TakeProfit.is_triggered_at(price(dec!(200)), trigger));
        assert!(OrderKind::TakeProfit.is_triggered_at(price(dec!(200.01)), trigger));
        assert!(!OrderKind::TakeProfit.is_triggered_at(price(dec!(199.99)), trigger));
    }

    #[test]
    fn test_order_starts_active() {
        let order = Order::new(1, 7, OrderKind::StopLoss, price(dec!(100)));

        assert!(order.is_active());
        assert!(!order.status.is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Executed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Active.is_terminal());
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Active).unwrap();
        assert_eq!(json, "\"active\"");

        let kind_json = serde_json::to_string(&OrderKind::StopLoss).unwrap();
        assert_eq!(kind_json, "\"stop-loss\"");
    }

    #[test]
    fn test_position_close_keeps_record() {
        let mut position = Position::new(
            1,
            Symbol::parse("BTCUSDT").unwrap(),
            Quantity::new(dec!(0.25)).unwrap(),
            price(dec!(9500)),
        );

        assert!(!position.is_closed());
        position.close();
        assert!(position.is_closed());
        assert_eq!(position.entry_price, price(dec!(9500)));
    }
}
