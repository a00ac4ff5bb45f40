//! Event bus for internal daemon communication.
//!
//! The event bus allows decoupled communication between:
//! - Price Feed → Trigger Engine (observations)
//! - Trigger Engine → Broadcaster (execution events)
//! - Request Gateway → Broadcaster (order creation notices)
//!
//! Uses tokio broadcast channels for fan-out to multiple receivers.

use tokio::sync::broadcast;
use tripwire_domain::{ExecutionEvent, Order, PriceObservation};

// =============================================================================
// Event Types
// =============================================================================

/// Events that flow through the daemon event bus.
#[derive(Debug, Clone)]
pub enum DaemonEvent {
    /// The feed produced a price observation
    PriceUpdate(PriceObservation),

    /// An order fired; the store has confirmed the transition
    Executed(ExecutionEvent),

    /// A new order was created through the gateway
    OrderCreated(Order),

    /// Shutdown signal
    Shutdown,
}

// =============================================================================
// Event Bus
// =============================================================================

/// Event bus for daemon-wide communication.
///
/// Multiple producers can send events, and multiple consumers can receive.
/// Uses broadcast channels for fan-out pattern.
pub struct EventBus {
    sender: broadcast::Sender<DaemonEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity.
    ///
    /// Capacity determines how many events can be buffered before
    /// slow receivers start missing events (lagging).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// Returns 0 if there are no active receivers.
    pub fn send(&self, event: DaemonEvent) -> usize {
        // send() returns Err if there are no receivers, but we don't care
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events.
    ///
    /// Returns a receiver that will receive all events sent after subscription.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Receiver for daemon events.
pub struct EventReceiver {
    receiver: broadcast::Receiver<DaemonEvent>,
}

impl EventReceiver {
    /// Receive the next event.
    ///
    /// Returns `None` if the sender has been dropped.
    /// Returns error description if the receiver lagged (missed events).
    pub async fn recv(&mut self) -> Option<Result<DaemonEvent, String>> {
        match self.receiver.recv().await {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::RecvError::Closed) => None,
            Err(broadcast::error::RecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} events", count)))
            }
        }
    }

    /// Try to receive an event without blocking.
    ///
    /// Returns `None` if no event is immediately available.
    pub fn try_recv(&mut self) -> Option<Result<DaemonEvent, String>> {
        match self.receiver.try_recv() {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::TryRecvError::Empty) => None,
            Err(broadcast::error::TryRecvError::Closed) => None,
            Err(broadcast::error::TryRecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} events", count)))
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tripwire_domain::{OrderKind, OrderStatus, Price, Symbol};

    fn create_test_event() -> ExecutionEvent {
        let mut order = tripwire_domain::Order::new(
            1,
            7,
            OrderKind::StopLoss,
            Price::new(dec!(100)).unwrap(),
        );
        order.status = OrderStatus::Executed;
        ExecutionEvent::for_order(&order)
    }

    #[tokio::test]
    async fn test_event_bus_send_recv() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        bus.send(DaemonEvent::Executed(create_test_event()));

        let event = receiver.recv().await.unwrap().unwrap();
        match event {
            DaemonEvent::Executed(e) => {
                assert_eq!(e.order_id, 1);
                assert_eq!(e.user_id, 7);
            }
            _ => panic!("Expected Executed event"),
        }
    }

    #[tokio::test]
    async fn test_event_bus_multiple_receivers() {
        let bus = EventBus::new(10);
        let mut receiver1 = bus.subscribe();
        let mut receiver2 = bus.subscribe();

        assert_eq!(bus.receiver_count(), 2);

        bus.send(DaemonEvent::Executed(create_test_event()));

        let event1 = receiver1.recv().await.unwrap().unwrap();
        let event2 = receiver2.recv().await.unwrap().unwrap();

        assert!(matches!(event1, DaemonEvent::Executed(_)));
        assert!(matches!(event2, DaemonEvent::Executed(_)));
    }

    #[tokio::test]
    async fn test_event_bus_no_receivers() {
        let bus = EventBus::new(10);

        // Send with no receivers should not panic
        let count = bus.send(DaemonEvent::Shutdown);
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_event_bus_price_update() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        let observation = PriceObservation::now(
            Symbol::parse("BTCUSDT").unwrap(),
            Price::new(dec!(96000)).unwrap(),
        );
        bus.send(DaemonEvent::PriceUpdate(observation));

        let event = receiver.recv().await.unwrap().unwrap();
        match event {
            DaemonEvent::PriceUpdate(obs) => {
                assert_eq!(obs.price.as_decimal(), dec!(96000));
            }
            _ => panic!("Expected PriceUpdate event"),
        }
    }

    #[test]
    fn test_try_recv_empty() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        // No events sent yet
        assert!(receiver.try_recv().is_none());
    }
}
