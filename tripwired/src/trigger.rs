//! Trigger Engine: the conditional-order core
//!
//! On every price observation the engine runs one evaluation pass:
//! - snapshot all active orders
//! - resolve each owner's position and reference price
//! - match the trigger predicate
//! - execute matches through the store's conditional transition
//! - publish an execution event once the store confirms the transition
//!
//! On-demand execution (driven by the gateway instead of the feed) funnels
//! through the same conditional transition, which is the single
//! serialization point: two racing attempts to fire one order resolve to
//! exactly one winner. The engine holds no lock of its own across awaits.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use tripwire_domain::{ExecutionEvent, Order, OrderId, OrderKind, OrderStatus, PriceObservation, UserId};
use tripwire_store::{OrderRepository, PositionReader};

use crate::error::{DaemonError, DaemonResult};
use crate::event_bus::{DaemonEvent, EventBus};

// =============================================================================
// Outcomes
// =============================================================================

/// Result of an on-demand execution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// A stop-loss fired; the position was closed
    StopLossExecuted,
    /// A take-profit fired
    TakeProfitExecuted,
    /// The trigger condition is not met, or the order already reached a
    /// terminal state
    ConditionsNotMet,
}

impl ExecutionOutcome {
    /// Human-readable outcome for the gateway response.
    pub fn message(&self) -> &'static str {
        match self {
            ExecutionOutcome::StopLossExecuted => "Stop loss executed",
            ExecutionOutcome::TakeProfitExecuted => "Take profit executed",
            ExecutionOutcome::ConditionsNotMet => {
                "Conditions not met, waiting for the trigger price"
            }
        }
    }
}

// =============================================================================
// Trigger Engine
// =============================================================================

/// Evaluates active conditional orders against price observations and
/// executes matches exactly once.
pub struct TriggerEngine {
    /// Order store (the conditional transition lives here)
    orders: Arc<dyn OrderRepository>,
    /// Position and reference-price resolution
    positions: Arc<dyn PositionReader>,
    /// Event bus for publishing execution events
    event_bus: Arc<EventBus>,
}

impl TriggerEngine {
    /// Create a new trigger engine.
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        positions: Arc<dyn PositionReader>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            orders,
            positions,
            event_bus,
        }
    }

    /// Run one evaluation pass for a price observation.
    ///
    /// Individual order failures are logged and skipped; the pass always
    /// runs to completion over its snapshot of candidates. Returns the
    /// execution events emitted by this pass.
    pub async fn evaluate(&self, observation: &PriceObservation) -> Vec<ExecutionEvent> {
        let snapshot = match self.orders.find_active().await {
            Ok(orders) => orders,
            Err(e) => {
                warn!(error = %e, "Failed to snapshot active orders, skipping pass");
                return Vec::new();
            }
        };

        trace!(
            symbol = %observation.symbol,
            price = %observation.price,
            candidates = snapshot.len(),
            "Evaluation pass"
        );

        let mut events = Vec::new();
        for order in &snapshot {
            match self.evaluate_candidate(order).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        order_id = order.id,
                        user_id = order.user_id,
                        error = %e,
                        "Order evaluation failed, skipping"
                    );
                }
            }
        }

        events
    }

    /// Evaluate a single candidate from the pass snapshot.
    async fn evaluate_candidate(&self, order: &Order) -> DaemonResult<Option<ExecutionEvent>> {
        let position = self.positions.position_for_user(order.user_id).await?;
        if position.is_none() {
            debug!(
                order_id = order.id,
                user_id = order.user_id,
                "No position for user, skipping order"
            );
            return Ok(None);
        }

        let reference = self.positions.price_for_user(order.user_id).await?;

        if !order.kind.is_triggered_at(reference, order.trigger_price) {
            return Ok(None);
        }

        info!(
            order_id = order.id,
            kind = %order.kind,
            %reference,
            trigger = %order.trigger_price,
            "Trigger condition met"
        );

        self.fire(order).await
    }

    /// Attempt the conditional transition and, on success, apply the
    /// kind-specific side effect and publish the execution event.
    ///
    /// Losing the race (`Conflict`) is the expected outcome of the
    /// at-most-once guarantee, not an error; it yields `Ok(None)`.
    async fn fire(&self, order: &Order) -> DaemonResult<Option<ExecutionEvent>> {
        let executed = match self
            .orders
            .transition(order.id, OrderStatus::Active, OrderStatus::Executed)
            .await
        {
            Ok(updated) => updated,
            Err(e) if e.is_conflict() => {
                trace!(order_id = order.id, "Lost execution race, order already terminal");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if executed.kind == OrderKind::StopLoss {
            // The execution stands even if the close fails; the position
            // will be reconciled by the account system.
            if let Err(e) = self.positions.close_position(executed.user_id).await {
                warn!(
                    order_id = executed.id,
                    user_id = executed.user_id,
                    error = %e,
                    "Failed to close position after stop-loss execution"
                );
            }
        }

        let event = ExecutionEvent::for_order(&executed);
        info!(
            order_id = event.order_id,
            user_id = event.user_id,
            kind = %event.kind,
            "Order executed"
        );
        self.event_bus.send(DaemonEvent::Executed(event.clone()));

        Ok(Some(event))
    }

    /// Execute an order on demand, outside the periodic pass.
    ///
    /// Safe to run concurrently with evaluation passes: both paths race on
    /// the same conditional transition.
    ///
    /// # Errors
    /// - [`DaemonError::OrderNotFound`] for an unknown order id
    /// - [`DaemonError::Unauthorized`] when the requester does not own it
    pub async fn execute_on_demand(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> DaemonResult<ExecutionOutcome> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(DaemonError::OrderNotFound(order_id))?;

        if order.user_id != user_id {
            warn!(order_id, user_id, "Unauthorized execution attempt");
            return Err(DaemonError::Unauthorized { order_id, user_id });
        }

        let reference = self.positions.price_for_user(user_id).await?;

        if !order.kind.is_triggered_at(reference, order.trigger_price) {
            return Ok(ExecutionOutcome::ConditionsNotMet);
        }

        match self.fire(&order).await? {
            Some(event) => Ok(match event.kind {
                OrderKind::StopLoss => ExecutionOutcome::StopLossExecuted,
                OrderKind::TakeProfit => ExecutionOutcome::TakeProfitExecuted,
            }),
            // Lost the race: a periodic pass got there first
            None => Ok(ExecutionOutcome::ConditionsNotMet),
        }
    }

    /// Cancel an active order on behalf of its owner.
    ///
    /// Unlike execution, a lost race here surfaces as a conflict: the
    /// caller asked for a state change that is no longer possible.
    pub async fn cancel(&self, order_id: OrderId, user_id: UserId) -> DaemonResult<Order> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(DaemonError::OrderNotFound(order_id))?;

        if order.user_id != user_id {
            warn!(order_id, user_id, "Unauthorized cancellation attempt");
            return Err(DaemonError::Unauthorized { order_id, user_id });
        }

        let cancelled = self
            .orders
            .transition(order_id, OrderStatus::Active, OrderStatus::Cancelled)
            .await?;

        info!(order_id, user_id, "Order cancelled");
        Ok(cancelled)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tripwire_domain::{Position, Price, Quantity, Symbol};
    use tripwire_store::{MemoryStore, StoreError};

    fn price(v: Decimal) -> Price {
        Price::new(v).unwrap()
    }

    fn observation(v: Decimal) -> PriceObservation {
        PriceObservation::now(Symbol::parse("BTCUSDT").unwrap(), price(v))
    }

    struct Harness {
        store: Arc<MemoryStore>,
        engine: TriggerEngine,
        bus: Arc<EventBus>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(EventBus::new(100));
        let engine = TriggerEngine::new(store.clone(), store.clone(), bus.clone());
        Harness { store, engine, bus }
    }

    fn seed_position(store: &MemoryStore, user_id: UserId) {
        store.upsert_position(Position::new(
            user_id,
            Symbol::parse("BTCUSDT").unwrap(),
            Quantity::new(dec!(0.5)).unwrap(),
            price(dec!(9500)),
        ));
    }

    /// Record the observation as the reference price, then run a pass.
    async fn tick(h: &Harness, v: Decimal) -> Vec<ExecutionEvent> {
        h.store.record_mark_price(price(v));
        h.engine.evaluate(&observation(v)).await
    }

    #[tokio::test]
    async fn test_stop_loss_fires_at_exact_trigger() {
        let h = harness();
        seed_position(&h.store, 1);
        let order = h.store.create(1, OrderKind::StopLoss, price(dec!(100))).await.unwrap();

        let events = tick(&h, dec!(100)).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].order_id, order.id);
        assert_eq!(events[0].status, OrderStatus::Executed);

        let stored = h.store.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Executed);

        // Stop-loss closes the position; the record survives
        let position = h.store.position_for_user(1).await.unwrap().unwrap();
        assert!(position.is_closed());
    }

    #[tokio::test]
    async fn test_take_profit_fires_at_exact_trigger_and_keeps_position() {
        let h = harness();
        seed_position(&h.store, 1);
        let order = h.store.create(1, OrderKind::TakeProfit, price(dec!(200))).await.unwrap();

        let events = tick(&h, dec!(200)).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].order_id, order.id);

        // Take-profit execution does not touch the position
        let position = h.store.position_for_user(1).await.unwrap().unwrap();
        assert!(!position.is_closed());
    }

    #[tokio::test]
    async fn test_no_false_trigger_above_stop_loss() {
        let h = harness();
        seed_position(&h.store, 1);
        let order = h.store.create(1, OrderKind::StopLoss, price(dec!(100))).await.unwrap();

        let events = tick(&h, dec!(100.01)).await;

        assert!(events.is_empty());
        let stored = h.store.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Active);
    }

    #[tokio::test]
    async fn test_no_false_trigger_below_take_profit() {
        let h = harness();
        seed_position(&h.store, 1);
        let order = h.store.create(1, OrderKind::TakeProfit, price(dec!(200))).await.unwrap();

        let events = tick(&h, dec!(150)).await;

        assert!(events.is_empty());
        let stored = h.store.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Active);
    }

    #[tokio::test]
    async fn test_missing_position_is_isolated() {
        let h = harness();
        seed_position(&h.store, 1);
        seed_position(&h.store, 3);
        // User 2 has no position; their order must not poison the pass
        let healthy_a = h.store.create(1, OrderKind::StopLoss, price(dec!(100))).await.unwrap();
        let orphan = h.store.create(2, OrderKind::StopLoss, price(dec!(100))).await.unwrap();
        let healthy_b = h.store.create(3, OrderKind::StopLoss, price(dec!(100))).await.unwrap();

        let events = tick(&h, dec!(95)).await;

        let fired: Vec<OrderId> = events.iter().map(|e| e.order_id).collect();
        assert_eq!(fired, vec![healthy_a.id, healthy_b.id]);

        let skipped = h.store.find_by_id(orphan.id).await.unwrap().unwrap();
        assert_eq!(skipped.status, OrderStatus::Active);
    }

    #[tokio::test]
    async fn test_executed_order_is_terminal_across_passes() {
        let h = harness();
        seed_position(&h.store, 1);
        let order = h.store.create(1, OrderKind::StopLoss, price(dec!(100))).await.unwrap();

        let first = tick(&h, dec!(100)).await;
        assert_eq!(first.len(), 1);

        // Price matches again: nothing further happens
        let second = tick(&h, dec!(90)).await;
        assert!(second.is_empty());

        let stored = h.store.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Executed);
    }

    #[tokio::test]
    async fn test_cancelled_order_never_fires() {
        let h = harness();
        seed_position(&h.store, 1);
        let order = h.store.create(1, OrderKind::StopLoss, price(dec!(100))).await.unwrap();

        h.engine.cancel(order.id, 1).await.unwrap();

        let events = tick(&h, dec!(90)).await;
        assert!(events.is_empty());

        let stored = h.store.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_concurrent_passes_execute_at_most_once() {
        let h = harness();
        seed_position(&h.store, 1);
        h.store.create(1, OrderKind::StopLoss, price(dec!(100))).await.unwrap();
        h.store.record_mark_price(price(dec!(100)));

        let obs = observation(dec!(100));
        let (a, b) = tokio::join!(h.engine.evaluate(&obs), h.engine.evaluate(&obs));

        assert_eq!(a.len() + b.len(), 1);
    }

    #[tokio::test]
    async fn test_pass_racing_on_demand_executes_at_most_once() {
        let h = harness();
        seed_position(&h.store, 1);
        let order = h.store.create(1, OrderKind::StopLoss, price(dec!(100))).await.unwrap();
        h.store.record_mark_price(price(dec!(100)));

        let mut receiver = h.bus.subscribe();

        let obs = observation(dec!(100));
        let (pass, on_demand) = tokio::join!(
            h.engine.evaluate(&obs),
            h.engine.execute_on_demand(order.id, 1)
        );

        let demand_fired = matches!(
            on_demand.unwrap(),
            ExecutionOutcome::StopLossExecuted | ExecutionOutcome::TakeProfitExecuted
        );
        assert_eq!(pass.len() + usize::from(demand_fired), 1);

        // Exactly one execution event crossed the bus
        let mut executed_events = 0;
        while let Some(Ok(event)) = receiver.try_recv() {
            if matches!(event, DaemonEvent::Executed(_)) {
                executed_events += 1;
            }
        }
        assert_eq!(executed_events, 1);
    }

    #[tokio::test]
    async fn test_on_demand_conditions_not_met() {
        let h = harness();
        seed_position(&h.store, 1);
        let order = h.store.create(1, OrderKind::StopLoss, price(dec!(100))).await.unwrap();
        h.store.record_mark_price(price(dec!(150)));

        let outcome = h.engine.execute_on_demand(order.id, 1).await.unwrap();

        assert_eq!(outcome, ExecutionOutcome::ConditionsNotMet);
        let stored = h.store.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Active);
    }

    #[tokio::test]
    async fn test_on_demand_take_profit() {
        let h = harness();
        seed_position(&h.store, 1);
        let order = h.store.create(1, OrderKind::TakeProfit, price(dec!(200))).await.unwrap();
        h.store.record_mark_price(price(dec!(250)));

        let outcome = h.engine.execute_on_demand(order.id, 1).await.unwrap();

        assert_eq!(outcome, ExecutionOutcome::TakeProfitExecuted);
        let position = h.store.position_for_user(1).await.unwrap().unwrap();
        assert!(!position.is_closed());
    }

    #[tokio::test]
    async fn test_on_demand_unknown_order() {
        let h = harness();
        let err = h.engine.execute_on_demand(99, 1).await.unwrap_err();
        assert!(matches!(err, DaemonError::OrderNotFound(99)));
    }

    #[tokio::test]
    async fn test_on_demand_rejects_foreign_order() {
        let h = harness();
        seed_position(&h.store, 1);
        let order = h.store.create(1, OrderKind::StopLoss, price(dec!(100))).await.unwrap();
        h.store.record_mark_price(price(dec!(50)));

        let err = h.engine.execute_on_demand(order.id, 2).await.unwrap_err();

        assert!(matches!(err, DaemonError::Unauthorized { .. }));
        // No state change on rejection
        let stored = h.store.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Active);
    }

    #[tokio::test]
    async fn test_on_demand_terminal_order_reports_not_met() {
        let h = harness();
        seed_position(&h.store, 1);
        let order = h.store.create(1, OrderKind::StopLoss, price(dec!(100))).await.unwrap();
        h.store.record_mark_price(price(dec!(90)));

        let first = h.engine.execute_on_demand(order.id, 1).await.unwrap();
        assert_eq!(first, ExecutionOutcome::StopLossExecuted);

        let second = h.engine.execute_on_demand(order.id, 1).await.unwrap();
        assert_eq!(second, ExecutionOutcome::ConditionsNotMet);
    }

    #[tokio::test]
    async fn test_cancel_rejects_foreign_order() {
        let h = harness();
        let order = h.store.create(1, OrderKind::StopLoss, price(dec!(100))).await.unwrap();

        let err = h.engine.cancel(order.id, 2).await.unwrap_err();
        assert!(matches!(err, DaemonError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_cancel_after_execution_is_conflict() {
        let h = harness();
        seed_position(&h.store, 1);
        let order = h.store.create(1, OrderKind::StopLoss, price(dec!(100))).await.unwrap();

        tick(&h, dec!(90)).await;

        let err = h.engine.cancel(order.id, 1).await.unwrap_err();
        assert!(matches!(err, DaemonError::Store(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_event_published_only_after_confirmed_transition() {
        let h = harness();
        seed_position(&h.store, 1);
        let order = h.store.create(1, OrderKind::StopLoss, price(dec!(100))).await.unwrap();
        let mut receiver = h.bus.subscribe();

        tick(&h, dec!(100)).await;

        let event = receiver.recv().await.unwrap().unwrap();
        match event {
            DaemonEvent::Executed(e) => {
                assert_eq!(e.order_id, order.id);
                assert_eq!(e.status, OrderStatus::Executed);
                // By the time the event is observable, the store agrees
                let stored = h.store.find_by_id(order.id).await.unwrap().unwrap();
                assert_eq!(stored.status, OrderStatus::Executed);
            }
            _ => panic!("Expected Executed event"),
        }
    }

    #[tokio::test]
    async fn test_pass_without_mark_price_skips_quietly() {
        let h = harness();
        seed_position(&h.store, 1);
        let order = h.store.create(1, OrderKind::StopLoss, price(dec!(100))).await.unwrap();

        // No mark price recorded: the reference is unavailable, the order
        // is skipped, the pass completes
        let events = h.engine.evaluate(&observation(dec!(90))).await;

        assert!(events.is_empty());
        let stored = h.store.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Active);
    }
}
