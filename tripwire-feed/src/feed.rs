//! The periodic feed driver
//!
//! Owns the polling cadence as a cancellable background task. Each tick
//! asks the quote source for the latest price under a per-tick timeout
//! and publishes a `PriceObservation` to all subscribers. A failed or
//! timed-out tick is skipped; the next tick is scheduled from the fixed
//! interval, so a slow tick cannot accumulate unbounded drift.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tripwire_domain::{PriceObservation, Symbol};

use crate::quote::QuoteSource;

// =============================================================================
// Configuration
// =============================================================================

/// Feed driver configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Instrument this feed tracks
    pub symbol: Symbol,
    /// Fixed interval between ticks
    pub poll_interval: Duration,
    /// Budget for a single tick's fetch; a slower tick is skipped
    pub tick_timeout: Duration,
}

impl FeedConfig {
    /// Default cadence: one tick per second, 800ms fetch budget.
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            poll_interval: Duration::from_secs(1),
            tick_timeout: Duration::from_millis(800),
        }
    }
}

// =============================================================================
// Price Feed
// =============================================================================

/// A lazy, infinite, time-driven sequence of price observations.
pub struct PriceFeed {
    /// Where each tick's price comes from
    source: Arc<dyn QuoteSource>,
    /// Cadence and timeout
    config: FeedConfig,
    /// Fan-out channel for observations
    sender: broadcast::Sender<PriceObservation>,
    /// Shutdown token
    shutdown_token: CancellationToken,
}

impl PriceFeed {
    /// Create a new feed with the given observation buffer capacity.
    pub fn new(source: Arc<dyn QuoteSource>, config: FeedConfig, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            source,
            config,
            sender,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Subscribe to observations produced after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<PriceObservation> {
        self.sender.subscribe()
    }

    /// Start the driver task in the background.
    ///
    /// Returns a JoinHandle that can be awaited or aborted.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.config.poll_interval);
            // Anchor the cadence to the interval, not to tick completion
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                symbol = %self.config.symbol,
                interval_ms = self.config.poll_interval.as_millis() as u64,
                "Price feed started"
            );

            loop {
                tokio::select! {
                    _ = self.shutdown_token.cancelled() => {
                        info!(symbol = %self.config.symbol, "Price feed received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_tick().await;
                    }
                }
            }

            info!(symbol = %self.config.symbol, "Price feed stopped");
        })
    }

    /// Produce one tick: fetch under timeout, publish on success, skip on failure.
    async fn run_tick(&self) {
        match timeout(self.config.tick_timeout, self.source.latest_price()).await {
            Ok(Ok(price)) => {
                let observation = PriceObservation::now(self.config.symbol.clone(), price);
                debug!(symbol = %self.config.symbol, %price, "Tick");
                // send() fails only with no subscribers; that is not an error
                let _ = self.sender.send(observation);
            }
            Ok(Err(e)) => {
                warn!(symbol = %self.config.symbol, error = %e, "Tick failed, skipping");
            }
            Err(_) => {
                warn!(
                    symbol = %self.config.symbol,
                    timeout_ms = self.config.tick_timeout.as_millis() as u64,
                    "Tick timed out, skipping"
                );
            }
        }
    }

    /// Stop the driver task.
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }
}

// =============================================================================
// Tests
// =============================================================================
