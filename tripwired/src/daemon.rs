//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Order Store and Position Reader (in-memory)
//! - Price Feed (periodic driver)
//! - Trigger Engine (evaluation passes, on-demand execution)
//! - Notification Broadcaster (WebSocket fan-out)
//! - API Server (HTTP endpoints)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Initialize components
//! 3. Start broadcaster and API server
//! 4. Start the price feed and bridge it onto the event bus
//! 5. Main event loop: record each observation as the reference price,
//!    then run one evaluation pass (single-flight per instrument)
//! 6. Graceful shutdown on SIGINT

use std::net::SocketAddr;
use std::sync::Arc;

use rust_decimal_macros::dec;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use tripwire_domain::Symbol;
use tripwire_feed::{BinanceQuoteSource, FeedConfig, PriceFeed, QuoteSource, SimulatedQuoteSource};
use tripwire_store::MemoryStore;

use crate::api::{create_router, ApiState};
use crate::broadcaster::Broadcaster;
use crate::config::{Config, Environment};
use crate::error::{DaemonError, DaemonResult};
use crate::event_bus::{DaemonEvent, EventBus};
use crate::trigger::TriggerEngine;

// =============================================================================
// Daemon
// =============================================================================

/// Addresses of the daemon's listening sockets.
#[derive(Debug, Clone, Copy)]
pub struct DaemonHandles {
    /// Bound address of the HTTP API
    pub api_addr: SocketAddr,
    /// Bound address of the notification broadcaster
    pub broadcast_addr: SocketAddr,
}

/// The main tripwire daemon.
pub struct Daemon {
    /// Configuration
    config: Config,
    /// In-memory store (orders, positions, reference price)
    store: Arc<MemoryStore>,
    /// Trigger engine
    engine: Arc<TriggerEngine>,
    /// Event bus
    event_bus: Arc<EventBus>,
    /// Notification broadcaster
    broadcaster: Arc<Broadcaster>,
    /// Price feed driver
    feed: Arc<PriceFeed>,
}

impl Daemon {
    /// Create a daemon, choosing the quote source from the environment:
    /// production polls the configured quote endpoint, everything else
    /// runs the simulated source.
    pub fn new(config: Config) -> DaemonResult<Self> {
        let symbol = Symbol::parse(&config.feed.symbol)?;

        let source: Arc<dyn QuoteSource> = match config.environment {
            Environment::Production => Arc::new(BinanceQuoteSource::with_base_url(
                symbol,
                config.feed.quote_url.clone(),
            )),
            // The mock reference price of the simulated setups
            _ => Arc::new(SimulatedQuoteSource::constant(dec!(5000))?),
        };

        Self::with_source(config, source)
    }

    /// Create a daemon around an explicit quote source.
    pub fn with_source(config: Config, source: Arc<dyn QuoteSource>) -> DaemonResult<Self> {
        let symbol = Symbol::parse(&config.feed.symbol)?;

        let store = Arc::new(MemoryStore::new());
        let event_bus = Arc::new(EventBus::new(1000));
        let engine = Arc::new(TriggerEngine::new(
            store.clone(),
            store.clone(),
            event_bus.clone(),
        ));
        let broadcaster = Arc::new(Broadcaster::new(
            config.broadcast.host.clone(),
            config.broadcast.port,
            event_bus.clone(),
        ));

        let feed_config = FeedConfig {
            symbol,
            poll_interval: config.feed.poll_interval,
            tick_timeout: config.feed.tick_timeout,
        };
        let feed = Arc::new(PriceFeed::new(source, feed_config, 256));

        Ok(Self {
            config,
            store,
            engine,
            event_bus,
            broadcaster,
            feed,
        })
    }

    /// The in-memory store (account seeding, tests).
    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }

    /// The event bus.
    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    /// The trigger engine.
    pub fn engine(&self) -> Arc<TriggerEngine> {
        self.engine.clone()
    }

    /// Start every component and return the bound addresses.
    ///
    /// Does not block; [`Daemon::run`] layers signal handling on top.
    pub async fn start(&self) -> DaemonResult<DaemonHandles> {
        // 1. Broadcaster
        let (broadcast_addr, _) = self.broadcaster.clone().start().await?;

        // 2. API server
        let api_addr = self.start_api_server().await?;
        info!(%api_addr, %broadcast_addr, "Gateway and broadcaster started");

        // 3. Bridge feed observations onto the event bus
        let mut observations = self.feed.subscribe();
        let bus = self.event_bus.clone();
        tokio::spawn(async move {
            loop {
                match observations.recv().await {
                    Ok(observation) => {
                        bus.send(DaemonEvent::PriceUpdate(observation));
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Observation bridge lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Observation bridge stopped");
        });

        // 4. Feed driver
        self.feed.clone().start();

        // 5. Evaluation loop
        let engine = self.engine.clone();
        let store = self.store.clone();
        let mut events = self.event_bus.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Some(Ok(DaemonEvent::PriceUpdate(observation))) => {
                        // The reference price is recorded before the pass so
                        // both execution paths resolve the same price
                        store.record_mark_price(observation.price);
                        let executed = engine.evaluate(&observation).await;
                        if !executed.is_empty() {
                            info!(
                                count = executed.len(),
                                price = %observation.price,
                                "Evaluation pass executed orders"
                            );
                        }
                    }
                    Some(Ok(DaemonEvent::Executed(event))) => {
                        debug!(order_id = event.order_id, "Execution event observed");
                    }
                    Some(Ok(DaemonEvent::OrderCreated(order))) => {
                        debug!(order_id = order.id, "Order created");
                    }
                    Some(Ok(DaemonEvent::Shutdown)) => break,
                    Some(Err(lag_msg)) => {
                        warn!(%lag_msg, "Evaluation loop lagged");
                    }
                    None => break,
                }
            }
            debug!("Evaluation loop stopped");
        });

        Ok(DaemonHandles {
            api_addr,
            broadcast_addr,
        })
    }

    /// Run the daemon until shutdown is requested (SIGINT).
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting tripwire daemon"
        );

        self.start().await?;

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| DaemonError::Config(format!("Failed to listen for shutdown: {}", e)))?;
        info!("Received shutdown signal");

        self.shutdown().await;
        Ok(())
    }

    /// Graceful shutdown: stop the feed and the broadcaster.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown");
        self.feed.shutdown();
        self.broadcaster.shutdown();
        self.event_bus.send(DaemonEvent::Shutdown);
        info!(orders = self.store.order_count(), "Shutdown complete");
    }

    /// Start the API server.
    async fn start_api_server(&self) -> DaemonResult<SocketAddr> {
        let state = Arc::new(ApiState {
            orders: self.store.clone(),
            positions: self.store.clone(),
            engine: self.engine.clone(),
            event_bus: self.event_bus.clone(),
        });

        let router = create_router(state);
        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DaemonError::Config(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| DaemonError::Config(format!("Failed to get local address: {}", e)))?;

        // Spawn the server task
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "API server error");
            }
        });

        Ok(local_addr)
    }
}

// =============================================================================
// Tests
// =============================================================================
