//! Tripwire Daemon Library
//!
//! Runtime orchestrator for the conditional-order trigger engine.
//!
//! # Architecture
//!
//! ```text
//! HTTP Gateway ──► Trigger Engine ──► Order Store (conditional transition)
//!                        ▲                  │
//!                   Event Bus ◄─────────────┘ (execution events)
//!                        ▲         │
//!                   Price Feed     └──► Broadcaster ──► WebSocket observers
//! ```
//!
//! # Components
//!
//! - **Daemon**: Main runtime orchestrator
//! - **Trigger Engine**: Evaluation passes and on-demand execution
//! - **Event Bus**: Internal communication (observations, executions)
//! - **Broadcaster**: Best-effort WebSocket fan-out of executions
//! - **API**: HTTP endpoints for order management
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use tripwired::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new(config).expect("Failed to build daemon");
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod broadcaster;
pub mod config;
pub mod daemon;
pub mod error;
pub mod event_bus;
pub mod trigger;

// Re-exports for convenience
pub use broadcaster::{Broadcaster, Notification};
pub use config::{ApiConfig, BroadcastConfig, Config, Environment, FeedSettings};
pub use daemon::{Daemon, DaemonHandles};
pub use error::{DaemonError, DaemonResult};
pub use event_bus::{DaemonEvent, EventBus, EventReceiver};
pub use trigger::{ExecutionOutcome, TriggerEngine};
