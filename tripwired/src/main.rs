//! Tripwire Daemon
//!
//! Conditional-order trigger engine with a price feed, an HTTP gateway,
//! and a WebSocket notification stream.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration
//! cargo run -p tripwired
//!
//! # Start with custom environment
//! TRIPWIRE_ENV=production TRIPWIRE_API_PORT=3001 cargo run -p tripwired
//! ```
//!
//! # Environment Variables
//!
//! - `TRIPWIRE_ENV`: Environment (test, development, production)
//! - `TRIPWIRE_API_HOST`: API host (default: 0.0.0.0)
//! - `TRIPWIRE_API_PORT`: API port (default: 3000)
//! - `TRIPWIRE_BROADCAST_HOST`: Broadcaster host (default: 0.0.0.0)
//! - `TRIPWIRE_BROADCAST_PORT`: Broadcaster port (default: 8383)
//! - `TRIPWIRE_SYMBOL`: Tracked instrument (default: BTCUSDT)
//! - `TRIPWIRE_QUOTE_URL`: Quote endpoint base URL
//! - `TRIPWIRE_POLL_INTERVAL_MS`: Feed tick interval (default: 1000)
//! - `TRIPWIRE_TICK_TIMEOUT_MS`: Per-tick fetch budget (default: 800)

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tripwired::{Config, Daemon};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("tripwired=info".parse()?))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        broadcast_port = config.broadcast.port,
        "Tripwire Daemon"
    );

    // Create and run daemon
    let daemon = Daemon::new(config)?;
    daemon.run().await?;

    Ok(())
}
