//! Quote source port and feed errors

use async_trait::async_trait;
use thiserror::Error;
use tripwire_domain::Price;

/// Errors that can occur while producing one tick.
///
/// A tick-level error never terminates a feed; the driver logs it,
/// skips the tick, and keeps the cadence.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// HTTP request failed
    #[error("Quote request failed: {0}")]
    RequestFailed(String),

    /// Upstream answered but the price was absent or not positive
    #[error("Price data not available: {0}")]
    MissingPrice(String),

    /// Failed to parse the upstream response
    #[error("Failed to parse quote response: {0}")]
    ParseError(String),

    /// The tick exceeded its timeout
    #[error("Quote request timed out")]
    Timeout,
}

/// A producer of the current price for one tracked instrument.
///
/// Implementations must be cheap to call once per tick and must not
/// block beyond ordinary request latency; the driver enforces the
/// per-tick timeout around this call.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch the latest price.
    async fn latest_price(&self) -> Result<Price, FeedError>;
}
