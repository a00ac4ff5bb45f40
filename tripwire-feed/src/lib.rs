//! Tripwire Price Feeds
//!
//! A feed is a lazy, infinite, time-spaced sequence of price observations
//! for one instrument. The [`PriceFeed`] driver owns the cadence and the
//! per-tick timeout; a [`QuoteSource`] supplies each price. Two sources
//! ship here: a Binance REST poller and a deterministic scripted source
//! for reproducible tests.

#![warn(clippy::all)]

pub mod binance;
pub mod feed;
pub mod quote;
pub mod simulated;

pub use binance::BinanceQuoteSource;
pub use feed::{FeedConfig, PriceFeed};
pub use quote::{FeedError, QuoteSource};
pub use simulated::SimulatedQuoteSource;
