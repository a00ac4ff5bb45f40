//! Binance REST quote source
//!
//! Polls the public ticker-price endpoint for one symbol and translates
//! the response into a domain price. No authentication is required for
//! this endpoint.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;
use tripwire_domain::{Price, Symbol};

use crate::quote::{FeedError, QuoteSource};

/// Binance REST API base URL (Spot)
const BINANCE_API_URL: &str = "https://api.binance.com";

/// Quote source backed by the Binance ticker-price endpoint.
pub struct BinanceQuoteSource {
    /// HTTP client
    client: Client,
    /// API base URL (overridable for tests and mirrors)
    base_url: String,
    /// Instrument to quote
    symbol: Symbol,
}

impl BinanceQuoteSource {
    /// Create a new quote source against the production endpoint.
    pub fn new(symbol: Symbol) -> Self {
        Self::with_base_url(symbol, BINANCE_API_URL.to_string())
    }

    /// Create a new quote source against a custom base URL.
    pub fn with_base_url(symbol: Symbol, base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            symbol,
        }
    }
}

#[async_trait]
impl QuoteSource for BinanceQuoteSource {
    async fn latest_price(&self) -> Result<Price, FeedError> {
        let url = format!(
            "{}/api/v3/ticker/price?symbol={}",
            self.base_url,
            self.symbol.as_str()
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FeedError::ParseError(e.to_string()))?;

        if !status.is_success() {
            return Err(FeedError::RequestFailed(format!("HTTP {}: {}", status, body)));
        }

        let ticker: TickerPrice =
            serde_json::from_str(&body).map_err(|e| FeedError::ParseError(e.to_string()))?;

        debug!(symbol = %self.symbol, price = %ticker.price, "Fetched quote");

        Price::new(ticker.price)
            .map_err(|_| FeedError::MissingPrice(format!("non-positive price: {}", ticker.price)))
    }
}

/// Ticker-price response (internal to this source).
#[derive(Debug, Deserialize)]
struct TickerPrice {
    #[allow(dead_code)]
    symbol: String,
    price: Decimal,
}

// =============================================================================
// Tests
// =============================================================================
