//! Deterministic quote source for tests and development
//!
//! Replays a scripted price sequence in order; once the script is
//! exhausted the last price repeats forever, so the feed stays infinite.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use tripwire_domain::{DomainError, Price};

use crate::quote::{FeedError, QuoteSource};

/// Scripted quote source; no network, fully reproducible.
pub struct SimulatedQuoteSource {
    prices: Vec<Price>,
    cursor: AtomicUsize,
}

impl SimulatedQuoteSource {
    /// Create a source that replays `prices` in order.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPrice` if the script is empty or any
    /// value is not positive.
    pub fn scripted(prices: Vec<Decimal>) -> Result<Self, DomainError> {
        if prices.is_empty() {
            return Err(DomainError::InvalidPrice("Price script must be non-empty".to_string()));
        }
        let prices = prices.into_iter().map(Price::new).collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            prices,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Create a source that always returns the same price.
    pub fn constant(price: Decimal) -> Result<Self, DomainError> {
        Self::scripted(vec![price])
    }

    /// How many ticks have been served so far.
    pub fn ticks_served(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for SimulatedQuoteSource {
    async fn latest_price(&self) -> Result<Price, FeedError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let clamped = index.min(self.prices.len() - 1);
        Ok(self.prices[clamped])
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_scripted_replays_in_order_then_repeats() {
        let source = SimulatedQuoteSource::scripted(vec![dec!(100), dec!(90)]).unwrap();

        assert_eq!(source.latest_price().await.unwrap().as_decimal(), dec!(100));
        assert_eq!(source.latest_price().await.unwrap().as_decimal(), dec!(90));
        assert_eq!(source.latest_price().await.unwrap().as_decimal(), dec!(90));
        assert_eq!(source.ticks_served(), 3);
    }

    #[tokio::test]
    async fn test_constant() {
        let source = SimulatedQuoteSource::constant(dec!(5000)).unwrap();

        for _ in 0..3 {
            assert_eq!(source.latest_price().await.unwrap().as_decimal(), dec!(5000));
        }
    }

    #[test]
    fn test_rejects_empty_and_non_positive_scripts() {
        assert!(SimulatedQuoteSource::scripted(vec![]).is_err());
        assert!(SimulatedQuoteSource::scripted(vec![dec!(100), dec!(0)]).is_err());
    }
}
