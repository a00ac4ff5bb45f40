//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{DaemonError, DaemonResult};
use std::env;
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Notification broadcaster configuration
    pub broadcast: BroadcastConfig,

    /// Price feed configuration
    pub feed: FeedSettings,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Notification broadcaster configuration.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Price feed configuration.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Instrument to track (e.g., "BTCUSDT")
    pub symbol: String,
    /// Quote endpoint base URL
    pub quote_url: String,
    /// Fixed tick interval
    pub poll_interval: Duration,
    /// Per-tick fetch budget
    pub tick_timeout: Duration,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (simulated feed)
    Test,
    /// Development environment (simulated feed)
    Development,
    /// Production environment (live quote source)
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let api = ApiConfig {
            host: env::var("TRIPWIRE_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::load_port_env("TRIPWIRE_API_PORT", 3000)?,
        };
        let broadcast = BroadcastConfig {
            host: env::var("TRIPWIRE_BROADCAST_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::load_port_env("TRIPWIRE_BROADCAST_PORT", 8383)?,
        };
        let feed = FeedSettings {
            symbol: env::var("TRIPWIRE_SYMBOL").unwrap_or_else(|_| "BTCUSDT".to_string()),
            quote_url: env::var("TRIPWIRE_QUOTE_URL")
                .unwrap_or_else(|_| "https://api.binance.com".to_string()),
            poll_interval: Duration::from_millis(Self::load_ms_env(
                "TRIPWIRE_POLL_INTERVAL_MS",
                1000,
            )?),
            tick_timeout: Duration::from_millis(Self::load_ms_env(
                "TRIPWIRE_TICK_TIMEOUT_MS",
                800,
            )?),
        };

        Ok(Self {
            api,
            broadcast,
            feed,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            broadcast: BroadcastConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            feed: FeedSettings {
                symbol: "BTCUSDT".to_string(),
                quote_url: "https://api.binance.com".to_string(),
                poll_interval: Duration::from_millis(20),
                tick_timeout: Duration::from_millis(50),
            },
            environment: Environment::Test,
        }
    }

    fn load_environment() -> DaemonResult<Environment> {
        let env_str = env::var("TRIPWIRE_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid TRIPWIRE_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_port_env(key: &str, default: u16) -> DaemonResult<u16> {
        match env::var(key) {
            Ok(val) => val
                .parse::<u16>()
                .map_err(|_| DaemonError::Config(format!("Invalid {}: {}", key, val))),
            Err(_) => Ok(default),
        }
    }

    fn load_ms_env(key: &str, default: u64) -> DaemonResult<u64> {
        match env::var(key) {
            Ok(val) => val
                .parse::<u64>()
                .map_err(|_| DaemonError::Config(format!("Invalid {}: {}", key, val))),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            broadcast: BroadcastConfig {
                host: "0.0.0.0".to_string(),
                port: 8383,
            },
            feed: FeedSettings {
                symbol: "BTCUSDT".to_string(),
                quote_url: "https://api.binance.com".to_string(),
                poll_interval: Duration::from_millis(1000),
                tick_timeout: Duration::from_millis(800),
            },
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.port, 3000);
        assert_eq!(config.broadcast.port, 8383);
        assert_eq!(config.feed.symbol, "BTCUSDT");
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert_eq!(config.api.port, 0);
        assert_eq!(config.broadcast.port, 0);
        assert_eq!(config.environment, Environment::Test);
    }

    #[test]
    fn test_feed_defaults() {
        let config = Config::default();

        assert_eq!(config.feed.poll_interval, Duration::from_millis(1000));
        assert_eq!(config.feed.tick_timeout, Duration::from_millis(800));
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Test.to_string(), "test");
        assert_eq!(Environment::Development.to_string(), "development");
        assert_eq!(Environment::Production.to_string(), "production");
    }
}
