//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use domain::{Money, PricingPolicy};
use outbox::DispatcherConfig;
use resilience::BreakerOptions;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` / `PORT`: bind address (default: `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset means the in-memory store
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `USERS_SERVICE_URL`, `PRODUCTS_SERVICE_URL`: remote validators
/// - `BREAKER_TIMEOUT_MS` (`15000`, `0` disables), `BREAKER_ERROR_THRESHOLD_PERCENTAGE` (`50`),
///   `BREAKER_RESET_TIMEOUT_MS` (`10000`)
/// - `OUTBOX_INTERVAL_MS` (`5000`), `OUTBOX_BATCH_SIZE` (`10`)
/// - `ORDER_TAX_RATE_BPS` (`0`), `ORDER_SHIPPING_CENTS` (`0`),
///   `ORDER_FREE_SHIPPING_THRESHOLD_CENTS` (unset)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub users_service_url: String,
    pub products_service_url: String,
    pub breaker_timeout_ms: u64,
    pub breaker_error_threshold_percentage: u8,
    pub breaker_reset_timeout_ms: u64,
    pub outbox_interval_ms: u64,
    pub outbox_batch_size: usize,
    pub tax_rate_bps: u32,
    pub shipping_cents: i64,
    pub free_shipping_threshold_cents: Option<i64>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = Parsed(&lookup);

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parsed.get("PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parsed
                .get("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            users_service_url: lookup("USERS_SERVICE_URL").unwrap_or(defaults.users_service_url),
            products_service_url: lookup("PRODUCTS_SERVICE_URL")
                .unwrap_or(defaults.products_service_url),
            breaker_timeout_ms: parsed
                .get("BREAKER_TIMEOUT_MS")
                .unwrap_or(defaults.breaker_timeout_ms),
            breaker_error_threshold_percentage: parsed
                .get("BREAKER_ERROR_THRESHOLD_PERCENTAGE")
                .unwrap_or(defaults.breaker_error_threshold_percentage),
            breaker_reset_timeout_ms: parsed
                .get("BREAKER_RESET_TIMEOUT_MS")
                .unwrap_or(defaults.breaker_reset_timeout_ms),
            outbox_interval_ms: parsed
                .get("OUTBOX_INTERVAL_MS")
                .unwrap_or(defaults.outbox_interval_ms),
            outbox_batch_size: parsed
                .get("OUTBOX_BATCH_SIZE")
                .unwrap_or(defaults.outbox_batch_size),
            tax_rate_bps: parsed
                .get("ORDER_TAX_RATE_BPS")
                .unwrap_or(defaults.tax_rate_bps),
            shipping_cents: parsed
                .get("ORDER_SHIPPING_CENTS")
                .unwrap_or(defaults.shipping_cents),
            free_shipping_threshold_cents: parsed.get("ORDER_FREE_SHIPPING_THRESHOLD_CENTS"),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Options shared by every breaker.
    pub fn breaker_options(&self) -> BreakerOptions {
        let timeout = match self.breaker_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        BreakerOptions::default()
            .with_timeout(timeout)
            .with_error_threshold_percentage(self.breaker_error_threshold_percentage)
            .with_reset_timeout(Duration::from_millis(self.breaker_reset_timeout_ms))
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig::default()
            .with_interval(Duration::from_millis(self.outbox_interval_ms.max(1)))
            .with_batch_size(self.outbox_batch_size.max(1))
    }

    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy {
            tax_rate_bps: self.tax_rate_bps,
            flat_shipping: Money::from_cents(self.shipping_cents),
            free_shipping_threshold: self.free_shipping_threshold_cents.map(Money::from_cents),
        }
    }
}

/// Typed lookups over a string source.
struct Parsed<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Parsed<'_, F> {
    fn get<T: FromStr>(&self, key: &str) -> Option<T> {
        (self.0)(key).and_then(|value| value.trim().parse().ok())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 5,
            users_service_url: "http://localhost:3001".to_string(),
            products_service_url: "http://localhost:3002".to_string(),
            breaker_timeout_ms: 15_000,
            breaker_error_threshold_percentage: 50,
            breaker_reset_timeout_ms: 10_000,
            outbox_interval_ms: 5_000,
            outbox_batch_size: 10,
            tax_rate_bps: 0,
            shipping_cents: 0,
            free_shipping_threshold_cents: None,
        }
    }
}
