//! Configuration types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::common::errors::{ClientError, Result};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backpack exchange credentials and endpoints
    pub backpack: BackpackConfig,
    /// Grid definition
    pub grid: GridConfig,
    /// Telegram notifications (optional)
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

impl AppConfig {
    /// Reject grids that cannot be traded
    pub fn validate(&self) -> Result<()> {
        if self.backpack.api_key.is_empty() || self.backpack.api_secret.is_empty() {
            return Err(ClientError::Configuration(
                "Backpack API key and secret are required".into(),
            ));
        }
        let grid = &self.grid;
        if grid.lower_price >= grid.upper_price {
            return Err(ClientError::Configuration(format!(
                "lower_price {} must be below upper_price {}",
                grid.lower_price, grid.upper_price
            )));
        }
        if grid.number_of_grids == 0 {
            return Err(ClientError::Configuration(
                "number_of_grids must be at least 1".into(),
            ));
        }
        if grid.quantity_per_grid <= Decimal::ZERO {
            return Err(ClientError::Configuration(format!(
                "quantity_per_grid must be positive, got {}",
                grid.quantity_per_grid
            )));
        }
        if self.settings.notify_interval_seconds == 0 {
            return Err(ClientError::Configuration(
                "notify_interval_seconds must be positive".into(),
            ));
        }
        grid.assets()?;
        check_url(&self.backpack.rest_url, &["http", "https"])?;
        check_url(&self.backpack.websocket_url, &["ws", "wss"])?;
        Ok(())
    }

    /// Telegram settings when notifications are enabled
    pub fn notifications(&self) -> Option<&TelegramConfig> {
        self.telegram
            .as_ref()
            .filter(|t| !t.bot_token.is_empty() && !t.chat_id.is_empty())
    }
}

fn check_url(raw: &str, schemes: &[&str]) -> Result<()> {
    let parsed = Url::parse(raw)
        .map_err(|e| ClientError::Configuration(format!("invalid URL '{}': {}", raw, e)))?;
    if !schemes.contains(&parsed.scheme()) {
        return Err(ClientError::Configuration(format!(
            "URL '{}' must use one of {:?}",
            raw, schemes
        )));
    }
    Ok(())
}

/// Backpack exchange configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackpackConfig {
    /// API key sent in `X-API-Key`
    pub api_key: String,
    /// Base64 Ed25519 seed
    pub api_secret: String,
    /// Base URL for the REST API
    #[serde(default = "default_backpack_rest_url")]
    pub rest_url: String,
    /// WebSocket URL for the realtime feed
    #[serde(default = "default_backpack_ws_url")]
    pub websocket_url: String,
    /// Signature validity window in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

fn default_backpack_rest_url() -> String {
    "https://api.backpack.exchange".to_string()
}

fn default_backpack_ws_url() -> String {
    "wss://ws.backpack.exchange".to_string()
}

fn default_window_ms() -> u64 {
    5000
}

/// Grid definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Market symbol, e.g. `SOL_USDC`
    pub symbol: String,
    pub lower_price: Decimal,
    pub upper_price: Decimal,
    /// Decimal places used when rendering order prices
    pub price_decimal: u32,
    pub number_of_grids: u32,
    pub quantity_per_grid: Decimal,
    /// Base asset override; derived from the symbol when absent
    #[serde(default)]
    pub base_asset: Option<String>,
    /// Quote asset override; derived from the symbol when absent
    #[serde(default)]
    pub quote_asset: Option<String>,
}

impl GridConfig {
    /// Resolve `(base, quote)` asset symbols
    pub fn assets(&self) -> Result<(String, String)> {
        let mut parts = self.symbol.splitn(2, '_');
        let derived_base = parts.next().filter(|s| !s.is_empty());
        let derived_quote = parts.next().filter(|s| !s.is_empty());

        let base = self
            .base_asset
            .clone()
            .or_else(|| derived_base.map(str::to_string));
        let quote = self
            .quote_asset
            .clone()
            .or_else(|| derived_quote.map(str::to_string));

        match (base, quote) {
            (Some(base), Some(quote)) => Ok((base, quote)),
            _ => Err(ClientError::Configuration(format!(
                "cannot derive base/quote assets from symbol '{}'",
                self.symbol
            ))),
        }
    }
}

/// Telegram bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

impl TelegramConfig {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            api_url: default_telegram_api_url(),
        }
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Delay between reconnection attempts in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Base delay for jittered REST retries in milliseconds
    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,
    /// Retries after the first failed REST attempt
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Balance polling interval while waiting for funds
    #[serde(default = "default_balance_poll")]
    pub balance_poll_interval_ms: u64,
    /// Pause after cancelling all orders at startup
    #[serde(default = "default_cancel_settle")]
    pub cancel_settle_delay_ms: u64,
    /// Delay between placement attempts
    #[serde(default = "default_placement_retry")]
    pub placement_retry_delay_ms: u64,
    /// Placement attempts for a mirrored order after a fill
    #[serde(default = "default_fill_attempts")]
    pub fill_max_attempts: u32,
    /// Interval between status reports in seconds
    #[serde(default = "default_notify_interval")]
    pub notify_interval_seconds: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            reconnect_delay_ms: default_reconnect_delay(),
            backoff_ms: default_backoff(),
            retries: default_retries(),
            request_timeout_seconds: default_request_timeout(),
            balance_poll_interval_ms: default_balance_poll(),
            cancel_settle_delay_ms: default_cancel_settle(),
            placement_retry_delay_ms: default_placement_retry(),
            fill_max_attempts: default_fill_attempts(),
            notify_interval_seconds: default_notify_interval(),
        }
    }
}

impl AppSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn notify_interval(&self) -> Duration {
        Duration::from_secs(self.notify_interval_seconds)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_reconnect_delay() -> u64 {
    10_000
}

fn default_backoff() -> u64 {
    5000
}

fn default_retries() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    30
}

fn default_balance_poll() -> u64 {
    5000
}

fn default_cancel_settle() -> u64 {
    3000
}

fn default_placement_retry() -> u64 {
    5000
}

fn default_fill_attempts() -> u32 {
    10
}

fn default_notify_interval() -> u64 {
    3600
}
