//! Configuration loader

use config::{Config, Environment, File};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

use super::types::{AppConfig, AppSettings, BackpackConfig, GridConfig, TelegramConfig};
use crate::common::errors::{ClientError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP_, sections split by `__`)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| ClientError::Configuration(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ClientError::Configuration(e.to_string()))
}

/// Load configuration from the bot's environment variables
pub fn load_from_env() -> Result<AppConfig> {
    // Try to load from .env file
    dotenvy::dotenv().ok();

    from_lookup(|key| std::env::var(key).ok())
}

/// Build the configuration from any variable lookup
///
/// Required variables fail fast; numeric values must parse.
pub fn from_lookup<F>(lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| -> Result<String> {
        lookup(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ClientError::Configuration(format!("missing environment variable {}", key)))
    };

    let backpack = BackpackConfig {
        api_key: required("BACKPACK_API_KEY")?,
        api_secret: required("BACKPACK_API_SECRET")?,
        rest_url: lookup("BACKPACK_REST_URL")
            .unwrap_or_else(|| "https://api.backpack.exchange".to_string()),
        websocket_url: lookup("BACKPACK_WS_URL")
            .unwrap_or_else(|| "wss://ws.backpack.exchange".to_string()),
        window_ms: match lookup("BACKPACK_WINDOW_MS") {
            Some(v) => parse_number("BACKPACK_WINDOW_MS", &v)?,
            None => 5000,
        },
    };

    let grid = GridConfig {
        symbol: required("SYMBOL")?,
        lower_price: parse_decimal("LOWER_PRICE", &required("LOWER_PRICE")?)?,
        upper_price: parse_decimal("UPPER_PRICE", &required("UPPER_PRICE")?)?,
        price_decimal: parse_number("PRICE_DECIMAL", &required("PRICE_DECIMAL")?)?,
        number_of_grids: parse_number("NUMBER_OF_GRIDS", &required("NUMBER_OF_GRIDS")?)?,
        quantity_per_grid: parse_decimal("QUANTITY_PER_GRID", &required("QUANTITY_PER_GRID")?)?,
        base_asset: lookup("BASE_ASSET").filter(|v| !v.is_empty()),
        quote_asset: lookup("QUOTE_ASSET").filter(|v| !v.is_empty()),
    };

    let telegram = match (lookup("TELEGRAM_BOT_API_TOKEN"), lookup("TELEGRAM_TARGET_CHAT_ID")) {
        (Some(token), Some(chat_id)) if !token.is_empty() => {
            Some(TelegramConfig::new(token, chat_id))
        }
        _ => None,
    };

    let mut settings = AppSettings::default();
    if let Some(level) = lookup("LOG_LEVEL") {
        settings.log_level = level;
    }

    Ok(AppConfig {
        backpack,
        grid,
        telegram,
        settings,
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|e| ClientError::Configuration(format!("{} is not a number ({}): {}", key, value, e)))
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ClientError::Configuration(format!("{} is not a number ({}): {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("BACKPACK_API_KEY", "api-key"),
            ("BACKPACK_API_SECRET", "c2VjcmV0"),
            ("SYMBOL", "SOL_USDC"),
            ("LOWER_PRICE", "100"),
            ("UPPER_PRICE", "140"),
            ("PRICE_DECIMAL", "2"),
            ("NUMBER_OF_GRIDS", "4"),
            ("QUANTITY_PER_GRID", "0.5"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<AppConfig> {
        from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_from_lookup() {
        let config = load(&env()).unwrap();
        assert_eq!(config.grid.symbol, "SOL_USDC");
        assert_eq!(config.grid.lower_price, dec!(100));
        assert_eq!(config.grid.number_of_grids, 4);
        assert_eq!(config.grid.quantity_per_grid, dec!(0.5));
        assert_eq!(config.backpack.rest_url, "https://api.backpack.exchange");
        assert!(config.telegram.is_none());
    }

    #[test]
    fn test_missing_required_variable() {
        let mut vars = env();
        vars.remove("SYMBOL");
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("SYMBOL"));
    }

    #[test]
    fn test_unparsable_number() {
        let mut vars = env();
        vars.insert("NUMBER_OF_GRIDS", "four");
        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
        assert!(err.to_string().contains("NUMBER_OF_GRIDS"));
    }

    #[test]
    fn test_telegram_enabled_with_token() {
        let mut vars = env();
        vars.insert("TELEGRAM_BOT_API_TOKEN", "123:abc");
        vars.insert("TELEGRAM_TARGET_CHAT_ID", "42");
        let config = load(&vars).unwrap();
        assert!(config.notifications().is_some());

        vars.insert("TELEGRAM_BOT_API_TOKEN", "");
        let config = load(&vars).unwrap();
        assert!(config.notifications().is_none());
    }
}
