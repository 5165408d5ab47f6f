//! Configuration loading and types

pub mod loader;
pub mod types;

pub use loader::{from_lookup, load_config, load_from_env};
pub use types::{AppConfig, AppSettings, BackpackConfig, GridConfig, TelegramConfig};
