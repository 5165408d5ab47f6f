//! Backpack Grid Library
//!
//! A grid trading bot for the Backpack exchange: a signed REST client,
//! a self-healing private websocket feed, and a fill-driven grid engine.

pub mod backpack;
pub mod common;
pub mod config;
pub mod grid;
pub mod notify;

// Re-export commonly used types
pub use backpack::client::BackpackClient;
pub use backpack::rest::BackpackRestClient;
pub use backpack::websocket::BackpackFeed;
pub use common::errors::{ClientError, Result};
pub use common::traits::{GridExchange, MessageFormat, Notifier};
pub use common::types::{Balance, ConnectionState, GridLevel, Order, OrderRequest, Side, Ticker};
pub use config::types::AppConfig;
pub use grid::{EngineSettings, FillOutcome, GridEngine, StatusReporter};
pub use notify::TelegramNotifier;
