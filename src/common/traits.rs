//! Trait seams between the grid engine and its collaborators

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

use super::errors::Result;
use super::types::{Balance, Order, OrderRequest};

/// Exchange operations the grid engine depends on
///
/// Implemented by the Backpack REST client; tests substitute an
/// in-memory exchange.
#[async_trait]
pub trait GridExchange: Send + Sync {
    /// Last traded price of the market
    async fn last_price(&self, symbol: &str) -> Result<Decimal>;

    /// Fresh balance snapshot keyed by asset symbol
    async fn balances(&self) -> Result<HashMap<String, Balance>>;

    /// Cancel every resting order on the market
    async fn cancel_all_orders(&self, symbol: &str) -> Result<()>;

    /// Look up a live order by client id; `None` when no such order exists
    async fn query_order(&self, symbol: &str, client_id: u32) -> Result<Option<Order>>;

    /// All open orders on the market
    async fn open_orders(&self, symbol: &str) -> Result<Vec<Order>>;

    /// Submit a new order
    async fn execute_order(&self, request: &OrderRequest) -> Result<()>;
}

/// Markup applied to an outbound notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Plain,
    Html,
    MarkdownV2,
}

/// Outbound chat notifications
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str, format: MessageFormat) -> Result<()>;
}
