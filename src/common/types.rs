//! Domain types shared by the exchange client and the grid engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side as the exchange names it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// The side that mirrors a fill on this side
    pub fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Bid => write!(f, "Bid"),
            Side::Ask => write!(f, "Ask"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Bid" => Ok(Side::Bid),
            "Ask" => Ok(Side::Ask),
            other => Err(format!("unknown side {}", other)),
        }
    }
}

/// One price point of the ladder; `index` is also the client order id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLevel {
    pub index: u32,
    pub price: Decimal,
}

/// Order type accepted by `orderExecute`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
}

/// Time in force accepted by `orderExecute`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    #[serde(rename = "GTC")]
    Gtc,
}

/// Order as reported by the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub client_id: Option<u32>,
    #[serde(default)]
    pub symbol: String,
    pub side: Side,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub executed_quantity: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Limit order submission
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub client_id: u32,
    pub symbol: String,
    pub side: Side,
    /// Price already rendered at the market's decimal precision
    pub price: String,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    /// Good-till-cancelled limit order
    pub fn limit(client_id: u32, symbol: &str, side: Side, price: String, quantity: Decimal) -> Self {
        Self {
            client_id,
            symbol: symbol.to_string(),
            side,
            price,
            quantity,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
        }
    }
}

/// Balance snapshot for a single asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub available: Decimal,
    #[serde(default)]
    pub locked: Decimal,
    #[serde(default)]
    pub staked: Decimal,
}

/// 24h ticker for a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub symbol: String,
    pub last_price: Decimal,
    #[serde(default)]
    pub high: Option<Decimal>,
    #[serde(default)]
    pub low: Option<Decimal>,
    #[serde(default)]
    pub volume: Option<Decimal>,
}

/// Websocket connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}
