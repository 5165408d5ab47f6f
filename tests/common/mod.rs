//! Common test utilities and fixtures

#![allow(dead_code)]

use backpack_grid::backpack::auth::Signer;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::Arc;

pub const API_KEY: &str = "test-api-key";
pub const WINDOW_MS: u64 = 5000;

/// Base64 secret holding a fixed Ed25519 seed
pub fn secret() -> String {
    BASE64.encode([7u8; 32])
}

pub fn signer() -> Arc<Signer> {
    Arc::new(Signer::from_base64_seed(&secret(), WINDOW_MS).expect("valid seed"))
}

/// Sample stream frames as pushed by the exchange
pub mod ws_messages {
    pub fn order_fill(client_id: u32, side: &str, price: &str) -> String {
        serde_json::json!({
            "stream": "account.orderUpdate",
            "data": {
                "e": "orderFill",
                "E": 1694687692980000u64,
                "s": "SOL_USDC",
                "c": client_id.to_string(),
                "S": side,
                "p": price,
                "q": "0.5",
                "l": "0.5",
                "X": "Filled"
            }
        })
        .to_string()
    }

    pub const ORDER_ACCEPTED: &str = r#"{
        "stream": "account.orderUpdate",
        "data": {"e": "orderAccepted", "s": "SOL_USDC", "c": "2", "S": "Ask", "p": "120.00"}
    }"#;
}

/// Sample API responses for testing
pub mod api_responses {
    pub const TICKER: &str = r#"{
        "symbol": "SOL_USDC",
        "firstPrice": "110.10",
        "lastPrice": "115.00",
        "high": "121.00",
        "low": "108.50",
        "volume": "10234.5"
    }"#;

    pub const BALANCES: &str = r#"{
        "SOL": {"available": "12.5", "locked": "1.5", "staked": "0"},
        "USDC": {"available": "2500.00", "locked": "210.00", "staked": "0"}
    }"#;

    pub const ORDER: &str = r#"{
        "id": "1111343026172067",
        "clientId": 2,
        "symbol": "SOL_USDC",
        "side": "Ask",
        "orderType": "Limit",
        "price": "120.00",
        "quantity": "0.5",
        "executedQuantity": "0",
        "status": "New",
        "timeInForce": "GTC"
    }"#;

    pub const OPEN_ORDERS: &str = r#"[
        {"id": "1", "clientId": 0, "symbol": "SOL_USDC", "side": "Bid", "price": "100.00", "quantity": "0.5", "status": "New"},
        {"id": "2", "clientId": 3, "symbol": "SOL_USDC", "side": "Ask", "price": "130.00", "quantity": "0.5", "status": "New"}
    ]"#;

    pub const INSUFFICIENT_FUNDS: &str = r#"{"error": ["EINSUFFICIENT_FUNDS"]}"#;
}
