//! Message types for the Backpack websocket API

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::common::types::Side;

/// Private stream carrying order lifecycle events
pub const ORDER_UPDATE_STREAM: &str = "account.orderUpdate";

/// Order update event type acted upon by the engine
pub const ORDER_FILL: &str = "orderFill";

// ============================================================================
// Outbound frames
// ============================================================================

/// Authenticated subscription request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeFrame {
    pub method: String,
    pub params: Vec<String>,
    /// `[api_key, signature, timestamp, window]`
    pub signature: (String, String, i64, u64),
}

impl SubscribeFrame {
    pub fn new(streams: Vec<String>, api_key: &str, signature: String, timestamp: i64, window_ms: u64) -> Self {
        Self {
            method: "SUBSCRIBE".to_string(),
            params: streams,
            signature: (api_key.to_string(), signature, timestamp, window_ms),
        }
    }
}

// ============================================================================
// Inbound frames
// ============================================================================

/// Envelope of every stream message
#[derive(Debug, Clone, Deserialize)]
pub struct StreamFrame {
    #[serde(default)]
    pub stream: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// Payload of an `account.orderUpdate` message
///
/// Everything except the event type is optional and read leniently: a
/// field of an unexpected shape becomes `None` instead of rejecting the
/// whole event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderUpdateEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E", default, deserialize_with = "lenient")]
    pub event_time: Option<i64>,
    #[serde(rename = "s", default, deserialize_with = "lenient")]
    pub symbol: Option<String>,
    /// Client id; the exchange sends it as a string or a number
    #[serde(rename = "c", default, deserialize_with = "lenient")]
    pub client_id: Option<i64>,
    #[serde(rename = "S", default, deserialize_with = "lenient")]
    pub side: Option<Side>,
    #[serde(rename = "p", default, deserialize_with = "lenient")]
    pub price: Option<Decimal>,
    #[serde(rename = "q", default, deserialize_with = "lenient")]
    pub quantity: Option<Decimal>,
    /// Quantity filled by this event
    #[serde(rename = "l", default, deserialize_with = "lenient")]
    pub fill_quantity: Option<Decimal>,
    #[serde(rename = "i", default, deserialize_with = "lenient")]
    pub order_id: Option<String>,
    #[serde(rename = "X", default, deserialize_with = "lenient")]
    pub status: Option<String>,
}

impl OrderUpdateEvent {
    pub fn is_fill(&self) -> bool {
        self.event_type == ORDER_FILL
    }
}

/// Parse a string or a number through `FromStr`; anything else is `None`
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(Value::Number(n)) => n.to_string().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_subscribe_frame_shape() {
        let frame = SubscribeFrame::new(
            vec![ORDER_UPDATE_STREAM.to_string()],
            "api-key",
            "c2ln".to_string(),
            1_700_000_000_000,
            5000,
        );
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({
                "method": "SUBSCRIBE",
                "params": ["account.orderUpdate"],
                "signature": ["api-key", "c2ln", 1_700_000_000_000i64, 5000]
            })
        );
    }

    #[test]
    fn test_parse_order_fill() {
        let json = r#"{
            "e": "orderFill",
            "E": 1694687692980000,
            "s": "SOL_USDC",
            "c": "1",
            "S": "Bid",
            "o": "LIMIT",
            "p": "110.00",
            "q": "0.5",
            "l": "0.5",
            "i": "1111343026172067",
            "X": "Filled"
        }"#;
        let event: OrderUpdateEvent = serde_json::from_str(json).unwrap();
        assert!(event.is_fill());
        assert_eq!(event.client_id, Some(1));
        assert_eq!(event.side, Some(Side::Bid));
        assert_eq!(event.price, Some(dec!(110.00)));
        assert_eq!(event.symbol.as_deref(), Some("SOL_USDC"));
    }

    #[test]
    fn test_client_id_variants() {
        let numeric: OrderUpdateEvent = serde_json::from_value(json!({"e": "orderFill", "c": 7})).unwrap();
        assert_eq!(numeric.client_id, Some(7));

        let missing: OrderUpdateEvent = serde_json::from_value(json!({"e": "orderAccepted"})).unwrap();
        assert_eq!(missing.client_id, None);
        assert!(!missing.is_fill());

        let garbage: OrderUpdateEvent = serde_json::from_value(json!({"e": "orderFill", "c": "abc"})).unwrap();
        assert_eq!(garbage.client_id, None);
    }

    #[test]
    fn test_fill_survives_unexpected_field_shapes() {
        let event: OrderUpdateEvent = serde_json::from_value(json!({
            "e": "orderFill",
            "s": "SOL_USDC",
            "c": 1,
            "S": "Bid",
            "i": 1111343026172067u64,
            "p": 110.5,
            "q": null,
            "l": {"unexpected": true},
            "X": ["Filled"]
        }))
        .unwrap();
        assert!(event.is_fill());
        assert_eq!(event.client_id, Some(1));
        assert_eq!(event.side, Some(Side::Bid));
        assert_eq!(event.order_id.as_deref(), Some("1111343026172067"));
        assert_eq!(event.price, Some(dec!(110.5)));
        assert_eq!(event.quantity, None);
        assert_eq!(event.fill_quantity, None);
        assert_eq!(event.status, None);

        let bad_side: OrderUpdateEvent =
            serde_json::from_value(json!({"e": "orderFill", "c": "2", "S": "Sideways"})).unwrap();
        assert_eq!(bad_side.side, None);
    }

    #[test]
    fn test_stream_frame() {
        let frame: StreamFrame =
            serde_json::from_str(r#"{"stream":"account.orderUpdate","data":{"e":"orderFill"}}"#).unwrap();
        assert_eq!(frame.stream.as_deref(), Some(ORDER_UPDATE_STREAM));
        assert_eq!(frame.data["e"], "orderFill");
    }
}
