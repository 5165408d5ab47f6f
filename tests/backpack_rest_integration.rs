//! Integration tests for the Backpack REST client
//!
//! Every test runs against a local mock server, so no credentials or
//! network access are needed:
//! ```
//! cargo test --test backpack_rest_integration
//! ```

mod common;

use backpack_grid::backpack::auth::Params;
use backpack_grid::backpack::rest::{ApiResponse, BackpackRestClient};
use backpack_grid::common::types::{OrderRequest, Side};
use backpack_grid::{ClientError, GridExchange};
use common::api_responses;
use rust_decimal_macros::dec;
use serde_json::json;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn json_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "application/json")
}

async fn create_test_client(server: &MockServer) -> BackpackRestClient {
    BackpackRestClient::new(&server.uri(), common::API_KEY, common::signer())
        .expect("Failed to create REST client")
        .with_backoff(Duration::from_millis(1))
        .with_retries(3)
}

// ============================================================================
// Public endpoints
// ============================================================================

#[tokio::test]
async fn test_ticker_is_unsigned_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/ticker"))
        .and(query_param("symbol", "SOL_USDC"))
        .and(header("User-Agent", "Backpack Client"))
        .respond_with(json_response(api_responses::TICKER))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server).await;
    let ticker = client.ticker("SOL_USDC").await.unwrap();
    assert_eq!(ticker.last_price, dec!(115.00));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let signed = requests[0]
        .headers
        .iter()
        .any(|(name, _)| name.as_str().eq_ignore_ascii_case("x-signature"));
    assert!(!signed, "public calls must not be signed");
}

// ============================================================================
// Private endpoints
// ============================================================================

#[tokio::test]
async fn test_private_call_carries_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/capital"))
        .and(header("X-API-Key", common::API_KEY))
        .and(header("X-Window", "5000"))
        .and(header_exists("X-Timestamp"))
        .and(header_exists("X-Signature"))
        .respond_with(json_response(api_responses::BALANCES))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server).await;
    let balances = client.balances().await.unwrap();
    assert_eq!(balances["SOL"].available, dec!(12.5));
    assert_eq!(balances["USDC"].locked, dec!(210.00));
}

#[tokio::test]
async fn test_order_execute_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/order"))
        .and(header_exists("X-Signature"))
        .and(body_json(json!({
            "clientId": 2,
            "orderType": "Limit",
            "price": "120.00",
            "quantity": "0.5",
            "side": "Ask",
            "symbol": "SOL_USDC",
            "timeInForce": "GTC"
        })))
        .respond_with(json_response(api_responses::ORDER))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server).await;
    let request = OrderRequest::limit(2, "SOL_USDC", Side::Ask, "120.00".to_string(), dec!(0.5));
    let order = client.order_execute(&request).await.unwrap().unwrap();
    assert_eq!(order.client_id, Some(2));
    assert_eq!(order.side, Side::Ask);
}

#[tokio::test]
async fn test_order_query_uses_query_string() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/order"))
        .and(query_param("clientId", "2"))
        .and(query_param("symbol", "SOL_USDC"))
        .respond_with(json_response(api_responses::ORDER))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server).await;
    let order = client.query_order("SOL_USDC", 2).await.unwrap();
    assert_eq!(order.map(|o| o.id), Some("1111343026172067".to_string()));
}

#[tokio::test]
async fn test_order_query_not_found_is_absent_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/order"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Order not found"))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server).await;
    let order = client.order_query("SOL_USDC", 3).await.unwrap();
    assert!(order.is_none());
}

#[tokio::test]
async fn test_open_orders() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/orders"))
        .and(query_param("symbol", "SOL_USDC"))
        .respond_with(json_response(api_responses::OPEN_ORDERS))
        .mount(&server)
        .await;

    let client = create_test_client(&server).await;
    let orders = client.open_orders("SOL_USDC").await.unwrap();
    let sides: Vec<Side> = orders.iter().map(|o| o.side).collect();
    assert_eq!(sides, vec![Side::Bid, Side::Ask]);
}

#[tokio::test]
async fn test_cancel_all_accepts_plain_text() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/orders"))
        .and(body_json(json!({"symbol": "SOL_USDC"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(2)
        .mount(&server)
        .await;

    let client = create_test_client(&server).await;
    assert_ok!(client.cancel_all_orders("SOL_USDC").await);

    let mut params = Params::new();
    params.insert("symbol".into(), json!("SOL_USDC"));
    let response = client.call("orderCancelAll", &params).await.unwrap();
    assert_eq!(response, ApiResponse::Text("ok".to_string()));
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_retries_exhausted_after_bounded_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/capital"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(4)
        .mount(&server)
        .await;

    let client = create_test_client(&server).await;
    let err = client.balances().await.unwrap_err();

    match &err {
        ClientError::RetriesExhausted { instruction, .. } => assert_eq!(instruction, "balanceQuery"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/ticker"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/ticker"))
        .respond_with(json_response(api_responses::TICKER))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server).await;
    assert_eq!(client.last_price("SOL_USDC").await.unwrap(), dec!(115.00));
}

#[tokio::test]
async fn test_application_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/order"))
        .respond_with(json_response(api_responses::INSUFFICIENT_FUNDS))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server).await.with_retries(0);
    let request = OrderRequest::limit(0, "SOL_USDC", Side::Bid, "100.00".to_string(), dec!(0.5));
    let err = assert_err!(client.execute_order(&request).await);

    let message = err.to_string();
    assert!(message.contains("INSUFFICIENT_FUNDS"), "{}", message);
    assert!(!message.contains("EINSUFFICIENT_FUNDS"), "{}", message);
    assert!(message.contains("/api/v1/order"), "{}", message);
}

#[tokio::test]
async fn test_unknown_instruction_fails_immediately() {
    let server = MockServer::start().await;
    let client = create_test_client(&server).await;

    let result = client.call("orderTeleport", &Params::new()).await;
    assert!(matches!(result, Err(ClientError::UnknownInstruction(_))));
    assert!(server.received_requests().await.unwrap().is_empty());
}
