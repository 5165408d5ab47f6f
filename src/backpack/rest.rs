//! REST API client for the Backpack exchange

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::auth::{generate_auth_headers, param_value, Params, Signer};
use super::instructions::{Endpoint, InstructionRegistry};
use crate::common::errors::{ClientError, Result};
use crate::common::traits::GridExchange;
use crate::common::types::{Balance, Order, OrderRequest, Ticker};

const CLIENT_USER_AGENT: &str = "Backpack Client";
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Instruction whose 404 means "no such order" rather than a failure
const ORDER_QUERY: &str = "orderQuery";

/// Default number of retries after the first failed attempt
pub const DEFAULT_RETRIES: u32 = 3;

/// Default base delay for jittered backoff
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(5000);

/// Decoded response of a REST call
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// JSON body without application errors
    Json(Value),
    /// Plain-text body, returned verbatim
    Text(String),
    /// Any other content type
    Raw {
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
    },
    /// `orderQuery` found no order
    Absent,
}

impl ApiResponse {
    /// Unwrap a JSON payload or report what came back instead
    pub fn into_json(self, instruction: &str) -> Result<Value> {
        match self {
            ApiResponse::Json(value) => Ok(value),
            other => Err(ClientError::InvalidResponse(format!(
                "{} expected a JSON body, got {:?}",
                instruction, other
            ))),
        }
    }
}

/// REST API client for Backpack
#[derive(Debug, Clone)]
pub struct BackpackRestClient {
    /// HTTP client
    client: Client,
    /// Base URL for the REST API
    base_url: String,
    /// Instruction → endpoint table
    registry: Arc<InstructionRegistry>,
    /// API key sent with signed requests
    api_key: String,
    /// Shared request signer
    signer: Arc<Signer>,
    /// Base delay for jittered retries
    backoff: Duration,
    /// Retries after the first failed attempt
    retries: u32,
}

impl BackpackRestClient {
    /// Create a new REST client
    pub fn new(base_url: &str, api_key: &str, signer: Arc<Signer>) -> Result<Self> {
        Self::with_timeout(base_url, api_key, signer, Duration::from_secs(30))
    }

    /// Create a new REST client with custom timeout
    pub fn with_timeout(
        base_url: &str,
        api_key: &str,
        signer: Arc<Signer>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            registry: Arc::new(InstructionRegistry::backpack()),
            api_key: api_key.to_string(),
            signer,
            backoff: DEFAULT_BACKOFF,
            retries: DEFAULT_RETRIES,
        })
    }

    /// Replace the instruction registry
    pub fn with_registry(mut self, registry: Arc<InstructionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Set the base delay for jittered retries
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the default retry count
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn signer(&self) -> Arc<Signer> {
        self.signer.clone()
    }

    // ========================================================================
    // Generic instruction calls
    // ========================================================================

    /// Call an instruction with the default retry count
    pub async fn call(&self, instruction: &str, params: &Params) -> Result<ApiResponse> {
        self.call_with_retries(instruction, params, self.retries).await
    }

    /// Call an instruction, retrying failures with jittered backoff
    ///
    /// A 404 from `orderQuery` returns [`ApiResponse::Absent`] at once.
    /// After `retries` failed retries the last error is wrapped with the
    /// instruction name and parameters.
    #[instrument(skip(self, params))]
    pub async fn call_with_retries(
        &self,
        instruction: &str,
        params: &Params,
        retries: u32,
    ) -> Result<ApiResponse> {
        let endpoint = self.registry.get(instruction)?.clone();
        let mut attempt: u32 = 0;

        loop {
            match self.execute(instruction, &endpoint, params).await {
                Ok(response) => return Ok(response),
                Err(e) if instruction == ORDER_QUERY && e.is_not_found() => {
                    debug!("{} found no order", instruction);
                    return Ok(ApiResponse::Absent);
                }
                Err(e) if attempt < retries => {
                    attempt += 1;
                    let delay = jittered(self.backoff);
                    warn!(
                        "API {} failed (attempt {}/{}), retrying in {:?}: {}",
                        instruction,
                        attempt,
                        retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(ClientError::RetriesExhausted {
                        instruction: instruction.to_string(),
                        params: Value::Object(params.clone()).to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }
    }

    /// Perform one HTTP exchange for an instruction
    async fn execute(&self, instruction: &str, endpoint: &Endpoint, params: &Params) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, endpoint.path);

        let mut request = self
            .client
            .request(endpoint.method.clone(), &url)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);

        request = if endpoint.method == Method::GET {
            request.query(&query_pairs(params))
        } else {
            request.json(params)
        };

        if endpoint.is_private() {
            let headers = generate_auth_headers(&self.api_key, &self.signer, instruction, params);
            request = headers.apply_to_request(request);
        }

        debug!("{} {} {}", endpoint.method, url, instruction);
        let response = request.send().await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        classify_response(status.as_u16(), content_type, body.to_vec(), &url, params)
    }

    // ========================================================================
    // Typed wrappers
    // ========================================================================

    /// 24h ticker for a market
    #[instrument(skip(self))]
    pub async fn ticker(&self, symbol: &str) -> Result<Ticker> {
        let params = to_params(json!({ "symbol": symbol }));
        let value = self.call("ticker", &params).await?.into_json("ticker")?;
        decode("ticker", value)
    }

    /// Balances keyed by asset symbol
    #[instrument(skip(self))]
    pub async fn balances(&self) -> Result<HashMap<String, Balance>> {
        let value = self
            .call("balanceQuery", &Params::new())
            .await?
            .into_json("balanceQuery")?;
        decode("balanceQuery", value)
    }

    /// Look up an open order by client id
    #[instrument(skip(self))]
    pub async fn order_query(&self, symbol: &str, client_id: u32) -> Result<Option<Order>> {
        let params = to_params(json!({ "clientId": client_id, "symbol": symbol }));
        match self.call(ORDER_QUERY, &params).await? {
            ApiResponse::Absent | ApiResponse::Json(Value::Null) => Ok(None),
            ApiResponse::Json(value) => decode(ORDER_QUERY, value).map(Some),
            other => Err(ClientError::InvalidResponse(format!(
                "{} returned {:?}",
                ORDER_QUERY, other
            ))),
        }
    }

    /// Submit a limit order
    #[instrument(skip(self))]
    pub async fn order_execute(&self, request: &OrderRequest) -> Result<Option<Order>> {
        let params = to_params(json!({
            "clientId": request.client_id,
            "orderType": request.order_type,
            "price": request.price,
            "quantity": request.quantity.to_string(),
            "side": request.side,
            "symbol": request.symbol,
            "timeInForce": request.time_in_force,
        }));
        match self.call("orderExecute", &params).await? {
            ApiResponse::Json(value) => Ok(serde_json::from_value(value).ok()),
            _ => Ok(None),
        }
    }

    /// Cancel every open order on a market
    #[instrument(skip(self))]
    pub async fn order_cancel_all(&self, symbol: &str) -> Result<()> {
        let params = to_params(json!({ "symbol": symbol }));
        self.call("orderCancelAll", &params).await?;
        Ok(())
    }

    /// All open orders on a market
    #[instrument(skip(self))]
    pub async fn order_query_all(&self, symbol: &str) -> Result<Vec<Order>> {
        let params = to_params(json!({ "symbol": symbol }));
        let value = self
            .call("orderQueryAll", &params)
            .await?
            .into_json("orderQueryAll")?;
        decode("orderQueryAll", value)
    }
}

#[async_trait]
impl GridExchange for BackpackRestClient {
    async fn last_price(&self, symbol: &str) -> Result<Decimal> {
        Ok(self.ticker(symbol).await?.last_price)
    }

    async fn balances(&self) -> Result<HashMap<String, Balance>> {
        BackpackRestClient::balances(self).await
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<()> {
        self.order_cancel_all(symbol).await
    }

    async fn query_order(&self, symbol: &str, client_id: u32) -> Result<Option<Order>> {
        self.order_query(symbol, client_id).await
    }

    async fn open_orders(&self, symbol: &str) -> Result<Vec<Order>> {
        self.order_query_all(symbol).await
    }

    async fn execute_order(&self, request: &OrderRequest) -> Result<()> {
        self.order_execute(request).await.map(|_| ())
    }
}

/// Turn a successful HTTP body into an [`ApiResponse`]
///
/// A JSON body carrying a non-empty `error` array is an application
/// failure. Only codes prefixed with `E` are reported, without the prefix.
pub fn classify_response(
    status: u16,
    content_type: Option<String>,
    body: Vec<u8>,
    url: &str,
    params: &Params,
) -> Result<ApiResponse> {
    let kind = content_type.as_deref().unwrap_or_default();

    if kind.contains("application/json") {
        let parsed: Value = serde_json::from_slice(&body)?;
        if let Some(codes) = parsed.get("error").and_then(Value::as_array) {
            if !codes.is_empty() {
                let messages: Vec<&str> = codes
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|code| code.strip_prefix('E'))
                    .collect();
                if messages.is_empty() {
                    return Err(ClientError::Exchange("Unknown error".to_string()));
                }
                return Err(ClientError::Exchange(format!(
                    "url={} body={} err={}",
                    url,
                    Value::Object(params.clone()),
                    messages.join(", ")
                )));
            }
        }
        Ok(ApiResponse::Json(parsed))
    } else if kind.contains("text/plain") {
        Ok(ApiResponse::Text(String::from_utf8_lossy(&body).into_owned()))
    } else {
        Ok(ApiResponse::Raw {
            status,
            content_type,
            body,
        })
    }
}

/// Query-string pairs in signing order
fn query_pairs(params: &Params) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (k.clone(), param_value(v)))
        .collect();
    pairs.sort();
    pairs
}

fn to_params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}

fn decode<T: DeserializeOwned>(instruction: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ClientError::InvalidResponse(format!("{} response: {}", instruction, e)))
}

/// Base delay scaled by a uniform factor in `[1, 2)`
pub fn jittered(base: Duration) -> Duration {
    base.mul_f64(1.0 + rand::random::<f64>())
}
