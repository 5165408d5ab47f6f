//! Request signing for the Backpack API
//!
//! Backpack authenticates private requests with an Ed25519 signature over
//! a canonical string built from the instruction name, the sorted request
//! parameters, the timestamp and the validity window.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{Signer as _, SigningKey};
use serde_json::Value;

use crate::common::errors::{ClientError, Result};

/// Request parameters, shared by the signer and the HTTP layer
pub type Params = serde_json::Map<String, Value>;

/// PKCS#8 DER prefix for a bare Ed25519 private key seed
const PKCS8_ED25519_PREFIX: &str = "302e020100300506032b657004220420";

const SEED_LEN: usize = 32;

/// Ed25519 request signer
pub struct Signer {
    key: SigningKey,
    window_ms: u64,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("window_ms", &self.window_ms)
            .finish_non_exhaustive()
    }
}

impl Signer {
    /// Build a signer from the base64 seed handed out by the exchange
    ///
    /// Only the first 32 decoded bytes are used as the seed. The seed is
    /// wrapped in a PKCS#8 envelope before decoding.
    pub fn from_base64_seed(secret: &str, window_ms: u64) -> Result<Self> {
        let raw = BASE64
            .decode(secret.trim())
            .map_err(|e| ClientError::Authentication(format!("Failed to decode secret: {}", e)))?;
        if raw.len() < SEED_LEN {
            return Err(ClientError::Authentication(format!(
                "Secret must hold at least {} bytes, got {}",
                SEED_LEN,
                raw.len()
            )));
        }

        let mut der = hex::decode(PKCS8_ED25519_PREFIX)
            .map_err(|e| ClientError::Internal(format!("Invalid PKCS#8 prefix: {}", e)))?;
        der.extend_from_slice(&raw[..SEED_LEN]);

        let key = SigningKey::from_pkcs8_der(&der)
            .map_err(|e| ClientError::Authentication(format!("Invalid Ed25519 key: {}", e)))?;

        Ok(Self { key, window_ms })
    }

    /// Validity window sent with every signed request
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Sign raw bytes, returning the base64 signature
    pub fn sign(&self, message: &[u8]) -> String {
        BASE64.encode(self.key.sign(message).to_bytes())
    }

    /// Sign an instruction at the given timestamp
    pub fn sign_instruction(&self, instruction: &str, params: &Params, timestamp: i64) -> String {
        let message = signing_message(instruction, params, timestamp, self.window_ms);
        self.sign(message.as_bytes())
    }

    #[cfg(test)]
    pub(crate) fn verifying_key(&self) -> ed25519_dalek::VerifyingKey {
        self.key.verifying_key()
    }
}

/// Render a parameter value the way it appears in the signing string
pub fn param_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `key=value` pairs joined by `&`, keys in ascending order
pub fn sorted_query_string(params: &Params) -> String {
    let mut pairs: Vec<(&String, &Value)> = params.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, param_value(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Canonical string signed for an instruction
pub fn signing_message(instruction: &str, params: &Params, timestamp: i64, window_ms: u64) -> String {
    let query = sorted_query_string(params);
    let mut message = format!("instruction={}", instruction);
    if !query.is_empty() {
        message.push('&');
        message.push_str(&query);
    }
    message.push_str(&format!("&timestamp={}&window={}", timestamp, window_ms));
    message
}

/// Generate authentication headers for a private instruction
pub fn generate_auth_headers(
    api_key: &str,
    signer: &Signer,
    instruction: &str,
    params: &Params,
) -> AuthHeaders {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let signature = signer.sign_instruction(instruction, params, timestamp);

    AuthHeaders {
        api_key: api_key.to_string(),
        signature,
        timestamp,
        window_ms: signer.window_ms(),
    }
}

/// Authentication headers for API requests
#[derive(Debug, Clone)]
pub struct AuthHeaders {
    pub api_key: String,
    pub signature: String,
    pub timestamp: i64,
    pub window_ms: u64,
}

impl AuthHeaders {
    /// Add authentication headers to a reqwest RequestBuilder
    pub fn apply_to_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("X-Timestamp", self.timestamp.to_string())
            .header("X-Window", self.window_ms.to_string())
            .header("X-API-Key", &self.api_key)
            .header("X-Signature", &self.signature)
    }
}
