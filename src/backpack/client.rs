//! Backpack connection: REST client and realtime feed sharing one set of credentials

use std::sync::Arc;
use tracing::info;

use super::auth::Signer;
use super::instructions::InstructionRegistry;
use super::rest::BackpackRestClient;
use super::websocket::BackpackFeed;
use crate::common::errors::Result;
use crate::config::types::{AppSettings, BackpackConfig};

/// Combined Backpack client for REST calls and the private websocket feed
///
/// Created once at startup. The websocket connection underneath the feed
/// is recreated on every disconnect; this object never is.
#[derive(Clone)]
pub struct BackpackClient {
    /// REST API client
    rest_client: BackpackRestClient,
    /// Realtime order-update feed
    feed: BackpackFeed,
}

impl BackpackClient {
    /// Create a new Backpack client from configuration
    ///
    /// Fails when the API secret is not a valid Ed25519 seed.
    pub fn new(config: &BackpackConfig, settings: &AppSettings) -> Result<Self> {
        let signer = Arc::new(Signer::from_base64_seed(&config.api_secret, config.window_ms)?);
        let registry = Arc::new(InstructionRegistry::backpack());

        let rest_client = BackpackRestClient::with_timeout(
            &config.rest_url,
            &config.api_key,
            signer.clone(),
            settings.request_timeout(),
        )?
        .with_registry(registry)
        .with_backoff(settings.backoff())
        .with_retries(settings.retries);

        let feed = BackpackFeed::new(
            &config.websocket_url,
            &config.api_key,
            signer,
            settings.reconnect_delay(),
        );

        info!("Backpack client ready for {}", config.rest_url);

        Ok(Self { rest_client, feed })
    }

    /// Get a reference to the REST client
    pub fn rest(&self) -> &BackpackRestClient {
        &self.rest_client
    }

    /// Get a reference to the realtime feed
    pub fn feed(&self) -> &BackpackFeed {
        &self.feed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    fn config(secret: String) -> BackpackConfig {
        BackpackConfig {
            api_key: "api-key".into(),
            api_secret: secret,
            rest_url: "https://api.backpack.exchange".into(),
            websocket_url: "wss://ws.backpack.exchange".into(),
            window_ms: 5000,
        }
    }

    #[test]
    fn test_client_creation() {
        let client = BackpackClient::new(&config(BASE64.encode([1u8; 32])), &AppSettings::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_malformed_secret_is_fatal() {
        let client = BackpackClient::new(&config("%%%".into()), &AppSettings::default());
        assert!(client.is_err());
    }
}
