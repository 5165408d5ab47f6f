//! Error types for the application

use thiserror::Error;

/// Result type alias using our ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

/// Main error type for client and engine operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// WebSocket connection errors
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    /// WebSocket send/receive errors
    #[error("WebSocket communication error: {0}")]
    WebSocketCommunication(String),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Non-success HTTP status returned by the exchange
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Application-level error codes reported in a JSON body
    #[error("Exchange error: {0}")]
    Exchange(String),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Authentication errors (bad secret, signing failure)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Instruction missing from the endpoint registry
    #[error("Unknown instruction: {0}")]
    UnknownInstruction(String),

    /// A call failed on every attempt
    #[error("API {instruction} failed after retries (params={params}): {source}")]
    RetriesExhausted {
        instruction: String,
        params: String,
        #[source]
        source: Box<ClientError>,
    },

    /// Invalid API response
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Channel send errors
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// HTTP status carried by this error, looking through retry wrappers
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::HttpStatus { status, .. } => Some(*status),
            ClientError::HttpRequest(e) => e.status().map(|s| s.as_u16()),
            ClientError::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }

    /// True when the exchange reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::WebSocketCommunication(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = ClientError::HttpStatus {
            status: 404,
            body: "RESOURCE_NOT_FOUND".to_string(),
        };
        assert!(err.is_not_found());

        let wrapped = ClientError::RetriesExhausted {
            instruction: "orderQuery".to_string(),
            params: "{}".to_string(),
            source: Box::new(err),
        };
        assert!(wrapped.is_not_found());
        assert!(!ClientError::Exchange("INVALID_ORDER".into()).is_not_found());
    }

    #[test]
    fn test_retries_exhausted_message() {
        let err = ClientError::RetriesExhausted {
            instruction: "ticker".to_string(),
            params: r#"{"symbol":"SOL_USDC"}"#.to_string(),
            source: Box::new(ClientError::Exchange("SERVICE_UNAVAILABLE".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("ticker"));
        assert!(msg.contains("SOL_USDC"));
        assert!(msg.contains("SERVICE_UNAVAILABLE"));
    }
}
