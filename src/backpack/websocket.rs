//! Realtime feed over the Backpack websocket API
//!
//! The feed owns a single websocket connection at a time. A supervisor
//! task reopens it after every close with a fixed delay, replays the
//! recorded subscriptions, and fans stream payloads out to bounded
//! channels registered with [`BackpackFeed::on_message`].

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, instrument, warn};

use super::auth::{Params, Signer};
use super::messages::{StreamFrame, SubscribeFrame};
use crate::common::channels::create_stream_channel;
use crate::common::errors::{ClientError, Result};
use crate::common::types::ConnectionState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A registered stream consumer
struct Route {
    filter: String,
    sender: mpsc::Sender<Value>,
}

struct FeedInner {
    url: String,
    api_key: String,
    signer: Arc<Signer>,
    reconnect_delay: Duration,
    state: RwLock<ConnectionState>,
    /// Streams replayed on every new connection
    streams: RwLock<Vec<String>>,
    routes: RwLock<Vec<Route>>,
    /// Writer handle of the live connection
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    /// Serializes connection attempts
    connect_lock: Mutex<()>,
    /// Signalled when a live session ends
    closed: Notify,
}

/// Self-healing websocket client for private Backpack streams
#[derive(Clone)]
pub struct BackpackFeed {
    inner: Arc<FeedInner>,
}

impl BackpackFeed {
    /// Create a feed that waits `reconnect_delay` before reopening a closed connection
    pub fn new(url: &str, api_key: &str, signer: Arc<Signer>, reconnect_delay: Duration) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                url: url.to_string(),
                api_key: api_key.to_string(),
                signer,
                reconnect_delay,
                state: RwLock::new(ConnectionState::Disconnected),
                streams: RwLock::new(Vec::new()),
                routes: RwLock::new(Vec::new()),
                outbound: Mutex::new(None),
                connect_lock: Mutex::new(()),
                closed: Notify::new(),
            }),
        }
    }

    /// Current connection state
    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Register a consumer for streams starting with `filter`
    ///
    /// Registrations are additive: registering the same filter twice
    /// delivers every payload to both receivers.
    pub async fn on_message(&self, filter: &str) -> mpsc::Receiver<Value> {
        let (sender, receiver) = create_stream_channel();
        self.inner.routes.write().await.push(Route {
            filter: filter.to_string(),
            sender,
        });
        receiver
    }

    /// Subscribe to streams, connecting first if needed
    ///
    /// The streams are recorded before any network activity so that the
    /// supervisor replays them after every reconnect.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, streams: Vec<String>) -> Result<()> {
        {
            let mut recorded = self.inner.streams.write().await;
            for stream in &streams {
                if !recorded.contains(stream) {
                    recorded.push(stream.clone());
                }
            }
        }

        if self.connect().await? {
            // A fresh connection already replayed every recorded stream
            return Ok(());
        }
        self.send_subscribe(streams).await
    }

    /// Open the connection unless one is already live
    ///
    /// Returns `true` when a new connection was established. A transport
    /// failure is returned to the caller without retrying.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<bool> {
        let _guard = self.inner.connect_lock.lock().await;
        if self.is_connected().await {
            return Ok(false);
        }

        self.set_state(ConnectionState::Connecting).await;
        info!("Connecting to Backpack WebSocket: {}", self.inner.url);

        let ws_stream = match connect_async(&self.inner.url).await {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected).await;
                error!("WebSocket error: {}", e);
                return Err(ClientError::WebSocketConnection(e.to_string()));
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        *self.inner.outbound.lock().await = Some(outbound_tx);
        self.set_state(ConnectionState::Connected).await;
        info!("WebSocket connected");

        let feed = self.clone();
        tokio::spawn(async move { feed.session(ws_stream, outbound_rx).await });

        let streams = self.inner.streams.read().await.clone();
        if !streams.is_empty() {
            if let Err(e) = self.send_subscribe(streams).await {
                warn!("Failed to replay subscriptions: {}", e);
            }
        }
        Ok(true)
    }

    /// Spawn the supervisor task
    pub fn spawn(&self) -> JoinHandle<()> {
        let feed = self.clone();
        tokio::spawn(async move { feed.run().await })
    }

    /// Keep the connection alive forever
    ///
    /// Every close or failed attempt is followed by the fixed reconnect
    /// delay and a new attempt; there is no attempt cap.
    pub async fn run(&self) {
        loop {
            match self.connect().await {
                Ok(_) => self.wait_for_close().await,
                Err(e) => error!("WebSocket reconnect failed: {}", e),
            }
            warn!(
                "WebSocket disconnected, reconnecting in {:?}",
                self.inner.reconnect_delay
            );
            tokio::time::sleep(self.inner.reconnect_delay).await;
        }
    }

    /// Resolve once the live session has ended
    ///
    /// A close signal left over from an earlier session is ignored while
    /// the feed is still connected.
    async fn wait_for_close(&self) {
        while self.is_connected().await {
            self.inner.closed.notified().await;
        }
    }

    /// Route one inbound text frame to matching consumers
    ///
    /// Frames that are not JSON are logged and dropped.
    pub async fn dispatch(&self, text: &str) {
        let frame: StreamFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Parse message failed: {} - {}", e, text);
                return;
            }
        };

        let Some(stream) = frame.stream else {
            debug!("Ignoring frame without stream: {}", text);
            return;
        };

        let senders: Vec<mpsc::Sender<Value>> = self
            .inner
            .routes
            .read()
            .await
            .iter()
            .filter(|route| stream.starts_with(&route.filter))
            .map(|route| route.sender.clone())
            .collect();

        for sender in senders {
            if let Err(e) = sender.send(frame.data.clone()).await {
                warn!("Dropping {} payload, consumer gone: {}", stream, e);
            }
        }
    }

    /// Build a signed subscription frame
    pub fn subscribe_frame(&self, streams: Vec<String>) -> SubscribeFrame {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let signature = self
            .inner
            .signer
            .sign_instruction("subscribe", &Params::new(), timestamp);
        SubscribeFrame::new(
            streams,
            &self.inner.api_key,
            signature,
            timestamp,
            self.inner.signer.window_ms(),
        )
    }

    async fn send_subscribe(&self, streams: Vec<String>) -> Result<()> {
        let frame = self.subscribe_frame(streams);
        let msg_json = serde_json::to_string(&frame)?;
        debug!("Sending subscription message: {:?}", frame.params);
        self.send(Message::Text(msg_json)).await
    }

    async fn send(&self, message: Message) -> Result<()> {
        let outbound = self.inner.outbound.lock().await;
        match outbound.as_ref() {
            Some(sender) => sender
                .send(message)
                .map_err(|e| ClientError::ChannelSend(e.to_string())),
            None => Err(ClientError::WebSocketCommunication(
                "WebSocket is not connected".to_string(),
            )),
        }
    }

    async fn set_state(&self, state: ConnectionState) {
        *self.inner.state.write().await = state;
    }

    /// Pump one connection until it closes
    async fn session(&self, ws_stream: WsStream, mut outbound_rx: mpsc::UnboundedReceiver<Message>) {
        let (mut write, mut read) = ws_stream.split();

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = write.send(message).await {
                    error!("Failed to write to WebSocket: {}", e);
                    break;
                }
            }
        });

        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => self.dispatch(&text).await,
                Some(Ok(Message::Ping(data))) => {
                    debug!("Received Ping, sending Pong");
                    if let Err(e) = self.send(Message::Pong(data)).await {
                        warn!("Failed to queue Pong: {}", e);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("WebSocket closed: {:?}", frame);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                None => {
                    info!("WebSocket stream ended");
                    break;
                }
            }
        }

        self.inner.outbound.lock().await.take();
        writer.abort();
        self.set_state(ConnectionState::Disconnected).await;
        warn!("WebSocket disconnected");
        self.inner.closed.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backpack::messages::ORDER_UPDATE_STREAM;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    fn feed() -> BackpackFeed {
        let signer = Signer::from_base64_seed(&BASE64.encode([5u8; 32]), 5000).unwrap();
        BackpackFeed::new(
            "wss://ws.backpack.exchange",
            "api-key",
            Arc::new(signer),
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn test_new_feed_is_disconnected() {
        let feed = feed();
        assert_eq!(feed.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_prefix() {
        let feed = feed();
        let mut orders = feed.on_message(ORDER_UPDATE_STREAM).await;
        let mut depth = feed.on_message("depth").await;

        feed.dispatch(r#"{"stream":"account.orderUpdate.SOL_USDC","data":{"e":"orderFill","c":"1"}}"#)
            .await;

        let payload = orders.try_recv().unwrap();
        assert_eq!(payload["c"], "1");
        assert!(depth.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_drops_malformed_frames() {
        let feed = feed();
        let mut orders = feed.on_message(ORDER_UPDATE_STREAM).await;

        feed.dispatch("not json at all").await;
        feed.dispatch(r#"{"data":{"e":"orderFill"}}"#).await;

        assert!(orders.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_registrations_are_additive() {
        let feed = feed();
        let mut first = feed.on_message(ORDER_UPDATE_STREAM).await;
        let mut second = feed.on_message(ORDER_UPDATE_STREAM).await;

        feed.dispatch(r#"{"stream":"account.orderUpdate","data":{"e":"orderFill"}}"#)
            .await;

        assert!(first.try_recv().is_ok());
        assert!(second.try_recv().is_ok());
    }

    #[test]
    fn test_subscribe_frame_is_signed() {
        let feed = feed();
        let frame = feed.subscribe_frame(vec![ORDER_UPDATE_STREAM.to_string()]);
        let (api_key, signature, timestamp, window) = frame.signature.clone();

        assert_eq!(frame.method, "SUBSCRIBE");
        assert_eq!(api_key, "api-key");
        assert_eq!(window, 5000);
        assert_eq!(
            signature,
            feed.inner
                .signer
                .sign_instruction("subscribe", &Params::new(), timestamp)
        );
    }

    #[tokio::test]
    async fn test_stale_close_signal_does_not_end_live_session() {
        let feed = feed();
        feed.set_state(ConnectionState::Connected).await;
        feed.inner.closed.notify_one();

        let waited = tokio::time::timeout(Duration::from_millis(50), feed.wait_for_close()).await;
        assert!(waited.is_err(), "returned while still connected");

        feed.set_state(ConnectionState::Disconnected).await;
        feed.inner.closed.notify_one();
        tokio::time::timeout(Duration::from_secs(1), feed.wait_for_close())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_without_connection_fails() {
        let feed = feed();
        let result = feed.send_subscribe(vec![ORDER_UPDATE_STREAM.to_string()]).await;
        assert!(matches!(result, Err(ClientError::WebSocketCommunication(_))));
    }
}
