//! Channel type definitions for inter-task communication

use serde_json::Value;
use tokio::sync::mpsc;

/// Default channel buffer size
pub const DEFAULT_CHANNEL_SIZE: usize = 1000;

/// Create a new stream payload channel with the default buffer size
pub fn create_stream_channel() -> (mpsc::Sender<Value>, mpsc::Receiver<Value>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}
