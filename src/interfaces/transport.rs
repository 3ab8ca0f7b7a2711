//! RealtimeTransport trait: the physical connection under the realtime channel.
//!
//! A transport opens sessions. Each session is a pair of queues: inbound
//! [`TransportEvent`]s (frames, then exactly one `Closed`) and outbound
//! [`Frame`]s. Dropping the outbound sender closes the session from our side.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors establishing a transport session.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("handshake rejected: {0}")]
    Handshake(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// One named event on the wire: `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// We closed it (`RealtimeChannel::disconnect`).
    ClientInitiated,
    /// The server closed it deliberately. No automatic retry at transport level.
    ServerInitiated,
    /// Network drop or protocol error.
    Transport(String),
}

/// Inbound item from an open session.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Frame(Frame),
    Closed(DisconnectReason),
}

/// An open session.
pub struct TransportSession {
    pub inbound: mpsc::Receiver<TransportEvent>,
    pub outbound: mpsc::Sender<Frame>,
}

/// Opens authenticated realtime sessions.
///
/// Implementations:
/// - `WebSocketTransport`: websocket with bearer-token handshake
/// - `LoopbackTransport`: in-process, driven by a test/embedding harness
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Open a new session authenticated with `token`.
    async fn open(&self, token: Option<&str>) -> Result<TransportSession>;

    /// Transport name for logging.
    fn name(&self) -> &str;
}
