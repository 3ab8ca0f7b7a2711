//! In-process realtime transport.
//!
//! [`LoopbackTransport`] is handed to a `RealtimeChannel`; the paired
//! [`LoopbackServer`] plays the server: it pushes frames, drops or closes the
//! connection, and records what the client sent. Used by tests and by
//! embedding code that feeds events from another source.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::interfaces::transport::{
    DisconnectReason, Frame, RealtimeTransport, Result, TransportError, TransportEvent,
    TransportSession,
};

const SESSION_BUFFER: usize = 256;

struct LoopbackState {
    inbound: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    sent: Mutex<Vec<Frame>>,
    tokens: Mutex<Vec<Option<String>>>,
    fail_opens: AtomicUsize,
    sent_count: watch::Sender<usize>,
    open_count: watch::Sender<usize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Client side of the loopback pair.
#[derive(Clone)]
pub struct LoopbackTransport {
    state: Arc<LoopbackState>,
}

/// Server side of the loopback pair.
#[derive(Clone)]
pub struct LoopbackServer {
    state: Arc<LoopbackState>,
}

impl LoopbackTransport {
    /// Create a connected transport/server pair.
    pub fn pair() -> (LoopbackTransport, LoopbackServer) {
        let state = Arc::new(LoopbackState {
            inbound: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
            fail_opens: AtomicUsize::new(0),
            sent_count: watch::channel(0).0,
            open_count: watch::channel(0).0,
        });
        (
            LoopbackTransport {
                state: state.clone(),
            },
            LoopbackServer { state },
        )
    }
}

#[async_trait]
impl RealtimeTransport for LoopbackTransport {
    async fn open(&self, token: Option<&str>) -> Result<TransportSession> {
        let state = &self.state;
        lock(&state.tokens).push(token.map(str::to_string));

        let remaining = state.fail_opens.load(Ordering::SeqCst);
        if remaining > 0 {
            state.fail_opens.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::Connection("loopback refused".to_string()));
        }

        let (inbound_tx, inbound_rx) = mpsc::channel(SESSION_BUFFER);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Frame>(SESSION_BUFFER);
        *lock(&state.inbound) = Some(inbound_tx);

        let recorder = state.clone();
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                debug!(event = %frame.event, "Loopback received client frame");
                lock(&recorder.sent).push(frame);
                recorder.sent_count.send_modify(|n| *n += 1);
            }
        });

        state.open_count.send_modify(|n| *n += 1);
        Ok(TransportSession {
            inbound: inbound_rx,
            outbound: outbound_tx,
        })
    }

    fn name(&self) -> &str {
        "loopback"
    }
}

impl LoopbackServer {
    /// Push a frame to the connected client. Returns `false` when nobody is connected.
    pub async fn push(&self, frame: Frame) -> bool {
        let sender = lock(&self.state.inbound).clone();
        match sender {
            Some(sender) => sender.send(TransportEvent::Frame(frame)).await.is_ok(),
            None => false,
        }
    }

    pub async fn push_event(&self, event: &str, data: Value) -> bool {
        self.push(Frame::new(event, data)).await
    }

    /// End the current session with `reason`.
    pub async fn disconnect(&self, reason: DisconnectReason) {
        let sender = lock(&self.state.inbound).take();
        if let Some(sender) = sender {
            let _ = sender.send(TransportEvent::Closed(reason)).await;
        }
    }

    /// Simulate a network drop.
    pub async fn drop_connection(&self) {
        self.disconnect(DisconnectReason::Transport("connection reset".to_string()))
            .await;
    }

    /// Whether a session is open and its client side is still reading.
    pub fn is_connected(&self) -> bool {
        lock(&self.state.inbound)
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
    }

    /// Refuse the next `count` open attempts.
    pub fn fail_next_opens(&self, count: usize) {
        self.state.fail_opens.store(count, Ordering::SeqCst);
    }

    /// Frames the client has sent, across all sessions.
    pub fn sent(&self) -> Vec<Frame> {
        lock(&self.state.sent).clone()
    }

    pub fn clear_sent(&self) {
        lock(&self.state.sent).clear();
    }

    /// Tokens presented on each open attempt.
    pub fn tokens(&self) -> Vec<Option<String>> {
        lock(&self.state.tokens).clone()
    }

    /// Successful opens so far.
    pub fn open_count(&self) -> usize {
        *self.state.open_count.borrow()
    }

    pub async fn wait_for_opens(&self, count: usize) {
        let mut rx = self.state.open_count.subscribe();
        let _ = rx.wait_for(|n| *n >= count).await;
    }

    /// Wait until the client has sent at least `count` frames in total.
    pub async fn wait_for_sent(&self, count: usize) {
        let mut rx = self.state.sent_count.subscribe();
        let _ = rx.wait_for(|n| *n >= count).await;
    }
}
