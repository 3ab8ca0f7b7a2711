//! Shared realtime channel.
//!
//! One [`RealtimeChannel`] wraps one logical connection and is cloned into
//! every consumer. Inbound frames are decoded and fanned out on a
//! [`RealtimeBus`]; consumers hold individual [`Subscription`]s.
//!
//! Connection lifecycle:
//! - `connect()` opens the session once; later calls are no-ops while it is up.
//!   If the first open fails it is retried with backoff in the background.
//! - A transport drop reconnects with exponential backoff (if enabled).
//! - A server-initiated close always reconnects, and is logged as such.
//! - `disconnect()` closes the session and never reconnects.
//!
//! Joined rooms are remembered and re-joined after every reconnect. Lifecycle
//! changes are published on the bus as [`RealtimeEvent::Connection`].

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use backon::Retryable;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::bus::{RealtimeBus, Subscription, SubscriptionId};
use super::events::{ConnectionState, EventKind, RealtimeEvent, Room};
use crate::config::RealtimeConfig;
use crate::interfaces::transport::{
    DisconnectReason, Frame, RealtimeTransport, TransportError, TransportEvent, TransportSession,
};
use crate::model::Id;
use crate::utils::retry::reconnect_backoff;

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Observable link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connected,
    Reconnecting,
    Closed,
}

struct ChannelInner {
    transport: Arc<dyn RealtimeTransport>,
    token: Option<String>,
    config: RealtimeConfig,
    bus: RealtimeBus,
    rooms: Mutex<Vec<Room>>,
    outbound: Mutex<Option<mpsc::Sender<Frame>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    state: watch::Sender<LinkState>,
    connect_lock: tokio::sync::Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cloneable handle over one shared realtime connection.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

impl RealtimeChannel {
    /// Create a channel. The token is fixed for the channel's lifetime.
    pub fn new(
        transport: Arc<dyn RealtimeTransport>,
        token: Option<String>,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                transport,
                token: token.filter(|t| !t.is_empty()),
                config,
                bus: RealtimeBus::new(),
                rooms: Mutex::new(Vec::new()),
                outbound: Mutex::new(None),
                pump: Mutex::new(None),
                state: watch::channel(LinkState::Idle).0,
                connect_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Open the connection if it is not already up.
    ///
    /// A failed first open is returned to the caller. With `auto_reconnect`
    /// the channel keeps retrying in the background and later calls return
    /// `Ok` while that is in progress.
    #[tracing::instrument(name = "realtime.connect", skip(self), fields(transport = self.inner.transport.name()))]
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.inner.connect_lock.lock().await;

        let running = lock(&self.inner.pump)
            .as_ref()
            .is_some_and(|pump| !pump.is_finished());
        if running {
            debug!("Realtime channel already connected");
            return Ok(());
        }

        let session = match self.inner.transport.open(self.inner.token.as_deref()).await {
            Ok(session) => session,
            Err(e) => {
                if self.inner.config.auto_reconnect {
                    warn!(error = %e, "Realtime connect failed, retrying in background");
                    self.inner.state.send_replace(LinkState::Reconnecting);
                    let pump = tokio::spawn(run_pump(Arc::downgrade(&self.inner), None));
                    *lock(&self.inner.pump) = Some(pump);
                }
                return Err(e.into());
            }
        };
        let inbound = self.inner.install(session).await;

        self.inner.state.send_replace(LinkState::Connected);
        self.inner
            .bus
            .publish(RealtimeEvent::Connection(ConnectionState::Connected));
        info!("Realtime channel connected");

        let pump = tokio::spawn(run_pump(Arc::downgrade(&self.inner), Some(inbound)));
        *lock(&self.inner.pump) = Some(pump);
        Ok(())
    }

    /// Close the connection. No reconnect follows.
    pub async fn disconnect(&self) {
        let _guard = self.inner.connect_lock.lock().await;
        if let Some(pump) = lock(&self.inner.pump).take() {
            pump.abort();
        }
        let had_session = lock(&self.inner.outbound).take().is_some();

        self.inner.state.send_replace(LinkState::Closed);
        if had_session {
            self.inner
                .bus
                .publish(RealtimeEvent::Connection(ConnectionState::Closed));
            info!("Realtime channel disconnected by client");
        }
    }

    pub fn state(&self) -> LinkState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Watch link state changes.
    pub fn state_changes(&self) -> watch::Receiver<LinkState> {
        self.inner.state.subscribe()
    }

    /// The bus inbound events are published on.
    pub fn bus(&self) -> &RealtimeBus {
        &self.inner.bus
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub fn subscribe(&self, kind: EventKind) -> Subscription {
        self.inner.bus.subscribe(kind)
    }

    /// Remove one subscriber. Unknown ids return `false`.
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    pub fn on_location_update(&self) -> Subscription {
        self.subscribe(EventKind::LocationUpdate)
    }

    pub fn on_tracking_started(&self) -> Subscription {
        self.subscribe(EventKind::TrackingStarted)
    }

    pub fn on_warehouse_arrived(&self) -> Subscription {
        self.subscribe(EventKind::WarehouseArrived)
    }

    pub fn on_warehouse_approaching(&self) -> Subscription {
        self.subscribe(EventKind::WarehouseApproaching)
    }

    pub fn on_eta_updated(&self) -> Subscription {
        self.subscribe(EventKind::EtaUpdated)
    }

    pub fn on_order_tracking_update(&self) -> Subscription {
        self.subscribe(EventKind::OrderTrackingUpdate)
    }

    pub fn on_notification(&self) -> Subscription {
        self.subscribe(EventKind::Notification)
    }

    pub fn on_connection(&self) -> Subscription {
        self.subscribe(EventKind::Connection)
    }

    // ------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------

    pub async fn track_truck(&self, truck_id: &Id) {
        self.join(Room::Truck(truck_id.clone())).await;
    }

    pub async fn untrack_truck(&self, truck_id: &Id) {
        self.leave(Room::Truck(truck_id.clone())).await;
    }

    pub async fn join_order_room(&self, order_id: &Id) {
        self.join(Room::Order(order_id.clone())).await;
    }

    pub async fn leave_order_room(&self, order_id: &Id) {
        self.leave(Room::Order(order_id.clone())).await;
    }

    /// Rooms currently joined, in join order.
    pub fn rooms(&self) -> Vec<Room> {
        lock(&self.inner.rooms).clone()
    }

    async fn join(&self, room: Room) {
        {
            let mut rooms = lock(&self.inner.rooms);
            if !rooms.contains(&room) {
                rooms.push(room.clone());
            }
        }
        self.inner.emit(room.join_frame()).await;
    }

    async fn leave(&self, room: Room) {
        lock(&self.inner.rooms).retain(|r| r != &room);
        self.inner.emit(room.leave_frame()).await;
    }
}

impl ChannelInner {
    /// Adopt a fresh session: keep its sender and re-join remembered rooms.
    async fn install(&self, session: TransportSession) -> mpsc::Receiver<TransportEvent> {
        *lock(&self.outbound) = Some(session.outbound);

        let rooms = lock(&self.rooms).clone();
        if !rooms.is_empty() {
            debug!(rooms = rooms.len(), "Re-joining rooms");
        }
        for room in rooms {
            self.emit(room.join_frame()).await;
        }
        session.inbound
    }

    /// Send a frame if a session is open. Rooms are replayed on reconnect,
    /// so a frame dropped while offline is not lost.
    async fn emit(&self, frame: Frame) {
        let sender = lock(&self.outbound).clone();
        match sender {
            Some(sender) => {
                let event = frame.event.clone();
                if sender.send(frame).await.is_err() {
                    debug!(event = %event, "Session closed, frame not sent");
                }
            }
            None => debug!(event = %frame.event, "Not connected, frame deferred"),
        }
    }

    fn dispatch(&self, frame: &Frame) {
        match RealtimeEvent::decode(frame) {
            Ok(event) => {
                let delivered = self.bus.publish(event);
                debug!(event = %frame.event, delivered, "Realtime event dispatched");
            }
            Err(e) => {
                warn!(event = %frame.event, error = %e, "Dropping undecodable realtime frame");
            }
        }
    }

    async fn reconnect(&self) -> Result<mpsc::Receiver<TransportEvent>> {
        let token = self.token.as_deref();
        let session = (|| async move { self.transport.open(token).await })
            .retry(reconnect_backoff(&self.config))
            .notify(|err, delay| {
                warn!(error = %err, ?delay, "Realtime reconnect attempt failed");
            })
            .await?;
        Ok(self.install(session).await)
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        if let Ok(mut pump) = self.pump.lock() {
            if let Some(pump) = pump.take() {
                pump.abort();
            }
        }
    }
}

/// Read inbound events until the session ends, then reconnect or stop.
///
/// Without an initial session the pump first retries the open with backoff.
async fn run_pump(channel: Weak<ChannelInner>, inbound: Option<mpsc::Receiver<TransportEvent>>) {
    let mut inbound = match inbound {
        Some(inbound) => inbound,
        None => {
            let Some(inner) = channel.upgrade() else {
                return;
            };
            match inner.reconnect().await {
                Ok(inbound) => {
                    inner.state.send_replace(LinkState::Connected);
                    inner
                        .bus
                        .publish(RealtimeEvent::Connection(ConnectionState::Connected));
                    info!("Realtime channel connected after retry");
                    inbound
                }
                Err(e) => {
                    error!(error = %e, "Realtime connect attempts exhausted");
                    inner.state.send_replace(LinkState::Closed);
                    inner
                        .bus
                        .publish(RealtimeEvent::Connection(ConnectionState::Closed));
                    return;
                }
            }
        }
    };

    loop {
        let reason = loop {
            match inbound.recv().await {
                Some(TransportEvent::Frame(frame)) => {
                    let Some(inner) = channel.upgrade() else {
                        return;
                    };
                    inner.dispatch(&frame);
                }
                Some(TransportEvent::Closed(reason)) => break reason,
                None => break DisconnectReason::Transport("session ended".to_string()),
            }
        };

        let Some(inner) = channel.upgrade() else {
            return;
        };
        *lock(&inner.outbound) = None;

        match &reason {
            DisconnectReason::ClientInitiated => {
                info!("Realtime session closed by client");
                inner.state.send_replace(LinkState::Closed);
                inner
                    .bus
                    .publish(RealtimeEvent::Connection(ConnectionState::Closed));
                return;
            }
            DisconnectReason::ServerInitiated => {
                warn!("Server closed realtime connection, reconnecting");
            }
            DisconnectReason::Transport(cause) => {
                if !inner.config.auto_reconnect {
                    warn!(cause = %cause, "Realtime transport dropped, auto-reconnect disabled");
                    inner.state.send_replace(LinkState::Closed);
                    inner
                        .bus
                        .publish(RealtimeEvent::Connection(ConnectionState::Closed));
                    return;
                }
                warn!(cause = %cause, "Realtime transport dropped, reconnecting");
            }
        }

        inner.state.send_replace(LinkState::Reconnecting);
        inner
            .bus
            .publish(RealtimeEvent::Connection(ConnectionState::Disconnected {
                reason: disconnect_label(&reason),
            }));

        match inner.reconnect().await {
            Ok(next) => {
                inbound = next;
                inner.state.send_replace(LinkState::Connected);
                inner
                    .bus
                    .publish(RealtimeEvent::Connection(ConnectionState::Reconnected));
                info!("Realtime channel reconnected");
            }
            Err(e) => {
                error!(error = %e, "Realtime reconnect attempts exhausted");
                inner.state.send_replace(LinkState::Closed);
                inner
                    .bus
                    .publish(RealtimeEvent::Connection(ConnectionState::Closed));
                return;
            }
        }
    }
}

fn disconnect_label(reason: &DisconnectReason) -> String {
    match reason {
        DisconnectReason::ClientInitiated => "client".to_string(),
        DisconnectReason::ServerInitiated => "server".to_string(),
        DisconnectReason::Transport(cause) => format!("transport: {cause}"),
    }
}
