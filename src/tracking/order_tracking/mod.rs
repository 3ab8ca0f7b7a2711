//! Per-order tracking aggregator.
//!
//! Fetches one order's tracking snapshot, joins the order's realtime room and
//! merges `order:tracking:update` / `tracking:started` events whose `orderId`
//! equals the tracked order. Without an order id the aggregator idles: no
//! fetch, no room, no subscriptions.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::interfaces::TrackingApi;
use crate::model::{Id, OrderTracking};
use crate::realtime::{ConnectionState, RealtimeChannel, RealtimeEvent, Subscription};

/// Published aggregator state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderTrackingState {
    pub order_id: Option<Id>,
    pub tracking: Option<OrderTracking>,
    pub loading: bool,
    pub error: Option<String>,
    /// Realtime patches applied since the last snapshot.
    pub patches: u64,
}

enum Command {
    Retarget(Option<Id>),
    Refetch,
    Shutdown,
}

/// Handle to a running order tracking aggregator. Dropping it stops the task
/// without leaving the room; call [`shutdown`](Self::shutdown) for a clean exit.
pub struct OrderTracker {
    state: watch::Receiver<OrderTrackingState>,
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

fn active_id(order_id: Option<Id>) -> Option<Id> {
    order_id.filter(|id| !id.is_empty())
}

impl OrderTracker {
    pub fn spawn(
        api: Arc<dyn TrackingApi>,
        channel: &RealtimeChannel,
        order_id: Option<Id>,
    ) -> Self {
        let order_id = active_id(order_id);
        let (state_tx, state_rx) = watch::channel(OrderTrackingState {
            order_id: order_id.clone(),
            loading: order_id.is_some(),
            ..OrderTrackingState::default()
        });
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        // Subscribe before returning so no event for the order is missed.
        let subscriptions = order_id.as_ref().map(|_| Subscriptions::open(channel));
        let worker = Worker {
            api,
            channel: channel.clone(),
            order_id,
            subscriptions,
            state: state_tx,
        };
        let task = tokio::spawn(worker.run(commands_rx));

        Self {
            state: state_rx,
            commands: commands_tx,
            task: Some(task),
        }
    }

    pub fn state(&self) -> OrderTrackingState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<OrderTrackingState> {
        self.state.clone()
    }

    /// Wait until the published state satisfies `predicate`.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&OrderTrackingState) -> bool,
    ) -> Option<OrderTrackingState> {
        let mut rx = self.state.clone();
        let state = rx.wait_for(predicate).await.ok()?;
        Some(state.clone())
    }

    /// Track a different order (or none).
    pub fn retarget(&self, order_id: Option<Id>) {
        let _ = self.commands.send(Command::Retarget(order_id));
    }

    pub fn refetch(&self) {
        let _ = self.commands.send(Command::Refetch);
    }

    /// Leave the room, unsubscribe and stop.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for OrderTracker {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Subscriptions {
    updates: Subscription,
    started: Subscription,
    connection: Subscription,
}

impl Subscriptions {
    fn open(channel: &RealtimeChannel) -> Self {
        Self {
            updates: channel.on_order_tracking_update(),
            started: channel.on_tracking_started(),
            connection: channel.on_connection(),
        }
    }
}

async fn next_event(subscription: Option<&mut Subscription>) -> Option<Arc<RealtimeEvent>> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

struct Worker {
    api: Arc<dyn TrackingApi>,
    channel: RealtimeChannel,
    order_id: Option<Id>,
    subscriptions: Option<Subscriptions>,
    state: watch::Sender<OrderTrackingState>,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        if let Some(order_id) = self.order_id.clone() {
            self.begin(order_id).await;
        }

        loop {
            let (updates, started, connection) = match self.subscriptions.as_mut() {
                Some(s) => (Some(&mut s.updates), Some(&mut s.started), Some(&mut s.connection)),
                None => (None, None, None),
            };

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Retarget(next)) => self.retarget(active_id(next)).await,
                    Some(Command::Refetch) => self.fetch().await,
                    Some(Command::Shutdown) | None => break,
                },
                Some(event) = next_event(updates) => {
                    if let RealtimeEvent::OrderTrackingUpdate(update) = &*event {
                        self.apply(&update.order_id, |tracking| tracking.apply_update(update.clone()));
                    }
                },
                Some(event) = next_event(started) => {
                    if let RealtimeEvent::TrackingStarted(started) = &*event {
                        self.apply(&started.order_id, |tracking| tracking.extend_with(started.clone()));
                    }
                },
                Some(event) = next_event(connection) => {
                    if matches!(&*event, RealtimeEvent::Connection(ConnectionState::Reconnected)) {
                        self.fetch().await;
                    }
                },
            }
        }

        self.end().await;
    }

    async fn begin(&mut self, order_id: Id) {
        info!(order_id = %order_id, "Order tracking started");
        if self.subscriptions.is_none() {
            self.subscriptions = Some(Subscriptions::open(&self.channel));
        }
        self.order_id = Some(order_id.clone());
        self.state.send_replace(OrderTrackingState {
            order_id: Some(order_id.clone()),
            loading: true,
            ..OrderTrackingState::default()
        });

        self.channel.join_order_room(&order_id).await;
        self.fetch().await;
    }

    async fn end(&mut self) {
        if let Some(order_id) = self.order_id.take() {
            self.channel.leave_order_room(&order_id).await;
            info!(order_id = %order_id, "Order tracking stopped");
        }
        self.subscriptions = None;
    }

    async fn retarget(&mut self, next: Option<Id>) {
        if next == self.order_id {
            return;
        }
        self.end().await;
        match next {
            Some(order_id) => self.begin(order_id).await,
            None => {
                self.state.send_replace(OrderTrackingState::default());
            }
        }
    }

    #[tracing::instrument(name = "order_tracking.fetch", skip(self), fields(order_id = ?self.order_id))]
    async fn fetch(&mut self) {
        let Some(order_id) = self.order_id.clone() else {
            return;
        };

        match self.api.order_tracking(&order_id).await {
            Ok(mut tracking) => {
                tracking.order_id.get_or_insert_with(|| order_id.clone());
                self.state.send_modify(|s| {
                    s.tracking = Some(tracking);
                    s.loading = false;
                    s.error = None;
                    s.patches = 0;
                });
                debug!("Order tracking snapshot applied");
            }
            Err(e) => {
                warn!(error = %e, "Order tracking fetch failed");
                self.state.send_modify(|s| {
                    s.tracking = None;
                    s.loading = false;
                    s.error = Some(e.to_string());
                });
            }
        }
    }

    /// Apply a patch if it targets the tracked order. Other orders are ignored.
    fn apply(&self, event_order: &Id, patch: impl FnOnce(&mut OrderTracking)) {
        let Some(order_id) = &self.order_id else {
            return;
        };
        if event_order != order_id {
            debug!(tracked = %order_id, event_order = %event_order, "Ignoring event for other order");
            return;
        }

        let order_id = order_id.clone();
        self.state.send_modify(|s| {
            let tracking = s.tracking.get_or_insert_with(|| OrderTracking {
                order_id: Some(order_id),
                ..OrderTracking::default()
            });
            patch(tracking);
            s.patches += 1;
        });
    }
}

#[cfg(test)]
mod tests;
