//! Live locations aggregator.
//!
//! Polls the live-location snapshot and merges realtime position and ETA
//! deltas into it. One spawned task owns the merge state; consumers read the
//! published [`LiveLocationsState`] through a watch channel.
//!
//! - Snapshot on start, on every poll tick, on demand, and after a reconnect.
//! - A position delta for an unknown assignment triggers an immediate refetch.
//! - Deltas outside the driver filter are dropped without publishing.
//! - A failed snapshot empties the collection and sets `error`; polling continues.

mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub use state::{LocationBook, MergeOutcome};

use crate::interfaces::TrackingApi;
use crate::model::LocationRecord;
use crate::realtime::{ConnectionState, RealtimeChannel, RealtimeEvent, Subscription};

/// Published aggregator state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveLocationsState {
    pub locations: Vec<LocationRecord>,
    pub loading: bool,
    pub error: Option<String>,
    /// Completed snapshot fetches, successful or not.
    pub fetches: u64,
}

enum Command {
    Refetch,
    SetFilter(Option<String>),
    Shutdown,
}

/// Handle to a running live locations aggregator. Dropping it stops the task.
pub struct LiveLocations {
    state: watch::Receiver<LiveLocationsState>,
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl LiveLocations {
    /// Start aggregating. Realtime subscriptions are registered before this returns.
    pub fn spawn(
        api: Arc<dyn TrackingApi>,
        channel: &RealtimeChannel,
        filter: Option<String>,
        poll_interval: Duration,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(LiveLocationsState {
            loading: true,
            ..LiveLocationsState::default()
        });
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            api,
            book: LocationBook::new(filter),
            state: state_tx,
            locations: channel.on_location_update(),
            etas: channel.on_eta_updated(),
            connection: channel.on_connection(),
        };
        let task = tokio::spawn(worker.run(commands_rx, poll_interval));

        Self {
            state: state_rx,
            commands: commands_tx,
            task: Some(task),
        }
    }

    /// Current state.
    pub fn state(&self) -> LiveLocationsState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published state.
    pub fn watch(&self) -> watch::Receiver<LiveLocationsState> {
        self.state.clone()
    }

    /// Wait until the published state satisfies `predicate`.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&LiveLocationsState) -> bool,
    ) -> Option<LiveLocationsState> {
        let mut rx = self.state.clone();
        let state = rx.wait_for(predicate).await.ok()?;
        Some(state.clone())
    }

    /// Request an out-of-band snapshot.
    pub fn refetch(&self) {
        let _ = self.commands.send(Command::Refetch);
    }

    /// Replace the driver filter and resnapshot.
    pub fn set_filter(&self, filter: Option<String>) {
        let _ = self.commands.send(Command::SetFilter(filter));
    }

    /// Stop polling and unsubscribe. Waits for an in-flight fetch to finish.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for LiveLocations {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Worker {
    api: Arc<dyn TrackingApi>,
    book: LocationBook,
    state: watch::Sender<LiveLocationsState>,
    locations: Subscription,
    etas: Subscription,
    connection: Subscription,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, poll_interval: Duration) {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(filter = ?self.book.filter(), ?poll_interval, "Live locations started");

        loop {
            tokio::select! {
                _ = ticker.tick() => self.refresh("poll").await,
                command = commands.recv() => match command {
                    Some(Command::Refetch) => self.refresh("requested").await,
                    Some(Command::SetFilter(filter)) => {
                        self.book.set_filter(filter);
                        self.state.send_modify(|s| {
                            s.locations.clear();
                            s.loading = true;
                            s.error = None;
                        });
                        self.refresh("filter").await;
                        ticker.reset();
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(event) = self.locations.recv() => {
                    if let RealtimeEvent::LocationUpdate(update) = &*event {
                        let outcome = self.book.apply_location_update(update);
                        debug!(assignment = ?update.assignment_id, ?outcome, "Location delta");
                        match outcome {
                            MergeOutcome::Merged => self.publish_records(),
                            MergeOutcome::Unknown => self.refresh("unknown assignment").await,
                            MergeOutcome::Filtered | MergeOutcome::Stale => {}
                        }
                    }
                },
                Some(event) = self.etas.recv() => {
                    if let RealtimeEvent::EtaUpdated(update) = &*event {
                        if self.book.apply_eta_update(update) == MergeOutcome::Merged {
                            self.publish_records();
                        }
                    }
                },
                Some(event) = self.connection.recv() => {
                    if matches!(&*event, RealtimeEvent::Connection(ConnectionState::Reconnected)) {
                        self.refresh("reconnected").await;
                    }
                },
            }
        }

        info!("Live locations stopped");
    }

    #[tracing::instrument(name = "live_locations.refresh", skip(self))]
    async fn refresh(&mut self, reason: &'static str) {
        match self.api.live_locations(self.book.filter()).await {
            Ok(records) => {
                self.book.apply_snapshot(records);
                let count = self.book.records().len();
                let locations = self.book.records().to_vec();
                self.state.send_modify(|s| {
                    s.locations = locations;
                    s.loading = false;
                    s.error = None;
                    s.fetches += 1;
                });
                debug!(count, "Live snapshot applied");
            }
            Err(e) => {
                warn!(error = %e, "Live snapshot failed");
                self.book.clear();
                self.state.send_modify(|s| {
                    s.locations.clear();
                    s.loading = false;
                    s.error = Some(e.to_string());
                    s.fetches += 1;
                });
            }
        }
    }

    fn publish_records(&self) {
        let locations = self.book.records().to_vec();
        self.state.send_modify(|s| s.locations = locations);
    }
}
