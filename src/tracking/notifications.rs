//! Notification feed: REST list plus realtime pushes.
//!
//! Pushed notifications are prepended (replacing any copy with the same id).
//! Mark-read and delete update the local list first, then the server. A 403
//! from the backend means notifications are not available for this user; the
//! feed goes quiet instead of reporting an error.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::interfaces::tracking_api::{ApiError, TrackingApi};
use crate::model::{Id, Notification};
use crate::realtime::{RealtimeChannel, RealtimeEvent};

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationState {
    /// Newest first.
    pub notifications: Vec<Notification>,
    /// `false` once the backend answered 403.
    pub available: bool,
    pub error: Option<String>,
}

impl Default for NotificationState {
    fn default() -> Self {
        Self {
            notifications: Vec::new(),
            available: true,
            error: None,
        }
    }
}

impl NotificationState {
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.is_read).count()
    }
}

pub struct NotificationFeed {
    api: Arc<dyn TrackingApi>,
    state: Arc<watch::Sender<NotificationState>>,
    task: Option<JoinHandle<()>>,
}

impl NotificationFeed {
    /// Start listening for pushed notifications. Call [`fetch`](Self::fetch) for the backlog.
    pub fn spawn(api: Arc<dyn TrackingApi>, channel: &RealtimeChannel) -> Self {
        let state = Arc::new(watch::channel(NotificationState::default()).0);
        let mut pushes = channel.on_notification();

        let sink = state.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = pushes.recv().await {
                if let RealtimeEvent::Notification(notification) = &*event {
                    debug!(id = %notification.id, "Notification pushed");
                    let notification = notification.clone();
                    sink.send_modify(|s| {
                        s.notifications.retain(|n| n.id != notification.id);
                        s.notifications.insert(0, notification);
                    });
                }
            }
        });

        Self {
            api,
            state,
            task: Some(task),
        }
    }

    pub fn state(&self) -> NotificationState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<NotificationState> {
        self.state.subscribe()
    }

    pub fn unread_count(&self) -> usize {
        self.state.borrow().unread_count()
    }

    /// Load the notification list from the backend.
    #[tracing::instrument(name = "notifications.fetch", skip(self))]
    pub async fn fetch(&self) {
        match self.api.notifications().await {
            Ok(notifications) => {
                info!(count = notifications.len(), "Notifications loaded");
                self.state.send_modify(|s| {
                    s.notifications = notifications;
                    s.available = true;
                    s.error = None;
                });
            }
            Err(e) if e.is_forbidden() => {
                debug!("Notifications not available for this user");
                self.state.send_modify(|s| {
                    s.notifications.clear();
                    s.available = false;
                    s.error = None;
                });
            }
            Err(e) => {
                warn!(error = %e, "Failed to load notifications");
                self.state.send_modify(|s| s.error = Some(e.to_string()));
            }
        }
    }

    /// Mark one notification read, locally then on the server.
    pub async fn mark_read(&self, id: &Id) -> Result<(), ApiError> {
        self.state.send_if_modified(|s| {
            match s.notifications.iter_mut().find(|n| &n.id == id && !n.is_read) {
                Some(n) => {
                    n.is_read = true;
                    true
                }
                None => false,
            }
        });
        quiet_forbidden(self.api.mark_notification_read(id).await)
    }

    /// Remove one notification, locally then on the server.
    pub async fn delete(&self, id: &Id) -> Result<(), ApiError> {
        self.state.send_if_modified(|s| {
            let before = s.notifications.len();
            s.notifications.retain(|n| &n.id != id);
            s.notifications.len() != before
        });
        quiet_forbidden(self.api.delete_notification(id).await)
    }

    /// Stop listening for pushes.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for NotificationFeed {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn quiet_forbidden(result: Result<(), ApiError>) -> Result<(), ApiError> {
    match result {
        Err(e) if e.is_forbidden() => {
            debug!("Notification change not permitted, kept local");
            Ok(())
        }
        other => other,
    }
}
