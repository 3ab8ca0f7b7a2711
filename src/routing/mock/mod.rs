//! Mock RoutingProvider implementation for testing.
//!
//! Routes are three points (from, midpoint, to) so they are distinguishable
//! from the straight-line fallback.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::interfaces::routing::{Result, RoutingError, RoutingProvider};
use crate::model::LatLng;
use crate::routing::cache::route_key;

/// Scripted routing provider.
pub struct MockRoutingProvider {
    calls: AtomicUsize,
    fail_all: AtomicBool,
    failing: Mutex<HashSet<String>>,
    requests: Mutex<Vec<(LatLng, LatLng)>>,
    paused: watch::Sender<bool>,
    pending: watch::Sender<usize>,
}

impl Default for MockRoutingProvider {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_all: AtomicBool::new(false),
            failing: Mutex::default(),
            requests: Mutex::default(),
            paused: watch::channel(false).0,
            pending: watch::channel(0).0,
        }
    }
}

impl MockRoutingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `route` calls so far (including failed ones).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Endpoints of every request, in call order.
    pub fn requests(&self) -> Vec<(LatLng, LatLng)> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Fail every request with HTTP 500.
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Fail requests between these endpoints (after key rounding) with HTTP 500.
    pub fn fail_between(&self, from: LatLng, to: LatLng) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(route_key(from, to));
        }
    }

    /// Hold every request until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Wait until at least `count` requests are blocked on [`pause`](Self::pause).
    pub async fn wait_for_pending(&self, count: usize) {
        let mut rx = self.pending.subscribe();
        let _ = rx.wait_for(|pending| *pending >= count).await;
    }

    fn should_fail(&self, from: LatLng, to: LatLng) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        self.failing
            .lock()
            .map(|failing| failing.contains(&route_key(from, to)))
            .unwrap_or(false)
    }
}

#[async_trait]
impl RoutingProvider for MockRoutingProvider {
    async fn route(&self, from: LatLng, to: LatLng) -> Result<Vec<LatLng>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((from, to));
        }

        let mut paused = self.paused.subscribe();
        if *paused.borrow() {
            self.pending.send_modify(|p| *p += 1);
            let _ = paused.wait_for(|p| !*p).await;
            self.pending.send_modify(|p| *p -= 1);
        }

        if self.should_fail(from, to) {
            return Err(RoutingError::Status(500));
        }

        let mid = LatLng::new((from.lat + to.lat) / 2.0, (from.lng + to.lng) / 2.0);
        Ok(vec![from, mid, to])
    }

    fn name(&self) -> &str {
        "mock"
    }
}
