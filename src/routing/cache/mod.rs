//! Bounded route memo in front of a [`RoutingProvider`].
//!
//! Keys are both endpoints rounded to 4 decimals (`"lat1,lng1-lat2,lng2"`),
//! so positions within ~11m share a route. Entries are evicted oldest-first
//! once the capacity is reached. Concurrent misses for the same key each call
//! the provider; the last result wins.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::interfaces::routing::{Result, RoutingError, RoutingProvider};
use crate::model::LatLng;

/// Default number of cached routes.
pub const DEFAULT_CAPACITY: usize = 100;

/// Cache key for a pair of endpoints.
pub fn route_key(from: LatLng, to: LatLng) -> String {
    format!("{}-{}", from.rounded_key(), to.rounded_key())
}

#[derive(Default)]
struct Entries {
    routes: HashMap<String, Vec<LatLng>>,
    order: VecDeque<String>,
}

/// Route cache shared by every map consumer.
pub struct RouteCache {
    provider: Arc<dyn RoutingProvider>,
    capacity: usize,
    entries: Mutex<Entries>,
}

impl RouteCache {
    pub fn new(provider: Arc<dyn RoutingProvider>) -> Self {
        Self::with_capacity(provider, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(provider: Arc<dyn RoutingProvider>, capacity: usize) -> Self {
        Self {
            provider,
            capacity: capacity.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Route between two points, or a straight 2-point line if the provider fails.
    pub async fn get_cached_route(&self, from: LatLng, to: LatLng) -> Vec<LatLng> {
        match self.try_route(from, to).await {
            Ok(path) => path,
            Err(e) => {
                warn!(
                    provider = self.provider.name(),
                    key = %route_key(from, to),
                    error = %e,
                    "Routing failed, using straight line"
                );
                vec![from, to]
            }
        }
    }

    /// Route between two points, surfacing provider failures. Failures are not cached.
    pub async fn try_route(&self, from: LatLng, to: LatLng) -> Result<Vec<LatLng>> {
        let key = route_key(from, to);

        if let Some(path) = self.lock().routes.get(&key) {
            debug!(key = %key, "Route cache hit");
            return Ok(path.clone());
        }

        debug!(key = %key, provider = self.provider.name(), "Route cache miss");
        let path = self.provider.route(from, to).await?;
        if path.is_empty() {
            return Err(RoutingError::NoRoute(key));
        }

        self.insert(key, path.clone());
        Ok(path)
    }

    fn insert(&self, key: String, path: Vec<LatLng>) {
        let mut entries = self.lock();

        if let Some(existing) = entries.routes.get_mut(&key) {
            *existing = path;
            return;
        }

        while entries.routes.len() >= self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.routes.remove(&oldest);
            debug!(key = %oldest, "Evicted oldest route");
        }

        entries.order.push_back(key.clone());
        entries.routes.insert(key, path);
    }

    /// Whether a route for these endpoints is cached.
    pub fn contains(&self, from: LatLng, to: LatLng) -> bool {
        self.lock().routes.contains_key(&route_key(from, to))
    }

    pub fn len(&self) -> usize {
        self.lock().routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.routes.clear();
        entries.order.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // Entries stay consistent even if a holder panicked; never held across await.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
