//! Route cache step definitions.

use std::fmt;
use std::sync::Arc;

use cucumber::{given, then, when, World};

use fleet_tracker::model::LatLng;
use fleet_tracker::routing::{MockRoutingProvider, RouteCache};

#[derive(World)]
#[world(init = Self::new)]
pub struct RouteCacheWorld {
    provider: Arc<MockRoutingProvider>,
    cache: Option<RouteCache>,
    last_route: Vec<LatLng>,
    requested: Vec<(LatLng, LatLng)>,
}

impl fmt::Debug for RouteCacheWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteCacheWorld")
            .field("provider_calls", &self.provider.calls())
            .field("last_route", &self.last_route)
            .finish()
    }
}

impl RouteCacheWorld {
    fn new() -> Self {
        Self {
            provider: Arc::new(MockRoutingProvider::new()),
            cache: None,
            last_route: Vec::new(),
            requested: Vec::new(),
        }
    }

    fn cache(&self) -> &RouteCache {
        self.cache.as_ref().expect("route cache not created")
    }

    async fn request(&mut self, from: LatLng, to: LatLng) {
        self.last_route = self.cache().get_cached_route(from, to).await;
        self.requested.push((from, to));
    }
}

// --- Background ---

#[given(expr = "a route cache with capacity {int}")]
async fn given_cache(world: &mut RouteCacheWorld, capacity: usize) {
    world.cache = Some(RouteCache::with_capacity(world.provider.clone(), capacity));
}

// --- Given steps ---

#[given("the provider fails every request")]
async fn given_provider_fails(world: &mut RouteCacheWorld) {
    world.provider.set_fail_all(true);
}

// --- When steps ---

#[when(expr = "a route is requested from {float}, {float} to {float}, {float}")]
async fn when_requested(
    world: &mut RouteCacheWorld,
    from_lat: f64,
    from_lng: f64,
    to_lat: f64,
    to_lng: f64,
) {
    world
        .request(LatLng::new(from_lat, from_lng), LatLng::new(to_lat, to_lng))
        .await;
}

#[when(expr = "{int} distinct routes are requested")]
async fn when_many_requested(world: &mut RouteCacheWorld, count: usize) {
    let dealer = LatLng::new(18.52, 73.85);
    for i in 0..count {
        let from = LatLng::new(19.0 + i as f64 * 0.001, 72.0);
        world.request(from, dealer).await;
    }
}

// --- Then steps ---

#[then(expr = "the provider was called {int} time(s)")]
async fn then_provider_calls(world: &mut RouteCacheWorld, calls: usize) {
    assert_eq!(world.provider.calls(), calls);
}

#[then(expr = "the last route has {int} points")]
async fn then_route_points(world: &mut RouteCacheWorld, points: usize) {
    assert_eq!(world.last_route.len(), points);
}

#[then(expr = "the last route is the straight line from {float}, {float} to {float}, {float}")]
async fn then_straight_line(
    world: &mut RouteCacheWorld,
    from_lat: f64,
    from_lng: f64,
    to_lat: f64,
    to_lng: f64,
) {
    assert_eq!(
        world.last_route,
        vec![LatLng::new(from_lat, from_lng), LatLng::new(to_lat, to_lng)]
    );
}

#[then(expr = "the cache holds {int} route(s)")]
async fn then_cache_size(world: &mut RouteCacheWorld, size: usize) {
    assert_eq!(world.cache().len(), size);
}

#[then("the first route is no longer cached")]
async fn then_first_evicted(world: &mut RouteCacheWorld) {
    let (from, to) = world.requested[0];
    assert!(!world.cache().contains(from, to));
}

#[then("the second route is still cached")]
async fn then_second_kept(world: &mut RouteCacheWorld) {
    let (from, to) = world.requested[1];
    assert!(world.cache().contains(from, to));
}
