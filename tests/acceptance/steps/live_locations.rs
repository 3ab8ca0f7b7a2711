//! Live locations step definitions.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cucumber::{given, then, when, World};
use serde_json::{json, Value};

use fleet_tracker::api::MockTrackingApi;
use fleet_tracker::config::RealtimeConfig;
use fleet_tracker::model::{Id, LocationRecord, TruckPosition};
use fleet_tracker::realtime::events::names;
use fleet_tracker::realtime::{LoopbackServer, LoopbackTransport, RealtimeChannel};
use fleet_tracker::tracking::{LiveLocations, LiveLocationsState};

use super::WAIT;

/// Polling is effectively off; scenarios drive refetches explicitly.
const NO_POLL: Duration = Duration::from_secs(3600);

#[derive(World)]
#[world(init = Self::new)]
pub struct LiveLocationsWorld {
    api: Arc<MockTrackingApi>,
    channel: RealtimeChannel,
    server: LoopbackServer,
    records: Vec<LocationRecord>,
    live: Option<LiveLocations>,
}

impl fmt::Debug for LiveLocationsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveLocationsWorld")
            .field("records", &self.records.len())
            .field("running", &self.live.is_some())
            .finish()
    }
}

impl LiveLocationsWorld {
    fn new() -> Self {
        let (transport, server) = LoopbackTransport::pair();
        Self {
            api: Arc::new(MockTrackingApi::new()),
            channel: RealtimeChannel::new(Arc::new(transport), None, RealtimeConfig::default()),
            server,
            records: Vec::new(),
            live: None,
        }
    }

    fn live(&self) -> &LiveLocations {
        self.live.as_ref().expect("live view not started")
    }

    async fn wait(&self, predicate: impl FnMut(&LiveLocationsState) -> bool) -> LiveLocationsState {
        tokio::time::timeout(WAIT, self.live().wait_for(predicate))
            .await
            .expect("timed out waiting for live view")
            .expect("live view stopped")
    }

    async fn add_record(&mut self, record: LocationRecord) {
        self.records.push(record);
        self.api.set_locations(self.records.clone()).await;
    }

    async fn start(&mut self, filter: Option<String>) {
        let live = LiveLocations::spawn(self.api.clone(), &self.channel, filter, NO_POLL);
        self.live = Some(live);
        self.wait(|s| s.fetches >= 1).await;
    }

    async fn push_delta(&self, data: Value) {
        assert!(
            self.server.push_event(names::LOCATION_UPDATE, data).await,
            "realtime channel not connected"
        );
    }
}

fn record(assignment: i64, phone: &str, lat: f64, lng: f64) -> LocationRecord {
    LocationRecord {
        assignment_id: Some(Id::from(assignment)),
        driver_phone: Some(phone.to_string()),
        truck: TruckPosition {
            lat: Some(lat),
            lng: Some(lng),
            ..TruckPosition::default()
        },
        ..LocationRecord::default()
    }
}

fn located(state: &LiveLocationsState, assignment: i64) -> Option<&LocationRecord> {
    let id = Id::from(assignment);
    state
        .locations
        .iter()
        .find(|r| r.assignment_id.as_ref() == Some(&id))
}

// --- Background ---

#[given("a live locations backend")]
async fn given_backend(world: &mut LiveLocationsWorld) {
    world
        .channel
        .connect()
        .await
        .expect("loopback connect failed");
}

// --- Given steps ---

#[given(expr = "the snapshot has assignment {int} driven by {string} at {float}, {float}")]
async fn given_snapshot_record(
    world: &mut LiveLocationsWorld,
    assignment: i64,
    phone: String,
    lat: f64,
    lng: f64,
) {
    world.add_record(record(assignment, &phone, lat, lng)).await;
}

#[given(
    expr = "the snapshot has assignment {int} driven by {string} at {float}, {float} updated at {string}"
)]
async fn given_snapshot_record_at(
    world: &mut LiveLocationsWorld,
    assignment: i64,
    phone: String,
    lat: f64,
    lng: f64,
    updated: String,
) {
    let mut record = record(assignment, &phone, lat, lng);
    let updated: DateTime<Utc> = updated.parse().expect("bad timestamp");
    record.truck.last_update = Some(updated);
    world.add_record(record).await;
}

#[given("an empty snapshot")]
async fn given_empty_snapshot(world: &mut LiveLocationsWorld) {
    world.records.clear();
    world.api.set_locations(Vec::new()).await;
}

#[given("the live view is running")]
async fn given_running(world: &mut LiveLocationsWorld) {
    world.start(None).await;
}

#[given(expr = "the live view is running for driver {string}")]
async fn given_running_for_driver(world: &mut LiveLocationsWorld, phone: String) {
    world.start(Some(phone)).await;
}

// --- When steps ---

#[when(expr = "a location delta for assignment {int} arrives at {float}, {float}")]
async fn when_delta(world: &mut LiveLocationsWorld, assignment: i64, lat: f64, lng: f64) {
    world
        .push_delta(json!({"assignmentId": assignment, "lat": lat, "lng": lng}))
        .await;
}

#[when(expr = "a location delta for assignment {int} arrives at {float}, {float} stamped {string}")]
async fn when_stamped_delta(
    world: &mut LiveLocationsWorld,
    assignment: i64,
    lat: f64,
    lng: f64,
    stamp: String,
) {
    world
        .push_delta(json!({"assignmentId": assignment, "lat": lat, "lng": lng, "timestamp": stamp}))
        .await;
}

#[when(expr = "a location delta for assignment {int} from driver {string} arrives at {float}, {float}")]
async fn when_foreign_delta(
    world: &mut LiveLocationsWorld,
    assignment: i64,
    phone: String,
    lat: f64,
    lng: f64,
) {
    world
        .push_delta(json!({
            "assignmentId": assignment,
            "driverPhone": phone,
            "lat": lat,
            "lng": lng,
        }))
        .await;
    // Nothing observable changes; give the aggregator time to drop it.
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[when(expr = "the snapshot gains assignment {int} driven by {string} at {float}, {float}")]
async fn when_snapshot_gains(
    world: &mut LiveLocationsWorld,
    assignment: i64,
    phone: String,
    lat: f64,
    lng: f64,
) {
    world.add_record(record(assignment, &phone, lat, lng)).await;
}

#[when(expr = "the backend starts failing with {string}")]
async fn when_backend_fails(world: &mut LiveLocationsWorld, message: String) {
    world.api.set_fail_on_locations(Some(&message)).await;
}

#[when("the live view refetches")]
async fn when_refetch(world: &mut LiveLocationsWorld) {
    world.live().refetch();
}

// --- Then steps ---

#[then(expr = "assignment {int} is at {float}, {float}")]
async fn then_at(world: &mut LiveLocationsWorld, assignment: i64, lat: f64, lng: f64) {
    world
        .wait(|s| {
            located(s, assignment)
                .is_some_and(|r| r.truck.lat == Some(lat) && r.truck.lng == Some(lng))
        })
        .await;
}

#[then(expr = "assignment {int} is still driven by {string}")]
async fn then_driven_by(world: &mut LiveLocationsWorld, assignment: i64, phone: String) {
    let state = world.live().state();
    let record = located(&state, assignment).expect("assignment missing");
    assert_eq!(record.driver_phone.as_deref(), Some(phone.as_str()));
}

#[then(expr = "the snapshot was fetched {int} time(s)")]
async fn then_fetched(world: &mut LiveLocationsWorld, times: usize) {
    tokio::time::timeout(WAIT, world.api.wait_for_location_calls(times))
        .await
        .expect("timed out waiting for snapshot fetches");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(world.api.location_calls(), times);
}

#[then(expr = "the view shows {int} truck(s)")]
async fn then_shows(world: &mut LiveLocationsWorld, count: usize) {
    world.wait(|s| s.locations.len() == count).await;
}

#[then(expr = "the view reports an error containing {string}")]
async fn then_error(world: &mut LiveLocationsWorld, message: String) {
    let state = world.wait(|s| s.error.is_some()).await;
    let error = state.error.unwrap_or_default();
    assert!(error.contains(&message), "unexpected error: {error}");
}
