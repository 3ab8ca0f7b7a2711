//! Route reconciliation step definitions.

use std::fmt;
use std::sync::Arc;

use cucumber::{given, then, when, World};

use fleet_tracker::map::{ReconcileReport, RouteReconciler};
use fleet_tracker::model::{Dealer, Id, LatLng, LocationRecord, RecordKey, TruckPosition, Warehouse};
use fleet_tracker::routing::{MockRoutingProvider, RouteCache};

#[derive(World)]
#[world(init = Self::new)]
pub struct ReconcileWorld {
    provider: Arc<MockRoutingProvider>,
    reconciler: RouteReconciler,
    records: Vec<LocationRecord>,
    last_report: ReconcileReport,
}

impl fmt::Debug for ReconcileWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcileWorld")
            .field("records", &self.records.len())
            .field("last_report", &self.last_report)
            .finish()
    }
}

impl ReconcileWorld {
    fn new() -> Self {
        let provider = Arc::new(MockRoutingProvider::new());
        let cache = Arc::new(RouteCache::new(provider.clone()));
        Self {
            provider,
            reconciler: RouteReconciler::new(cache),
            records: Vec::new(),
            last_report: ReconcileReport::default(),
        }
    }

    fn record_mut(&mut self, assignment: i64) -> &mut LocationRecord {
        let id = Id::from(assignment);
        self.records
            .iter_mut()
            .find(|r| r.assignment_id.as_ref() == Some(&id))
            .expect("unknown assignment")
    }

    async fn reconcile(&mut self) {
        self.last_report = self.reconciler.reconcile(&self.records).await;
    }
}

fn key(assignment: i64) -> RecordKey {
    RecordKey::Assignment(Id::from(assignment))
}

// --- Background ---

#[given("a route reconciler")]
async fn given_reconciler(_world: &mut ReconcileWorld) {}

#[given(
    expr = "assignment {int} from warehouse {float}, {float} to dealer {float}, {float} with the truck at {float}, {float}"
)]
#[allow(clippy::too_many_arguments)]
async fn given_assignment(
    world: &mut ReconcileWorld,
    assignment: i64,
    wh_lat: f64,
    wh_lng: f64,
    dealer_lat: f64,
    dealer_lng: f64,
    truck_lat: f64,
    truck_lng: f64,
) {
    world.records.push(LocationRecord {
        assignment_id: Some(Id::from(assignment)),
        truck: TruckPosition {
            lat: Some(truck_lat),
            lng: Some(truck_lng),
            ..TruckPosition::default()
        },
        warehouse: Some(Warehouse {
            lat: Some(wh_lat),
            lng: Some(wh_lng),
            ..Warehouse::default()
        }),
        dealer: Some(Dealer {
            lat: Some(dealer_lat),
            lng: Some(dealer_lng),
            ..Dealer::default()
        }),
        ..LocationRecord::default()
    });
}

// --- Given steps ---

#[given(expr = "the provider fails between {float}, {float} and {float}, {float}")]
async fn given_provider_fails(
    world: &mut ReconcileWorld,
    from_lat: f64,
    from_lng: f64,
    to_lat: f64,
    to_lng: f64,
) {
    world
        .provider
        .fail_between(LatLng::new(from_lat, from_lng), LatLng::new(to_lat, to_lng));
}

#[given("routes are reconciled")]
async fn given_reconciled(world: &mut ReconcileWorld) {
    world.reconcile().await;
}

// --- When steps ---

#[when("routes are reconciled")]
async fn when_reconciled(world: &mut ReconcileWorld) {
    world.reconcile().await;
}

#[when(expr = "the truck for assignment {int} moves to {float}, {float}")]
async fn when_truck_moves(world: &mut ReconcileWorld, assignment: i64, lat: f64, lng: f64) {
    let record = world.record_mut(assignment);
    record.truck.lat = Some(lat);
    record.truck.lng = Some(lng);
}

// --- Then steps ---

#[then(expr = "the route for assignment {int} is exactly {float}, {float} then {float}, {float}")]
async fn then_route_exact(
    world: &mut ReconcileWorld,
    assignment: i64,
    from_lat: f64,
    from_lng: f64,
    to_lat: f64,
    to_lng: f64,
) {
    let route = world.reconciler.route(&key(assignment)).expect("no route");
    assert_eq!(
        route.points,
        vec![LatLng::new(from_lat, from_lng), LatLng::new(to_lat, to_lng)]
    );
}

#[then(expr = "the route for assignment {int} is marked as a fallback")]
async fn then_route_fallback(world: &mut ReconcileWorld, assignment: i64) {
    let route = world.reconciler.route(&key(assignment)).expect("no route");
    assert!(route.fallback);
}

#[then(expr = "the last pass routed {int} assignment(s)")]
async fn then_pass_routed(world: &mut ReconcileWorld, count: usize) {
    assert_eq!(world.last_report.requested, count);
}
