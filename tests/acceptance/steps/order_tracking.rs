//! Order tracking step definitions.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when, World};
use serde_json::json;

use fleet_tracker::api::MockTrackingApi;
use fleet_tracker::config::RealtimeConfig;
use fleet_tracker::model::{Assignment, CurrentLocation, Id, OrderTracking};
use fleet_tracker::realtime::events::names;
use fleet_tracker::realtime::{LoopbackServer, LoopbackTransport, RealtimeChannel};
use fleet_tracker::tracking::{OrderTracker, OrderTrackingState};

use super::WAIT;

#[derive(World)]
#[world(init = Self::new)]
pub struct OrderTrackingWorld {
    api: Arc<MockTrackingApi>,
    channel: RealtimeChannel,
    server: LoopbackServer,
    tracker: Option<OrderTracker>,
}

impl fmt::Debug for OrderTrackingWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderTrackingWorld")
            .field("tracking", &self.tracker.as_ref().map(|t| t.state()))
            .finish()
    }
}

impl OrderTrackingWorld {
    fn new() -> Self {
        let (transport, server) = LoopbackTransport::pair();
        Self {
            api: Arc::new(MockTrackingApi::new()),
            channel: RealtimeChannel::new(Arc::new(transport), None, RealtimeConfig::default()),
            server,
            tracker: None,
        }
    }

    fn tracker(&self) -> &OrderTracker {
        self.tracker.as_ref().expect("no order tracked")
    }

    async fn wait(&self, predicate: impl FnMut(&OrderTrackingState) -> bool) -> OrderTrackingState {
        tokio::time::timeout(WAIT, self.tracker().wait_for(predicate))
            .await
            .expect("timed out waiting for order tracking")
            .expect("order tracker stopped")
    }

    async fn track(&mut self, order_id: Option<Id>) {
        let tracker = OrderTracker::spawn(self.api.clone(), &self.channel, order_id);
        self.tracker = Some(tracker);
    }
}

fn snapshot(order: i64) -> OrderTracking {
    OrderTracking {
        order_id: Some(Id::from(order)),
        order_number: Some(format!("ORD-{order}")),
        assignment: Some(Assignment {
            eta: Some("14:30".to_string()),
            ..Assignment::default()
        }),
        current_location: Some(CurrentLocation {
            lat: Some(19.0),
            lng: Some(72.0),
            ..CurrentLocation::default()
        }),
        ..OrderTracking::default()
    }
}

// --- Background ---

#[given(expr = "an order tracking backend with orders {int} and {int}")]
async fn given_backend(world: &mut OrderTrackingWorld, first: i64, second: i64) {
    world.api.set_order(snapshot(first)).await;
    world.api.set_order(snapshot(second)).await;
    world
        .channel
        .connect()
        .await
        .expect("loopback connect failed");
}

// --- Given / When steps ---

#[given(expr = "order {int} is tracked")]
async fn given_order_tracked(world: &mut OrderTrackingWorld, order: i64) {
    world.track(Some(Id::from(order))).await;
    world.wait(|s| s.tracking.is_some()).await;
}

#[when(expr = "order {int} is tracked")]
async fn when_order_tracked(world: &mut OrderTrackingWorld, order: i64) {
    given_order_tracked(world, order).await;
}

#[when("no order is tracked")]
async fn when_no_order(world: &mut OrderTrackingWorld) {
    world.track(None).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[when(expr = "an update for order {int} moves the truck to {float}, {float}")]
async fn when_update_moves(world: &mut OrderTrackingWorld, order: i64, lat: f64, lng: f64) {
    world
        .server
        .push_event(
            names::ORDER_TRACKING_UPDATE,
            json!({"orderId": order, "currentLocation": {"lat": lat, "lng": lng}}),
        )
        .await;
}

#[when(expr = "an update for order {int} sets the ETA to {string}")]
async fn when_update_eta(world: &mut OrderTrackingWorld, order: i64, eta: String) {
    world
        .server
        .push_event(
            names::ORDER_TRACKING_UPDATE,
            json!({"orderId": order, "assignment": {"eta": eta}}),
        )
        .await;
}

// --- Then steps ---

#[then(expr = "the tracking shows order number {string}")]
async fn then_order_number(world: &mut OrderTrackingWorld, number: String) {
    let state = world.tracker().state();
    let tracking = state.tracking.expect("no tracking");
    assert_eq!(tracking.order_number.as_deref(), Some(number.as_str()));
}

#[then(expr = "the room for order {int} was joined")]
async fn then_room_joined(world: &mut OrderTrackingWorld, order: i64) {
    tokio::time::timeout(WAIT, world.server.wait_for_sent(1))
        .await
        .expect("no frame sent");
    let sent = world.server.sent();
    assert_eq!(sent[0].event, names::ORDER_JOIN);
    assert_eq!(sent[0].data, json!({"orderId": order.to_string()}));
}

#[then(expr = "the ETA is {string}")]
async fn then_eta(world: &mut OrderTrackingWorld, eta: String) {
    let state = world
        .wait(|s| {
            s.tracking
                .as_ref()
                .and_then(|t| t.assignment.as_ref())
                .and_then(|a| a.eta.as_deref())
                == Some(eta.as_str())
        })
        .await;
    assert_eq!(state.patches, 1);
}

#[then(expr = "the truck for order {int} is still at {float}, {float}")]
async fn then_truck_unchanged(world: &mut OrderTrackingWorld, order: i64, lat: f64, lng: f64) {
    // Wait for the later, matching update so the foreign one has been processed.
    let state = world.wait(|s| s.patches >= 1).await;
    assert_eq!(state.order_id, Some(Id::from(order)));
    let location = state
        .tracking
        .and_then(|t| t.current_location)
        .expect("no current location");
    assert_eq!((location.lat, location.lng), (Some(lat), Some(lng)));
}

#[then("no order was fetched")]
async fn then_no_fetch(world: &mut OrderTrackingWorld) {
    assert!(world.api.order_requests().await.is_empty());
    assert!(!world.tracker().state().loading);
}

#[then("no room was joined")]
async fn then_no_room(world: &mut OrderTrackingWorld) {
    assert!(world.server.sent().is_empty());
    assert!(world.channel.rooms().is_empty());
}
