use std::time::Duration;

use serde_json::json;

use super::*;
use crate::api::MockTrackingApi;
use crate::config::RealtimeConfig;
use crate::model::{Assignment, CurrentLocation, OrderTrackingUpdate, TrackingStarted};
use crate::realtime::events::names;
use crate::realtime::{EventKind, LoopbackServer, LoopbackTransport};

const WAIT: Duration = Duration::from_secs(2);

fn snapshot(order: i64) -> OrderTracking {
    OrderTracking {
        order_id: Some(Id::from(order)),
        order_number: Some(format!("ORD-{order}")),
        status: Some("dispatched".to_string()),
        assignment: Some(Assignment {
            id: Some(Id::from(9)),
            driver_name: Some("Ravi".to_string()),
            eta: Some("14:30".to_string()),
            ..Assignment::default()
        }),
        current_location: Some(CurrentLocation {
            lat: Some(19.0),
            lng: Some(72.0),
            speed: Some(40.0),
            ..CurrentLocation::default()
        }),
        ..OrderTracking::default()
    }
}

async fn setup() -> (Arc<MockTrackingApi>, RealtimeChannel, LoopbackServer) {
    let api = Arc::new(MockTrackingApi::new());
    api.set_order(snapshot(123)).await;
    api.set_order(snapshot(456)).await;

    let (transport, server) = LoopbackTransport::pair();
    let channel = RealtimeChannel::new(Arc::new(transport), None, RealtimeConfig::default());
    channel.connect().await.unwrap();
    (api, channel, server)
}

async fn wait(
    tracker: &OrderTracker,
    predicate: impl FnMut(&OrderTrackingState) -> bool,
) -> OrderTrackingState {
    tokio::time::timeout(WAIT, tracker.wait_for(predicate))
        .await
        .expect("timed out waiting for state")
        .expect("tracker stopped")
}

fn sent_events(server: &LoopbackServer) -> Vec<(String, serde_json::Value)> {
    server
        .sent()
        .into_iter()
        .map(|frame| (frame.event, frame.data))
        .collect()
}

#[tokio::test]
async fn test_absent_order_id_is_noop() {
    let (api, channel, server) = setup().await;

    for order_id in [None, Some(Id::new("")), Some(Id::new("  "))] {
        let tracker = OrderTracker::spawn(api.clone(), &channel, order_id);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let state = tracker.state();
        assert!(!state.loading);
        assert!(state.tracking.is_none());
        tracker.shutdown().await;
    }

    assert!(api.order_requests().await.is_empty());
    assert!(server.sent().is_empty());
    assert_eq!(channel.bus().subscriber_count(EventKind::OrderTrackingUpdate), 0);
}

#[tokio::test]
async fn test_start_fetches_and_joins_room() {
    let (api, channel, server) = setup().await;
    let tracker = OrderTracker::spawn(api.clone(), &channel, Some(Id::from(123)));

    let state = wait(&tracker, |s| s.tracking.is_some()).await;
    assert!(!state.loading);
    assert_eq!(
        state.tracking.unwrap().order_number.as_deref(),
        Some("ORD-123")
    );

    server.wait_for_sent(1).await;
    assert_eq!(
        sent_events(&server),
        vec![("order:join".to_string(), json!({"orderId": "123"}))]
    );
    assert_eq!(api.order_requests().await, vec![Id::from(123)]);
}

#[tokio::test]
async fn test_update_for_other_order_is_ignored() {
    let (api, channel, server) = setup().await;
    let tracker = OrderTracker::spawn(api, &channel, Some(Id::from(123)));
    let before = wait(&tracker, |s| s.tracking.is_some()).await;

    server
        .push_event(
            names::ORDER_TRACKING_UPDATE,
            json!({"orderId": 456, "currentLocation": {"lat": 1.0, "lng": 1.0}}),
        )
        .await;
    // A matching update afterwards proves the first one was processed.
    server
        .push_event(
            names::ORDER_TRACKING_UPDATE,
            json!({"orderId": "123", "assignment": {"eta": "15:00"}}),
        )
        .await;

    let after = wait(&tracker, |s| s.patches == 1).await;
    let tracking = after.tracking.unwrap();
    assert_eq!(tracking.current_location, before.tracking.unwrap().current_location);
}

#[tokio::test]
async fn test_update_merges_assignment_and_replaces_location() {
    let (api, channel, _server) = setup().await;
    let tracker = OrderTracker::spawn(api, &channel, Some(Id::from(123)));
    wait(&tracker, |s| s.tracking.is_some()).await;

    channel
        .bus()
        .publish(RealtimeEvent::OrderTrackingUpdate(OrderTrackingUpdate {
            order_id: Id::from(123),
            assignment: Some(Assignment {
                eta: Some("15:10".to_string()),
                ..Assignment::default()
            }),
            current_location: Some(CurrentLocation {
                lat: Some(19.2),
                lng: Some(72.2),
                ..CurrentLocation::default()
            }),
        }));

    let state = wait(&tracker, |s| s.patches == 1).await;
    let tracking = state.tracking.unwrap();
    let assignment = tracking.assignment.unwrap();
    assert_eq!(assignment.eta.as_deref(), Some("15:10"));
    assert_eq!(assignment.driver_name.as_deref(), Some("Ravi"));

    let location = tracking.current_location.unwrap();
    assert_eq!(location.lat, Some(19.2));
    assert_eq!(location.speed, None);
}

#[tokio::test]
async fn test_tracking_started_overwrites_present_fields() {
    let (api, channel, _server) = setup().await;
    let tracker = OrderTracker::spawn(api, &channel, Some(Id::from(123)));
    wait(&tracker, |s| s.tracking.is_some()).await;

    channel
        .bus()
        .publish(RealtimeEvent::TrackingStarted(TrackingStarted {
            order_id: Id::from(123),
            order_number: None,
            status: Some("in_transit".to_string()),
            assignment: None,
            current_location: None,
            warehouse: None,
            dealer: None,
        }));

    let state = wait(&tracker, |s| s.patches == 1).await;
    let tracking = state.tracking.unwrap();
    assert_eq!(tracking.status.as_deref(), Some("in_transit"));
    assert_eq!(tracking.order_number.as_deref(), Some("ORD-123"));
    assert!(tracking.assignment.is_some());
}

#[tokio::test]
async fn test_retarget_leaves_old_room_and_joins_new() {
    let (api, channel, server) = setup().await;
    let tracker = OrderTracker::spawn(api.clone(), &channel, Some(Id::from(123)));
    wait(&tracker, |s| s.tracking.is_some()).await;

    tracker.retarget(Some(Id::from(456)));
    let state = wait(&tracker, |s| {
        s.order_id == Some(Id::from(456)) && s.tracking.is_some()
    })
    .await;
    assert_eq!(
        state.tracking.unwrap().order_number.as_deref(),
        Some("ORD-456")
    );

    server.wait_for_sent(3).await;
    let events: Vec<_> = sent_events(&server)
        .into_iter()
        .map(|(event, data)| format!("{event} {}", data["orderId"]))
        .collect();
    assert_eq!(
        events,
        vec![
            "order:join \"123\"",
            "order:leave \"123\"",
            "order:join \"456\""
        ]
    );
    assert_eq!(api.order_requests().await, vec![Id::from(123), Id::from(456)]);
}

#[tokio::test]
async fn test_fetch_failure_sets_error() {
    let (api, channel, _server) = setup().await;
    api.set_fail_on_order(true).await;
    let tracker = OrderTracker::spawn(api, &channel, Some(Id::from(123)));

    let state = wait(&tracker, |s| s.error.is_some()).await;
    assert!(!state.loading);
    assert!(state.tracking.is_none());
}

#[tokio::test]
async fn test_shutdown_leaves_room_and_unsubscribes() {
    let (api, channel, server) = setup().await;
    let tracker = OrderTracker::spawn(api, &channel, Some(Id::from(123)));
    wait(&tracker, |s| s.tracking.is_some()).await;

    tracker.shutdown().await;
    server.wait_for_sent(2).await;

    assert_eq!(server.sent()[1].event, "order:leave");
    assert!(channel.rooms().is_empty());
    assert_eq!(channel.bus().subscriber_count(EventKind::OrderTrackingUpdate), 0);
    assert_eq!(channel.bus().subscriber_count(EventKind::TrackingStarted), 0);
}
