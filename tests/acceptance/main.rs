//! Acceptance tests for the tracking core using Cucumber.
//!
//! Every scenario runs against in-memory doubles: `MockTrackingApi` for the
//! REST backend, `MockRoutingProvider` for routing and the loopback transport
//! for the realtime channel.
//!
//! ```bash
//! cargo test --test acceptance
//! ```

mod steps;

use cucumber::World;
use steps::live_locations::LiveLocationsWorld;
use steps::order_tracking::OrderTrackingWorld;
use steps::route_cache::RouteCacheWorld;
use steps::route_reconciliation::ReconcileWorld;

#[tokio::main]
async fn main() {
    println!("\n=== Running Route Cache Scenarios ===\n");
    RouteCacheWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/acceptance/features/route_cache.feature")
        .await;

    println!("\n=== Running Live Locations Scenarios ===\n");
    LiveLocationsWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/acceptance/features/live_locations.feature")
        .await;

    println!("\n=== Running Order Tracking Scenarios ===\n");
    OrderTrackingWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/acceptance/features/order_tracking.feature")
        .await;

    println!("\n=== Running Route Reconciliation Scenarios ===\n");
    ReconcileWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/acceptance/features/route_reconciliation.feature")
        .await;
}
