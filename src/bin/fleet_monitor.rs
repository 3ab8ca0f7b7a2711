//! fleet-monitor: headless live fleet view
//!
//! Runs the live locations aggregator against the backend, keeps routes and
//! breadcrumbs reconciled and logs a map scene summary on every change.
//!
//! ## Configuration
//! - First argument: config file path (optional)
//! - FLEET_CONFIG: config file path (optional)
//! - FLEET_*: environment overrides (`FLEET_API__BASE_URL`, ...)
//! - FLEET_LOG: tracing filter (default: info)

use std::sync::Arc;

use tracing::{info, warn};

use fleet_tracker::api::HttpTrackingApi;
use fleet_tracker::config::Config;
use fleet_tracker::interfaces::TrackingApi;
use fleet_tracker::map::{MapScene, RouteReconciler, TruckPaths};
use fleet_tracker::model::WarehouseProximity;
use fleet_tracker::realtime::{RealtimeChannel, RealtimeEvent, WebSocketTransport};
use fleet_tracker::routing::{OsrmProvider, RouteCache};
use fleet_tracker::tracking::{LiveLocations, NotificationFeed};
use fleet_tracker::utils::bootstrap::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;

    let api: Arc<dyn TrackingApi> = Arc::new(HttpTrackingApi::new(&config.api)?);
    let provider = Arc::new(OsrmProvider::new(&config.routing)?);
    let cache = Arc::new(RouteCache::with_capacity(provider, config.routing.cache_capacity));
    let reconciler = RouteReconciler::with_threshold(cache, config.map.movement_threshold_deg);
    let mut paths = TruckPaths::new(
        config.map.breadcrumb_capacity,
        config.map.breadcrumb_epsilon_deg,
    );

    let transport = Arc::new(WebSocketTransport::new(config.realtime.url.clone()));
    let channel = RealtimeChannel::new(transport, config.realtime_token(), config.realtime.clone());
    if let Err(e) = channel.connect().await {
        // The channel keeps retrying in the background; snapshots poll meanwhile.
        warn!(error = %e, "Realtime connection failed, polling until it comes up");
    }

    let warehouses = api.warehouses().await.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load warehouses");
        Vec::new()
    });
    let dealers = api.dealers().await.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load dealers");
        Vec::new()
    });

    let notifications = NotificationFeed::spawn(api.clone(), &channel);
    notifications.fetch().await;
    let mut arrivals = channel.on_warehouse_arrived();
    let mut approaching = channel.on_warehouse_approaching();

    let live = LiveLocations::spawn(
        api.clone(),
        &channel,
        config.tracking.driver_phone.clone(),
        config.tracking.poll_interval(),
    );
    let mut locations = live.watch();

    info!(
        api = %config.api.base_url,
        realtime = %config.realtime.url,
        warehouses = warehouses.len(),
        dealers = dealers.len(),
        unread = notifications.unread_count(),
        "fleet-monitor started"
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = locations.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = locations.borrow_and_update().clone();
                if let Some(error) = &state.error {
                    warn!(error = %error, "Live locations unavailable");
                }

                reconciler.reconcile(&state.locations).await;
                paths.observe(&state.locations);
                let routes = reconciler.routes();

                let scene = MapScene::builder(&config.map)
                    .records(&state.locations)
                    .warehouses(&warehouses)
                    .dealers(&dealers)
                    .routes(&routes)
                    .breadcrumbs(&paths)
                    .build();
                let summary = scene.summary();
                info!(
                    trucks = summary.trucks,
                    warehouses = summary.warehouses,
                    dealers = summary.dealers,
                    routes = summary.routes,
                    fallback_routes = summary.fallback_routes,
                    breadcrumbs = summary.breadcrumbs,
                    at_warehouse = summary.trucks_at_warehouse,
                    revision = reconciler.revision(),
                    "Scene updated"
                );
            }
            Some(event) = arrivals.recv() => {
                if let RealtimeEvent::WarehouseArrived(p) = &*event {
                    log_proximity("Truck arrived at warehouse", p);
                }
            }
            Some(event) = approaching.recv() => {
                if let RealtimeEvent::WarehouseApproaching(p) = &*event {
                    log_proximity("Truck approaching warehouse", p);
                }
            }
        }
    }

    info!("Shutting down");
    live.shutdown().await;
    notifications.shutdown().await;
    channel.disconnect().await;
    Ok(())
}

fn log_proximity(message: &str, proximity: &WarehouseProximity) {
    info!(
        assignment_id = ?proximity.assignment_id,
        truck_id = ?proximity.truck_id,
        warehouse = proximity.warehouse_name.as_deref().unwrap_or("-"),
        "{message}"
    );
}
