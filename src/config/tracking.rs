//! Tunables for aggregation, map assembly and workflow views.

use std::time::Duration;

use serde::Deserialize;

/// Live/order aggregation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Snapshot refresh interval in seconds.
    pub poll_interval_secs: u64,
    /// Driver-phone filter for the live view. `None` shows every truck.
    pub driver_phone: Option<String>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            driver_phone: None,
        }
    }
}

impl TrackingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Map assembly settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Truck movement (degrees, either axis) before its route is rebuilt.
    pub movement_threshold_deg: f64,
    /// Breadcrumb points kept per truck.
    pub breadcrumb_capacity: usize,
    /// Minimum movement (degrees) before a breadcrumb is appended.
    pub breadcrumb_epsilon_deg: f64,
    /// Warehouse geofence radius.
    pub geofence_radius_m: f64,
    /// Viewport padding as a fraction of the bounds span.
    pub bounds_padding: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            movement_threshold_deg: 0.01,
            breadcrumb_capacity: 200,
            breadcrumb_epsilon_deg: 0.000_01,
            geofence_radius_m: 500.0,
            bounds_padding: 0.1,
        }
    }
}

/// Workflow view settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Deadlines closer than this are "due soon".
    pub due_soon_hours: i64,
}

/// Longest accepted "due soon" window: one year.
pub const MAX_DUE_SOON_HOURS: i64 = 24 * 365;

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self { due_soon_hours: 24 }
    }
}

impl WorkflowConfig {
    /// The "due soon" window, clamped to `1..=MAX_DUE_SOON_HOURS` hours.
    pub fn due_soon(&self) -> chrono::Duration {
        chrono::Duration::hours(self.due_soon_hours.clamp(1, MAX_DUE_SOON_HOURS))
    }
}
