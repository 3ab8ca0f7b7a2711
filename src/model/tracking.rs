//! Per-order tracking snapshot and its realtime patches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geo::LatLng;
use super::lenient::{f64_opt, id_opt, text_opt, timestamp_opt, Id};
use super::location::{AssignmentStatus, Dealer, Warehouse};

/// Truck assignment attached to an order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Assignment {
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub id: Option<Id>,
    pub status: Option<AssignmentStatus>,
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub truck_id: Option<Id>,
    pub truck_name: Option<String>,
    pub driver_name: Option<String>,
    #[serde(deserialize_with = "text_opt::deserialize")]
    pub driver_phone: Option<String>,
    #[serde(deserialize_with = "text_opt::deserialize")]
    pub eta: Option<String>,
    pub distance_text: Option<String>,
    pub duration_text: Option<String>,
    #[serde(deserialize_with = "timestamp_opt::deserialize")]
    pub started_at: Option<DateTime<Utc>>,
}

impl Assignment {
    /// Shallow merge: every field present in `patch` overwrites ours.
    pub fn merge(&mut self, patch: Assignment) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if patch.$field.is_some() { self.$field = patch.$field; })*
            };
        }
        take!(
            id,
            status,
            truck_id,
            truck_name,
            driver_name,
            driver_phone,
            eta,
            distance_text,
            duration_text,
            started_at
        );
    }
}

/// Last reported truck position for an order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CurrentLocation {
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub lat: Option<f64>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub lng: Option<f64>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub speed: Option<f64>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub heading: Option<f64>,
    #[serde(deserialize_with = "timestamp_opt::deserialize")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl CurrentLocation {
    pub fn position(&self) -> Option<LatLng> {
        LatLng::from_parts(self.lat, self.lng)
    }
}

/// Tracking snapshot for one order (`GET /tracking/order/:id`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderTracking {
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub order_id: Option<Id>,
    #[serde(deserialize_with = "text_opt::deserialize")]
    pub order_number: Option<String>,
    pub status: Option<String>,
    pub assignment: Option<Assignment>,
    pub current_location: Option<CurrentLocation>,
    pub warehouse: Option<Warehouse>,
    pub dealer: Option<Dealer>,
}

impl OrderTracking {
    /// Apply an `order:tracking:update` patch.
    ///
    /// The assignment merges shallowly; the current location is replaced whole.
    pub fn apply_update(&mut self, update: OrderTrackingUpdate) {
        if let Some(patch) = update.assignment {
            match self.assignment.as_mut() {
                Some(existing) => existing.merge(patch),
                None => self.assignment = Some(patch),
            }
        }
        if update.current_location.is_some() {
            self.current_location = update.current_location;
        }
    }

    /// Apply a `tracking:started` event: top-level fields it carries overwrite ours.
    pub fn extend_with(&mut self, started: TrackingStarted) {
        self.order_id = Some(started.order_id);
        if started.order_number.is_some() {
            self.order_number = started.order_number;
        }
        if started.status.is_some() {
            self.status = started.status;
        }
        if started.assignment.is_some() {
            self.assignment = started.assignment;
        }
        if started.current_location.is_some() {
            self.current_location = started.current_location;
        }
        if started.warehouse.is_some() {
            self.warehouse = started.warehouse;
        }
        if started.dealer.is_some() {
            self.dealer = started.dealer;
        }
    }
}

/// Realtime patch for one order (`order:tracking:update`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTrackingUpdate {
    pub order_id: Id,
    #[serde(default)]
    pub assignment: Option<Assignment>,
    #[serde(default)]
    pub current_location: Option<CurrentLocation>,
}

/// Realtime notice that tracking began for an order (`tracking:started`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStarted {
    pub order_id: Id,
    #[serde(default, deserialize_with = "text_opt::deserialize")]
    pub order_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub assignment: Option<Assignment>,
    #[serde(default)]
    pub current_location: Option<CurrentLocation>,
    #[serde(default)]
    pub warehouse: Option<Warehouse>,
    #[serde(default)]
    pub dealer: Option<Dealer>,
}

impl From<TrackingStarted> for OrderTracking {
    fn from(started: TrackingStarted) -> Self {
        let mut tracking = OrderTracking::default();
        tracking.extend_with(started);
        tracking
    }
}
