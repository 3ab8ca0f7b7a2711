//! Live location records and the realtime deltas merged into them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geo::LatLng;
use super::lenient::{f64_opt, id_opt, text_opt, timestamp_opt, Id};

/// Lifecycle status of a truck assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Assigned,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
    Delayed,
    OnHold,
    /// Any status string this client does not know about.
    #[serde(other)]
    Unknown,
}

impl AssignmentStatus {
    /// True once the load has left the warehouse.
    pub fn is_past_pickup(&self) -> bool {
        matches!(
            self,
            AssignmentStatus::PickedUp | AssignmentStatus::InTransit | AssignmentStatus::Delayed
        )
    }

    /// True for assignments that no longer move.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentStatus::Delivered | AssignmentStatus::Cancelled)
    }
}

/// Current truck telemetry nested inside a [`LocationRecord`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TruckPosition {
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub id: Option<Id>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub lat: Option<f64>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub lng: Option<f64>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub speed: Option<f64>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub heading: Option<f64>,
    #[serde(deserialize_with = "timestamp_opt::deserialize")]
    pub last_update: Option<DateTime<Utc>>,
    pub truck_name: Option<String>,
    pub license_number: Option<String>,
}

impl TruckPosition {
    pub fn position(&self) -> Option<LatLng> {
        LatLng::from_parts(self.lat, self.lng)
    }
}

/// Pickup warehouse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Warehouse {
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub id: Option<Id>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub lat: Option<f64>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub lng: Option<f64>,
    pub name: Option<String>,
    pub address: Option<String>,
}

impl Warehouse {
    pub fn position(&self) -> Option<LatLng> {
        LatLng::from_parts(self.lat, self.lng)
    }
}

/// Delivery destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Dealer {
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub id: Option<Id>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub lat: Option<f64>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub lng: Option<f64>,
    pub business_name: Option<String>,
    pub address: Option<String>,
    #[serde(deserialize_with = "text_opt::deserialize")]
    pub phone: Option<String>,
}

impl Dealer {
    pub fn position(&self) -> Option<LatLng> {
        LatLng::from_parts(self.lat, self.lng)
    }
}

/// A bare coordinate object (`{lat, lng}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Coordinates {
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub lat: Option<f64>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub lng: Option<f64>,
}

impl Coordinates {
    pub fn position(&self) -> Option<LatLng> {
        LatLng::from_parts(self.lat, self.lng)
    }
}

/// Identity of a record: assignment first, truck as fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    Assignment(Id),
    Truck(Id),
}

impl Serialize for RecordKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKey::Assignment(id) => write!(f, "assignment:{id}"),
            RecordKey::Truck(id) => write!(f, "truck:{id}"),
        }
    }
}

/// One truck assignment as shown on the live map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocationRecord {
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub assignment_id: Option<Id>,
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub truck_id: Option<Id>,
    #[serde(deserialize_with = "text_opt::deserialize")]
    pub driver_phone: Option<String>,
    pub driver_name: Option<String>,
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub order_id: Option<Id>,
    #[serde(deserialize_with = "text_opt::deserialize")]
    pub order_number: Option<String>,
    pub status: AssignmentStatus,
    pub truck: TruckPosition,
    pub warehouse: Option<Warehouse>,
    pub dealer: Option<Dealer>,
    pub start_location: Option<Coordinates>,
    #[serde(deserialize_with = "text_opt::deserialize")]
    pub current_eta: Option<String>,
    #[serde(deserialize_with = "text_opt::deserialize")]
    pub eta: Option<String>,
    pub duration_text: Option<String>,
    pub distance_text: Option<String>,
}

impl LocationRecord {
    /// Stable identity: assignment id, else truck id.
    pub fn key(&self) -> Option<RecordKey> {
        if let Some(id) = &self.assignment_id {
            return Some(RecordKey::Assignment(id.clone()));
        }
        self.truck_id().map(|id| RecordKey::Truck(id.clone()))
    }

    /// Truck id from the record, or from the nested truck object.
    pub fn truck_id(&self) -> Option<&Id> {
        self.truck_id.as_ref().or(self.truck.id.as_ref())
    }

    pub fn truck_position(&self) -> Option<LatLng> {
        self.truck.position()
    }

    pub fn warehouse_position(&self) -> Option<LatLng> {
        self.warehouse.as_ref().and_then(Warehouse::position)
    }

    pub fn dealer_position(&self) -> Option<LatLng> {
        self.dealer.as_ref().and_then(Dealer::position)
    }

    pub fn start_position(&self) -> Option<LatLng> {
        self.start_location.as_ref().and_then(Coordinates::position)
    }

    /// Driver-phone filter. `None` matches every record.
    pub fn matches_driver(&self, filter: Option<&str>) -> bool {
        match filter {
            None => true,
            Some(phone) => self.driver_phone.as_deref().map(str::trim) == Some(phone.trim()),
        }
    }

    /// Display label for markers.
    pub fn label(&self) -> String {
        self.truck
            .truck_name
            .clone()
            .or_else(|| self.truck.license_number.clone())
            .or_else(|| self.driver_name.clone())
            .or_else(|| self.truck_id().map(|id| format!("Truck {id}")))
            .unwrap_or_else(|| "Truck".to_string())
    }
}

/// Realtime position delta for one truck (`truck:location:update`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocationUpdate {
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub assignment_id: Option<Id>,
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub truck_id: Option<Id>,
    #[serde(deserialize_with = "text_opt::deserialize")]
    pub driver_phone: Option<String>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub lat: Option<f64>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub lng: Option<f64>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub speed: Option<f64>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub heading: Option<f64>,
    #[serde(alias = "lastUpdate", deserialize_with = "timestamp_opt::deserialize")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LocationUpdate {
    pub fn position(&self) -> Option<LatLng> {
        LatLng::from_parts(self.lat, self.lng)
    }

    pub fn matches_driver(&self, filter: Option<&str>) -> bool {
        match filter {
            None => true,
            Some(phone) => self.driver_phone.as_deref().map(str::trim) == Some(phone.trim()),
        }
    }
}

/// Realtime ETA change for one assignment (`eta:updated`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EtaUpdate {
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub assignment_id: Option<Id>,
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub order_id: Option<Id>,
    #[serde(alias = "currentEta", deserialize_with = "text_opt::deserialize")]
    pub eta: Option<String>,
    pub duration_text: Option<String>,
    pub distance_text: Option<String>,
}

/// Geofence crossing near a warehouse (`warehouse:arrived` / `warehouse:approaching`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WarehouseProximity {
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub assignment_id: Option<Id>,
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub truck_id: Option<Id>,
    #[serde(deserialize_with = "id_opt::deserialize")]
    pub order_id: Option<Id>,
    pub warehouse_name: Option<String>,
    #[serde(deserialize_with = "f64_opt::deserialize")]
    pub distance: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_snapshot_record() {
        let json = r#"{
            "assignmentId": 1,
            "truckId": "T-9",
            "driverPhone": 9876543210,
            "status": "in_transit",
            "truck": {"id": 9, "lat": "19.0", "lng": 72.0, "lastUpdate": "2024-05-01T10:00:00Z"},
            "warehouse": {"lat": 19.1, "lng": 72.9, "name": "Bhiwandi"},
            "dealer": {"lat": 18.5, "lng": 73.8, "businessName": "Pune Motors"}
        }"#;
        let record: LocationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.key(), Some(RecordKey::Assignment(Id::from(1))));
        assert_eq!(record.status, AssignmentStatus::InTransit);
        assert_eq!(record.driver_phone.as_deref(), Some("9876543210"));
        assert_eq!(record.truck_position(), Some(LatLng::new(19.0, 72.0)));
        assert_eq!(record.warehouse_position(), Some(LatLng::new(19.1, 72.9)));
        assert!(record.truck.last_update.is_some());
    }

    #[test]
    fn test_unknown_status_decodes() {
        let record: LocationRecord =
            serde_json::from_str(r#"{"truckId": 4, "status": "teleported"}"#).unwrap();
        assert_eq!(record.status, AssignmentStatus::Unknown);
        assert_eq!(record.key(), Some(RecordKey::Truck(Id::from(4))));
    }

    #[test]
    fn test_key_falls_back_to_nested_truck() {
        let record: LocationRecord = serde_json::from_str(r#"{"truck": {"id": 7}}"#).unwrap();
        assert_eq!(record.key(), Some(RecordKey::Truck(Id::from(7))));
    }

    #[test]
    fn test_driver_filter() {
        let record = LocationRecord {
            driver_phone: Some("555".to_string()),
            ..Default::default()
        };
        assert!(record.matches_driver(None));
        assert!(record.matches_driver(Some("555")));
        assert!(!record.matches_driver(Some("556")));
    }

    #[test]
    fn test_update_accepts_last_update_alias() {
        let update: LocationUpdate =
            serde_json::from_str(r#"{"assignmentId": 1, "lat": 19.01, "lng": 72.01, "lastUpdate": 1714557600000}"#)
                .unwrap();
        assert!(update.timestamp.is_some());
        assert_eq!(update.position(), Some(LatLng::new(19.01, 72.01)));
    }
}
