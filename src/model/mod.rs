//! Data model shared by every layer.
//!
//! Types mirror the backend's JSON shapes (camelCase) and decode leniently:
//! see [`lenient`] for the scalar normalization rules.

pub mod geo;
pub mod lenient;
pub mod location;
pub mod notification;
pub mod tracking;
pub mod workflow;

pub use geo::{Bounds, LatLng};
pub use lenient::Id;
pub use location::{
    AssignmentStatus, Coordinates, Dealer, EtaUpdate, LocationRecord, LocationUpdate, RecordKey,
    TruckPosition, Warehouse, WarehouseProximity,
};
pub use notification::Notification;
pub use tracking::{
    Assignment, CurrentLocation, OrderTracking, OrderTrackingUpdate, TrackingStarted,
};
pub use workflow::{ApprovalStatus, EntityKind, EntityRef, Workflow};
