//! Aggregators: snapshot + realtime delta merging.

pub mod live_locations;
pub mod notifications;
pub mod order_tracking;

pub use live_locations::{LiveLocations, LiveLocationsState, LocationBook, MergeOutcome};
pub use notifications::{NotificationFeed, NotificationState};
pub use order_tracking::{OrderTracker, OrderTrackingState};
