//! Typed realtime events and the wire names they travel under.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::interfaces::transport::Frame;
use crate::model::{
    EtaUpdate, Id, LocationUpdate, Notification, OrderTrackingUpdate, TrackingStarted,
    WarehouseProximity,
};

/// Inbound and outbound event names.
pub mod names {
    pub const LOCATION_UPDATE: &str = "truck:location:update";
    pub const TRACKING_STARTED: &str = "tracking:started";
    pub const WAREHOUSE_ARRIVED: &str = "warehouse:arrived";
    pub const WAREHOUSE_APPROACHING: &str = "warehouse:approaching";
    pub const ETA_UPDATED: &str = "eta:updated";
    pub const ORDER_TRACKING_UPDATE: &str = "order:tracking:update";
    pub const NOTIFICATION: &str = "notification";

    pub const TRUCK_TRACK: &str = "truck:track";
    pub const TRUCK_UNTRACK: &str = "truck:untrack";
    pub const ORDER_JOIN: &str = "order:join";
    pub const ORDER_LEAVE: &str = "order:leave";
}

/// Connection lifecycle, published on the bus alongside server events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// First successful connect.
    Connected,
    /// Connected again after a drop. Consumers should resynchronize.
    Reconnected,
    /// Connection lost; a reconnect may follow.
    Disconnected { reason: String },
    /// Reconnect attempts exhausted, or the client disconnected.
    Closed,
}

/// Event category used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    LocationUpdate,
    TrackingStarted,
    WarehouseArrived,
    WarehouseApproaching,
    EtaUpdated,
    OrderTrackingUpdate,
    Notification,
    Connection,
    /// Any event name this client has no type for.
    Other,
}

/// A decoded realtime event.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    LocationUpdate(LocationUpdate),
    TrackingStarted(TrackingStarted),
    WarehouseArrived(WarehouseProximity),
    WarehouseApproaching(WarehouseProximity),
    EtaUpdated(EtaUpdate),
    OrderTrackingUpdate(OrderTrackingUpdate),
    Notification(Notification),
    Connection(ConnectionState),
    Other { name: String, data: Value },
}

impl RealtimeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RealtimeEvent::LocationUpdate(_) => EventKind::LocationUpdate,
            RealtimeEvent::TrackingStarted(_) => EventKind::TrackingStarted,
            RealtimeEvent::WarehouseArrived(_) => EventKind::WarehouseArrived,
            RealtimeEvent::WarehouseApproaching(_) => EventKind::WarehouseApproaching,
            RealtimeEvent::EtaUpdated(_) => EventKind::EtaUpdated,
            RealtimeEvent::OrderTrackingUpdate(_) => EventKind::OrderTrackingUpdate,
            RealtimeEvent::Notification(_) => EventKind::Notification,
            RealtimeEvent::Connection(_) => EventKind::Connection,
            RealtimeEvent::Other { .. } => EventKind::Other,
        }
    }

    /// Decode an inbound frame. Unknown names pass through as [`RealtimeEvent::Other`].
    pub fn decode(frame: &Frame) -> Result<Self, serde_json::Error> {
        fn typed<T: DeserializeOwned>(data: &Value) -> Result<T, serde_json::Error> {
            T::deserialize(data)
        }

        let data = &frame.data;
        Ok(match frame.event.as_str() {
            names::LOCATION_UPDATE => RealtimeEvent::LocationUpdate(typed(data)?),
            names::TRACKING_STARTED => RealtimeEvent::TrackingStarted(typed(data)?),
            names::WAREHOUSE_ARRIVED => RealtimeEvent::WarehouseArrived(typed(data)?),
            names::WAREHOUSE_APPROACHING => RealtimeEvent::WarehouseApproaching(typed(data)?),
            names::ETA_UPDATED => RealtimeEvent::EtaUpdated(typed(data)?),
            names::ORDER_TRACKING_UPDATE => RealtimeEvent::OrderTrackingUpdate(typed(data)?),
            names::NOTIFICATION => RealtimeEvent::Notification(typed(data)?),
            other => RealtimeEvent::Other {
                name: other.to_string(),
                data: data.clone(),
            },
        })
    }
}

/// A server-side subscription room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    Truck(Id),
    Order(Id),
}

impl Room {
    pub fn join_frame(&self) -> Frame {
        match self {
            Room::Truck(id) => Frame::new(names::TRUCK_TRACK, json!({ "truckId": id })),
            Room::Order(id) => Frame::new(names::ORDER_JOIN, json!({ "orderId": id })),
        }
    }

    pub fn leave_frame(&self) -> Frame {
        match self {
            Room::Truck(id) => Frame::new(names::TRUCK_UNTRACK, json!({ "truckId": id })),
            Room::Order(id) => Frame::new(names::ORDER_LEAVE, json!({ "orderId": id })),
        }
    }
}
