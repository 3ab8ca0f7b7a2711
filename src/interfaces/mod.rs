//! Abstract interfaces for the tracking core.
//!
//! These traits define the contracts for:
//! - REST backend access (snapshots, workflows, notifications)
//! - Road-network routing
//! - The physical realtime connection

pub mod routing;
pub mod tracking_api;
pub mod transport;

pub use routing::{RoutingError, RoutingProvider};
pub use tracking_api::{ApiError, TrackingApi};
pub use transport::{
    DisconnectReason, Frame, RealtimeTransport, TransportError, TransportEvent, TransportSession,
};
