//! Realtime channel: typed events over a shared, reconnecting connection.
//!
//! - [`events`]: event types, wire names and room frames
//! - [`bus`]: in-process fan-out with individual subscription handles
//! - [`channel`]: the shared connection handle
//! - [`websocket`] / [`loopback`]: transports

pub mod bus;
pub mod channel;
pub mod events;
pub mod loopback;
pub mod websocket;

pub use bus::{RealtimeBus, Subscription, SubscriptionId};
pub use channel::{ChannelError, LinkState, RealtimeChannel};
pub use events::{ConnectionState, EventKind, RealtimeEvent, Room};
pub use loopback::{LoopbackServer, LoopbackTransport};
pub use websocket::WebSocketTransport;
