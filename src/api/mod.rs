//! REST backend clients.
//!
//! - `HttpTrackingApi`: the real backend over reqwest
//! - `MockTrackingApi`: in-memory responses for tests and demos

pub mod envelope;
pub mod http;
pub mod mock;

pub use http::HttpTrackingApi;
pub use mock::MockTrackingApi;
