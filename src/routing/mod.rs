//! Road-network routing: the route cache and its providers.

pub mod cache;
pub mod mock;
pub mod osrm;

pub use cache::{route_key, RouteCache};
pub use mock::MockRoutingProvider;
pub use osrm::OsrmProvider;
