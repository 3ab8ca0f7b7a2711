//! Cucumber step definitions for acceptance tests.

use std::time::Duration;

pub mod live_locations;
pub mod order_tracking;
pub mod route_cache;
pub mod route_reconciliation;

/// Upper bound for waiting on background tasks.
pub const WAIT: Duration = Duration::from_secs(2);
