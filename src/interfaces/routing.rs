//! RoutingProvider trait and error types.

use async_trait::async_trait;

use crate::model::LatLng;

/// Result type for routing operations.
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Errors from the external routing service.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("routing provider returned HTTP {0}")]
    Status(u16),

    #[error("no route found: {0}")]
    NoRoute(String),

    #[error("invalid routing response: {0}")]
    InvalidResponse(String),
}

/// Road-network routing between two positions.
///
/// Implementations:
/// - `OsrmProvider`: OSRM-compatible HTTP API
/// - `MockRoutingProvider`: scripted routes for testing
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Ordered polyline from `from` to `to`, in `(lat, lng)` order.
    async fn route(&self, from: LatLng, to: LatLng) -> Result<Vec<LatLng>>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}
