//! TrackingApi trait and error types.

use async_trait::async_trait;

use crate::model::{
    Dealer, EntityRef, Id, LocationRecord, Notification, OrderTracking, Warehouse, Workflow,
};

/// Result type for REST backend operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors that can occur when talking to the REST backend.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unauthorized")]
    Unauthorized,

    /// 403. Callers treat this as "feature unavailable" rather than a failure.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("HTTP {status} from {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Response body did not match any accepted envelope for the endpoint.
    #[error("unexpected response shape from {endpoint}: {message}")]
    Shape { endpoint: String, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ApiError::Forbidden(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

/// REST backend used by the tracking core.
///
/// Implementations:
/// - `HttpTrackingApi`: reqwest against the real backend
/// - `MockTrackingApi`: in-memory responses for testing
#[async_trait]
pub trait TrackingApi: Send + Sync {
    /// Full live-location snapshot, optionally narrowed to one driver's phone.
    async fn live_locations(&self, driver_phone: Option<&str>) -> Result<Vec<LocationRecord>>;

    /// Tracking snapshot for one order.
    async fn order_tracking(&self, order_id: &Id) -> Result<OrderTracking>;

    /// Workflow status for an order, invoice, payment or document.
    async fn workflow(&self, entity: &EntityRef) -> Result<Workflow>;

    /// Notifications for the current user.
    async fn notifications(&self) -> Result<Vec<Notification>>;

    async fn mark_notification_read(&self, id: &Id) -> Result<()>;

    async fn delete_notification(&self, id: &Id) -> Result<()>;

    /// Warehouse overlay set for the map.
    async fn warehouses(&self) -> Result<Vec<Warehouse>>;

    /// Dealer overlay set for the map.
    async fn dealers(&self) -> Result<Vec<Dealer>>;
}
