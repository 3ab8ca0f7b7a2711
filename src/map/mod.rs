//! Map layer: route reconciliation, breadcrumb trails and scene assembly.

pub mod breadcrumbs;
pub mod reconcile;
pub mod scene;

pub use breadcrumbs::TruckPaths;
pub use reconcile::{
    LiveRoute, PlannedRoute, ReconcileError, ReconcileReport, RouteKind, RouteReconciler,
};
pub use scene::{
    Geofence, MapScene, Marker, MarkerKind, Polyline, PolylineStyle, SceneBuilder, SceneSummary,
};
