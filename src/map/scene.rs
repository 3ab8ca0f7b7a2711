//! Map scene assembly: markers, polylines, geofences and the viewport.
//!
//! A [`MapScene`] is a plain value rebuilt whenever its inputs change. Rendering
//! it is the embedder's job.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::breadcrumbs::TruckPaths;
use super::reconcile::PlannedRoute;
use crate::config::MapConfig;
use crate::model::{AssignmentStatus, Bounds, Dealer, LatLng, LocationRecord, RecordKey, Warehouse};

/// Smallest padding (degrees) applied to the viewport, so a single marker
/// still gets a usable zoom level.
const MIN_BOUNDS_PAD_DEG: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Truck,
    Warehouse,
    Dealer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub kind: MarkerKind,
    pub position: LatLng,
    pub label: String,
    /// Set on truck markers.
    pub key: Option<RecordKey>,
    pub heading: Option<f64>,
    pub status: Option<AssignmentStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolylineStyle {
    Route,
    /// Straight lines used when routing failed.
    FallbackRoute,
    Breadcrumb,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polyline {
    pub key: RecordKey,
    pub style: PolylineStyle,
    pub points: Vec<LatLng>,
}

/// Circular zone around a warehouse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geofence {
    pub center: LatLng,
    pub radius_m: f64,
    pub label: String,
}

impl Geofence {
    pub fn contains(&self, point: &LatLng) -> bool {
        self.center.distance_m(point) <= self.radius_m
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapScene {
    pub markers: Vec<Marker>,
    pub routes: Vec<Polyline>,
    pub breadcrumbs: Vec<Polyline>,
    pub geofences: Vec<Geofence>,
    /// Padded viewport; `None` when nothing on the scene has a position.
    pub bounds: Option<Bounds>,
}

/// Counts for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneSummary {
    pub trucks: usize,
    pub warehouses: usize,
    pub dealers: usize,
    pub routes: usize,
    pub fallback_routes: usize,
    pub breadcrumbs: usize,
    pub trucks_at_warehouse: usize,
}

impl MapScene {
    pub fn builder(config: &MapConfig) -> SceneBuilder<'_> {
        SceneBuilder::new(config)
    }

    pub fn markers_of(&self, kind: MarkerKind) -> impl Iterator<Item = &Marker> {
        self.markers.iter().filter(move |m| m.kind == kind)
    }

    /// Trucks currently inside a warehouse geofence, with the warehouse label.
    pub fn trucks_at_warehouses(&self) -> Vec<(&Marker, &Geofence)> {
        self.markers_of(MarkerKind::Truck)
            .filter_map(|truck| {
                self.geofences
                    .iter()
                    .find(|fence| fence.contains(&truck.position))
                    .map(|fence| (truck, fence))
            })
            .collect()
    }

    pub fn summary(&self) -> SceneSummary {
        SceneSummary {
            trucks: self.markers_of(MarkerKind::Truck).count(),
            warehouses: self.markers_of(MarkerKind::Warehouse).count(),
            dealers: self.markers_of(MarkerKind::Dealer).count(),
            routes: self.routes.len(),
            fallback_routes: self
                .routes
                .iter()
                .filter(|r| r.style == PolylineStyle::FallbackRoute)
                .count(),
            breadcrumbs: self.breadcrumbs.len(),
            trucks_at_warehouse: self.trucks_at_warehouses().len(),
        }
    }
}

/// Collects scene inputs. Every input is optional.
pub struct SceneBuilder<'a> {
    config: &'a MapConfig,
    records: &'a [LocationRecord],
    warehouses: &'a [Warehouse],
    dealers: &'a [Dealer],
    routes: Option<&'a HashMap<RecordKey, PlannedRoute>>,
    paths: Option<&'a TruckPaths>,
}

impl<'a> SceneBuilder<'a> {
    pub fn new(config: &'a MapConfig) -> Self {
        Self {
            config,
            records: &[],
            warehouses: &[],
            dealers: &[],
            routes: None,
            paths: None,
        }
    }

    pub fn records(mut self, records: &'a [LocationRecord]) -> Self {
        self.records = records;
        self
    }

    /// Standalone warehouse overlay, merged with the records' warehouses.
    pub fn warehouses(mut self, warehouses: &'a [Warehouse]) -> Self {
        self.warehouses = warehouses;
        self
    }

    /// Standalone dealer overlay, merged with the records' dealers.
    pub fn dealers(mut self, dealers: &'a [Dealer]) -> Self {
        self.dealers = dealers;
        self
    }

    pub fn routes(mut self, routes: &'a HashMap<RecordKey, PlannedRoute>) -> Self {
        self.routes = Some(routes);
        self
    }

    pub fn breadcrumbs(mut self, paths: &'a TruckPaths) -> Self {
        self.paths = Some(paths);
        self
    }

    pub fn build(self) -> MapScene {
        let mut scene = MapScene::default();
        let mut places = PlaceSet::default();

        for record in self.records {
            if let Some(position) = record.truck_position() {
                scene.markers.push(Marker {
                    kind: MarkerKind::Truck,
                    position,
                    label: record.label(),
                    key: record.key(),
                    heading: record.truck.heading,
                    status: Some(record.status),
                });
            }
        }

        let record_warehouses = self.records.iter().filter_map(|r| r.warehouse.as_ref());
        for warehouse in record_warehouses.chain(self.warehouses) {
            let Some(position) = warehouse.position() else {
                continue;
            };
            if !places.insert(MarkerKind::Warehouse, position) {
                continue;
            }
            let label = warehouse.name.clone().unwrap_or_else(|| "Warehouse".to_string());
            scene.geofences.push(Geofence {
                center: position,
                radius_m: self.config.geofence_radius_m,
                label: label.clone(),
            });
            scene.markers.push(place_marker(MarkerKind::Warehouse, position, label));
        }

        let record_dealers = self.records.iter().filter_map(|r| r.dealer.as_ref());
        for dealer in record_dealers.chain(self.dealers) {
            let Some(position) = dealer.position() else {
                continue;
            };
            if places.insert(MarkerKind::Dealer, position) {
                let label = dealer.business_name.clone().unwrap_or_else(|| "Dealer".to_string());
                scene.markers.push(place_marker(MarkerKind::Dealer, position, label));
            }
        }

        if let Some(routes) = self.routes {
            scene.routes = routes
                .iter()
                .filter(|(_, route)| route.points.len() >= 2)
                .map(|(key, route)| Polyline {
                    key: key.clone(),
                    style: if route.fallback {
                        PolylineStyle::FallbackRoute
                    } else {
                        PolylineStyle::Route
                    },
                    points: route.points.clone(),
                })
                .collect();
            scene.routes.sort_by(|a, b| a.key.cmp(&b.key));
        }

        if let Some(paths) = self.paths {
            scene.breadcrumbs = paths
                .iter()
                .filter(|(_, path)| path.len() >= 2)
                .map(|(key, path)| Polyline {
                    key: key.clone(),
                    style: PolylineStyle::Breadcrumb,
                    points: path.iter().copied().collect(),
                })
                .collect();
            scene.breadcrumbs.sort_by(|a, b| a.key.cmp(&b.key));
        }

        let points = scene
            .markers
            .iter()
            .map(|m| m.position)
            .chain(scene.routes.iter().flat_map(|r| r.points.iter().copied()));
        scene.bounds = Bounds::from_points(points)
            .map(|b| b.padded(self.config.bounds_padding, MIN_BOUNDS_PAD_DEG));

        scene
    }
}

fn place_marker(kind: MarkerKind, position: LatLng, label: String) -> Marker {
    Marker {
        kind,
        position,
        label,
        key: None,
        heading: None,
        status: None,
    }
}

/// De-duplicates fixed places by rounded position.
#[derive(Default)]
struct PlaceSet(HashSet<(MarkerKind, String)>);

impl PlaceSet {
    fn insert(&mut self, kind: MarkerKind, position: LatLng) -> bool {
        self.0.insert((kind, position.rounded_key()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::reconcile::RouteKind;
    use crate::model::{Id, TruckPosition};

    fn config() -> MapConfig {
        MapConfig::default()
    }

    fn record(id: i64, truck: (f64, f64), warehouse: (f64, f64)) -> LocationRecord {
        LocationRecord {
            assignment_id: Some(Id::from(id)),
            truck: TruckPosition {
                lat: Some(truck.0),
                lng: Some(truck.1),
                truck_name: Some(format!("MH-{id}")),
                ..TruckPosition::default()
            },
            warehouse: Some(Warehouse {
                lat: Some(warehouse.0),
                lng: Some(warehouse.1),
                name: Some("Bhiwandi".to_string()),
                ..Warehouse::default()
            }),
            dealer: Some(Dealer {
                lat: Some(18.52),
                lng: Some(73.85),
                business_name: Some("Pune Motors".to_string()),
                ..Dealer::default()
            }),
            ..LocationRecord::default()
        }
    }

    #[test]
    fn test_empty_scene_has_no_bounds() {
        let config = config();
        let scene = MapScene::builder(&config).build();
        assert!(scene.bounds.is_none());
        assert_eq!(scene.summary(), SceneSummary::default());
    }

    #[test]
    fn test_markers_and_shared_places_are_deduplicated() {
        let config = config();
        let records = [record(1, (19.0, 72.0), (19.1, 72.85)), record(2, (19.5, 72.5), (19.1, 72.85))];
        let extra = [Warehouse {
            lat: Some(20.0),
            lng: Some(73.0),
            ..Warehouse::default()
        }];

        let scene = MapScene::builder(&config)
            .records(&records)
            .warehouses(&extra)
            .build();

        let summary = scene.summary();
        assert_eq!(summary.trucks, 2);
        assert_eq!(summary.warehouses, 2);
        assert_eq!(summary.dealers, 1);
        assert_eq!(scene.geofences.len(), 2);
        assert_eq!(scene.markers_of(MarkerKind::Truck).next().unwrap().label, "MH-1");
    }

    #[test]
    fn test_bounds_cover_everything_with_padding() {
        let config = config();
        let records = [record(1, (19.0, 72.0), (19.1, 72.85))];
        let scene = MapScene::builder(&config).records(&records).build();

        let bounds = scene.bounds.unwrap();
        assert!(bounds.south < 18.52 && bounds.north > 19.1);
        assert!(bounds.west < 72.0 && bounds.east > 73.85);
    }

    #[test]
    fn test_truck_inside_geofence() {
        let config = config();
        // ~110m north of the warehouse
        let records = [
            record(1, (19.101, 72.85), (19.1, 72.85)),
            record(2, (19.2, 72.85), (19.1, 72.85)),
        ];
        let scene = MapScene::builder(&config).records(&records).build();

        let inside = scene.trucks_at_warehouses();
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].0.key, Some(RecordKey::Assignment(Id::from(1))));
        assert_eq!(inside[0].1.label, "Bhiwandi");
    }

    #[test]
    fn test_routes_and_breadcrumbs_become_polylines() {
        let config = config();
        let key = RecordKey::Assignment(Id::from(1));
        let mut routes = HashMap::new();
        routes.insert(
            key.clone(),
            PlannedRoute {
                points: vec![LatLng::new(19.1, 72.85), LatLng::new(18.52, 73.85)],
                anchor: None,
                fallback: true,
                kind: RouteKind::Planned,
            },
        );
        let mut paths = TruckPaths::default();
        paths.record(key.clone(), LatLng::new(19.0, 72.0));
        paths.record(key.clone(), LatLng::new(19.01, 72.0));

        let scene = MapScene::builder(&config)
            .routes(&routes)
            .breadcrumbs(&paths)
            .build();

        assert_eq!(scene.routes[0].style, PolylineStyle::FallbackRoute);
        assert_eq!(scene.breadcrumbs[0].points.len(), 2);
        assert_eq!(scene.summary().fallback_routes, 1);
        assert!(scene.bounds.is_some());
    }
}
