//! Route reconciliation for the live map.
//!
//! Decides which assignments need a routed polyline, fetches the legs through
//! the [`RouteCache`] and merges every result in a single batch. Assignments
//! already resolved (and whose truck has not moved past the threshold) or
//! already in flight are skipped.
//!
//! Planned routes run start → warehouse → dealer and do not pass through the
//! truck, so a rebuild after movement is served from the cache and only moves
//! the anchor. Selecting a truck builds a live route from its current position
//! to the remaining stops. A live route replaces the planned one and stays
//! live: later passes rebuild it from the new position when the truck moves
//! past the threshold or the pickup state changes.
//!
//! Every request is stamped when issued. A result is only stored if no newer
//! request for the same assignment has already stored its route.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::model::{Bounds, LatLng, LocationRecord, RecordKey};
use crate::routing::RouteCache;

/// Default truck movement (degrees) before a route is rebuilt.
pub const DEFAULT_MOVEMENT_THRESHOLD: f64 = 0.01;

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, ReconcileError>;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("record has no identity (assignment or truck id)")]
    MissingKey,

    #[error("record {key} has no valid {what} position")]
    MissingPosition { key: RecordKey, what: &'static str },
}

/// How a route's waypoints were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Start (if known), warehouse, dealer.
    Planned,
    /// From the truck to its remaining stops.
    Live { past_pickup: bool },
}

/// A resolved route for one assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRoute {
    pub points: Vec<LatLng>,
    /// Truck position when the route was built.
    pub anchor: Option<LatLng>,
    /// True when a leg failed and the route is straight lines between stops.
    pub fallback: bool,
    pub kind: RouteKind,
}

/// Route from a truck's current position, with the viewport to fit it.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveRoute {
    pub key: RecordKey,
    pub points: Vec<LatLng>,
    pub bounds: Option<Bounds>,
    pub fallback: bool,
}

/// Outcome of one [`RouteReconciler::reconcile`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Assignments routed in this pass.
    pub requested: usize,
    /// Of those, how many fell back to straight lines.
    pub fallbacks: usize,
    /// Skipped because another pass is already routing them.
    pub in_flight: usize,
    /// Routes dropped because their assignment left the list.
    pub pruned: usize,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.requested > 0 || self.pruned > 0
    }
}

#[derive(Default)]
struct RouteBook {
    routes: HashMap<RecordKey, PlannedRoute>,
    /// Stamp of the request that produced each stored route.
    stamps: HashMap<RecordKey, u64>,
    in_flight: HashSet<RecordKey>,
    issued: u64,
    revision: u64,
}

impl RouteBook {
    fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Store a result unless a newer request already stored one.
    fn store(&mut self, key: RecordKey, stamp: u64, route: PlannedRoute) -> bool {
        if self.stamps.get(&key).is_some_and(|stored| *stored > stamp) {
            return false;
        }
        self.stamps.insert(key.clone(), stamp);
        self.routes.insert(key, route);
        true
    }

    fn prune(&mut self, present: &HashSet<RecordKey>) -> usize {
        let before = self.routes.len();
        self.routes.retain(|key, _| present.contains(key));
        self.stamps.retain(|key, _| present.contains(key));
        before - self.routes.len()
    }
}

/// A candidate whose legs still need routing.
struct Pending {
    key: RecordKey,
    waypoints: Vec<LatLng>,
    anchor: Option<LatLng>,
    kind: RouteKind,
    stamp: u64,
}

/// Keys a pass has marked in flight. Released on drop, so a cancelled pass
/// does not leave its assignments blocked.
struct InFlight<'a> {
    reconciler: &'a RouteReconciler,
    keys: Vec<RecordKey>,
}

impl InFlight<'_> {
    fn settle(mut self, book: &mut RouteBook) {
        for key in self.keys.drain(..) {
            book.in_flight.remove(&key);
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        let mut book = self.reconciler.lock();
        for key in &self.keys {
            book.in_flight.remove(key);
        }
        debug!(keys = self.keys.len(), "Route pass cancelled, released in-flight keys");
    }
}

pub struct RouteReconciler {
    cache: Arc<RouteCache>,
    movement_threshold: f64,
    book: Mutex<RouteBook>,
}

impl RouteReconciler {
    pub fn new(cache: Arc<RouteCache>) -> Self {
        Self::with_threshold(cache, DEFAULT_MOVEMENT_THRESHOLD)
    }

    pub fn with_threshold(cache: Arc<RouteCache>, movement_threshold: f64) -> Self {
        Self {
            cache,
            movement_threshold,
            book: Mutex::new(RouteBook::default()),
        }
    }

    /// Route every record that needs it and merge the results in one update.
    ///
    /// A record is routed when it has warehouse and dealer positions, is not
    /// already in flight, and either has no route yet or its truck moved more
    /// than the threshold from the route's anchor. Live routes are also
    /// rebuilt when the pickup state changes.
    #[tracing::instrument(name = "map.reconcile", skip_all, fields(records = records.len()))]
    pub async fn reconcile(&self, records: &[LocationRecord]) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let (pending, guard) = {
            let mut book = self.lock();

            let present: HashSet<RecordKey> = records.iter().filter_map(LocationRecord::key).collect();
            report.pruned = book.prune(&present);

            let mut pending = Vec::new();
            for record in records {
                let Some(key) = record.key() else {
                    continue;
                };
                if book.in_flight.contains(&key) {
                    report.in_flight += 1;
                    continue;
                }
                let Some(mut candidate) = self.candidate(book.routes.get(&key), record) else {
                    continue;
                };
                candidate.stamp = book.issue();
                book.in_flight.insert(candidate.key.clone());
                pending.push(candidate);
            }

            let guard = InFlight {
                reconciler: self,
                keys: pending.iter().map(|p| p.key.clone()).collect(),
            };
            (pending, guard)
        };

        if pending.is_empty() {
            if report.pruned > 0 {
                self.lock().revision += 1;
            }
            return report;
        }

        let resolved = join_all(pending.into_iter().map(|candidate| async move {
            let (points, fallback) = build_route(&self.cache, &candidate.waypoints).await;
            (candidate, points, fallback)
        }))
        .await;

        let mut book = self.lock();
        guard.settle(&mut book);
        for (candidate, points, fallback) in resolved {
            report.requested += 1;
            if fallback {
                report.fallbacks += 1;
            }
            let route = PlannedRoute {
                points,
                anchor: candidate.anchor,
                fallback,
                kind: candidate.kind,
            };
            if !book.store(candidate.key.clone(), candidate.stamp, route) {
                debug!(key = %candidate.key, "Newer route already stored, result dropped");
            }
        }
        book.revision += 1;

        info!(
            requested = report.requested,
            fallbacks = report.fallbacks,
            pruned = report.pruned,
            revision = book.revision,
            "Routes reconciled"
        );
        report
    }

    /// Route from the truck's current position to its remaining stops.
    ///
    /// Before pickup that is warehouse then dealer; afterwards the dealer only.
    /// The result replaces the assignment's steady-state route.
    #[tracing::instrument(name = "map.live_route", skip_all)]
    pub async fn live_route(&self, record: &LocationRecord) -> Result<LiveRoute> {
        let key = record.key().ok_or(ReconcileError::MissingKey)?;
        let truck = record.truck_position().ok_or_else(|| ReconcileError::MissingPosition {
            key: key.clone(),
            what: "truck",
        })?;
        let dealer = record.dealer_position().ok_or_else(|| ReconcileError::MissingPosition {
            key: key.clone(),
            what: "dealer",
        })?;

        let past_pickup = record.status.is_past_pickup();
        let waypoints = live_waypoints(record, truck, dealer);
        let stamp = self.lock().issue();

        let (points, fallback) = build_route(&self.cache, &waypoints).await;
        let bounds = Bounds::from_points(points.iter().copied());

        let mut book = self.lock();
        let route = PlannedRoute {
            points: points.clone(),
            anchor: Some(truck),
            fallback,
            kind: RouteKind::Live { past_pickup },
        };
        if book.store(key.clone(), stamp, route) {
            book.revision += 1;
            debug!(key = %key, points = points.len(), fallback, "Live route built");
        } else {
            debug!(key = %key, "Newer route already stored, live route not kept");
        }

        Ok(LiveRoute {
            key,
            points,
            bounds,
            fallback,
        })
    }

    pub fn route(&self, key: &RecordKey) -> Option<PlannedRoute> {
        self.lock().routes.get(key).cloned()
    }

    pub fn routes(&self) -> HashMap<RecordKey, PlannedRoute> {
        self.lock().routes.clone()
    }

    /// Bumped once per batch that changed the route set.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// What to build for `record` given its stored route, if anything.
    fn candidate(&self, existing: Option<&PlannedRoute>, record: &LocationRecord) -> Option<Pending> {
        let current = record.truck_position();
        match existing {
            None => planned_waypoints(record),
            Some(route) => match route.kind {
                RouteKind::Planned => {
                    if !self.moved(route.anchor, current) {
                        return None;
                    }
                    debug!(key = ?record.key(), "Truck moved, rebuilding route");
                    planned_waypoints(record)
                }
                RouteKind::Live { past_pickup } => {
                    let status_changed = past_pickup != record.status.is_past_pickup();
                    if !status_changed && !self.moved(route.anchor, current) {
                        return None;
                    }
                    debug!(key = ?record.key(), status_changed, "Rebuilding live route");
                    live_pending(record)
                }
            },
        }
    }

    fn moved(&self, anchor: Option<LatLng>, current: Option<LatLng>) -> bool {
        match (anchor, current) {
            (Some(anchor), Some(current)) => current.moved_beyond(&anchor, self.movement_threshold),
            _ => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RouteBook> {
        self.book.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn planned_waypoints(record: &LocationRecord) -> Option<Pending> {
    let key = record.key()?;
    let warehouse = record.warehouse_position()?;
    let dealer = record.dealer_position()?;

    let mut waypoints = Vec::with_capacity(3);
    waypoints.extend(record.start_position());
    waypoints.push(warehouse);
    waypoints.push(dealer);

    Some(Pending {
        key,
        waypoints,
        anchor: record.truck_position(),
        kind: RouteKind::Planned,
        stamp: 0,
    })
}

fn live_pending(record: &LocationRecord) -> Option<Pending> {
    let key = record.key()?;
    let truck = record.truck_position()?;
    let dealer = record.dealer_position()?;

    Some(Pending {
        key,
        waypoints: live_waypoints(record, truck, dealer),
        anchor: Some(truck),
        kind: RouteKind::Live {
            past_pickup: record.status.is_past_pickup(),
        },
        stamp: 0,
    })
}

/// Truck, then the warehouse unless already picked up, then the dealer.
fn live_waypoints(record: &LocationRecord, truck: LatLng, dealer: LatLng) -> Vec<LatLng> {
    let mut waypoints = vec![truck];
    if !record.status.is_past_pickup() {
        waypoints.extend(record.warehouse_position());
    }
    waypoints.push(dealer);
    waypoints
}

/// Route consecutive waypoint pairs and join the legs.
///
/// Each leg after the first starts where the previous one ended, so its first
/// point is dropped. If any leg fails the whole route becomes straight lines
/// through the waypoints.
async fn build_route(cache: &RouteCache, waypoints: &[LatLng]) -> (Vec<LatLng>, bool) {
    let legs = join_all(waypoints.windows(2).map(|pair| cache.try_route(pair[0], pair[1]))).await;

    let mut points: Vec<LatLng> = Vec::new();
    for leg in legs {
        match leg {
            Ok(leg) => {
                let skip = usize::from(!points.is_empty());
                points.extend(leg.into_iter().skip(skip));
            }
            Err(e) => {
                warn!(error = %e, "Route leg failed, using straight lines");
                return (waypoints.to_vec(), true);
            }
        }
    }
    (points, false)
}
