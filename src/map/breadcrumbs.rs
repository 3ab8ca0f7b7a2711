//! Per-truck breadcrumb trails.
//!
//! Each truck keeps a bounded ring of recent positions. Points closer than
//! `epsilon` degrees (both axes) to the last one are not appended.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::model::{LatLng, LocationRecord, RecordKey};

/// Default breadcrumb points kept per truck.
pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone)]
pub struct TruckPaths {
    capacity: usize,
    epsilon: f64,
    paths: HashMap<RecordKey, VecDeque<LatLng>>,
}

impl Default for TruckPaths {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, 0.000_01)
    }
}

impl TruckPaths {
    pub fn new(capacity: usize, epsilon: f64) -> Self {
        Self {
            capacity: capacity.max(1),
            epsilon,
            paths: HashMap::new(),
        }
    }

    /// Append a position. Returns false if it was too close to the last one.
    pub fn record(&mut self, key: RecordKey, point: LatLng) -> bool {
        if !point.is_valid() {
            return false;
        }
        let path = self.paths.entry(key).or_default();
        if let Some(last) = path.back() {
            if !point.moved_beyond(last, self.epsilon) {
                return false;
            }
        }
        if path.len() == self.capacity {
            path.pop_front();
        }
        path.push_back(point);
        true
    }

    /// Record the current truck position of every record, then drop trails
    /// for trucks no longer listed. Returns how many points were appended.
    pub fn observe(&mut self, records: &[LocationRecord]) -> usize {
        let mut present = HashSet::new();
        let mut appended = 0;
        for record in records {
            let Some(key) = record.key() else {
                continue;
            };
            if let Some(point) = record.truck_position() {
                if self.record(key.clone(), point) {
                    appended += 1;
                }
            }
            present.insert(key);
        }
        self.prune(&present);
        appended
    }

    pub fn prune(&mut self, keep: &HashSet<RecordKey>) {
        self.paths.retain(|key, _| keep.contains(key));
    }

    pub fn path(&self, key: &RecordKey) -> Vec<LatLng> {
        self.paths
            .get(key)
            .map(|path| path.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, &VecDeque<LatLng>)> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Id, TruckPosition};

    fn key(id: i64) -> RecordKey {
        RecordKey::Assignment(Id::from(id))
    }

    #[test]
    fn test_ring_keeps_newest_points() {
        let mut paths = TruckPaths::new(3, 0.0);
        for i in 0..5 {
            paths.record(key(1), LatLng::new(19.0 + i as f64 * 0.01, 72.0));
        }

        let path = paths.path(&key(1));
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], LatLng::new(19.02, 72.0));
        assert_eq!(path[2], LatLng::new(19.04, 72.0));
    }

    #[test]
    fn test_default_capacity_is_200() {
        let mut paths = TruckPaths::default();
        for i in 0..250 {
            paths.record(key(1), LatLng::new(10.0 + i as f64 * 0.001, 72.0));
        }
        assert_eq!(paths.path(&key(1)).len(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_jitter_is_ignored() {
        let mut paths = TruckPaths::default();
        assert!(paths.record(key(1), LatLng::new(19.0, 72.0)));
        assert!(!paths.record(key(1), LatLng::new(19.000_001, 72.000_001)));
        assert!(!paths.record(key(1), LatLng::new(f64::NAN, 72.0)));
        assert_eq!(paths.path(&key(1)).len(), 1);
    }

    #[test]
    fn test_observe_prunes_departed_trucks() {
        let truck = |id: i64, lat: f64| LocationRecord {
            assignment_id: Some(Id::from(id)),
            truck: TruckPosition {
                lat: Some(lat),
                lng: Some(72.0),
                ..TruckPosition::default()
            },
            ..LocationRecord::default()
        };
        let mut paths = TruckPaths::default();

        assert_eq!(paths.observe(&[truck(1, 19.0), truck(2, 18.0)]), 2);
        assert_eq!(paths.observe(&[truck(1, 19.1)]), 1);

        assert_eq!(paths.len(), 1);
        assert_eq!(paths.path(&key(1)).len(), 2);
        assert!(paths.path(&key(2)).is_empty());
    }
}
