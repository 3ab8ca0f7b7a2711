//! Pure merge rules for the live location collection.

use chrono::{DateTime, Utc};

use crate::model::{EtaUpdate, LocationRecord, LocationUpdate};

/// What happened to one realtime delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Applied to a record.
    Merged,
    /// Driver filter did not match; dropped silently.
    Filtered,
    /// Older than (or as old as) what the record already holds.
    Stale,
    /// No record matches; the caller should resnapshot.
    Unknown,
}

/// The merged live collection, in snapshot order.
#[derive(Debug, Clone, Default)]
pub struct LocationBook {
    records: Vec<LocationRecord>,
    filter: Option<String>,
}

fn strictly_newer(candidate: Option<DateTime<Utc>>, current: Option<DateTime<Utc>>) -> bool {
    match (candidate, current) {
        (Some(candidate), Some(current)) => candidate > current,
        _ => true,
    }
}

impl LocationBook {
    pub fn new(filter: Option<String>) -> Self {
        Self {
            records: Vec::new(),
            filter: normalize_filter(filter),
        }
    }

    pub fn records(&self) -> &[LocationRecord] {
        &self.records
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Change the filter. Existing records are dropped until the next snapshot.
    pub fn set_filter(&mut self, filter: Option<String>) {
        self.filter = normalize_filter(filter);
        self.records.clear();
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Replace the collection with an authoritative snapshot.
    ///
    /// Records outside the filter are dropped. A truck position held locally
    /// that is strictly newer than the snapshot's is kept.
    pub fn apply_snapshot(&mut self, snapshot: Vec<LocationRecord>) {
        let filter = self.filter.clone();
        let mut previous = std::mem::take(&mut self.records);

        self.records = snapshot
            .into_iter()
            .filter(|record| record.matches_driver(filter.as_deref()))
            .map(|mut record| {
                let key = record.key();
                let held = previous
                    .iter_mut()
                    .find(|old| key.is_some() && old.key() == key);
                if let Some(old) = held {
                    let local = old.truck.last_update;
                    let incoming = record.truck.last_update;
                    if local.is_some() && incoming.is_some() && local > incoming {
                        let fresher = std::mem::take(&mut old.truck);
                        record.truck.lat = fresher.lat;
                        record.truck.lng = fresher.lng;
                        record.truck.speed = fresher.speed.or(record.truck.speed);
                        record.truck.heading = fresher.heading.or(record.truck.heading);
                        record.truck.last_update = fresher.last_update;
                    }
                }
                record
            })
            .collect();
    }

    /// Merge a position delta into the matching record's truck.
    pub fn apply_location_update(&mut self, update: &LocationUpdate) -> MergeOutcome {
        if !update.matches_driver(self.filter.as_deref()) {
            return MergeOutcome::Filtered;
        }

        let Some(record) = self.find_for_location(update) else {
            return MergeOutcome::Unknown;
        };

        if !strictly_newer(update.timestamp, record.truck.last_update) {
            return MergeOutcome::Stale;
        }

        let truck = &mut record.truck;
        if update.lat.is_some() {
            truck.lat = update.lat;
        }
        if update.lng.is_some() {
            truck.lng = update.lng;
        }
        if update.speed.is_some() {
            truck.speed = update.speed;
        }
        if update.heading.is_some() {
            truck.heading = update.heading;
        }
        if update.timestamp.is_some() {
            truck.last_update = update.timestamp;
        }
        MergeOutcome::Merged
    }

    /// Merge an ETA change into the matching assignment.
    pub fn apply_eta_update(&mut self, update: &EtaUpdate) -> MergeOutcome {
        let record = match (&update.assignment_id, &update.order_id) {
            (Some(id), _) => self
                .records
                .iter_mut()
                .find(|r| r.assignment_id.as_ref() == Some(id)),
            (None, Some(order)) => self
                .records
                .iter_mut()
                .find(|r| r.order_id.as_ref() == Some(order)),
            (None, None) => None,
        };
        let Some(record) = record else {
            return MergeOutcome::Unknown;
        };

        if update.eta.is_some() {
            record.current_eta = update.eta.clone();
        }
        if update.duration_text.is_some() {
            record.duration_text = update.duration_text.clone();
        }
        if update.distance_text.is_some() {
            record.distance_text = update.distance_text.clone();
        }
        MergeOutcome::Merged
    }

    /// Assignment id first; truck id only where the assignment does not conflict.
    fn find_for_location(&mut self, update: &LocationUpdate) -> Option<&mut LocationRecord> {
        if let Some(assignment) = &update.assignment_id {
            if let Some(index) = self
                .records
                .iter()
                .position(|r| r.assignment_id.as_ref() == Some(assignment))
            {
                return self.records.get_mut(index);
            }
        }

        let truck = update.truck_id.as_ref()?;
        self.records.iter_mut().find(|r| {
            let no_conflict = match (&r.assignment_id, &update.assignment_id) {
                (Some(ours), Some(theirs)) => ours == theirs,
                _ => true,
            };
            no_conflict && r.truck_id() == Some(truck)
        })
    }
}

fn normalize_filter(filter: Option<String>) -> Option<String> {
    filter
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
}
