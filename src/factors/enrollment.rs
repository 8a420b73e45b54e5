//! Short-lived holding area for enrolled face templates.
//!
//! Front ends that enroll in one request and encode in a later one park the
//! [`FeatureVector`] here under a random id. Entries expire after a fixed
//! lifetime and the store never holds more than `capacity` of them; the
//! oldest entry is evicted first.

use log::debug;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::factors::face::FeatureVector;

/// Enrolled templates keyed by id, each with its enrollment time.
pub struct EnrollmentStore {
    entries: HashMap<Uuid, (FeatureVector, Instant)>,
    ttl: Duration,
    capacity: usize,
}

impl EnrollmentStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Park a template and return its id.
    pub fn insert(&mut self, template: FeatureVector) -> Uuid {
        self.insert_at(template, Instant::now())
    }

    pub fn insert_at(&mut self, template: FeatureVector, now: Instant) -> Uuid {
        self.purge_expired(now);
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, (_, enrolled))| *enrolled)
                .map(|(id, _)| *id)
            else {
                break;
            };
            debug!("Evicting face template {} (store full)", oldest);
            self.entries.remove(&oldest);
        }

        let id = Uuid::new_v4();
        self.entries.insert(id, (template, now));
        id
    }

    /// Remove and return a live template. Expired entries are treated as absent.
    pub fn take(&mut self, id: &Uuid) -> Option<FeatureVector> {
        self.take_at(id, Instant::now())
    }

    pub fn take_at(&mut self, id: &Uuid, now: Instant) -> Option<FeatureVector> {
        self.purge_expired(now);
        self.entries.remove(id).map(|(template, _)| template)
    }

    /// Put back a template taken for an operation that then failed.
    /// It keeps its original enrollment time, so it still expires on schedule.
    pub fn restore(&mut self, id: Uuid, template: FeatureVector, enrolled: Instant) {
        self.entries.insert(id, (template, enrolled));
    }

    /// Enrollment time of a live entry.
    pub fn enrolled_at(&self, id: &Uuid) -> Option<Instant> {
        self.entries.get(id).map(|(_, enrolled)| *enrolled)
    }

    fn purge_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (_, enrolled)| now.saturating_duration_since(*enrolled) < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::face::VECTOR_LEN;

    fn template(fill: u8) -> FeatureVector {
        FeatureVector::try_from(vec![fill; VECTOR_LEN]).unwrap()
    }

    #[test]
    fn test_take_removes_entry() {
        let mut store = EnrollmentStore::new(Duration::from_secs(60), 4);
        let id = store.insert(template(1));
        assert_eq!(store.len(), 1);

        assert_eq!(store.take(&id), Some(template(1)));
        assert!(store.take(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_entries_expire() {
        let t0 = Instant::now();
        let mut store = EnrollmentStore::new(Duration::from_secs(60), 4);
        let id = store.insert_at(template(1), t0);

        assert!(store.take_at(&id, t0 + Duration::from_secs(60)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_purges_expired_entries() {
        let t0 = Instant::now();
        let mut store = EnrollmentStore::new(Duration::from_secs(60), 100);
        for i in 0..10 {
            store.insert_at(template(i), t0);
        }
        assert_eq!(store.len(), 10);

        store.insert_at(template(99), t0 + Duration::from_secs(61));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_repeated_enrollment_is_capped() {
        let t0 = Instant::now();
        let mut store = EnrollmentStore::new(Duration::from_secs(600), 3);

        let first = store.insert_at(template(0), t0);
        let mut last = first;
        for i in 1..50u8 {
            last = store.insert_at(template(i), t0 + Duration::from_millis(i as u64));
        }

        assert_eq!(store.len(), 3);
        // Oldest evicted first
        assert!(store.take_at(&first, t0).is_none());
        assert_eq!(store.take_at(&last, t0), Some(template(49)));
    }

    #[test]
    fn test_restore_keeps_original_expiry() {
        let t0 = Instant::now();
        let mut store = EnrollmentStore::new(Duration::from_secs(60), 4);
        let id = store.insert_at(template(7), t0);
        let enrolled = store.enrolled_at(&id).unwrap();

        let taken = store.take_at(&id, t0 + Duration::from_secs(10)).unwrap();
        store.restore(id, taken, enrolled);

        assert_eq!(store.enrolled_at(&id), Some(t0));
        assert_eq!(store.take_at(&id, t0 + Duration::from_secs(20)), Some(template(7)));

        let taken = template(7);
        store.restore(id, taken, enrolled);
        assert!(store.take_at(&id, t0 + Duration::from_secs(61)).is_none());
    }
}
