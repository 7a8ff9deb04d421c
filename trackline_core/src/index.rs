//! VehicleIndex - the read-through binding between a license number and
//! the vehicle's live track state.
//!
//! Concurrency model: the index is a read-preferring map of `Arc`'d
//! entries. Merges for different vehicles proceed in parallel; merges for
//! the same vehicle serialize on that entry's own mutex. There is no
//! global lock held across a merge. Entry creation double-checks under
//! the map's write lock, so concurrent first-sight resolves for one
//! license create exactly one entry.

use crate::buffer::TrackBuffer;
use crate::model::{LicenseNumber, Vehicle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

// ============================================================================
// ENTRY
// ============================================================================

/// Mutable per-vehicle state, guarded by the entry's mutex.
#[derive(Debug)]
pub struct EntryState {
    /// The live track. Mutated only by the Reconciler (via the engine).
    pub buffer: TrackBuffer,

    /// Unix seconds of the last accepted submission for this license.
    pub last_seen: f64,

    /// Cached registry metadata; populated lazily, never written back.
    pub vehicle: Option<Vehicle>,

    /// Set by the Evictor under this lock just before the entry leaves
    /// the map. A submitter that raced the eviction re-resolves instead
    /// of merging into a detached buffer.
    pub evicted: bool,
}

/// One vehicle's slot in the index. The TrackBuffer's lifetime is tied to
/// this entry.
#[derive(Debug)]
pub struct VehicleEntry {
    license: LicenseNumber,
    state: Mutex<EntryState>,
}

impl VehicleEntry {
    fn new(license: LicenseNumber, first_seen: f64) -> Self {
        Self {
            license,
            state: Mutex::new(EntryState {
                buffer: TrackBuffer::new(),
                last_seen: first_seen,
                vehicle: None,
                evicted: false,
            }),
        }
    }

    pub fn license(&self) -> &LicenseNumber {
        &self.license
    }

    /// Acquires this vehicle's exclusive lock. Merges, queries'
    /// snapshotting, and eviction all pass through here.
    pub fn lock(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock().unwrap()
    }
}

// ============================================================================
// INDEX
// ============================================================================

/// `license → entry` map. Exclusively owns its entries.
#[derive(Debug, Default)]
pub struct VehicleIndex {
    entries: RwLock<HashMap<LicenseNumber, Arc<VehicleEntry>>>,
}

impl VehicleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a license to its entry, creating one on first sight.
    ///
    /// The fast path is a shared read lock; only an unseen license takes
    /// the write lock, and the `entry()` double-check there guarantees
    /// at-most-one creation under concurrent first sights.
    pub fn resolve(&self, license: &LicenseNumber, now: f64) -> Arc<VehicleEntry> {
        if let Some(entry) = self.entries.read().unwrap().get(license) {
            return Arc::clone(entry);
        }

        let mut entries = self.entries.write().unwrap();
        let entry = entries
            .entry(license.clone())
            .or_insert_with(|| Arc::new(VehicleEntry::new(license.clone(), now)));
        Arc::clone(entry)
    }

    /// Looks up an entry without creating one (query path).
    pub fn get(&self, license: &str) -> Option<Arc<VehicleEntry>> {
        self.entries.read().unwrap().get(license).cloned()
    }

    /// Marks a known license as seen at `now`. Returns false for a
    /// license the index does not hold.
    pub fn touch(&self, license: &str, now: f64) -> bool {
        match self.get(license) {
            Some(entry) => {
                entry.lock().last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Removes an entry. Called by the Evictor after it has marked the
    /// entry evicted under the entry lock (and released it), so removal
    /// never holds two locks at once.
    pub fn remove(&self, license: &LicenseNumber) -> Option<Arc<VehicleEntry>> {
        self.entries.write().unwrap().remove(license)
    }

    /// Snapshot of all entries for iteration (eviction sweeps, live
    /// listings) without holding the map lock during per-entry work.
    pub fn snapshot(&self) -> Vec<Arc<VehicleEntry>> {
        self.entries.read().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_resolve_creates_once() {
        let index = VehicleIndex::new();
        let license = LicenseNumber::new("ABC-123");

        let a = index.resolve(&license, 100.0);
        let b = index.resolve(&license, 200.0);

        assert_eq!(index.len(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        // first_seen sticks; the second resolve does not reset it
        assert_eq!(a.lock().last_seen, 100.0);
    }

    #[test]
    fn test_concurrent_first_sight_single_creation() {
        let index = Arc::new(VehicleIndex::new());
        let license = LicenseNumber::new("RACE-1");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let index = Arc::clone(&index);
                let license = license.clone();
                thread::spawn(move || index.resolve(&license, 1.0))
            })
            .collect();

        let entries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(index.len(), 1);
        for pair in entries.windows(2) {
            assert!(Arc::ptr_eq(&pair[0], &pair[1]));
        }
    }

    #[test]
    fn test_distinct_licenses_distinct_entries() {
        let index = VehicleIndex::new();
        let a = index.resolve(&LicenseNumber::new("AAA-111"), 1.0);
        let b = index.resolve(&LicenseNumber::new("BBB-222"), 1.0);

        assert_eq!(index.len(), 2);
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_touch_updates_last_seen() {
        let index = VehicleIndex::new();
        let license = LicenseNumber::new("ABC-123");
        index.resolve(&license, 100.0);

        assert!(index.touch("ABC-123", 250.0));
        assert_eq!(index.get("ABC-123").unwrap().lock().last_seen, 250.0);
        assert!(!index.touch("GHOST-1", 250.0));
    }

    #[test]
    fn test_get_does_not_create() {
        let index = VehicleIndex::new();
        assert!(index.get("GHOST-1").is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_remove_drops_entry() {
        let index = VehicleIndex::new();
        let license = LicenseNumber::new("ABC-123");
        index.resolve(&license, 1.0);

        assert!(index.remove(&license).is_some());
        assert!(index.get("ABC-123").is_none());
        assert!(index.remove(&license).is_none());
    }
}
