//! TrackBuffer - the per-vehicle ordered, deduplicated, bounded window of
//! recent track points.
//!
//! The buffer itself is a dumb sorted sequence: all merge policy
//! (duplicates, reorder window) lives in the Reconciler, and whole-buffer
//! deletion belongs to the Evictor. The ordering invariant is fatal when
//! broken - an unsorted buffer means the core guarantee is already gone,
//! so observation panics rather than serving untrustworthy data.

use crate::model::TrackPoint;
use std::cmp::Ordering;

/// Ordered sequence of TrackPoint, unique by `(timestamp, sequence)`,
/// ascending by timestamp then sequence.
#[derive(Debug, Clone, Default)]
pub struct TrackBuffer {
    points: Vec<TrackPoint>,
}

impl TrackBuffer {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All points, oldest first.
    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    /// The newest point, if any.
    pub fn tail(&self) -> Option<&TrackPoint> {
        self.points.last()
    }

    /// Position at which a point with the given key sorts.
    ///
    /// Binary search: the buffer stays sorted, so this is O(log n).
    pub fn insertion_index(&self, ts_value: f64, sequence: u64) -> usize {
        self.points
            .partition_point(|p| point_key_cmp(p, ts_value, sequence) == Ordering::Less)
    }

    /// Inserts at the given index. The caller (Reconciler) has computed
    /// the index via `insertion_index`; ordering is re-checked against
    /// both neighbors and violations are fatal.
    pub fn insert_at(&mut self, index: usize, point: TrackPoint) {
        self.points.insert(index, point);
        self.assert_local_order(index);
    }

    /// Removes and returns the point at `index` (duplicate supersession).
    pub fn remove_at(&mut self, index: usize) -> TrackPoint {
        self.points.remove(index)
    }

    /// Replaces the point at `index` with `point`, re-sorting it to its
    /// own position. Used when a later arrival supersedes a retained
    /// duplicate at the identical timestamp.
    pub fn replace(&mut self, index: usize, point: TrackPoint) {
        self.points.remove(index);
        let idx = self.insertion_index(point.timestamp.value(), point.sequence);
        self.points.insert(idx, point);
        self.assert_local_order(idx);
    }

    /// Trims the buffer to its bounds: at most `max_points`, nothing older
    /// than `max_age` seconds before the newest point. Oldest points go
    /// first. Returns how many points were dropped.
    pub fn trim(&mut self, max_points: usize, max_age: f64) -> usize {
        let before = self.points.len();

        if let Some(newest) = self.points.last() {
            let cutoff = newest.timestamp.value() - max_age;
            let keep_from = self
                .points
                .partition_point(|p| p.timestamp.value() < cutoff);
            if keep_from > 0 {
                self.points.drain(..keep_from);
            }
        }

        if self.points.len() > max_points {
            let excess = self.points.len() - max_points;
            self.points.drain(..excess);
        }

        before - self.points.len()
    }

    /// Drains all points out of the buffer (eviction hand-off).
    pub fn take_points(&mut self) -> Vec<TrackPoint> {
        std::mem::take(&mut self.points)
    }

    /// Copies the points with `from <= timestamp <= to` into an owned,
    /// ordered snapshot.
    pub fn snapshot_window(&self, from: f64, to: f64) -> Vec<TrackPoint> {
        let start = self.points.partition_point(|p| p.timestamp.value() < from);
        let end = self.points.partition_point(|p| p.timestamp.value() <= to);
        self.points[start..end].to_vec()
    }

    /// Full-order verification. O(n); used by tests and the simulation
    /// oracle, and behind debug assertions in the merge path.
    pub fn is_sorted(&self) -> bool {
        self.points
            .windows(2)
            .all(|w| w[0].sort_key() < w[1].sort_key())
    }

    /// Checks the inserted point against its immediate neighbors. An
    /// out-of-order neighbor means the sort invariant was already broken
    /// before this mutation: fatal.
    fn assert_local_order(&self, index: usize) {
        let p = &self.points[index];
        if index > 0 {
            let prev = &self.points[index - 1];
            assert!(
                prev.sort_key() < p.sort_key(),
                "track buffer unsorted at {}: {:?} !< {:?}",
                index,
                prev.sort_key(),
                p.sort_key(),
            );
        }
        if index + 1 < self.points.len() {
            let next = &self.points[index + 1];
            assert!(
                p.sort_key() < next.sort_key(),
                "track buffer unsorted at {}: {:?} !< {:?}",
                index,
                p.sort_key(),
                next.sort_key(),
            );
        }
        debug_assert!(self.is_sorted());
    }
}

/// Compares an existing point against a candidate `(timestamp, sequence)`
/// key. Timestamps compare by value; NaN cannot occur past the validator.
#[inline]
fn point_key_cmp(p: &TrackPoint, ts_value: f64, sequence: u64) -> Ordering {
    match p.timestamp.value().partial_cmp(&ts_value) {
        Some(Ordering::Equal) | None => p.sequence.cmp(&sequence),
        Some(ord) => ord,
    }
}

// ============================================================================
// TESTS
// ============================================================================
