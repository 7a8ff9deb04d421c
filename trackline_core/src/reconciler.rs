//! Reconciler - merges a newly arriving fix into a vehicle's TrackBuffer,
//! resolving ordering and duplicates.
//!
//! The merge pipeline:
//! 1. Reorder-window gate (protects against unbounded retroactive rewrites)
//! 2. Binary-search insertion position by `(timestamp, sequence)`
//! 3. Duplicate suppression (close in time AND space; never both retained)
//! 4. Insert + local trim to the buffer's bounds
//!
//! Local trimming here is distinct from the Evictor's whole-buffer
//! reclamation: the Reconciler only ever shrinks a live buffer.

use crate::buffer::TrackBuffer;
use crate::engine::EngineConfig;
use crate::model::{GpsFix, TrackPoint};
use geo::{point, HaversineDistance};
use serde::Serialize;

/// Mean earth radius in meters, for the planar approximation.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

// ============================================================================
// MERGE OUTCOME
// ============================================================================

/// What happened to a submitted fix. `DuplicateIgnored` and
/// `OutOfWindowIgnored` are expected steady-state outcomes, not errors:
/// they are reported for observability and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MergeOutcome {
    /// The fix was retained (inserted, or it replaced a lower-precision
    /// duplicate).
    Inserted,

    /// An equivalent point already exists; the buffer is unchanged in
    /// length.
    DuplicateIgnored,

    /// The fix is older than the buffer tail by more than the reorder
    /// window; too old to safely reconcile.
    OutOfWindowIgnored,
}

// ============================================================================
// DISTANCE MODEL
// ============================================================================

/// How the duplicate-distance check measures the gap between two fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceModel {
    /// Great-circle distance. Exact enough everywhere; the default.
    Haversine,

    /// Equirectangular approximation. Cheaper, adequate at the 10 m
    /// scale of duplicate suppression.
    Planar,
}

impl DistanceModel {
    /// Distance in meters between two (lat, lng) positions.
    pub fn distance_m(&self, lat_a: f64, lng_a: f64, lat_b: f64, lng_b: f64) -> f64 {
        match self {
            DistanceModel::Haversine => {
                let a = point!(x: lng_a, y: lat_a);
                let b = point!(x: lng_b, y: lat_b);
                a.haversine_distance(&b)
            }
            DistanceModel::Planar => {
                let mid_lat = ((lat_a + lat_b) / 2.0).to_radians();
                let dx = (lng_b - lng_a).to_radians() * mid_lat.cos() * EARTH_RADIUS_M;
                let dy = (lat_b - lat_a).to_radians() * EARTH_RADIUS_M;
                (dx * dx + dy * dy).sqrt()
            }
        }
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

/// Stateless merge policy over a TrackBuffer. One Reconciler serves all
/// vehicles; the per-vehicle state lives in the buffers it is handed.
#[derive(Debug, Clone)]
pub struct Reconciler {
    min_distinct_interval: f64,
    min_distinct_distance_m: f64,
    max_reorder_window: f64,
    buffer_max_points: usize,
    buffer_max_age: f64,
    distance_model: DistanceModel,
}

impl Reconciler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            min_distinct_interval: config.min_distinct_interval,
            min_distinct_distance_m: config.min_distinct_distance_m,
            max_reorder_window: config.max_reorder_window,
            buffer_max_points: config.buffer_max_points,
            buffer_max_age: config.buffer_max_age,
            distance_model: config.distance_model,
        }
    }

    /// Merges one validated fix into the buffer. The caller holds the
    /// vehicle's exclusive lock and has assigned `sequence` under it, so
    /// sequences reflect per-vehicle arrival order.
    pub fn merge(&self, buffer: &mut TrackBuffer, fix: &GpsFix, sequence: u64) -> MergeOutcome {
        let ts = fix.timestamp.value();

        // Gate: older than the tail by more than the reorder window.
        if let Some(tail) = buffer.tail() {
            if tail.timestamp.value() - ts > self.max_reorder_window {
                return MergeOutcome::OutOfWindowIgnored;
            }
        }

        let idx = buffer.insertion_index(ts, sequence);

        if let Some(dup_idx) = self.find_duplicate(buffer, fix, idx) {
            let existing = buffer.points()[dup_idx];
            let new_rank = fix.timestamp.rank();
            let old_rank = existing.timestamp.rank();

            if new_rank < old_rank {
                // Explicit supersedes inferred: never both retained. The
                // superseded point is removed and the merge re-runs, so
                // the new fix is also checked against the remaining
                // points before it lands.
                buffer.remove_at(dup_idx);
                return self.merge(buffer, fix, sequence);
            }

            if new_rank == old_rank && existing.timestamp.value() == ts {
                // Identical timestamp, same rank: the later arrival wins
                // as the retained point. No new information, though, so
                // the caller still sees a duplicate.
                buffer.replace(dup_idx, TrackPoint::from_fix(fix, sequence));
            }

            return MergeOutcome::DuplicateIgnored;
        }

        buffer.insert_at(idx, TrackPoint::from_fix(fix, sequence));
        let trimmed = buffer.trim(self.buffer_max_points, self.buffer_max_age);
        if trimmed > 0 {
            tracing::trace!(license = %fix.license, trimmed, "trimmed buffer to bounds");
        }

        MergeOutcome::Inserted
    }

    /// Scans outward from the insertion position for the closest-in-time
    /// existing point that is within `min_distinct_interval` AND
    /// `min_distinct_distance_m` of the fix. The scan stops at the first
    /// point outside the time window on each side, so it is O(k) in the
    /// number of near-in-time points, not O(n).
    fn find_duplicate(&self, buffer: &TrackBuffer, fix: &GpsFix, idx: usize) -> Option<usize> {
        let ts = fix.timestamp.value();
        let points = buffer.points();
        let mut best: Option<(usize, f64)> = None;

        let consider = |j: usize, dt: f64, best: &mut Option<(usize, f64)>| {
            let p = &points[j];
            let dist = self
                .distance_model
                .distance_m(fix.lat, fix.lng, p.lat, p.lng);
            if dist <= self.min_distinct_distance_m
                && best.map_or(true, |(_, best_dt)| dt < best_dt)
            {
                *best = Some((j, dt));
            }
        };

        for j in (0..idx).rev() {
            let dt = ts - points[j].timestamp.value();
            if dt > self.min_distinct_interval {
                break;
            }
            consider(j, dt, &mut best);
        }
        for (j, p) in points.iter().enumerate().skip(idx) {
            let dt = p.timestamp.value() - ts;
            if dt > self.min_distinct_interval {
                break;
            }
            consider(j, dt, &mut best);
        }

        best.map(|(j, _)| j)
    }
}

// ============================================================================
// TESTS
// ============================================================================
