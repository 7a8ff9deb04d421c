//! TrackEngine - the facade wiring the reconstruction pipeline together.
//!
//! `submit` is the single ingress: raw fix → validator → index
//! (lookup/create) → reconciler (merge under the vehicle's lock). Reads
//! go through the `QueryService`; reclamation through the `Evictor`. The
//! engine owns the configuration and the global sequence counter.

use crate::archive::{NullArchive, TrackArchive};
use crate::evictor::{Evictor, EvictorHandle};
use crate::index::VehicleIndex;
use crate::metrics::EngineMetrics;
use crate::model::RawFix;
use crate::query::QueryService;
use crate::reconciler::{DistanceModel, MergeOutcome, Reconciler};
use crate::registry::VehicleRegistry;
use crate::validator::{PointValidator, RejectReason};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use trackline_env::{unix_seconds, TracklineContext};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the TrackEngine.
///
/// The thresholds are design choices, not reverse-engineered constants:
/// treat them as configuration, not fixed law.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Two fixes closer than this in time AND within
    /// `min_distinct_distance_m` are duplicates (default: 5 s)
    pub min_distinct_interval: f64,

    /// Spatial half of the duplicate check (default: 10 m)
    pub min_distinct_distance_m: f64,

    /// How the duplicate check measures distance (default: Haversine)
    pub distance_model: DistanceModel,

    /// A fix older than the buffer tail by more than this is too old to
    /// safely reconcile (default: 120 s)
    pub max_reorder_window: f64,

    /// Maximum points retained per vehicle (default: 512)
    pub buffer_max_points: usize,

    /// Maximum age of a retained point relative to the newest one
    /// (default: 3600 s)
    pub buffer_max_age: f64,

    /// Silence beyond this evicts the vehicle's track (default: 600 s)
    pub silence_ttl: f64,

    /// Period of the eviction cycle (default: 30 s)
    pub eviction_cycle_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_distinct_interval: 5.0,
            min_distinct_distance_m: 10.0,
            distance_model: DistanceModel::Haversine,
            max_reorder_window: 120.0,
            buffer_max_points: 512,
            buffer_max_age: 3600.0,
            silence_ttl: 600.0,
            eviction_cycle_interval: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// The track reconstruction engine.
///
/// Thread-safe: submissions for different vehicles merge in parallel;
/// submissions for one vehicle serialize on its entry lock, where the
/// sequence number is also assigned so sequences reflect per-vehicle
/// arrival order.
pub struct TrackEngine<C: TracklineContext> {
    config: EngineConfig,
    ctx: Arc<C>,
    index: Arc<VehicleIndex>,
    validator: PointValidator,
    reconciler: Reconciler,
    registry: Arc<dyn VehicleRegistry>,
    archive: Arc<dyn TrackArchive>,
    metrics: Arc<EngineMetrics>,
    sequence: AtomicU64,
}

impl<C: TracklineContext> TrackEngine<C> {
    /// Creates an engine with the default (discarding) archive sink.
    pub fn new(config: EngineConfig, ctx: Arc<C>, registry: Arc<dyn VehicleRegistry>) -> Self {
        Self::with_archive(config, ctx, registry, Arc::new(NullArchive))
    }

    /// Creates an engine that hands evicted tracks to `archive`.
    pub fn with_archive(
        config: EngineConfig,
        ctx: Arc<C>,
        registry: Arc<dyn VehicleRegistry>,
        archive: Arc<dyn TrackArchive>,
    ) -> Self {
        let reconciler = Reconciler::new(&config);
        Self {
            config,
            ctx,
            index: Arc::new(VehicleIndex::new()),
            validator: PointValidator::new(),
            reconciler,
            registry,
            archive,
            metrics: Arc::new(EngineMetrics::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Submits one raw fix through the full pipeline.
    ///
    /// Rejections are the caller's fault and surfaced synchronously;
    /// `DuplicateIgnored` / `OutOfWindowIgnored` are expected outcomes,
    /// reported but never retried.
    pub fn submit(&self, raw: RawFix) -> Result<MergeOutcome, RejectReason> {
        self.metrics.record_submission();
        let receipt = unix_seconds(self.ctx.system_time());

        let fix = match self.validator.validate(raw, receipt) {
            Ok(fix) => fix,
            Err(reason) => {
                self.metrics.record_rejection();
                tracing::debug!(%reason, "fix rejected at boundary");
                return Err(reason);
            }
        };

        loop {
            let entry = self.index.resolve(&fix.license, receipt);
            let mut state = entry.lock();
            if state.evicted {
                // Lost a race with the evictor: this entry is leaving the
                // map. Re-resolve; the next round creates a fresh one.
                continue;
            }

            // Any validated sighting proves the vehicle is alive, even if
            // the point itself ends up suppressed.
            state.last_seen = receipt;

            let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
            let outcome = self.reconciler.merge(&mut state.buffer, &fix, sequence);
            drop(state);

            self.metrics.record_outcome(outcome);
            tracing::debug!(license = %fix.license, ?outcome, "merged fix");
            return Ok(outcome);
        }
    }

    /// A read-only query handle sharing this engine's state.
    pub fn queries(&self) -> QueryService<C> {
        QueryService::new(
            Arc::clone(&self.ctx),
            Arc::clone(&self.index),
            Arc::clone(&self.registry),
            self.config.silence_ttl,
        )
    }

    /// Starts the periodic eviction cycle on the engine's context.
    /// Returns a handle that can stop the loop.
    pub fn start_evictor(&self) -> EvictorHandle {
        self.evictor().spawn()
    }

    /// The eviction component itself; exposed for tests and harnesses
    /// that drive sweeps manually instead of on a timer.
    pub fn evictor(&self) -> Evictor<C> {
        Evictor::new(
            Arc::clone(&self.ctx),
            Arc::clone(&self.index),
            Arc::clone(&self.archive),
            Arc::clone(&self.metrics),
            self.config.silence_ttl,
            self.config.eviction_cycle_interval,
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Number of vehicles currently holding a live buffer.
    pub fn tracked_vehicles(&self) -> usize {
        self.index.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;
    use crate::testctx::ManualContext;

    fn engine_with(config: EngineConfig) -> (TrackEngine<ManualContext>, Arc<ManualContext>) {
        let ctx = Arc::new(ManualContext::new());
        let registry: Arc<dyn VehicleRegistry> = Arc::new(InMemoryRegistry::new());
        (TrackEngine::new(config, Arc::clone(&ctx), registry), ctx)
    }

    fn raw(license: &str, lat: f64, lng: f64, timestamp: Option<f64>) -> RawFix {
        RawFix {
            license: license.to_string(),
            lat,
            lng,
            timestamp,
        }
    }

    #[test]
    fn test_submit_worked_example() {
        let (engine, _ctx) = engine_with(EngineConfig {
            min_distinct_distance_m: 50.0,
            max_reorder_window: 30.0,
            ..Default::default()
        });

        assert_eq!(
            engine.submit(raw("TRK-A", 10.0, 20.0, Some(100.0))).unwrap(),
            MergeOutcome::Inserted
        );
        assert_eq!(
            engine
                .submit(raw("TRK-A", 10.0001, 20.0001, Some(102.0)))
                .unwrap(),
            MergeOutcome::DuplicateIgnored
        );
        assert_eq!(
            engine.submit(raw("TRK-A", 10.0, 20.0, Some(50.0))).unwrap(),
            MergeOutcome::OutOfWindowIgnored
        );
        assert_eq!(
            engine.submit(raw("TRK-A", 11.0, 21.0, Some(80.0))).unwrap(),
            MergeOutcome::Inserted
        );

        let snap = engine.metrics().snapshot();
        assert_eq!(snap.submitted, 4);
        assert_eq!(snap.inserted, 2);
        assert_eq!(snap.duplicates, 1);
        assert_eq!(snap.out_of_window, 1);
    }

    #[test]
    fn test_submit_rejects_malformed() {
        let (engine, _ctx) = engine_with(EngineConfig::default());

        assert!(engine.submit(raw("", 0.0, 0.0, None)).is_err());
        assert!(engine.submit(raw("TRK-A", 95.0, 0.0, None)).is_err());
        assert_eq!(engine.tracked_vehicles(), 0);
        assert_eq!(engine.metrics().snapshot().rejected, 2);
    }

    #[test]
    fn test_missing_timestamp_uses_receipt_time() {
        let (engine, ctx) = engine_with(EngineConfig::default());
        ctx.set_unix_seconds(1_000.0);

        engine.submit(raw("TRK-A", 10.0, 20.0, None)).unwrap();

        let queries = engine.queries();
        let point = queries.current_position("TRK-A").unwrap();
        assert!(point.timestamp.is_inferred());
        assert_eq!(point.timestamp.value(), 1_000.0);
    }

    #[test]
    fn test_first_sight_creates_single_buffer() {
        let (engine, _ctx) = engine_with(EngineConfig::default());

        engine.submit(raw("TRK-A", 10.0, 20.0, Some(1.0))).unwrap();
        engine.submit(raw("TRK-A", 10.1, 20.1, Some(10.0))).unwrap();
        engine.submit(raw("TRK-B", 30.0, 40.0, Some(1.0))).unwrap();

        assert_eq!(engine.tracked_vehicles(), 2);
    }

    #[test]
    fn test_concurrent_distinct_vehicles_isolated() {
        use std::thread;

        let (engine, _ctx) = engine_with(EngineConfig {
            // Wide-open thresholds: every accepted fix must be retained.
            min_distinct_interval: 0.0,
            min_distinct_distance_m: 0.0,
            max_reorder_window: f64::MAX,
            buffer_max_points: 100_000,
            ..Default::default()
        });
        let engine = Arc::new(engine);

        const PER_VEHICLE: usize = 500;
        let handles: Vec<_> = ["TRK-A", "TRK-B", "TRK-C", "TRK-D"]
            .into_iter()
            .map(|license| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for i in 0..PER_VEHICLE {
                        // Deliberately shuffled timestamps inside each
                        // stream to force out-of-order inserts.
                        let ts = ((i * 7919) % PER_VEHICLE) as f64;
                        let outcome = engine
                            .submit(raw(license, 10.0 + i as f64 * 1e-4, 20.0, Some(ts)))
                            .unwrap();
                        assert_eq!(outcome, MergeOutcome::Inserted);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let queries = engine.queries();
        for license in ["TRK-A", "TRK-B", "TRK-C", "TRK-D"] {
            let window = queries.track_in_window(license, 0.0, f64::MAX);
            assert_eq!(window.len(), PER_VEHICLE, "{license} lost points");
            let points = window.points();
            assert!(
                points.windows(2).all(|w| w[0].sort_key() < w[1].sort_key()),
                "{license} unsorted"
            );
        }
    }

    #[test]
    fn test_sequences_strictly_increase_per_vehicle() {
        let (engine, _ctx) = engine_with(EngineConfig {
            min_distinct_interval: 0.0,
            min_distinct_distance_m: 0.0,
            ..Default::default()
        });

        for ts in [10.0, 20.0, 30.0] {
            engine.submit(raw("TRK-A", 10.0, 20.0, Some(ts))).unwrap();
        }

        let window = engine.queries().track_in_window("TRK-A", 0.0, f64::MAX);
        let seqs: Vec<_> = window.points().iter().map(|p| p.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }
}
