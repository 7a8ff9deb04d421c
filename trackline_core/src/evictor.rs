//! Evictor - reclaims buffers for vehicles that have gone silent.
//!
//! Runs on a periodic cycle spawned on the environment context, never
//! externally triggered. This is the only component permitted to delete a
//! TrackBuffer outright; the Reconciler only trims within a live one.
//!
//! Coordination with in-flight merges: the sweep marks an entry `evicted`
//! under the same per-vehicle lock that merges hold, releases it, and
//! only then removes the entry from the map. A submitter that acquired
//! the entry between those two steps observes the flag and re-resolves,
//! so no accepted fix ever lands in a detached buffer.

use crate::archive::TrackArchive;
use crate::index::VehicleIndex;
use crate::metrics::EngineMetrics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use trackline_env::{unix_seconds, TracklineContext};

/// Periodic whole-buffer reclamation.
pub struct Evictor<C: TracklineContext> {
    ctx: Arc<C>,
    index: Arc<VehicleIndex>,
    archive: Arc<dyn TrackArchive>,
    metrics: Arc<EngineMetrics>,
    silence_ttl: f64,
    cycle: Duration,
}

impl<C: TracklineContext> Evictor<C> {
    pub(crate) fn new(
        ctx: Arc<C>,
        index: Arc<VehicleIndex>,
        archive: Arc<dyn TrackArchive>,
        metrics: Arc<EngineMetrics>,
        silence_ttl: f64,
        cycle: Duration,
    ) -> Self {
        Self {
            ctx,
            index,
            archive,
            metrics,
            silence_ttl,
            cycle,
        }
    }

    /// One sweep over the index at time `now` (unix seconds). Returns the
    /// number of vehicles evicted.
    pub fn sweep(&self, now: f64) -> usize {
        let mut evicted = 0;

        for entry in self.index.snapshot() {
            let points = {
                let mut state = entry.lock();
                if state.evicted || now - state.last_seen <= self.silence_ttl {
                    continue;
                }
                state.evicted = true;
                state.buffer.take_points()
            };
            // Entry lock released: removal takes only the map lock.
            self.index.remove(entry.license());

            if let Err(err) = self.archive.archive(entry.license(), &points) {
                tracing::error!(license = %entry.license(), %err, "failed to archive evicted track");
            }
            self.metrics.record_eviction(points.len());
            tracing::info!(
                license = %entry.license(),
                points = points.len(),
                "evicted silent vehicle"
            );
            evicted += 1;
        }

        evicted
    }

    /// Spawns the periodic cycle on the context. The returned handle
    /// stops the loop at its next wakeup.
    pub fn spawn(self) -> EvictorHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let ctx = Arc::clone(&self.ctx);

        ctx.spawn("evictor", async move {
            loop {
                self.ctx.sleep(self.cycle).await;
                if flag.load(Ordering::Relaxed) {
                    break;
                }
                let now = unix_seconds(self.ctx.system_time());
                let evicted = self.sweep(now);
                if evicted > 0 {
                    tracing::debug!(evicted, "eviction sweep complete");
                }
            }
        });

        EvictorHandle { shutdown }
    }
}

/// Stops a spawned eviction loop.
pub struct EvictorHandle {
    shutdown: Arc<AtomicBool>,
}

impl EvictorHandle {
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, TrackEngine};
    use crate::model::RawFix;
    use crate::registry::{InMemoryRegistry, VehicleRegistry};
    use crate::testctx::ManualContext;

    fn engine_with_ttl(silence_ttl: f64) -> (TrackEngine<ManualContext>, Arc<ManualContext>) {
        let ctx = Arc::new(ManualContext::new());
        let registry: Arc<dyn VehicleRegistry> = Arc::new(InMemoryRegistry::new());
        let engine = TrackEngine::new(
            EngineConfig {
                silence_ttl,
                ..Default::default()
            },
            Arc::clone(&ctx),
            registry,
        );
        (engine, ctx)
    }

    fn raw(license: &str, ts: f64) -> RawFix {
        RawFix {
            license: license.to_string(),
            lat: 10.0,
            lng: 20.0,
            timestamp: Some(ts),
        }
    }

    #[test]
    fn test_sweep_evicts_only_silent_vehicles() {
        let (engine, ctx) = engine_with_ttl(600.0);

        ctx.set_unix_seconds(1_000.0);
        engine.submit(raw("TRK-OLD", 100.0)).unwrap();
        ctx.set_unix_seconds(1_500.0);
        engine.submit(raw("TRK-NEW", 110.0)).unwrap();

        let evictor = engine.evictor();
        // At t=1700 only TRK-OLD (700 s silent) is past the TTL.
        assert_eq!(evictor.sweep(1_700.0), 1);
        assert_eq!(engine.tracked_vehicles(), 1);

        let queries = engine.queries();
        assert!(queries.current_position("TRK-OLD").is_none());
        assert!(queries.current_position("TRK-NEW").is_some());
        assert_eq!(engine.metrics().snapshot().evicted_vehicles, 1);
    }

    #[test]
    fn test_sweep_idempotent_on_quiet_index() {
        let (engine, ctx) = engine_with_ttl(600.0);
        ctx.set_unix_seconds(1_000.0);
        engine.submit(raw("TRK-A", 100.0)).unwrap();

        let evictor = engine.evictor();
        assert_eq!(evictor.sweep(1_100.0), 0);
        assert_eq!(evictor.sweep(1_100.0), 0);
        assert_eq!(engine.tracked_vehicles(), 1);
    }

    #[test]
    fn test_resubmission_after_eviction_recreates_track() {
        let (engine, ctx) = engine_with_ttl(600.0);

        ctx.set_unix_seconds(1_000.0);
        engine.submit(raw("TRK-A", 100.0)).unwrap();
        engine.evictor().sweep(2_000.0);
        assert_eq!(engine.tracked_vehicles(), 0);

        ctx.set_unix_seconds(2_100.0);
        engine.submit(raw("TRK-A", 200.0)).unwrap();
        assert_eq!(engine.tracked_vehicles(), 1);
        let p = engine.queries().current_position("TRK-A").unwrap();
        assert_eq!(p.timestamp.value(), 200.0);
    }

    #[test]
    fn test_evicted_points_reach_archive() {
        use crate::archive::{ArchiveError, TrackArchive};
        use crate::model::{LicenseNumber, TrackPoint};
        use std::sync::Mutex;

        #[derive(Default)]
        struct RecordingArchive {
            tracks: Mutex<Vec<(LicenseNumber, usize)>>,
        }

        impl TrackArchive for RecordingArchive {
            fn archive(
                &self,
                license: &LicenseNumber,
                points: &[TrackPoint],
            ) -> Result<(), ArchiveError> {
                self.tracks
                    .lock()
                    .unwrap()
                    .push((license.clone(), points.len()));
                Ok(())
            }
        }

        let ctx = Arc::new(ManualContext::new());
        let registry: Arc<dyn VehicleRegistry> = Arc::new(InMemoryRegistry::new());
        let archive = Arc::new(RecordingArchive::default());
        let engine = TrackEngine::with_archive(
            EngineConfig {
                silence_ttl: 600.0,
                min_distinct_interval: 0.0,
                min_distinct_distance_m: 0.0,
                ..Default::default()
            },
            Arc::clone(&ctx),
            registry,
            Arc::clone(&archive) as Arc<dyn TrackArchive>,
        );

        ctx.set_unix_seconds(1_000.0);
        for ts in [100.0, 110.0, 120.0] {
            engine.submit(raw("TRK-A", ts)).unwrap();
        }
        engine.evictor().sweep(2_000.0);

        let archived = archive.tracks.lock().unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0], (LicenseNumber::new("TRK-A"), 3));
    }

    #[tokio::test]
    async fn test_spawned_cycle_evicts_on_real_clock() {
        use trackline_env::TokioContext;

        let ctx = TokioContext::shared();
        let registry: Arc<dyn VehicleRegistry> = Arc::new(InMemoryRegistry::new());
        let engine = TrackEngine::new(
            EngineConfig {
                silence_ttl: 0.05,
                eviction_cycle_interval: Duration::from_millis(10),
                ..Default::default()
            },
            Arc::clone(&ctx),
            registry,
        );

        engine.submit(raw("TRK-A", 100.0)).unwrap();
        assert_eq!(engine.tracked_vehicles(), 1);

        let handle = engine.start_evictor();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(engine.tracked_vehicles(), 0);
        handle.stop();
    }
}
