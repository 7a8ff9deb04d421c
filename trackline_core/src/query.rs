//! QueryService - read-only views over the set of TrackBuffers.
//!
//! Every result is a point-in-time snapshot: windowed reads copy the
//! matching points out under the vehicle's lock and iterate outside it,
//! so a long scan never blocks a merge and is never torn by one. Nothing
//! here mutates track state.

use crate::index::VehicleIndex;
use crate::model::{LicenseNumber, TrackPoint, Vehicle};
use crate::registry::VehicleRegistry;
use std::sync::Arc;
use trackline_env::{unix_seconds, TracklineContext};

// ============================================================================
// TRACK WINDOW (Snapshot)
// ============================================================================

/// An ordered, owned snapshot of one vehicle's track over a time window.
///
/// Restartable: `iter()` can be called any number of times; the snapshot
/// never changes after it is taken.
#[derive(Debug, Clone, Default)]
pub struct TrackWindow {
    points: Vec<TrackPoint>,
}

impl TrackWindow {
    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrackPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl IntoIterator for TrackWindow {
    type Item = TrackPoint;
    type IntoIter = std::vec::IntoIter<TrackPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a> IntoIterator for &'a TrackWindow {
    type Item = &'a TrackPoint;
    type IntoIter = std::slice::Iter<'a, TrackPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

// ============================================================================
// QUERY SERVICE
// ============================================================================

/// Read handle shared by dashboards and alerting consumers. Cheap to
/// clone; all clones observe the same engine state.
pub struct QueryService<C: TracklineContext> {
    ctx: Arc<C>,
    index: Arc<VehicleIndex>,
    registry: Arc<dyn VehicleRegistry>,
    silence_ttl: f64,
}

impl<C: TracklineContext> Clone for QueryService<C> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            index: Arc::clone(&self.index),
            registry: Arc::clone(&self.registry),
            silence_ttl: self.silence_ttl,
        }
    }
}

impl<C: TracklineContext> QueryService<C> {
    pub(crate) fn new(
        ctx: Arc<C>,
        index: Arc<VehicleIndex>,
        registry: Arc<dyn VehicleRegistry>,
        silence_ttl: f64,
    ) -> Self {
        Self {
            ctx,
            index,
            registry,
            silence_ttl,
        }
    }

    /// Latest point in the vehicle's buffer, or `None` for an unknown or
    /// evicted license.
    pub fn current_position(&self, license: &str) -> Option<TrackPoint> {
        let entry = self.index.get(license)?;
        let state = entry.lock();
        if state.evicted {
            return None;
        }
        state.buffer.tail().copied()
    }

    /// Ordered snapshot of the track with `from <= timestamp <= to`.
    /// Unknown licenses yield an empty window.
    pub fn track_in_window(&self, license: &str, from: f64, to: f64) -> TrackWindow {
        let Some(entry) = self.index.get(license) else {
            return TrackWindow::default();
        };
        let state = entry.lock();
        if state.evicted {
            return TrackWindow::default();
        }
        TrackWindow {
            points: state.buffer.snapshot_window(from, to),
        }
    }

    /// License numbers seen within the silence TTL, sorted for stable
    /// output.
    pub fn live_vehicles(&self) -> Vec<LicenseNumber> {
        let now = unix_seconds(self.ctx.system_time());
        let mut live: Vec<LicenseNumber> = self
            .index
            .snapshot()
            .into_iter()
            .filter(|entry| {
                let state = entry.lock();
                !state.evicted && now - state.last_seen <= self.silence_ttl
            })
            .map(|entry| entry.license().clone())
            .collect();
        live.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        live
    }

    /// Registry metadata for a license: cached copy if present, otherwise
    /// a lazy read-through to the injected registry. Never writes back.
    pub fn vehicle_info(&self, license: &str) -> Option<Vehicle> {
        let key = LicenseNumber::from(license);

        let Some(entry) = self.index.get(license) else {
            // No live track: consult the registry without caching.
            return self.registry.get_vehicle(&key);
        };

        let mut state = entry.lock();
        if let Some(vehicle) = &state.vehicle {
            return Some(vehicle.clone());
        }
        let vehicle = self.registry.get_vehicle(&key)?;
        state.vehicle = Some(vehicle.clone());
        Some(vehicle)
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
    use crate::registry::InMemoryRegistry;
    use crate::testctx::ManualContext;
    use uuid::Uuid;

    fn setup() -> (
        TrackEngine<ManualContext>,
        Arc<ManualContext>,
        Arc<InMemoryRegistry>,
    ) {
        let ctx = Arc::new(ManualContext::new());
        let registry = Arc::new(InMemoryRegistry::new());
        let engine = TrackEngine::new(
            EngineConfig {
                silence_ttl: 600.0,
                ..Default::default()
            },
            Arc::clone(&ctx),
            Arc::clone(&registry) as Arc<dyn VehicleRegistry>,
        );
        (engine, ctx, registry)
    }

    fn raw(license: &str, lat: f64, lng: f64, ts: f64) -> RawFix {
        RawFix {
            license: license.to_string(),
            lat,
            lng,
            timestamp: Some(ts),
        }
    }

    #[test]
    fn test_current_position_is_latest() {
        let (engine, _ctx, _) = setup();
        engine.submit(raw("TRK-A", 10.0, 20.0, 100.0)).unwrap();
        engine.submit(raw("TRK-A", 11.0, 21.0, 200.0)).unwrap();
        // Late but in-window fix must not become "current".
        engine.submit(raw("TRK-A", 12.0, 22.0, 150.0)).unwrap();

        let p = engine.queries().current_position("TRK-A").unwrap();
        assert_eq!(p.timestamp.value(), 200.0);
        assert_eq!(p.lat, 11.0);
    }

    #[test]
    fn test_current_position_unknown_license() {
        let (engine, _ctx, _) = setup();
        assert!(engine.queries().current_position("GHOST-1").is_none());
    }

    #[test]
    fn test_track_in_window_snapshot() {
        let (engine, _ctx, _) = setup();
        for ts in [100.0, 200.0, 300.0, 400.0] {
            engine.submit(raw("TRK-A", 10.0, ts / 10.0, ts)).unwrap();
        }

        let window = engine.queries().track_in_window("TRK-A", 150.0, 350.0);
        assert_eq!(window.len(), 2);
        let stamps: Vec<_> = window.iter().map(|p| p.timestamp.value()).collect();
        assert_eq!(stamps, vec![200.0, 300.0]);

        // Snapshot is unaffected by later merges.
        engine.submit(raw("TRK-A", 10.0, 25.0, 250.0)).unwrap();
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_live_vehicles_respects_ttl() {
        let (engine, ctx, _) = setup();

        ctx.set_unix_seconds(1_000.0);
        engine.submit(raw("TRK-A", 10.0, 20.0, 100.0)).unwrap();
        ctx.set_unix_seconds(1_500.0);
        engine.submit(raw("TRK-B", 30.0, 40.0, 110.0)).unwrap();

        // At t=1700: A was seen 700 s ago (past the 600 s TTL), B 200 s ago.
        ctx.set_unix_seconds(1_700.0);
        let live = engine.queries().live_vehicles();
        assert_eq!(live, vec![LicenseNumber::new("TRK-B")]);
    }

    #[test]
    fn test_vehicle_info_cached_read_through() {
        let (engine, _ctx, registry) = setup();
        let license = LicenseNumber::new("TRK-A");
        registry.insert(Vehicle {
            id: Uuid::new_v4(),
            license: license.clone(),
            model: "Vito".to_string(),
            brand: "Mercedes".to_string(),
        });

        engine.submit(raw("TRK-A", 10.0, 20.0, 100.0)).unwrap();

        let queries = engine.queries();
        assert_eq!(queries.vehicle_info("TRK-A").unwrap().model, "Vito");

        // Second lookup is served from the entry cache even if the
        // registry forgets the vehicle.
        let entry = Vehicle {
            id: Uuid::new_v4(),
            license: license.clone(),
            model: "Sprinter".to_string(),
            brand: "Mercedes".to_string(),
        };
        registry.insert(entry);
        assert_eq!(queries.vehicle_info("TRK-A").unwrap().model, "Vito");

        // Unknown everywhere.
        assert!(queries.vehicle_info("GHOST-1").is_none());
    }
}
