//! Scenario runner: drives a real TrackEngine against the oracle's fleet
//! through the corrupting feed, then verifies the engine's contract
//! properties against what the oracle knows to be true.

use crate::context::SimContext;
use crate::feed::{FeedConfig, FixFeed};
use crate::oracle::FleetOracle;
use crate::scenarios::ScenarioId;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use trackline_core::metrics::MetricsSnapshot;
use trackline_core::registry::{InMemoryRegistry, VehicleRegistry};
use trackline_core::{EngineConfig, TrackEngine};
use trackline_env::{unix_seconds, TracklineContext};

/// Outcome of one scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub scenario: ScenarioId,
    pub seed: u64,
    pub passed: bool,
    pub total_ticks: u64,
    pub fixes_submitted: u64,
    pub live_vehicles: usize,
    pub metrics: MetricsSnapshot,
    pub failure_reason: Option<String>,
}

/// Runs scenarios with a fixed seed and fleet size.
pub struct ScenarioRunner {
    seed: u64,
    vehicles: usize,
    duration: f64,
}

impl ScenarioRunner {
    pub fn new(seed: u64, vehicles: usize) -> Self {
        Self {
            seed,
            vehicles,
            duration: 120.0,
        }
    }

    /// Simulated duration in seconds (1 s per tick).
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    fn engine_config(scenario: ScenarioId) -> EngineConfig {
        match scenario {
            ScenarioId::SteadyState | ScenarioId::DuplicateFlood => EngineConfig::default(),
            ScenarioId::TimeWarp => EngineConfig {
                max_reorder_window: 20.0,
                ..Default::default()
            },
            ScenarioId::SilentFleet => EngineConfig {
                silence_ttl: 45.0,
                eviction_cycle_interval: Duration::from_secs(5),
                ..Default::default()
            },
            ScenarioId::RushHour => EngineConfig {
                buffer_max_points: 64,
                ..Default::default()
            },
        }
    }

    fn feed_config(scenario: ScenarioId) -> FeedConfig {
        match scenario {
            ScenarioId::SteadyState | ScenarioId::RushHour => FeedConfig::default(),
            ScenarioId::DuplicateFlood => FeedConfig {
                duplicate_rate: 0.8,
                ..Default::default()
            },
            ScenarioId::TimeWarp => FeedConfig {
                reorder_rate: 0.4,
                max_reorder_delay_ticks: 40,
                clock_skew_std: 4.0,
                drop_timestamp_rate: 0.05,
                ..Default::default()
            },
            ScenarioId::SilentFleet => FeedConfig {
                // Keep hold-backs short so nothing straggles into the
                // silent half's TTL window.
                reorder_rate: 0.05,
                max_reorder_delay_ticks: 2,
                ..Default::default()
            },
        }
    }

    fn fleet_size(&self, scenario: ScenarioId) -> usize {
        match scenario {
            ScenarioId::RushHour => self.vehicles * 10,
            _ => self.vehicles,
        }
    }

    /// Executes one scenario and verifies the engine afterwards.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        let config = Self::engine_config(scenario);
        let fleet_size = self.fleet_size(scenario);
        let half = fleet_size / 2;
        let total_ticks = self.duration as u64;
        let silence_starts = total_ticks / 2;

        let ctx = SimContext::shared(self.seed);
        let start = unix_seconds(ctx.system_time());

        let mut oracle = FleetOracle::new(self.seed, fleet_size, start);
        let registry = Arc::new(InMemoryRegistry::new());
        oracle.populate_registry(&registry);

        let engine = TrackEngine::new(
            config.clone(),
            Arc::clone(&ctx),
            registry as Arc<dyn VehicleRegistry>,
        );
        let evictor = engine.evictor();
        let mut feed = FixFeed::new(
            self.seed.wrapping_mul(0x9e3779b97f4a7c15),
            Self::feed_config(scenario),
        );

        let mut fixes_submitted = 0u64;
        for tick in 0..total_ticks {
            oracle.step(1.0);
            ctx.advance_time(Duration::from_secs(1));

            let silent = scenario == ScenarioId::SilentFleet && tick >= silence_starts;
            let raw = oracle.true_fixes(|i| !silent || i < half);

            for fix in feed.corrupt(raw) {
                fixes_submitted += 1;
                // Rejections and ignored outcomes are expected; the
                // metrics see all of them.
                let _ = engine.submit(fix);
            }

            evictor.sweep(unix_seconds(ctx.system_time()));

            if tick % 30 == 0 {
                debug!(
                    "  t={:.0}s | tracked={} | submitted={}",
                    oracle.time() - start,
                    engine.tracked_vehicles(),
                    fixes_submitted
                );
            }
        }

        // Late stragglers still held by the feed.
        for fix in feed.drain() {
            fixes_submitted += 1;
            let _ = engine.submit(fix);
        }

        let failure_reason = self.verify(scenario, &engine, &oracle, &config, half);
        let live_vehicles = engine.queries().live_vehicles().len();

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: failure_reason.is_none(),
            total_ticks,
            fixes_submitted,
            live_vehicles,
            metrics: engine.metrics().snapshot(),
            failure_reason,
        }
    }

    /// Checks the engine's observable state against its contract. Returns
    /// the first violation found.
    fn verify(
        &self,
        scenario: ScenarioId,
        engine: &TrackEngine<SimContext>,
        oracle: &FleetOracle,
        config: &EngineConfig,
        half: usize,
    ) -> Option<String> {
        let queries = engine.queries();
        let live = queries.live_vehicles();

        for (i, v) in oracle.fleet().iter().enumerate() {
            let license = v.license().as_str();
            let window = queries.track_in_window(license, 0.0, f64::MAX);
            let points = window.points();

            // Ordering: sorted ascending by (timestamp, sequence).
            if !points.windows(2).all(|w| w[0].sort_key() < w[1].sort_key()) {
                return Some(format!("{license}: buffer unsorted"));
            }

            // Bounded growth.
            if points.len() > config.buffer_max_points {
                return Some(format!(
                    "{license}: {} points exceeds bound {}",
                    points.len(),
                    config.buffer_max_points
                ));
            }

            // Duplicate suppression: no two retained points close in both
            // time and space.
            for (a_idx, a) in points.iter().enumerate() {
                for b in &points[a_idx + 1..] {
                    let dt = b.timestamp.value() - a.timestamp.value();
                    if dt > config.min_distinct_interval {
                        break;
                    }
                    let dist = config
                        .distance_model
                        .distance_m(a.lat, a.lng, b.lat, b.lng);
                    if dist <= config.min_distinct_distance_m {
                        return Some(format!(
                            "{license}: retained duplicate pair ({:.1}s, {:.1}m apart)",
                            dt, dist
                        ));
                    }
                }
            }

            // Current position is the newest retained point.
            let current = queries.current_position(license);
            if current.as_ref().map(|p| p.sort_key()) != points.last().map(|p| p.sort_key()) {
                return Some(format!("{license}: current position is not the buffer tail"));
            }

            // Liveness listing.
            let reporting =
                scenario != ScenarioId::SilentFleet || i < half;
            let is_live = live.iter().any(|l| l.as_str() == license);
            if reporting && !is_live {
                return Some(format!("{license}: reporting vehicle missing from live set"));
            }
            if !reporting {
                if is_live {
                    return Some(format!("{license}: silent vehicle still listed live"));
                }
                if current.is_some() {
                    return Some(format!("{license}: silent vehicle still has a position"));
                }
            }
        }

        // Scenario-specific expectations.
        let metrics = engine.metrics().snapshot();
        match scenario {
            ScenarioId::DuplicateFlood if metrics.duplicates == 0 => {
                return Some("duplicate flood suppressed no duplicates".to_string());
            }
            ScenarioId::TimeWarp if metrics.out_of_window == 0 => {
                return Some("time warp produced no out-of-window discards".to_string());
            }
            ScenarioId::SilentFleet if metrics.evicted_vehicles == 0 => {
                return Some("silent fleet evicted nothing".to_string());
            }
            _ => {}
        }
        if metrics.rejected == 0 {
            return Some("feed injected invalid fixes but none were rejected".to_string());
        }

        None
    }
}

// ============================================================================
// TESTS
// ============================================================================
