//! Feed corruption: turns the oracle's clean stream into the kind of raw
//! stream the engine actually sees in production.
//!
//! All corruption is seeded: duplication, bounded reordering, dropped
//! timestamps, clock skew, and unknown-license noise replay identically
//! for the same seed.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use trackline_core::model::RawFix;

/// Chaos knobs. Rates are per-fix probabilities in [0, 1].
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Emit an exact copy of the fix in the same tick
    pub duplicate_rate: f64,

    /// Hold the fix back and release it a few ticks later
    pub reorder_rate: f64,

    /// Maximum hold-back, in ticks
    pub max_reorder_delay_ticks: usize,

    /// Strip the device timestamp (forces receipt-time inference)
    pub drop_timestamp_rate: f64,

    /// Std-dev of gaussian timestamp skew, in seconds (0 disables)
    pub clock_skew_std: f64,

    /// Inject a malformed fix with an empty license
    pub invalid_rate: f64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            duplicate_rate: 0.05,
            reorder_rate: 0.10,
            max_reorder_delay_ticks: 3,
            drop_timestamp_rate: 0.02,
            clock_skew_std: 0.0,
            invalid_rate: 0.01,
        }
    }
}

/// Seeded stream corrupter.
pub struct FixFeed {
    rng: ChaCha8Rng,
    config: FeedConfig,
    skew: Option<Normal<f64>>,
    /// Held-back fixes: (release tick, fix)
    delayed: Vec<(usize, RawFix)>,
    tick: usize,
}

impl FixFeed {
    pub fn new(seed: u64, config: FeedConfig) -> Self {
        let skew = if config.clock_skew_std > 0.0 {
            Some(Normal::new(0.0, config.clock_skew_std).expect("valid skew distribution"))
        } else {
            None
        };
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            config,
            skew,
            delayed: Vec::new(),
            tick: 0,
        }
    }

    /// Corrupts one tick's worth of true fixes, merging in any held-back
    /// fixes that are due. Output order within the tick is shuffled.
    pub fn corrupt(&mut self, fixes: Vec<RawFix>) -> Vec<RawFix> {
        self.tick += 1;
        let mut out = self.release_due();

        for fix in fixes {
            let mut fix = fix;

            if self.roll(self.config.invalid_rate) {
                out.push(RawFix {
                    license: String::new(),
                    ..fix.clone()
                });
            }

            if self.roll(self.config.drop_timestamp_rate) {
                fix.timestamp = None;
            } else if let (Some(skew), Some(ts)) = (&self.skew, fix.timestamp) {
                fix.timestamp = Some(ts + skew.sample(&mut self.rng));
            }

            if self.roll(self.config.duplicate_rate) {
                out.push(fix.clone());
            }

            if self.roll(self.config.reorder_rate) {
                let delay = self.rng.gen_range(1..=self.config.max_reorder_delay_ticks);
                self.delayed.push((self.tick + delay, fix));
            } else {
                out.push(fix);
            }
        }

        out.shuffle(&mut self.rng);
        out
    }

    /// Releases everything still held back (end of run).
    pub fn drain(&mut self) -> Vec<RawFix> {
        self.tick = usize::MAX;
        let mut rest: Vec<RawFix> = self.delayed.drain(..).map(|(_, f)| f).collect();
        rest.shuffle(&mut self.rng);
        rest
    }

    fn release_due(&mut self) -> Vec<RawFix> {
        let tick = self.tick;
        let (due, later): (Vec<_>, Vec<_>) =
            self.delayed.drain(..).partition(|(release, _)| *release <= tick);
        self.delayed = later;
        due.into_iter().map(|(_, f)| f).collect()
    }

    fn roll(&mut self, rate: f64) -> bool {
        rate > 0.0 && self.rng.gen_bool(rate.min(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(license: &str, ts: f64) -> RawFix {
        RawFix {
            license: license.to_string(),
            lat: 52.52,
            lng: 13.405,
            timestamp: Some(ts),
        }
    }

    #[test]
    fn test_feed_is_deterministic() {
        let config = FeedConfig {
            duplicate_rate: 0.5,
            reorder_rate: 0.5,
            ..Default::default()
        };
        let mut a = FixFeed::new(11, config.clone());
        let mut b = FixFeed::new(11, config);

        for tick in 0..20 {
            let input: Vec<_> = (0..5).map(|i| fix(&format!("SIM-{:03}", i), tick as f64)).collect();
            let out_a = a.corrupt(input.clone());
            let out_b = b.corrupt(input);
            assert_eq!(out_a.len(), out_b.len());
            for (fa, fb) in out_a.iter().zip(&out_b) {
                assert_eq!(fa.license, fb.license);
                assert_eq!(fa.timestamp, fb.timestamp);
            }
        }
    }

    #[test]
    fn test_no_chaos_passes_through() {
        let config = FeedConfig {
            duplicate_rate: 0.0,
            reorder_rate: 0.0,
            drop_timestamp_rate: 0.0,
            clock_skew_std: 0.0,
            invalid_rate: 0.0,
            ..Default::default()
        };
        let mut feed = FixFeed::new(1, config);
        let out = feed.corrupt(vec![fix("SIM-000", 1.0), fix("SIM-001", 1.0)]);
        assert_eq!(out.len(), 2);
        assert!(feed.drain().is_empty());
    }

    #[test]
    fn test_reordered_fixes_are_not_lost() {
        let config = FeedConfig {
            duplicate_rate: 0.0,
            reorder_rate: 1.0,
            max_reorder_delay_ticks: 4,
            drop_timestamp_rate: 0.0,
            invalid_rate: 0.0,
            ..Default::default()
        };
        let mut feed = FixFeed::new(3, config);

        let mut seen = 0;
        for tick in 0..10 {
            let out = feed.corrupt(vec![fix("SIM-000", tick as f64)]);
            seen += out.len();
        }
        seen += feed.drain().len();
        assert_eq!(seen, 10);
    }

    #[test]
    fn test_duplicates_add_fixes() {
        let config = FeedConfig {
            duplicate_rate: 1.0,
            reorder_rate: 0.0,
            drop_timestamp_rate: 0.0,
            invalid_rate: 0.0,
            ..Default::default()
        };
        let mut feed = FixFeed::new(5, config);
        let out = feed.corrupt(vec![fix("SIM-000", 1.0)]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].license, out[1].license);
    }
}
