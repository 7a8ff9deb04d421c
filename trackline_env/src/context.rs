//! Core environment context trait for Trackline components.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that the track engine can run
/// in both production (tokio) and simulation (virtual clock) environments.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, system clock
/// - **Simulation**: `SimContext` (in `trackline_sim`) - manually advanced
///   virtual clock
///
/// # Determinism
///
/// For deterministic testing, all methods that would normally introduce
/// non-determinism (time, task scheduling) are controlled by the
/// implementation.
#[async_trait]
pub trait TracklineContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Used for internal timers and duration measurements.
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time used to stamp fix receipt.
    ///
    /// Critical for the receipt-time fallback on fixes that arrive without
    /// a timestamp. In simulation, this is derived from the virtual clock
    /// plus a fixed epoch offset.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task (e.g. the eviction cycle).
    ///
    /// In production: `tokio::spawn`
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    /// In simulation, returns the master seed.
    fn seed(&self) -> u64;
}

/// Convenience: wall-clock time as f64 unix seconds, the engine's native
/// timestamp representation.
pub fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
