//! Trackline Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the track engine
//! to run in both **Production** (tokio) and **Simulation** (virtual clock)
//! environments.
//!
//! # Core Concept
//!
//! For deterministic testing, we intercept the engine's only sources of
//! non-determinism:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - Task scheduling (`spawn()`)
//!
//! With time under test control, eviction and receipt-time inference become
//! reproducible: any failure can be replayed from its seed.
//!
//! # Example
//!
//! ```ignore
//! use trackline_env::TracklineContext;
//! use std::time::Duration;
//!
//! async fn eviction_loop<Ctx: TracklineContext>(ctx: &Ctx) {
//!     loop {
//!         ctx.sleep(Duration::from_secs(30)).await;
//!         sweep();
//!     }
//! }
//! ```

mod context;
mod tokio_impl;

pub use context::{unix_seconds, TracklineContext};
pub use tokio_impl::TokioContext;
