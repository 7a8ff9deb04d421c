//! Trackline Deterministic Stress Harness
//!
//! This crate runs the real track engine inside a controlled world:
//! - **Time**: a virtual clock the runner advances tick by tick
//! - **Fleet**: a seeded ground-truth motion model (the oracle)
//! - **Feed**: seeded corruption between oracle and engine -
//!   duplication, bounded reordering, dropped timestamps, clock skew,
//!   and malformed fixes
//!
//! Because every source of entropy derives from one 64-bit seed, any
//! failing run replays exactly from its seed number.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  ScenarioRunner                     │
//! │                                                     │
//! │  ┌────────────┐    ┌─────────┐    ┌─────────────┐   │
//! │  │ FleetOracle│───►│ FixFeed │───►│ TrackEngine │   │
//! │  │  (truth)   │    │ (chaos) │    │ (under test)│   │
//! │  └────────────┘    └─────────┘    └──────┬──────┘   │
//! │        ▲                                 │          │
//! │        └────────── verify ◄──────────────┘          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use trackline_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 25).run(ScenarioId::TimeWarp);
//! assert!(result.passed);
//! ```

mod context;
mod feed;
mod oracle;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use feed::{FeedConfig, FixFeed};
pub use oracle::{FleetOracle, SimVehicle};
pub use runner::{ScenarioResult, ScenarioRunner};
