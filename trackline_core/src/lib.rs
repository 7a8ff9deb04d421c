//! Trackline Core - Per-Vehicle GPS Track Reconstruction Engine
//!
//! This library turns an unordered, duplicated, out-of-order stream of raw
//! GPS fixes into consistent, queryable per-vehicle trajectories:
//! 1. **Ordering**: buffers stay sorted by (timestamp, sequence) under any
//!    arrival interleaving
//! 2. **Deduplication**: fixes close in both time and space collapse to
//!    one retained point
//! 3. **Bounded memory**: live buffers trim to count/age bounds, silent
//!    vehicles are evicted on a TTL

pub mod archive;
pub mod buffer;
pub mod engine;
pub mod evictor;
pub mod index;
pub mod metrics;
pub mod model;
pub mod query;
pub mod reconciler;
pub mod registry;
pub mod validator;

// Re-export key types for convenience
pub use archive::{ArchiveError, NullArchive, TrackArchive};
pub use engine::{EngineConfig, TrackEngine};
pub use evictor::{Evictor, EvictorHandle};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use model::{GpsFix, LicenseNumber, RawFix, Timestamp, TrackPoint, Vehicle};
pub use query::{QueryService, TrackWindow};
pub use reconciler::{DistanceModel, MergeOutcome};
pub use registry::{InMemoryRegistry, VehicleRegistry};
pub use validator::{PointValidator, RejectReason};

#[cfg(feature = "archive")]
pub use archive::SledArchive;
