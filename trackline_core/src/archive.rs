//! Pluggable sink for evicted tracks.
//!
//! Long-term storage sits outside the engine: when the Evictor reclaims a
//! silent vehicle, the buffer's points are offered to a `TrackArchive`
//! before the entry is dropped. The default sink discards them; the
//! optional sled-backed sink (feature `archive`) persists them as JSON
//! records.

use crate::model::{LicenseNumber, TrackPoint};
use thiserror::Error;

/// Errors from an archive sink. Eviction itself cannot fail; the Evictor
/// reports these loudly and carries on.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[cfg(feature = "archive")]
    #[error("archive storage error: {0}")]
    Storage(#[from] sled::Error),

    #[cfg(feature = "archive")]
    #[error("archive encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Receives the points of a track that is about to be reclaimed.
pub trait TrackArchive: Send + Sync {
    fn archive(&self, license: &LicenseNumber, points: &[TrackPoint]) -> Result<(), ArchiveError>;
}

/// Discards evicted tracks. The default.
#[derive(Debug, Default)]
pub struct NullArchive;

impl TrackArchive for NullArchive {
    fn archive(&self, _license: &LicenseNumber, _points: &[TrackPoint]) -> Result<(), ArchiveError> {
        Ok(())
    }
}

// ============================================================================
// SLED ARCHIVE (feature = "archive")
// ============================================================================

/// Persistent archive backed by a sled key-value store.
///
/// Keys are `<license>/<monotonic id>` so a vehicle evicted repeatedly
/// keeps every retired window; values are JSON arrays of points.
#[cfg(feature = "archive")]
pub struct SledArchive {
    db: sled::Db,
}

#[cfg(feature = "archive")]
impl SledArchive {
    /// Opens (or creates) the archive at the given path.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, ArchiveError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// In-memory archive for tests.
    pub fn temporary() -> Result<Self, ArchiveError> {
        let config = sled::Config::new().temporary(true);
        Ok(Self { db: config.open()? })
    }

    /// Number of archived track windows.
    pub fn window_count(&self) -> usize {
        self.db.len()
    }

    /// All archived windows for a license, oldest first.
    pub fn windows_for(
        &self,
        license: &LicenseNumber,
    ) -> Result<Vec<Vec<TrackPoint>>, ArchiveError> {
        let prefix = format!("{}/", license);
        let mut windows = Vec::new();
        for item in self.db.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            windows.push(serde_json::from_slice(&value)?);
        }
        Ok(windows)
    }
}

#[cfg(feature = "archive")]
impl TrackArchive for SledArchive {
    fn archive(&self, license: &LicenseNumber, points: &[TrackPoint]) -> Result<(), ArchiveError> {
        if points.is_empty() {
            return Ok(());
        }
        let id = self.db.generate_id()?;
        let key = format!("{}/{:020}", license, id);
        let value = serde_json::to_vec(points)?;
        self.db.insert(key.as_bytes(), value)?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
