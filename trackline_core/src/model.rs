//! Shared data model for the track reconstruction engine.
//!
//! Everything downstream of the validator speaks these types. Raw input
//! (`RawFix`) is the only place where fields may be missing or malformed;
//! a validated `GpsFix` is immutable and always carries a `Timestamp`.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// RAW INPUT (Boundary)
// ============================================================================

/// One raw observation as delivered by the transport layer: already
/// deserialized, not yet validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFix {
    /// Vehicle license number (join key, unvalidated)
    pub license: String,

    /// Latitude in degrees, expected within [-90, 90]
    pub lat: f64,

    /// Longitude in degrees, expected within [-180, 180]
    pub lng: f64,

    /// Unix timestamp (seconds since epoch). Absent when the device did
    /// not stamp the fix; the engine infers receipt time instead.
    pub timestamp: Option<f64>,
}

// ============================================================================
// TIMESTAMP
// ============================================================================

/// A fix timestamp, carrying its provenance through reconciliation.
///
/// `Inferred` timestamps (receipt-time fallback) rank below `Explicit`
/// ones on ties: a device-stamped fix is better evidence of when the
/// vehicle was actually there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Timestamp {
    /// Device-supplied timestamp (unix seconds)
    Explicit(f64),

    /// Engine-assigned receipt time (unix seconds), used when the raw fix
    /// arrived without one
    Inferred(f64),
}

impl Timestamp {
    /// The timestamp value in unix seconds, regardless of provenance.
    #[inline]
    pub fn value(&self) -> f64 {
        match self {
            Timestamp::Explicit(v) | Timestamp::Inferred(v) => *v,
        }
    }

    /// True if this timestamp was inferred from receipt time.
    #[inline]
    pub fn is_inferred(&self) -> bool {
        matches!(self, Timestamp::Inferred(_))
    }

    /// Tie-break rank: explicit timestamps outrank inferred ones.
    /// Lower rank wins.
    #[inline]
    pub fn rank(&self) -> u8 {
        if self.is_inferred() {
            1
        } else {
            0
        }
    }
}

// ============================================================================
// LICENSE NUMBER
// ============================================================================

/// A vehicle license number: the unique key joining fixes to vehicles.
///
/// Constructed unchecked; format enforcement lives in the validator at
/// the ingress boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LicenseNumber(String);

impl LicenseNumber {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LicenseNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Allows HashMap<LicenseNumber, _> lookups by &str without allocating.
impl Borrow<str> for LicenseNumber {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LicenseNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// VALIDATED FIX
// ============================================================================

/// A validated, timestamped observation. Immutable once produced by the
/// validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpsFix {
    pub license: LicenseNumber,
    pub lat: f64,
    pub lng: f64,
    pub timestamp: Timestamp,
}

// ============================================================================
// VEHICLE (Registry-owned identity)
// ============================================================================

/// Identity record owned by the external registry. The engine holds at
/// most a cached copy keyed by license number and never writes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Opaque, stable, engine-independent id
    pub id: Uuid,
    pub license: LicenseNumber,
    pub model: String,
    pub brand: String,
}

// ============================================================================
// TRACK POINT
// ============================================================================

/// A validated fix bound to exactly one vehicle's track.
///
/// Within a buffer, points are unique by `(timestamp, sequence)` and
/// ordered ascending by timestamp, then sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lng: f64,

    /// Monotonic within a track after reconciliation
    pub timestamp: Timestamp,

    /// Engine-assigned, strictly increasing; tie-break when timestamps
    /// collide
    pub sequence: u64,
}

impl TrackPoint {
    pub fn from_fix(fix: &GpsFix, sequence: u64) -> Self {
        Self {
            lat: fix.lat,
            lng: fix.lng,
            timestamp: fix.timestamp,
            sequence,
        }
    }

    /// Ordering key within a buffer.
    #[inline]
    pub fn sort_key(&self) -> (f64, u64) {
        (self.timestamp.value(), self.sequence)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_value_and_provenance() {
        let explicit = Timestamp::Explicit(100.0);
        let inferred = Timestamp::Inferred(100.0);

        assert_eq!(explicit.value(), 100.0);
        assert_eq!(inferred.value(), 100.0);
        assert!(!explicit.is_inferred());
        assert!(inferred.is_inferred());
        assert!(explicit.rank() < inferred.rank());
    }

    #[test]
    fn test_license_number_borrow_lookup() {
        use std::collections::HashMap;

        let mut map: HashMap<LicenseNumber, u32> = HashMap::new();
        map.insert(LicenseNumber::new("ABC-123"), 7);

        assert_eq!(map.get("ABC-123"), Some(&7));
        assert_eq!(map.get("XYZ-999"), None);
    }

    #[test]
    fn test_track_point_sort_key() {
        let fix = GpsFix {
            license: LicenseNumber::new("ABC-123"),
            lat: 10.0,
            lng: 20.0,
            timestamp: Timestamp::Explicit(100.0),
        };
        let p = TrackPoint::from_fix(&fix, 3);
        assert_eq!(p.sort_key(), (100.0, 3));
    }
}
