//! PointValidator - rejects or normalizes malformed fixes before they
//! enter the pipeline.
//!
//! Validation is pure: a raw fix either becomes a `GpsFix` or a
//! `RejectReason`, and nothing is dropped silently. The receipt time is
//! supplied by the caller so the validator itself never reads a clock.

use crate::model::{GpsFix, LicenseNumber, RawFix, Timestamp};
use thiserror::Error;

/// License numbers are 2..=16 ASCII characters: alphanumerics, dashes,
/// and interior spaces.
const LICENSE_MIN_LEN: usize = 2;
const LICENSE_MAX_LEN: usize = 16;

// ============================================================================
// REJECT REASONS
// ============================================================================

/// Why a raw fix was refused at the boundary. Caller's fault, surfaced
/// synchronously; the engine never retries these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("invalid license number: {0:?}")]
    InvalidLicense(String),

    #[error("coordinates out of range: lat={lat}, lng={lng}")]
    OutOfRange { lat: f64, lng: f64 },
}

// ============================================================================
// VALIDATOR
// ============================================================================

/// Stateless boundary validator.
#[derive(Debug, Default)]
pub struct PointValidator;

impl PointValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validates a raw fix, assigning `receipt_time` (unix seconds) as an
    /// inferred timestamp when the device did not stamp the fix.
    pub fn validate(&self, raw: RawFix, receipt_time: f64) -> Result<GpsFix, RejectReason> {
        if !license_format_ok(&raw.license) {
            return Err(RejectReason::InvalidLicense(raw.license));
        }

        if !coordinates_ok(raw.lat, raw.lng) {
            return Err(RejectReason::OutOfRange {
                lat: raw.lat,
                lng: raw.lng,
            });
        }

        let timestamp = match raw.timestamp {
            Some(ts) if ts.is_finite() => Timestamp::Explicit(ts),
            // A non-finite device timestamp is as good as none at all.
            _ => Timestamp::Inferred(receipt_time),
        };

        Ok(GpsFix {
            license: LicenseNumber::new(raw.license),
            lat: raw.lat,
            lng: raw.lng,
            timestamp,
        })
    }
}

fn license_format_ok(license: &str) -> bool {
    let len = license.len();
    if len < LICENSE_MIN_LEN || len > LICENSE_MAX_LEN {
        return false;
    }
    if license.starts_with(' ') || license.ends_with(' ') {
        return false;
    }
    license
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ' ')
}

fn coordinates_ok(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

// ============================================================================
// TESTS
// ============================================================================
