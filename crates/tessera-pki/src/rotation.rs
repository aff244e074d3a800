//! CA rotation parameters
//!
//! A CA is generated with a fixed validity and is renewed once the remaining
//! lifetime drops below `rotate_before`. The common way to express this is a
//! renewal threshold: with a 1 year validity and a threshold of 0.8 the CA is
//! renewed after ~292 days, leaving ~73 days of overlap.

use std::time::Duration;

use crate::{PkiError, Result};

/// Seconds in a day, used for day-based validity arithmetic
pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Default CA validity (1 year)
pub const DEFAULT_CA_VALIDITY: Duration = Duration::from_secs(365 * SECONDS_PER_DAY);

/// Default renewal threshold as a fraction of the validity (80%)
pub const DEFAULT_RENEW_THRESHOLD: f64 = 0.80;

/// Validity and renewal configuration for generated CAs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationParams {
    /// Validity of newly generated CAs
    pub validity: Duration,
    /// A CA is renewed once less than this much lifetime remains
    pub rotate_before: Duration,
}

impl Default for RotationParams {
    fn default() -> Self {
        Self {
            validity: DEFAULT_CA_VALIDITY,
            rotate_before: DEFAULT_CA_VALIDITY.mul_f64(1.0 - DEFAULT_RENEW_THRESHOLD),
        }
    }
}

impl RotationParams {
    /// Build parameters from an explicit validity and safety margin
    pub fn new(validity: Duration, rotate_before: Duration) -> Result<Self> {
        if validity.is_zero() {
            return Err(PkiError::InvalidRotation(
                "validity must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            validity,
            rotate_before,
        })
    }

    /// Build parameters from a validity and the fraction of it after which
    /// the CA is renewed
    ///
    /// `threshold` must be in `(0, 1]`. A threshold of 1.0 renews only once
    /// the CA has expired.
    pub fn with_renew_threshold(validity: Duration, threshold: f64) -> Result<Self> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(PkiError::InvalidRotation(format!(
                "renew threshold must be in (0, 1], got {}",
                threshold
            )));
        }
        let rotate_before = validity.mul_f64(1.0 - threshold);
        Self::new(validity, rotate_before)
    }

    /// Unix timestamp after which a CA expiring at `not_after` must be renewed
    pub fn renew_at(&self, not_after: i64) -> i64 {
        let margin = i64::try_from(self.rotate_before.as_secs()).unwrap_or(i64::MAX);
        not_after.saturating_sub(margin)
    }
}
