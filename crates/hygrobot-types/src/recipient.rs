//! Registered chat recipients and their alert thresholds.

use core::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ValidationError;

/// Default minimum humidity threshold for newly registered recipients.
pub const DEFAULT_HUMIDITY_MIN: f64 = 40.0;
/// Default maximum humidity threshold for newly registered recipients.
pub const DEFAULT_HUMIDITY_MAX: f64 = 60.0;

/// Opaque identifier of a chat recipient (always positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(i64);

impl RecipientId {
    /// Wrap a raw identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRecipientId`] for non-positive ids.
    pub fn new(raw: i64) -> Result<Self, ValidationError> {
        if raw <= 0 {
            return Err(ValidationError::InvalidRecipientId(raw));
        }
        Ok(Self(raw))
    }

    /// The raw integer value.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered chat user with personalized humidity thresholds.
///
/// Created on first interaction with default thresholds; mutated only
/// through [`Recipient::with_thresholds`], which re-validates the
/// `humidity_min < humidity_max` invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    /// Recipient identifier.
    pub id: RecipientId,
    /// Lower humidity bound; readings below it alert.
    pub humidity_min: f64,
    /// Upper humidity bound; readings above it alert.
    pub humidity_max: f64,
    /// First interaction time (UTC).
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last settings change (UTC).
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Recipient {
    /// Construct a recipient, validating both thresholds.
    pub fn new(
        id: RecipientId,
        humidity_min: f64,
        humidity_max: f64,
        created_at: OffsetDateTime,
        updated_at: OffsetDateTime,
    ) -> Result<Self, ValidationError> {
        validate_thresholds(humidity_min, humidity_max)?;
        Ok(Self {
            id,
            humidity_min,
            humidity_max,
            created_at,
            updated_at,
        })
    }

    /// Copy of this recipient with new thresholds and a bumped
    /// `updated_at`, re-validating the ordering invariant.
    pub fn with_thresholds(
        &self,
        humidity_min: f64,
        humidity_max: f64,
        now: OffsetDateTime,
    ) -> Result<Self, ValidationError> {
        validate_thresholds(humidity_min, humidity_max)?;
        Ok(Self {
            id: self.id,
            humidity_min,
            humidity_max,
            created_at: self.created_at,
            updated_at: now,
        })
    }
}

/// Validate a threshold pair: both in `[0, 100]` and strictly ordered.
pub fn validate_thresholds(min: f64, max: f64) -> Result<(), ValidationError> {
    for (field, value) in [("humidity_min", min), ("humidity_max", max)] {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(ValidationError::OutOfRange {
                field,
                value,
                min: 0.0,
                max: 100.0,
            });
        }
    }
    if min >= max {
        return Err(ValidationError::ThresholdOrder { min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: i64) -> RecipientId {
        RecipientId::new(raw).unwrap()
    }

    #[test]
    fn recipient_id_rejects_non_positive() {
        assert!(RecipientId::new(0).is_err());
        assert!(RecipientId::new(-5).is_err());
        assert_eq!(id(42).get(), 42);
    }

    #[test]
    fn thresholds_must_be_ordered() {
        let now = OffsetDateTime::now_utc();
        assert!(Recipient::new(id(1), 40.0, 60.0, now, now).is_ok());
        let err = Recipient::new(id(1), 60.0, 60.0, now, now).unwrap_err();
        assert!(matches!(err, ValidationError::ThresholdOrder { .. }));
        assert!(Recipient::new(id(1), 70.0, 60.0, now, now).is_err());
    }

    #[test]
    fn thresholds_must_be_in_range() {
        let now = OffsetDateTime::now_utc();
        assert!(Recipient::new(id(1), -1.0, 60.0, now, now).is_err());
        assert!(Recipient::new(id(1), 40.0, 100.5, now, now).is_err());
        assert!(Recipient::new(id(1), 0.0, 100.0, now, now).is_ok());
    }

    #[test]
    fn with_thresholds_bumps_updated_at() {
        let created = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let user = Recipient::new(id(7), 40.0, 60.0, created, created).unwrap();
        let later = created + time::Duration::hours(1);
        let updated = user.with_thresholds(35.0, 65.0, later).unwrap();
        assert_eq!(updated.humidity_min, 35.0);
        assert_eq!(updated.humidity_max, 65.0);
        assert_eq!(updated.created_at, created);
        assert_eq!(updated.updated_at, later);
        assert!(user.with_thresholds(65.0, 35.0, later).is_err());
    }
}
