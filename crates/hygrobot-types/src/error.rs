//! Validation errors for domain type construction.

use thiserror::Error;

/// Errors raised when constructing or mutating domain types with
/// out-of-contract values.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// A numeric field is outside its allowed range.
    #[error("{field} {value} is outside valid range ({min} to {max})")]
    OutOfRange {
        /// The field that failed validation.
        field: &'static str,
        /// The rejected value.
        value: f64,
        /// Lower bound (inclusive).
        min: f64,
        /// Upper bound (inclusive).
        max: f64,
    },

    /// A reading timestamp lies in the future.
    #[error("timestamp cannot be in the future")]
    FutureTimestamp,

    /// Threshold ordering violated: minimum must stay below maximum.
    #[error("humidity_min ({min}) must be less than humidity_max ({max})")]
    ThresholdOrder {
        /// Minimum threshold.
        min: f64,
        /// Maximum threshold.
        max: f64,
    },

    /// Recipient identifiers must be positive.
    #[error("recipient id must be positive, got {0}")]
    InvalidRecipientId(i64),

    /// An enum column held a value outside its vocabulary.
    #[error("unknown {field} value: {value}")]
    UnknownVariant {
        /// The field being decoded.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
}
