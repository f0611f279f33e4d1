//! Domain types for the hygrobot humidity monitoring service.
//!
//! This crate defines the validated data model shared by the telemetry
//! parser, the alert engine, the store, and the HTTP tool API:
//!
//! - [`Reading`]: one validated telemetry sample from the sensor unit
//! - [`Recipient`]: a registered chat user with personalized thresholds
//! - [`AlertState`]: per-recipient alert status with cooldown tracking
//! - [`HumidityState`] / [`AlertType`]: the state machine vocabulary
//!
//! All constructors validate; out-of-range values are rejected, never
//! clamped.

mod alert;
mod error;
mod reading;
mod recipient;

pub use alert::{AlertState, AlertType, HumidityState};
pub use error::ValidationError;
pub use reading::Reading;
pub use recipient::{Recipient, RecipientId, DEFAULT_HUMIDITY_MAX, DEFAULT_HUMIDITY_MIN};

/// Round a value to two decimal places, the precision all stored
/// telemetry fields carry.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_truncates_to_cents() {
        assert_eq!(round2(24.934), 24.93);
        assert_eq!(round2(22.735), 22.74);
        assert_eq!(round2(56.0), 56.0);
        assert_eq!(round2(-0.004), -0.0);
    }
}
