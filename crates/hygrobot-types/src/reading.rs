//! Validated telemetry samples.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ValidationError;
use crate::round2;

/// Humidity range accepted from the sensor unit (percent).
pub const HUMIDITY_RANGE: (f64, f64) = (0.0, 100.0);
/// Temperature range accepted from any of the three probes (°C).
pub const TEMPERATURE_RANGE: (f64, f64) = (-40.0, 125.0);

/// A single validated data point from the sensor unit.
///
/// Immutable once constructed; only [`Reading::new`] (used by the parser)
/// and store deserialization build one. Construction rejects out-of-range
/// values and future timestamps rather than clamping, and rounds every
/// numeric field to two decimal places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Relative humidity percentage (0.0–100.0).
    pub humidity: f64,
    /// DHT sensor temperature in °C.
    pub dht_temperature: f64,
    /// LM35 sensor temperature in °C.
    pub lm35_temperature: f64,
    /// Thermistor temperature in °C.
    pub thermistor_temperature: f64,
    /// When the reading was captured (UTC).
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Reading {
    /// Construct a validated reading.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::OutOfRange`] if humidity leaves
    /// [`HUMIDITY_RANGE`] or any temperature leaves [`TEMPERATURE_RANGE`],
    /// and [`ValidationError::FutureTimestamp`] if `timestamp` is ahead of
    /// the current UTC time.
    pub fn new(
        humidity: f64,
        dht_temperature: f64,
        lm35_temperature: f64,
        thermistor_temperature: f64,
        timestamp: OffsetDateTime,
    ) -> Result<Self, ValidationError> {
        check_range("humidity", humidity, HUMIDITY_RANGE)?;
        check_range("dht_temperature", dht_temperature, TEMPERATURE_RANGE)?;
        check_range("lm35_temperature", lm35_temperature, TEMPERATURE_RANGE)?;
        check_range(
            "thermistor_temperature",
            thermistor_temperature,
            TEMPERATURE_RANGE,
        )?;

        if timestamp > OffsetDateTime::now_utc() {
            return Err(ValidationError::FutureTimestamp);
        }

        Ok(Self {
            humidity: round2(humidity),
            dht_temperature: round2(dht_temperature),
            lm35_temperature: round2(lm35_temperature),
            thermistor_temperature: round2(thermistor_temperature),
            timestamp,
        })
    }

    /// Age of the reading relative to `now`, clamped at zero.
    pub fn age_seconds(&self, now: OffsetDateTime) -> i64 {
        (now - self.timestamp).whole_seconds().max(0)
    }
}

fn check_range(
    field: &'static str,
    value: f64,
    (min, max): (f64, f64),
) -> Result<(), ValidationError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
