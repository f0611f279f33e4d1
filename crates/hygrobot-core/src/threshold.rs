//! Threshold classification.

use hygrobot_types::HumidityState;

/// Classify a humidity value against a recipient's thresholds.
///
/// High is checked before low; a reading is `Normal` iff
/// `min <= humidity <= max`.
pub fn classify(humidity: f64, min: f64, max: f64) -> HumidityState {
    if humidity > max {
        HumidityState::HighHumidity
    } else if humidity < min {
        HumidityState::LowHumidity
    } else {
        HumidityState::Normal
    }
}
