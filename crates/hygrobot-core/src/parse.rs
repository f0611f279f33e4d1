//! Telemetry frame parsing.
//!
//! The microcontroller emits one frame per line. The current firmware sends a
//! flat JSON object; older firmware sent a labeled text line. Both are
//! accepted. Malformed frames are dropped, never errors: telemetry frames are
//! independent and the next one is a second away.

use serde_json::Value;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::debug;

use hygrobot_types::Reading;

/// Alias keys accepted for each canonical field, probed in order.
const FIELD_ALIASES: [(&str, &[&str]); 4] = [
    ("humidity", &["humidity"]),
    ("dht_temperature", &["dht_temperature", "dht_temp"]),
    ("lm35_temperature", &["lm35_temperature", "lm35_temp"]),
    ("thermistor_temperature", &["thermistor_temperature", "therm_temp"]),
];

/// Parse a single telemetry frame into a validated [`Reading`].
///
/// Returns `None` for anything that cannot be turned into a valid reading:
/// malformed JSON, missing or non-numeric fields, malformed timestamps, and
/// values [`Reading::new`] rejects.
pub fn parse_frame(frame: &str) -> Option<Reading> {
    let frame = frame.trim();
    if frame.is_empty() {
        return None;
    }
    if frame.starts_with('{') {
        parse_json_frame(frame)
    } else {
        parse_labeled_frame(frame)
    }
}

fn parse_json_frame(frame: &str) -> Option<Reading> {
    let payload: Value = match serde_json::from_str(frame) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "dropping undecodable frame");
            return None;
        }
    };
    let payload = payload.as_object()?;

    let mut fields = [0.0_f64; 4];
    for (slot, (canonical, aliases)) in fields.iter_mut().zip(FIELD_ALIASES) {
        let value = aliases.iter().find_map(|key| payload.get(*key))?;
        match extract_f64(value) {
            Some(number) => *slot = number,
            None => {
                debug!(field = canonical, "dropping frame with non-numeric field");
                return None;
            }
        }
    }
    let [humidity, dht, lm35, thermistor] = fields;

    let timestamp = match payload.get("timestamp") {
        None => OffsetDateTime::now_utc(),
        Some(raw) => parse_timestamp(raw)?,
    };

    match Reading::new(humidity, dht, lm35, thermistor, timestamp) {
        Ok(reading) => Some(reading),
        Err(err) => {
            debug!(error = %err, "dropping frame that failed validation");
            None
        }
    }
}

/// Numeric JSON values and numeric strings both count; anything else does not.
fn extract_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Timestamps are normalized to UTC. A bare datetime without an offset is
/// taken as already-UTC; anything unparseable rejects the whole frame.
fn parse_timestamp(raw: &Value) -> Option<OffsetDateTime> {
    let text = raw.as_str()?;
    if let Ok(parsed) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(parsed.to_offset(time::UtcOffset::UTC));
    }
    if let Ok(parsed) = PrimitiveDateTime::parse(text, &Iso8601::DEFAULT) {
        return Some(parsed.assume_utc());
    }
    debug!(timestamp = text, "dropping frame with malformed timestamp");
    None
}

/// Legacy firmware line: `Humidity: 52.30% DHT Temp: 24.10C LM35: 23.90C Therm: 24.30C`.
fn parse_labeled_frame(frame: &str) -> Option<Reading> {
    let humidity = number_after(frame, "Humidity:")?;
    let dht = number_after(frame, "DHT Temp:")?;
    let lm35 = number_after(frame, "LM35:")?;
    let thermistor = number_after(frame, "Therm:")?;
    Reading::new(humidity, dht, lm35, thermistor, OffsetDateTime::now_utc()).ok()
}

fn number_after(text: &str, label: &str) -> Option<f64> {
    let rest = text[text.find(label)? + label.len()..].trim_start();
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}
