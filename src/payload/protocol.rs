//! # Payload Constants and Types
//!
//! Wire layouts and decoded record types for the peer transmitter's packets.

use serde::de::Error;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Binary record A size: f32 latitude + f32 longitude + u32 timestamp
pub const TELEMETRY_RECORD_SIZE: usize = 12;

/// Binary record B size: u8 id + f32 temperature + f32 humidity + i32 rssi (packed)
pub const SENSOR_RECORD_SIZE: usize = 13;

/// Maximum text record length, excluding the NUL terminator
pub const TEXT_RECORD_MAX_LEN: usize = 255;

/// Payload encoding used by the peer transmitter
///
/// Fixed per deployment through configuration; never negotiated per packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadEncoding {
    /// Packed little-endian position record (record A)
    BinaryTelemetry,
    /// Packed little-endian sensor record (record B)
    BinarySensor,
    /// NUL-terminated JSON object with `latitude`, `longitude`, `timestamp`
    TextTelemetry,
}

impl fmt::Display for PayloadEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PayloadEncoding::BinaryTelemetry => "binary_telemetry",
            PayloadEncoding::BinarySensor => "binary_sensor",
            PayloadEncoding::TextTelemetry => "text_telemetry",
        };
        f.write_str(name)
    }
}

/// Position fix reported by the transmitter
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TelemetryFix {
    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Unix timestamp in seconds
    #[serde(deserialize_with = "whole_seconds")]
    pub timestamp: u32,
}

/// Accept a timestamp written as an integer or as a float with no fractional
/// part, within `u32` range
fn whole_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let seconds = f64::deserialize(deserializer)?;
    if seconds.fract() != 0.0 || !(0.0..=f64::from(u32::MAX)).contains(&seconds) {
        return Err(D::Error::custom(format!(
            "timestamp must be whole seconds between 0 and {}, got {}",
            u32::MAX,
            seconds
        )));
    }
    Ok(seconds as u32)
}

/// Environmental sensor reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// Sensor node id
    pub id: u8,

    /// Temperature in °C
    pub temperature: f32,

    /// Relative humidity in %
    pub humidity: f32,

    /// Signal strength in dBm
    pub rssi: i32,
}

/// A decoded payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodedRecord {
    BinaryTelemetry(TelemetryFix),
    BinarySensor(SensorReading),
    TextTelemetry(TelemetryFix),
}

impl DecodedRecord {
    /// Encoding this record was decoded from
    pub fn encoding(&self) -> PayloadEncoding {
        match self {
            DecodedRecord::BinaryTelemetry(_) => PayloadEncoding::BinaryTelemetry,
            DecodedRecord::BinarySensor(_) => PayloadEncoding::BinarySensor,
            DecodedRecord::TextTelemetry(_) => PayloadEncoding::TextTelemetry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes() {
        assert_eq!(TELEMETRY_RECORD_SIZE, 4 + 4 + 4);
        assert_eq!(SENSOR_RECORD_SIZE, 1 + 4 + 4 + 4);
    }

    #[test]
    fn test_encoding_deserializes_from_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            encoding: PayloadEncoding,
        }

        let w: Wrapper = toml::from_str("encoding = \"binary_sensor\"").unwrap();
        assert_eq!(w.encoding, PayloadEncoding::BinarySensor);

        let w: Wrapper = toml::from_str("encoding = \"text_telemetry\"").unwrap();
        assert_eq!(w.encoding, PayloadEncoding::TextTelemetry);

        assert!(toml::from_str::<Wrapper>("encoding = \"protobuf\"").is_err());
    }

    #[test]
    fn test_encoding_display_matches_config_names() {
        assert_eq!(PayloadEncoding::BinaryTelemetry.to_string(), "binary_telemetry");
        assert_eq!(PayloadEncoding::BinarySensor.to_string(), "binary_sensor");
        assert_eq!(PayloadEncoding::TextTelemetry.to_string(), "text_telemetry");
    }

    #[test]
    fn test_record_reports_its_encoding() {
        let fix = TelemetryFix { latitude: 0.0, longitude: 0.0, timestamp: 0 };
        assert_eq!(DecodedRecord::TextTelemetry(fix).encoding(), PayloadEncoding::TextTelemetry);
        assert_eq!(
            DecodedRecord::BinaryTelemetry(fix).encoding(),
            PayloadEncoding::BinaryTelemetry
        );
    }
}
