//! # Payload Decoder
//!
//! Decodes received payloads (binary position, binary sensor, JSON text).
//!
//! All functions here are pure: no I/O and no logging.

use bytes::Buf;

use super::protocol::*;
use crate::error::DecodeError;

/// Decode a payload with the configured encoding
///
/// # Arguments
///
/// * `encoding` - Encoding the transmitter is configured for
/// * `payload` - Raw payload bytes as copied out of the mailbox
///
/// # Errors
///
/// Returns [`DecodeError::SizeMismatch`] for binary records of the wrong
/// length and [`DecodeError::Malformed`] for unparsable text.
pub fn decode(encoding: PayloadEncoding, payload: &[u8]) -> Result<DecodedRecord, DecodeError> {
    match encoding {
        PayloadEncoding::BinaryTelemetry => {
            decode_binary_telemetry(payload).map(DecodedRecord::BinaryTelemetry)
        }
        PayloadEncoding::BinarySensor => {
            decode_binary_sensor(payload).map(DecodedRecord::BinarySensor)
        }
        PayloadEncoding::TextTelemetry => {
            decode_text_telemetry(payload).map(DecodedRecord::TextTelemetry)
        }
    }
}

/// Decode binary record A
///
/// Layout (12 bytes, little-endian, no padding):
/// `f32 latitude, f32 longitude, u32 timestamp`
pub fn decode_binary_telemetry(payload: &[u8]) -> Result<TelemetryFix, DecodeError> {
    check_size(payload, TELEMETRY_RECORD_SIZE)?;

    let mut buf = payload;
    let latitude = buf.get_f32_le() as f64;
    let longitude = buf.get_f32_le() as f64;
    let timestamp = buf.get_u32_le();

    Ok(TelemetryFix {
        latitude,
        longitude,
        timestamp,
    })
}

/// Decode binary record B
///
/// Layout (13 bytes, little-endian, packed):
/// `u8 id, f32 temperature, f32 humidity, i32 rssi`
pub fn decode_binary_sensor(payload: &[u8]) -> Result<SensorReading, DecodeError> {
    check_size(payload, SENSOR_RECORD_SIZE)?;

    let mut buf = payload;
    Ok(SensorReading {
        id: buf.get_u8(),
        temperature: buf.get_f32_le(),
        humidity: buf.get_f32_le(),
        rssi: buf.get_i32_le(),
    })
}

/// Decode a NUL-terminated JSON text record
///
/// Only the bytes before the first NUL are parsed. A buffer without a NUL is
/// parsed whole. Keys other than `latitude`, `longitude` and `timestamp` are
/// ignored.
pub fn decode_text_telemetry(payload: &[u8]) -> Result<TelemetryFix, DecodeError> {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    let raw = &payload[..end];

    if raw.len() > TEXT_RECORD_MAX_LEN {
        return Err(DecodeError::Malformed(format!(
            "text record too long: {} bytes (max {})",
            raw.len(),
            TEXT_RECORD_MAX_LEN
        )));
    }

    let text = std::str::from_utf8(raw)
        .map_err(|e| DecodeError::Malformed(format!("invalid UTF-8: {}", e)))?;

    if text.trim().is_empty() {
        return Err(DecodeError::Malformed("empty text record".to_string()));
    }

    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| DecodeError::Malformed(format!("invalid JSON: {}", e)))?;

    // Structs also deserialize from JSON arrays; only objects are accepted
    if !value.is_object() {
        return Err(DecodeError::Malformed("expected a JSON object".to_string()));
    }

    serde_json::from_value(value).map_err(|e| DecodeError::Malformed(e.to_string()))
}

fn check_size(payload: &[u8], expected: usize) -> Result<(), DecodeError> {
    if payload.len() != expected {
        return Err(DecodeError::SizeMismatch {
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}
