//! # Error Types
//!
//! Custom error types for the telemetry receiver using `thiserror`.

use thiserror::Error;

/// Main error type for the telemetry receiver
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Radio link errors
    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),
}

/// Errors raised by the radio/link-layer service
#[derive(Debug, Error)]
pub enum RadioError {
    /// The radio subsystem refused to start
    #[error("radio initialization failed: {0}")]
    InitFailed(String),

    /// None of the candidate device paths could be opened
    #[error("no radio device found (tried: {0})")]
    PortNotFound(String),

    /// A handler was registered before `initialize` succeeded
    #[error("radio link is not initialized")]
    NotInitialized,
}

/// Payload decoding failures
///
/// These never escape the receive coordinator; they are turned into
/// diagnostic reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Binary record with the wrong byte count
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Text record that could not be parsed into a telemetry fix
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Producer-side rejection of a hardware receive event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReceiveError {
    /// Frame does not fit the mailbox slot; nothing was copied
    #[error("oversized frame: {len} bytes (capacity {capacity})")]
    OversizedFrame { len: usize, capacity: usize },
}

/// Result type alias for the telemetry receiver
pub type Result<T> = std::result::Result<T, ReceiverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_messages() {
        let err = DecodeError::SizeMismatch { expected: 12, actual: 7 };
        assert_eq!(err.to_string(), "size mismatch: expected 12 bytes, got 7");

        let err = DecodeError::Malformed("missing field `timestamp`".to_string());
        assert!(err.to_string().contains("timestamp"));
    }

    #[test]
    fn test_radio_error_converts_into_receiver_error() {
        let err: ReceiverError = RadioError::InitFailed("no dongle".to_string()).into();
        assert!(matches!(err, ReceiverError::Radio(RadioError::InitFailed(_))));
        assert!(err.to_string().contains("no dongle"));
    }
}
