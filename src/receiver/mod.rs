//! # Receive Coordinator Module
//!
//! Owns the frame mailbox and drives the foreground drain/report cycle.
//!
//! This module handles:
//! - The receive handler given to the radio (copy + signal only)
//! - Polling the mailbox from the foreground loop
//! - Decoding drained frames with the configured encoding
//! - Emitting one atomic report (or diagnostic) per frame
//! - Counting drops, overwrites and decode failures
//!
//! ## Usage
//!
//! ```no_run
//! use telemetry_rx::payload::protocol::PayloadEncoding;
//! use telemetry_rx::receiver::ReceiveCoordinator;
//! use telemetry_rx::receiver::report::ConsoleSink;
//!
//! let mut coordinator =
//!     ReceiveCoordinator::new(PayloadEncoding::BinaryTelemetry, ConsoleSink::stdout());
//! let handler = coordinator.receive_handler();
//! // radio.register_receive_handler(handler)?;
//!
//! loop {
//!     coordinator.drain();
//!     // sleep for the poll interval...
//! }
//! ```

pub mod mailbox;
pub mod report;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{DecodeError, ReceiveError};
use crate::payload::decoder::decode;
use crate::payload::protocol::{DecodedRecord, PayloadEncoding};
use crate::radio::{MacAddress, ReceiveHandler};
use mailbox::{InboundFrame, Mailbox};
use report::{format_local_address, format_report, LogSink};

/// Observable coordinator state
///
/// `Draining` only exists inside [`ReceiveCoordinator::drain`], which holds
/// `&mut self`, so it can never be observed from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// No pending frame
    Idle,
    /// A frame was copied in and the signal is set
    FrameAvailable,
}

/// Result of draining one frame
#[derive(Debug, Clone, PartialEq)]
pub enum DrainOutcome {
    /// Frame decoded and reported
    Reported {
        frame: InboundFrame,
        record: DecodedRecord,
    },
    /// Frame failed to decode; a diagnostic was reported instead
    Rejected {
        frame: InboundFrame,
        error: DecodeError,
    },
}

impl DrainOutcome {
    pub fn frame(&self) -> &InboundFrame {
        match self {
            DrainOutcome::Reported { frame, .. } | DrainOutcome::Rejected { frame, .. } => frame,
        }
    }
}

/// Receiver counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Frames accepted into the mailbox
    pub received: u32,

    /// Oversized frames dropped before copy
    pub dropped_oversized: u32,

    /// Frames lost to the single-slot overwrite policy
    pub overwritten: u32,

    /// Frames decoded and reported
    pub decoded: u32,

    /// Frames reported as diagnostics
    pub decode_failures: u32,

    /// Reports the log sink failed to accept
    pub sink_failures: u32,
}

/// Receive Coordinator
///
/// Shares its mailbox with the receive handler; everything else is owned by
/// the foreground.
pub struct ReceiveCoordinator<S: LogSink> {
    mailbox: Arc<Mailbox>,
    encoding: PayloadEncoding,
    sink: S,
    decoded: u32,
    decode_failures: u32,
    sink_failures: u32,
}

impl<S: LogSink> std::fmt::Debug for ReceiveCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveCoordinator")
            .field("encoding", &self.encoding)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<S: LogSink> ReceiveCoordinator<S> {
    /// Create a coordinator decoding with `encoding` and reporting to `sink`
    pub fn new(encoding: PayloadEncoding, sink: S) -> Self {
        Self {
            mailbox: Arc::new(Mailbox::new()),
            encoding,
            sink,
            decoded: 0,
            decode_failures: 0,
            sink_failures: 0,
        }
    }

    /// Handler to register with the radio
    ///
    /// Only copies the frame into the mailbox. Oversized frames are dropped
    /// and counted by the mailbox.
    pub fn receive_handler(&self) -> ReceiveHandler {
        let mailbox = Arc::clone(&self.mailbox);
        Arc::new(move |sender: MacAddress, data: &[u8]| {
            let _ = mailbox.publish(sender, data);
        })
    }

    /// Hardware receive event, for callers without a registered handler
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveError::OversizedFrame`] if the frame was dropped.
    pub fn on_hardware_receive(&self, sender: MacAddress, data: &[u8]) -> Result<(), ReceiveError> {
        self.mailbox.publish(sender, data)
    }

    /// Drain the pending frame, if any
    ///
    /// Non-blocking. Returns `None` with no side effects when nothing is
    /// pending. Otherwise decodes the frame, writes exactly one report to
    /// the sink and returns the outcome. Decode errors are reported, never
    /// propagated; sink errors are logged and counted.
    pub fn drain(&mut self) -> Option<DrainOutcome> {
        let frame = self.mailbox.take()?;

        let outcome = decode(self.encoding, frame.payload());
        let report = format_report(&frame, &outcome);

        if let Err(e) = self.sink.write_report(&report) {
            self.sink_failures = self.sink_failures.wrapping_add(1);
            warn!("Failed to write report for frame #{}: {}", frame.sequence, e);
        }

        match outcome {
            Ok(record) => {
                self.decoded = self.decoded.wrapping_add(1);
                debug!(
                    sender = %frame.sender,
                    len = frame.len(),
                    "Reported frame #{}",
                    frame.sequence
                );
                Some(DrainOutcome::Reported { frame, record })
            }
            Err(error) => {
                self.decode_failures = self.decode_failures.wrapping_add(1);
                warn!(
                    sender = %frame.sender,
                    len = frame.len(),
                    "Could not decode frame #{}: {}",
                    frame.sequence,
                    error
                );
                Some(DrainOutcome::Rejected { frame, error })
            }
        }
    }

    /// Write the startup block with this receiver's own address to the sink
    pub fn report_local_address(&mut self, address: MacAddress) {
        if let Err(e) = self.sink.write_report(&format_local_address(address)) {
            self.sink_failures = self.sink_failures.wrapping_add(1);
            warn!("Failed to write local address {}: {}", address, e);
        }
    }

    pub fn state(&self) -> ReceiverState {
        if self.mailbox.is_pending() {
            ReceiverState::FrameAvailable
        } else {
            ReceiverState::Idle
        }
    }

    pub fn encoding(&self) -> PayloadEncoding {
        self.encoding
    }

    pub fn stats(&self) -> ReceiverStats {
        let mailbox = self.mailbox.stats();
        ReceiverStats {
            received: mailbox.received,
            dropped_oversized: mailbox.dropped_oversized,
            overwritten: mailbox.overwritten,
            decoded: self.decoded,
            decode_failures: self.decode_failures,
            sink_failures: self.sink_failures,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
