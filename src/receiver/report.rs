//! # Console Reports
//!
//! Formats one bordered block per drained frame and hands it to the log sink
//! in a single write, so a report is never interleaved with other output.

use std::fmt;
use std::io::{self, Write};

use chrono::DateTime;

use super::mailbox::InboundFrame;
use crate::error::DecodeError;
use crate::payload::protocol::{DecodedRecord, SensorReading, TelemetryFix};
use crate::radio::MacAddress;

/// Border line framing every report block
pub const REPORT_BORDER: &str = "================================";

/// Payload bytes per echo line
const HEX_BYTES_PER_LINE: usize = 16;

/// Destination for formatted reports
///
/// Each call carries exactly one complete report.
#[cfg_attr(test, mockall::automock)]
pub trait LogSink {
    fn write_report(&mut self, report: &str) -> io::Result<()>;
}

/// Log sink over any byte-stream writer (stdout by default)
#[derive(Debug)]
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> LogSink for ConsoleSink<W> {
    fn write_report(&mut self, report: &str) -> io::Result<()> {
        self.out.write_all(report.as_bytes())?;
        self.out.flush()
    }
}

/// Format the report for a drained frame
///
/// Successful decodes produce a telemetry block, failures a diagnostic block.
pub fn format_report(frame: &InboundFrame, outcome: &Result<DecodedRecord, DecodeError>) -> String {
    Report { frame, outcome }.to_string()
}

/// Format the startup block announcing this receiver's own address
///
/// Transmitters are configured with this address.
pub fn format_local_address(address: MacAddress) -> String {
    format!(
        "{border}\nReceiver MAC address: {address}\n{border}\n",
        border = REPORT_BORDER,
        address = address
    )
}

struct Report<'a> {
    frame: &'a InboundFrame,
    outcome: &'a Result<DecodedRecord, DecodeError>,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.frame;
        writeln!(f, "{}", REPORT_BORDER)?;

        let heading = match self.outcome {
            Ok(DecodedRecord::BinarySensor(_)) => "Sensor data",
            Ok(_) => "Telemetry",
            Err(_) => "Undecodable frame",
        };
        writeln!(
            f,
            "{} received from MAC: {} ({} bytes, frame #{})",
            heading,
            frame.sender,
            frame.len(),
            frame.sequence
        )?;
        write_payload_echo(f, frame.payload())?;

        match self.outcome {
            Ok(DecodedRecord::BinaryTelemetry(fix)) => write_fix(f, fix)?,
            Ok(DecodedRecord::TextTelemetry(fix)) => {
                writeln!(f, "Text:      {}", text_echo(frame.payload()))?;
                write_fix(f, fix)?;
            }
            Ok(DecodedRecord::BinarySensor(reading)) => write_sensor(f, reading)?,
            Err(error) => writeln!(f, "Error:     {}", error)?,
        }

        writeln!(f, "{}", REPORT_BORDER)
    }
}

fn write_payload_echo(f: &mut fmt::Formatter<'_>, payload: &[u8]) -> fmt::Result {
    if payload.is_empty() {
        return writeln!(f, "Payload:   (empty)");
    }

    for (i, chunk) in payload.chunks(HEX_BYTES_PER_LINE).enumerate() {
        f.write_str(if i == 0 { "Payload:  " } else { "          " })?;
        for byte in chunk {
            write!(f, " {:02X}", byte)?;
        }
        writeln!(f)?;
    }
    Ok(())
}

fn write_fix(f: &mut fmt::Formatter<'_>, fix: &TelemetryFix) -> fmt::Result {
    writeln!(f, "Latitude:  {:.6}°", fix.latitude)?;
    writeln!(f, "Longitude: {:.6}°", fix.longitude)?;
    match DateTime::from_timestamp(i64::from(fix.timestamp), 0) {
        Some(utc) => writeln!(
            f,
            "Timestamp: {} ({})",
            fix.timestamp,
            utc.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => writeln!(f, "Timestamp: {}", fix.timestamp),
    }
}

fn write_sensor(f: &mut fmt::Formatter<'_>, reading: &SensorReading) -> fmt::Result {
    writeln!(f, "Sensor ID:   {}", reading.id)?;
    writeln!(f, "Temperature: {:.2} °C", reading.temperature)?;
    writeln!(f, "Humidity:    {:.2} %", reading.humidity)?;
    writeln!(f, "RSSI:        {} dBm", reading.rssi)
}

/// Text record up to its NUL terminator
fn text_echo(payload: &[u8]) -> String {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end]).into_owned()
}
