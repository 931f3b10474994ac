//! # Telemetry RX Library
//!
//! Single-hop wireless telemetry receiver.
//!
//! This library provides the receive pipeline: a radio callback copies each
//! packet into a lock-free single-slot mailbox, and a foreground loop drains
//! it, decodes the payload and writes one report per packet to the console.

pub mod config;
pub mod error;
pub mod payload;
pub mod radio;
pub mod receiver;
