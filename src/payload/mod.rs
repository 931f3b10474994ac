//! # Payload Module
//!
//! Interpretation of the bytes carried by a received frame.
//!
//! This module handles:
//! - Fixed binary position records (record A)
//! - Fixed binary sensor records (record B)
//! - Self-describing JSON text records
//! - Size validation of binary records

pub mod protocol;
pub mod decoder;
