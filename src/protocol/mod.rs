//! # Control Protocol Module
//!
//! Fixed 8-byte control frame understood by the drone's TCP control port.
//!
//! This module handles:
//! - Frame layout constants (start/end markers, field offsets)
//! - XOR checksum over the five command bytes
//! - Frame encoding and validation

pub mod checksum;
pub mod frame;
