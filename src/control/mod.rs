//! # Control Module
//!
//! The shared command pipeline between joystick and transmitter.
//!
//! This module handles:
//! - The locked "current command" read by the transmitter
//! - Raw axis to command byte scaling (with per-axis inversion)
//! - Edge-triggered button to flag toggling
//! - The one-shot startup calibration sequence

pub mod axis;
pub mod calibration;
pub mod input_mapper;
pub mod state;
