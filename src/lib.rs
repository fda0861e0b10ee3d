//! # Joylink Library
//!
//! Fly a TCP-controlled toy drone with a Linux joystick.
//!
//! This library provides the control pipeline: joystick events are mapped
//! onto a shared command, which a background transmitter encodes into the
//! drone's fixed 8-byte frame and streams over TCP every 20 ms.

pub mod config;
pub mod confirm;
pub mod control;
pub mod error;
pub mod joystick;
pub mod link;
pub mod protocol;
pub mod session;
