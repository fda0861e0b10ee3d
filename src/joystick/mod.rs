//! # Joystick Module
//!
//! Joystick event source consumed by the input mapper.
//!
//! This module handles:
//! - The `{kind, index, value}` event record shared by all sources
//! - The non-blocking [`JoystickSource::drain`] contract
//! - An evdev-backed source for Linux gamepads (see [`evdev_source`])

pub mod evdev_source;

use crate::error::Result;

/// Kind of joystick event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Absolute axis moved; value is −32767..=32767
    Axis,
    /// Button changed; value is 1 for press, 0 for release
    Button,
}

/// A single joystick event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoystickEvent {
    pub kind: EventKind,
    pub index: usize,
    pub value: i32,
}

impl JoystickEvent {
    /// Axis event for raw axis `index`.
    #[must_use]
    pub const fn axis(index: usize, value: i32) -> Self {
        Self {
            kind: EventKind::Axis,
            index,
            value,
        }
    }

    /// Button event; `pressed == false` is a release.
    #[must_use]
    pub const fn button(index: usize, pressed: bool) -> Self {
        Self {
            kind: EventKind::Button,
            index,
            value: pressed as i32,
        }
    }
}

/// Source of joystick events.
pub trait JoystickSource: Send {
    /// Appends every currently available event to `out` without blocking.
    ///
    /// Returns the number of events appended; zero means nothing was pending.
    ///
    /// # Errors
    ///
    /// Returns `InputSource` if the device became unreadable.
    fn drain(&mut self, out: &mut Vec<JoystickEvent>) -> Result<usize>;
}
