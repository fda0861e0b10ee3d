//! # Axis Scaling
//!
//! Converts a raw joystick axis sample (−32768..=32767, 0 = centered) into a
//! command byte (0..=255, 128 = centered).
//!
//! The formula is `raw / 256 + 128`, or `-raw / 256 + 128` when inverted,
//! clamped to the byte range. Division truncates toward zero, so small
//! deflections around center (|raw| < 256) map to exactly 128.
//!
//! ## Usage
//!
//! ```
//! use joylink::control::axis::map_axis;
//!
//! assert_eq!(map_axis(0, false), 128);
//! assert_eq!(map_axis(-25600, false), 28);
//! assert_eq!(map_axis(-25600, true), 228);
//! ```

use serde::Deserialize;

/// Lowest raw axis value reported by the joystick layer.
pub const RAW_AXIS_MIN: i32 = -32768;

/// Highest raw axis value reported by the joystick layer.
pub const RAW_AXIS_MAX: i32 = 32767;

/// Maps a raw axis sample to a command byte.
///
/// # Arguments
///
/// * `raw` - Raw axis value, nominally −32768..=32767
/// * `invert` - Flip the direction around center
///
/// # Returns
///
/// Command byte, saturated to 0..=255.
#[must_use]
pub fn map_axis(raw: i32, invert: bool) -> u8 {
    let signed = if invert { raw.saturating_neg() } else { raw };
    let scaled = signed / 256 + 128;
    scaled.clamp(0, 255) as u8
}

/// Which raw axis feeds a logical axis, and whether it is inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AxisBinding {
    /// Raw joystick axis index
    pub axis_index: usize,

    /// Invert the axis direction
    #[serde(default)]
    pub invert: bool,
}

impl AxisBinding {
    /// Creates a binding for `axis_index`.
    #[must_use]
    pub const fn new(axis_index: usize, invert: bool) -> Self {
        Self { axis_index, invert }
    }

    /// Maps a raw sample through this binding.
    #[must_use]
    pub fn map(&self, raw: i32) -> u8 {
        map_axis(raw, self.invert)
    }
}

/// Bindings for the four logical axes of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisLayout {
    pub forward_back: AxisBinding,
    pub left_right: AxisBinding,
    pub up_down: AxisBinding,
    pub turn: AxisBinding,
}

impl Default for AxisLayout {
    /// Mode-2 gamepad layout: right stick flies, left stick climbs and turns.
    fn default() -> Self {
        Self {
            forward_back: AxisBinding::new(1, true),
            left_right: AxisBinding::new(0, false),
            up_down: AxisBinding::new(4, true),
            turn: AxisBinding::new(3, false),
        }
    }
}

impl AxisLayout {
    /// Iterates over the four bindings in wire order.
    pub fn bindings(&self) -> impl Iterator<Item = &AxisBinding> {
        [&self.forward_back, &self.left_right, &self.up_down, &self.turn].into_iter()
    }
}
