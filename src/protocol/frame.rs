//! # Control Frame Codec
//!
//! Encodes a [`Command`] into the drone's 8-byte control frame.
//!
//! ```text
//! +------+----+----+----+------+-------+-----+------+
//! | 0xCC | FB | LR | UD | TURN | FLAGS | XOR | 0x33 |
//! +------+----+----+----+------+-------+-----+------+
//!    0     1    2    3     4      5       6     7
//! ```
//!
//! No length prefix, no escaping. The drone drops frames whose checksum
//! does not match.

use super::checksum::xor_checksum;
use crate::control::state::Command;
use crate::error::{JoylinkError, Result};

/// Start marker (byte 0)
pub const FRAME_START: u8 = 0xCC;

/// End marker (byte 7)
pub const FRAME_END: u8 = 0x33;

/// Total frame length in bytes
pub const FRAME_LEN: usize = 8;

/// Offset of the checksum byte
pub const CHECKSUM_OFFSET: usize = 6;

/// One encoded control frame
pub type Frame = [u8; FRAME_LEN];

/// Encode a command into a complete control frame
///
/// # Arguments
///
/// * `command` - Snapshot of the command state
///
/// # Returns
///
/// * `Frame` - 8 bytes: start marker, 5 command bytes, checksum, end marker
///
/// # Examples
///
/// ```
/// use joylink::control::state::Command;
/// use joylink::protocol::frame::encode;
///
/// let frame = encode(&Command::neutral());
/// assert_eq!(frame, [0xCC, 0x80, 0x80, 0x80, 0x80, 0x00, 0x00, 0x33]);
/// ```
pub fn encode(command: &Command) -> Frame {
    let body = command.to_bytes();

    let mut frame = [0u8; FRAME_LEN];
    frame[0] = FRAME_START;
    frame[1..CHECKSUM_OFFSET].copy_from_slice(&body);
    frame[CHECKSUM_OFFSET] = xor_checksum(&body);
    frame[7] = FRAME_END;

    frame
}

/// Decode and validate a control frame
///
/// # Arguments
///
/// * `frame` - Raw frame bytes
///
/// # Returns
///
/// * `Result<Command>` - Command carried by the frame
///
/// # Errors
///
/// Returns error if:
/// - Frame is not exactly 8 bytes
/// - Start or end marker is wrong
/// - Checksum does not match bytes 1..=5
pub fn decode(frame: &[u8]) -> Result<Command> {
    if frame.len() != FRAME_LEN {
        return Err(JoylinkError::Protocol(format!(
            "Frame must be {} bytes, got {}",
            FRAME_LEN,
            frame.len()
        )));
    }

    if frame[0] != FRAME_START {
        return Err(JoylinkError::Protocol(format!(
            "Invalid start marker: 0x{:02X}",
            frame[0]
        )));
    }

    if frame[7] != FRAME_END {
        return Err(JoylinkError::Protocol(format!(
            "Invalid end marker: 0x{:02X}",
            frame[7]
        )));
    }

    let body = &frame[1..CHECKSUM_OFFSET];
    let calculated = xor_checksum(body);
    if calculated != frame[CHECKSUM_OFFSET] {
        return Err(JoylinkError::Protocol(format!(
            "Checksum mismatch: expected 0x{:02X}, got 0x{:02X}",
            calculated, frame[CHECKSUM_OFFSET]
        )));
    }

    Ok(Command {
        forward_back: body[0],
        left_right: body[1],
        up_down: body[2],
        turn: body[3],
        flags: body[4],
    })
}
