//! # Frame Checksum
//!
//! The drone validates each frame with a plain XOR reduction over the five
//! command bytes (forward/back, left/right, up/down, turn, flags). The start
//! and end markers are not covered.

/// Calculate the XOR checksum of the command bytes
///
/// # Arguments
///
/// * `data` - Command bytes (frame bytes 1 through 5)
///
/// # Returns
///
/// * `u8` - XOR of all bytes, `0x00` for an empty slice
///
/// # Examples
///
/// ```
/// use joylink::protocol::checksum::xor_checksum;
///
/// assert_eq!(xor_checksum(&[0x80, 0x80, 0x80, 0x80, 0x00]), 0x00);
/// assert_eq!(xor_checksum(&[0xFF, 0xF4, 0x00, 0xF4, 0x00]), 0xFF);
/// ```
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, &byte| acc ^ byte)
}
