//! CRC-16 checksum calculation and verification
//!
//! The measurement system protects every framed command and reply with
//! a CRC-16 (polynomial 0x8005, bit-reflected). Two implementations of
//! the same function live here: a table-driven form used on the textual
//! path and a parity-trick form used on the binary path. Both produce
//! identical values for identical input.

use once_cell::sync::Lazy;

use crate::error::{NdiError, Result};

/// Reflected CRC-16 polynomial shared by both implementations.
const POLYNOMIAL: u16 = 0xA001;

/// Lookup table for the table-driven implementation, built on first use.
static CRC_TABLE: Lazy<[u16; 256]> = Lazy::new(|| {
    let mut table = [0u16; 256];
    for (index, entry) in table.iter_mut().enumerate() {
        let mut value = index as u16;
        for _ in 0..8 {
            value = if value & 1 != 0 {
                (value >> 1) ^ POLYNOMIAL
            } else {
                value >> 1
            };
        }
        *entry = value;
    }
    table
});

/// Nibble parity table for the binary-path implementation.
const ODD_PARITY: [u16; 16] = [0, 1, 1, 0, 1, 0, 0, 1, 1, 0, 0, 1, 0, 1, 1, 0];

/// Calculate the checksum of a textual command or reply payload.
///
/// # Example
///
/// ```
/// use ndicapi_rust::protocol::crc::text_crc;
///
/// assert_eq!(text_crc(b"123456789"), 0xBB3D);
/// ```
pub fn text_crc(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc = CRC_TABLE[((crc ^ byte as u16) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc
}

/// Calculate the checksum of a binary reply section.
///
/// Functionally identical to [`text_crc`]; kept separate so the binary
/// decoder mirrors the firmware's own arithmetic.
pub fn binary_crc(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc = binary_crc_step(crc, byte);
    }
    crc
}

fn binary_crc_step(crc: u16, byte: u8) -> u16 {
    let data = (byte as u16 ^ (crc & 0xFF)) & 0xFF;
    let mut crc = crc >> 8;
    if ODD_PARITY[(data & 0x0F) as usize] != ODD_PARITY[(data >> 4) as usize] {
        crc ^= 0xC001;
    }
    crc ^= data << 6;
    crc ^= data << 7;
    crc
}

/// Verify the trailing checksum of a textual reply.
///
/// `reply` is the raw reply as read from the port, with or without the
/// trailing carriage return. On success the payload is returned with
/// the four checksum characters (and terminator) stripped.
///
/// # Errors
///
/// - [`NdiError::MalformedReply`] if the reply is too short to carry a
///   checksum or the checksum field is not hexadecimal
/// - [`NdiError::BadChecksum`] if the checksum does not match
pub fn verify_text_reply(reply: &[u8]) -> Result<&[u8]> {
    let body = match reply.last() {
        Some(&super::CARRIAGE_RETURN) => &reply[..reply.len() - 1],
        _ => reply,
    };
    if body.len() < 4 {
        return Err(NdiError::MalformedReply(format!(
            "reply of {} bytes cannot carry a checksum",
            body.len()
        )));
    }
    let (payload, field) = body.split_at(body.len() - 4);
    let received = parse_crc_field(field)?;
    if text_crc(payload) != received {
        return Err(NdiError::BadChecksum);
    }
    Ok(payload)
}

/// Verify both checksums of a binary reply frame.
///
/// `frame` must be a complete frame starting at the two preamble bytes.
/// The header checksum covers the first four bytes and the body
/// checksum covers everything between the header and the final two
/// bytes. On success the body section is returned.
///
/// # Errors
///
/// - [`NdiError::ProtocolViolation`] if the frame is shorter than its
///   own header claims
/// - [`NdiError::BadChecksum`] if either checksum does not match
pub fn verify_binary_reply(frame: &[u8]) -> Result<&[u8]> {
    if frame.len() < 8 {
        return Err(NdiError::ProtocolViolation(format!(
            "binary frame of {} bytes is shorter than its fixed fields",
            frame.len()
        )));
    }
    let declared = u16::from_le_bytes([frame[2], frame[3]]) as usize;
    let total = declared + 8;
    if frame.len() != total {
        return Err(NdiError::ProtocolViolation(format!(
            "binary frame length {} disagrees with declared body length {}",
            frame.len(),
            declared
        )));
    }
    let header_crc = u16::from_le_bytes([frame[4], frame[5]]);
    if binary_crc(&frame[..4]) != header_crc {
        return Err(NdiError::BadChecksum);
    }
    let body = &frame[6..total - 2];
    let body_crc = u16::from_le_bytes([frame[total - 2], frame[total - 1]]);
    if binary_crc(body) != body_crc {
        return Err(NdiError::BadChecksum);
    }
    Ok(body)
}

fn parse_crc_field(field: &[u8]) -> Result<u16> {
    let text = std::str::from_utf8(field)
        .map_err(|_| NdiError::MalformedReply("checksum field is not ASCII".into()))?;
    u16::from_str_radix(text, 16).map_err(|_| {
        NdiError::MalformedReply(format!("checksum field {:?} is not hexadecimal", text))
    })
}
