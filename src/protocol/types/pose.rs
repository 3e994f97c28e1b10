//! Tracking reply parsers for the textual and binary pose formats
//!
//! Pose reports arrive in two shapes: a textual reply with
//! fixed-width signed decimal fields, and a framed binary reply with
//! little-endian floats. Both decode into [`ToolUpdate`] records so
//! the registry can ingest them through a single path.
//!
//! The textual parser is incremental. Each record is committed as it
//! is decoded, so a reply that goes bad partway through still updates
//! every handle that preceded the damage. The binary parser validates
//! the whole frame before reporting anything.

use bytes::Buf;

use crate::error::{NdiError, Result};
use crate::protocol::crc::verify_binary_reply;
use crate::protocol::reply::{hex_field, PREAMBLE_FIRST, PREAMBLE_SECOND};
use crate::transform::{QuatTransform, Quaternion, Vector3};

use super::port_info::Handle;
use super::system::SystemStatus;

/// Sentinel written into every numeric pose field of a tool that is
/// not currently measurable.
pub const BAD_FLOAT: f32 = -3.697_314e28;

/// Threshold below which a translation component is treated as the
/// missing-value sentinel.
pub const MAX_NEGATIVE: f32 = -3.0e28;

/// Shortest well-formed remainder after a record's handle: a DISABLED
/// record, its line feed, and the trailing system status field.
const MIN_RECORD_REMAINDER: usize = 13;

/// How far into a binary reply the frame preamble may sit.
const PREAMBLE_SCAN_WINDOW: usize = 64;

/// Transform status values used by the binary tracking format.
const BX_POSE_VALID: u8 = 0x01;
const BX_POSE_MISSING: u8 = 0x02;
const BX_POSE_DISABLED: u8 = 0x04;

/// Measurement state of one tool in a tracking reply.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PoseFlag {
    /// No measurement has been reported yet, or the tool is not visible
    #[default]
    Missing,
    /// The pose fields hold a current measurement
    Valid,
    /// Tracking for the handle is disabled
    Disabled,
    /// The port has no tool in it
    Unoccupied,
}

/// Most recent pose state retained for a handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Measurement state of the numeric fields
    pub flag: PoseFlag,
    /// Orientation as a unit quaternion
    pub rotation: Quaternion,
    /// Position in millimeters
    pub translation: Vector3,
    /// RMS fit error in millimeters
    pub error: f32,
    /// Frame counter of the most recent report
    pub frame_number: u32,
}

impl Default for Pose {
    fn default() -> Self {
        Pose {
            flag: PoseFlag::Missing,
            rotation: Quaternion::new(BAD_FLOAT, BAD_FLOAT, BAD_FLOAT, BAD_FLOAT),
            translation: Vector3::new(BAD_FLOAT, BAD_FLOAT, BAD_FLOAT),
            error: BAD_FLOAT,
            frame_number: 0,
        }
    }
}

impl Pose {
    /// Returns the rigid transform held in this pose.
    pub fn transform(&self) -> QuatTransform {
        QuatTransform {
            rotation: self.rotation,
            translation: self.translation,
        }
    }

    /// Overwrites every numeric field with the missing-value sentinel.
    pub fn set_invalid(&mut self) {
        self.rotation = Quaternion::new(BAD_FLOAT, BAD_FLOAT, BAD_FLOAT, BAD_FLOAT);
        self.translation = Vector3::new(BAD_FLOAT, BAD_FLOAT, BAD_FLOAT);
        self.error = BAD_FLOAT;
    }
}

/// One tool's slice of a tracking reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolUpdate {
    /// Handle the record belongs to
    pub handle: Handle,
    /// Measurement state carried by the record
    pub flag: PoseFlag,
    /// Orientation, sentinel-valued unless the flag is `Valid`
    pub rotation: Quaternion,
    /// Position, sentinel-valued unless the flag is `Valid`
    pub translation: Vector3,
    /// Fit error, sentinel-valued unless the flag is `Valid`
    pub error: f32,
    /// Handle status bits, absent when the record carried none
    pub status_bits: Option<u32>,
    /// Frame counter, absent when the record carried none
    pub frame_number: Option<u32>,
}

impl ToolUpdate {
    fn invalid(handle: Handle, flag: PoseFlag) -> Self {
        ToolUpdate {
            handle,
            flag,
            rotation: Quaternion::new(BAD_FLOAT, BAD_FLOAT, BAD_FLOAT, BAD_FLOAT),
            translation: Vector3::new(BAD_FLOAT, BAD_FLOAT, BAD_FLOAT),
            error: BAD_FLOAT,
            status_bits: None,
            frame_number: None,
        }
    }
}

/// Incremental parser for the textual tracking reply.
///
/// Decode records with [`TxReader::next_tool`] until it returns
/// `None`, then call [`TxReader::finish`] for the trailing system
/// status field. When `next_tool` fails, [`TxReader::current_handle`]
/// names the handle whose record could not be decoded.
#[derive(Debug)]
pub struct TxReader<'a> {
    payload: &'a [u8],
    cursor: usize,
    remaining: usize,
    current: Option<Handle>,
}

impl<'a> TxReader<'a> {
    /// Starts reading a tracking reply payload.
    pub fn new(payload: &'a [u8]) -> Result<Self> {
        let remaining = hex_field(payload, 0, 2)? as usize;
        Ok(TxReader {
            payload,
            cursor: 2,
            remaining,
            current: None,
        })
    }

    /// Returns the handle of the record most recently started.
    pub fn current_handle(&self) -> Option<Handle> {
        self.current
    }

    /// Decodes the next tool record, or `None` after the last one.
    pub fn next_tool(&mut self) -> Result<Option<ToolUpdate>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;

        let handle = Handle(self.take_hex(2)? as u8);
        self.current = Some(handle);
        if self.payload.len().saturating_sub(self.cursor) < MIN_RECORD_REMAINDER {
            return Err(NdiError::MalformedReply(format!(
                "tracking record for handle {} is truncated",
                handle
            )));
        }

        let rest = &self.payload[self.cursor..];
        let update = if rest.starts_with(b"UNOCCUPIED") {
            self.cursor += b"UNOCCUPIED".len();
            ToolUpdate::invalid(handle, PoseFlag::Unoccupied)
        } else if rest.starts_with(b"DISABLED") {
            self.cursor += b"DISABLED".len();
            ToolUpdate::invalid(handle, PoseFlag::Disabled)
        } else if rest.starts_with(b"MISSING") {
            self.cursor += b"MISSING".len();
            let mut update = ToolUpdate::invalid(handle, PoseFlag::Missing);
            update.status_bits = Some(self.take_hex(8)?);
            update.frame_number = Some(self.take_hex(8)?);
            update
        } else {
            let rotation = Quaternion::new(
                self.take_signed(6, 10_000.0)?,
                self.take_signed(6, 10_000.0)?,
                self.take_signed(6, 10_000.0)?,
                self.take_signed(6, 10_000.0)?,
            );
            let translation = Vector3::new(
                self.take_signed(7, 100.0)?,
                self.take_signed(7, 100.0)?,
                self.take_signed(7, 100.0)?,
            );
            let error = self.take_signed(6, 10_000.0)?;
            let status_bits = self.take_hex(8)?;
            let frame_number = self.take_hex(8)?;
            ToolUpdate {
                handle,
                flag: PoseFlag::Valid,
                rotation,
                translation,
                error,
                status_bits: Some(status_bits),
                frame_number: Some(frame_number),
            }
        };

        // Records are separated by a line feed, including the last one.
        self.cursor += 1;
        Ok(Some(update))
    }

    /// Decodes the system status field that follows the last record.
    ///
    /// Call after [`TxReader::next_tool`] has returned `None`.
    pub fn finish(self) -> Result<SystemStatus> {
        let bits = hex_field(self.payload, self.cursor, 4)?;
        Ok(SystemStatus::from_bits(bits as u16))
    }

    fn take_hex(&mut self, width: usize) -> Result<u32> {
        let value = hex_field(self.payload, self.cursor, width)?;
        self.cursor += width;
        Ok(value)
    }

    fn take_signed(&mut self, width: usize, scale: f32) -> Result<f32> {
        let bytes = self
            .payload
            .get(self.cursor..self.cursor + width)
            .ok_or_else(|| {
                NdiError::MalformedReply(format!(
                    "tracking reply ends before the numeric field at offset {}",
                    self.cursor
                ))
            })?;
        let text = std::str::from_utf8(bytes).map_err(|_| {
            NdiError::MalformedReply("tracking reply contains a non-ASCII numeric field".into())
        })?;
        let value: i32 = text.parse().map_err(|_| {
            NdiError::MalformedReply(format!("malformed numeric field {:?} in tracking reply", text))
        })?;
        self.cursor += width;
        Ok(value as f32 / scale)
    }
}

/// Parses a binary tracking reply.
///
/// The whole frame is validated, including both checksums, before any
/// update is produced, so a damaged reply leaves the caller's state
/// untouched. Returns the decoded records together with the trailing
/// system status.
pub fn parse_bx(frame: &[u8]) -> Result<(Vec<ToolUpdate>, SystemStatus)> {
    let start = frame
        .iter()
        .take(PREAMBLE_SCAN_WINDOW)
        .position(|&byte| byte == PREAMBLE_FIRST)
        .ok_or_else(|| {
            NdiError::ProtocolViolation(format!(
                "no frame preamble within the first {} bytes",
                PREAMBLE_SCAN_WINDOW
            ))
        })?;
    if frame.get(start + 1) != Some(&PREAMBLE_SECOND) {
        return Err(NdiError::ProtocolViolation(
            "frame preamble is incomplete".into(),
        ));
    }

    let mut body = verify_binary_reply(&frame[start..])?;

    need(body, 1, "the handle count")?;
    let count = body.get_u8() as usize;
    let mut updates = Vec::with_capacity(count);
    for _ in 0..count {
        need(body, 2, "a record header")?;
        let handle = Handle(body.get_u8());
        let transform_status = body.get_u8();
        match transform_status {
            BX_POSE_VALID => {
                need(body, 40, "a pose record")?;
                let rotation = Quaternion::new(
                    body.get_f32_le(),
                    body.get_f32_le(),
                    body.get_f32_le(),
                    body.get_f32_le(),
                );
                let translation =
                    Vector3::new(body.get_f32_le(), body.get_f32_le(), body.get_f32_le());
                let error = body.get_f32_le();
                let status_bits = body.get_u32_le();
                let frame_number = body.get_u32_le();
                updates.push(ToolUpdate {
                    handle,
                    flag: PoseFlag::Valid,
                    rotation,
                    translation,
                    error,
                    status_bits: Some(status_bits),
                    frame_number: Some(frame_number),
                });
            }
            BX_POSE_MISSING => {
                need(body, 8, "a missing-tool record")?;
                let mut update = ToolUpdate::invalid(handle, PoseFlag::Missing);
                update.status_bits = Some(body.get_u32_le());
                update.frame_number = Some(body.get_u32_le());
                updates.push(update);
            }
            BX_POSE_DISABLED => {
                updates.push(ToolUpdate::invalid(handle, PoseFlag::Disabled));
            }
            other => {
                return Err(NdiError::ProtocolViolation(format!(
                    "unknown transform status {:#04X} for handle {}",
                    other, handle
                )));
            }
        }
    }

    need(body, 2, "the system status")?;
    let status = SystemStatus::from_bits(body.get_u16_le());
    if body.has_remaining() {
        return Err(NdiError::ProtocolViolation(format!(
            "{} unparsed bytes after the system status",
            body.remaining()
        )));
    }
    Ok((updates, status))
}

fn need(body: &[u8], len: usize, what: &str) -> Result<()> {
    if body.len() < len {
        return Err(NdiError::ProtocolViolation(format!(
            "binary tracking reply ends inside {}",
            what
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::crc::binary_crc;

    fn sample_tx_payload() -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"02");
        payload.extend_from_slice(b"0A");
        payload.extend_from_slice(b"+09999+00000+00000-00141");
        payload.extend_from_slice(b"+012345-000067+000001");
        payload.extend_from_slice(b"+00012");
        payload.extend_from_slice(b"0000003D");
        payload.extend_from_slice(b"0000001F");
        payload.push(b'\n');
        payload.extend_from_slice(b"0B");
        payload.extend_from_slice(b"MISSING");
        payload.extend_from_slice(b"00000100");
        payload.extend_from_slice(b"00000020");
        payload.push(b'\n');
        payload.extend_from_slice(b"0002");
        payload
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_tx_valid_and_missing() {
        let payload = sample_tx_payload();
        let mut reader = TxReader::new(&payload).unwrap();

        let first = reader.next_tool().unwrap().unwrap();
        assert_eq!(first.handle, Handle(0x0A));
        assert_eq!(first.flag, PoseFlag::Valid);
        assert_close(first.rotation.q0, 0.9999);
        assert_close(first.rotation.qx, 0.0);
        assert_close(first.rotation.qz, -0.0141);
        assert_close(first.translation.x, 123.45);
        assert_close(first.translation.y, -0.67);
        assert_close(first.translation.z, 0.01);
        assert_close(first.error, 0.0012);
        assert_eq!(first.status_bits, Some(0x3D));
        assert_eq!(first.frame_number, Some(0x1F));

        let second = reader.next_tool().unwrap().unwrap();
        assert_eq!(second.handle, Handle(0x0B));
        assert_eq!(second.flag, PoseFlag::Missing);
        assert_eq!(second.rotation.q0, BAD_FLOAT);
        assert_eq!(second.translation.x, BAD_FLOAT);
        assert_eq!(second.status_bits, Some(0x100));
        assert_eq!(second.frame_number, Some(0x20));

        assert!(reader.next_tool().unwrap().is_none());
        let status = reader.finish().unwrap();
        assert!(status.too_much_interference);
        assert!(!status.communication_sync_error);
    }

    #[test]
    fn test_tx_disabled_and_unoccupied() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"03");
        payload.extend_from_slice(b"0C");
        payload.extend_from_slice(b"DISABLED");
        payload.push(b'\n');
        payload.extend_from_slice(b"0D");
        payload.extend_from_slice(b"UNOCCUPIED");
        payload.push(b'\n');
        payload.extend_from_slice(b"0EMISSING0000000000000001");
        payload.push(b'\n');
        payload.extend_from_slice(b"0000");

        let mut reader = TxReader::new(&payload).unwrap();
        let disabled = reader.next_tool().unwrap().unwrap();
        assert_eq!(disabled.flag, PoseFlag::Disabled);
        for value in [
            disabled.rotation.q0,
            disabled.rotation.qx,
            disabled.rotation.qy,
            disabled.rotation.qz,
            disabled.translation.x,
            disabled.translation.y,
            disabled.translation.z,
            disabled.error,
        ] {
            assert_eq!(value, BAD_FLOAT);
        }
        assert_eq!(disabled.status_bits, None);
        assert_eq!(disabled.frame_number, None);

        let unoccupied = reader.next_tool().unwrap().unwrap();
        assert_eq!(unoccupied.flag, PoseFlag::Unoccupied);
        assert_eq!(unoccupied.status_bits, None);

        let missing = reader.next_tool().unwrap().unwrap();
        assert_eq!(missing.flag, PoseFlag::Missing);
        assert!(reader.next_tool().unwrap().is_none());
        assert!(!reader.finish().unwrap().any_set());
    }

    #[test]
    fn test_tx_disabled_as_final_record() {
        let mut reader = TxReader::new(b"010CDISABLED\n0000").unwrap();
        let disabled = reader.next_tool().unwrap().unwrap();
        assert_eq!(disabled.handle, Handle(0x0C));
        assert_eq!(disabled.flag, PoseFlag::Disabled);
        assert!(reader.next_tool().unwrap().is_none());
        assert!(!reader.finish().unwrap().any_set());
    }

    #[test]
    fn test_tx_malformed_numeric_names_handle() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"01");
        payload.extend_from_slice(b"0A");
        payload.extend_from_slice(b"+0G999+00000+00000+00000");
        payload.extend_from_slice(b"+012345-000067+000001");
        payload.extend_from_slice(b"+00012000000000000001F");
        payload.push(b'\n');
        payload.extend_from_slice(b"0000");

        let mut reader = TxReader::new(&payload).unwrap();
        let result = reader.next_tool();
        assert!(matches!(result, Err(NdiError::MalformedReply(_))));
        assert_eq!(reader.current_handle(), Some(Handle(0x0A)));
    }

    #[test]
    fn test_tx_truncated_record() {
        let mut reader = TxReader::new(b"010AMISSING").unwrap();
        let result = reader.next_tool();
        assert!(matches!(result, Err(NdiError::MalformedReply(_))));
    }

    #[test]
    fn test_tx_bad_count() {
        assert!(TxReader::new(b"XY").is_err());
    }

    fn frame_bx(body: &[u8]) -> Vec<u8> {
        let mut frame = vec![PREAMBLE_FIRST, PREAMBLE_SECOND];
        frame.extend_from_slice(&(body.len() as u16).to_le_bytes());
        let header_crc = binary_crc(&frame[..4]);
        frame.extend_from_slice(&header_crc.to_le_bytes());
        frame.extend_from_slice(body);
        frame.extend_from_slice(&binary_crc(body).to_le_bytes());
        frame
    }

    fn valid_bx_body() -> Vec<u8> {
        let mut body = vec![0x01, 0x0A, BX_POSE_VALID];
        for value in [0.9999f32, 0.0, 0.0, -0.0141, 123.45, -0.67, 0.01, 0.0012] {
            body.extend_from_slice(&value.to_le_bytes());
        }
        body.extend_from_slice(&0x3Du32.to_le_bytes());
        body.extend_from_slice(&0x1Fu32.to_le_bytes());
        body.extend_from_slice(&0x0041u16.to_le_bytes());
        body
    }

    #[test]
    fn test_bx_valid_record() {
        let frame = frame_bx(&valid_bx_body());
        let (updates, status) = parse_bx(&frame).unwrap();
        assert_eq!(updates.len(), 1);
        let update = &updates[0];
        assert_eq!(update.handle, Handle(0x0A));
        assert_eq!(update.flag, PoseFlag::Valid);
        assert_eq!(update.rotation.q0, 0.9999);
        assert_eq!(update.translation.x, 123.45);
        assert_eq!(update.error, 0.0012);
        assert_eq!(update.status_bits, Some(0x3D));
        assert_eq!(update.frame_number, Some(0x1F));
        assert!(status.communication_sync_error);
        assert!(status.port_occupied);
    }

    #[test]
    fn test_bx_missing_and_disabled() {
        let mut body = vec![0x02];
        body.push(0x0B);
        body.push(BX_POSE_MISSING);
        body.extend_from_slice(&0x100u32.to_le_bytes());
        body.extend_from_slice(&9u32.to_le_bytes());
        body.push(0x0C);
        body.push(BX_POSE_DISABLED);
        body.extend_from_slice(&0u16.to_le_bytes());

        let (updates, _) = parse_bx(&frame_bx(&body)).unwrap();
        assert_eq!(updates[0].flag, PoseFlag::Missing);
        assert_eq!(updates[0].rotation.q0, BAD_FLOAT);
        assert_eq!(updates[0].status_bits, Some(0x100));
        assert_eq!(updates[0].frame_number, Some(9));
        assert_eq!(updates[1].flag, PoseFlag::Disabled);
        assert_eq!(updates[1].status_bits, None);
    }

    #[test]
    fn test_bx_unknown_transform_status() {
        let mut body = vec![0x01, 0x0A, 0x03];
        body.extend_from_slice(&0u16.to_le_bytes());
        let result = parse_bx(&frame_bx(&body));
        assert!(matches!(result, Err(NdiError::ProtocolViolation(_))));
    }

    #[test]
    fn test_bx_truncated_record() {
        let mut body = vec![0x01, 0x0A, BX_POSE_VALID];
        body.extend_from_slice(&[0u8; 10]);
        let result = parse_bx(&frame_bx(&body));
        assert!(matches!(result, Err(NdiError::ProtocolViolation(_))));
    }

    #[test]
    fn test_bx_skips_leading_junk() {
        let mut frame = vec![0x00, 0x11, 0x22];
        frame.extend_from_slice(&frame_bx(&valid_bx_body()));
        let (updates, _) = parse_bx(&frame).unwrap();
        assert_eq!(updates.len(), 1);
    }

    #[test]
    fn test_bx_missing_preamble() {
        let frame = vec![0u8; 80];
        let result = parse_bx(&frame);
        assert!(matches!(result, Err(NdiError::ProtocolViolation(_))));
    }

    #[test]
    fn test_bx_corrupted_body() {
        let mut frame = frame_bx(&valid_bx_body());
        let body_start = 6;
        frame[body_start] ^= 0x01;
        let result = parse_bx(&frame);
        assert!(matches!(result, Err(NdiError::BadChecksum)));
    }
}
