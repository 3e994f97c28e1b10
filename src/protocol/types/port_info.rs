//! Port handle identifiers, search queries, and port information replies

use std::fmt;

use crate::error::{NdiError, Result};
use crate::protocol::reply::hex_field;

/// Reply option word requesting the abbreviated port information
/// layout used by systems that omit connector data.
pub const SHORT_OPTIONS: &str = "0005";

/// Reply option word requesting the full port information layout
/// including connector and channel fields.
pub const LONG_OPTIONS: &str = "0025";

/// Port handle assigned by the device.
///
/// Handles are single-byte identifiers allocated by the device and
/// rendered as two uppercase hex digits on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u8);

impl Handle {
    /// Returns the handle as a registry slot index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.0)
    }
}

/// Which population of handles a search query should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleSearch {
    /// Every allocated handle
    All,
    /// Handles the device wants freed
    StaleHandles,
    /// Occupied handles that have not been initialized
    NeedInitialization,
    /// Initialized handles that have not been enabled
    NeedEnabling,
    /// Enabled handles
    Enabled,
}

impl HandleSearch {
    /// Returns the two-digit reply option for this search.
    pub fn code(self) -> &'static str {
        match self {
            HandleSearch::All => "00",
            HandleSearch::StaleHandles => "01",
            HandleSearch::NeedInitialization => "02",
            HandleSearch::NeedEnabling => "03",
            HandleSearch::Enabled => "04",
        }
    }
}

/// Parses a handle search reply into the handles it lists.
///
/// The payload carries a two-digit hex count followed by one
/// five-character entry per handle: two hex digits of handle number
/// and three digits of status that this parser does not interpret.
pub fn parse_handle_list(payload: &[u8]) -> Result<Vec<Handle>> {
    let count = hex_field(payload, 0, 2)? as usize;
    let mut handles = Vec::with_capacity(count);
    for entry in 0..count {
        let offset = 2 + entry * 5;
        handles.push(Handle(hex_field(payload, offset, 2)? as u8));
    }
    Ok(handles)
}

/// Decoded per-handle status bits.
///
/// Two reply families report handle status with different bit
/// layouts: port information replies carry a two-digit field, and
/// tracking replies carry an eight-digit field. Each applicator
/// touches only the flags its reply actually reports, so the flags
/// unique to the other family survive a refresh.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HandleStatus {
    /// A tool is physically present in the port
    pub tool_in_port: bool,
    /// General purpose input line 1 is asserted
    pub gpio1: bool,
    /// General purpose input line 2 is asserted
    pub gpio2: bool,
    /// General purpose input line 3 is asserted
    pub gpio3: bool,
    /// The handle has been initialized
    pub initialized: bool,
    /// The handle has been enabled for tracking
    pub enabled: bool,
    /// The tool is entirely outside the characterized volume
    pub out_of_volume: bool,
    /// Some tool markers are outside the characterized volume
    pub partially_out_of_volume: bool,
    /// Field disturbance detected at the sensor
    pub disturbance: bool,
    /// Signal amplitude below the usable range
    pub signal_too_small: bool,
    /// Signal amplitude above the usable range
    pub signal_too_big: bool,
    /// The device hit a processing exception for this tool
    pub processing_exception: bool,
    /// Tool hardware failure
    pub hardware_failure: bool,
    /// The port supports tip current sensing
    pub tip_current_sensing: bool,
}

impl HandleStatus {
    /// Applies the two-digit status field from a port information reply.
    pub fn apply_port_bits(&mut self, bits: u8) {
        self.tool_in_port = bits & 0x01 != 0;
        self.gpio1 = bits & 0x02 != 0;
        self.gpio2 = bits & 0x04 != 0;
        self.gpio3 = bits & 0x08 != 0;
        self.initialized = bits & 0x10 != 0;
        self.enabled = bits & 0x20 != 0;
        self.tip_current_sensing = bits & 0x80 != 0;
    }

    /// Applies the eight-digit status field from a tracking reply.
    pub fn apply_tracking_bits(&mut self, bits: u32) {
        self.tool_in_port = bits & 0x0001 != 0;
        self.gpio1 = bits & 0x0002 != 0;
        self.gpio2 = bits & 0x0004 != 0;
        self.gpio3 = bits & 0x0008 != 0;
        self.initialized = bits & 0x0010 != 0;
        self.enabled = bits & 0x0020 != 0;
        self.out_of_volume = bits & 0x0040 != 0;
        self.partially_out_of_volume = bits & 0x0080 != 0;
        self.disturbance = bits & 0x0200 != 0;
        self.signal_too_small = bits & 0x0400 != 0;
        self.signal_too_big = bits & 0x0800 != 0;
        self.processing_exception = bits & 0x1000 != 0;
        self.hardware_failure = bits & 0x2000 != 0;
    }
}

/// Identity and status fields decoded from a port information reply.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Tool type field
    pub tool_type: String,
    /// Manufacturer identifier
    pub manufacturer: String,
    /// Tool revision
    pub revision: String,
    /// Serial number
    pub serial_number: String,
    /// Raw two-digit status bits
    pub status_bits: u8,
    /// Part number
    pub part_number: String,
    /// Physical connector, present only in the long layout
    pub connector: Option<String>,
    /// Connector channel, present only in the long layout
    pub channel: Option<String>,
}

impl PortInfo {
    /// Parses a port information reply payload.
    ///
    /// The fixed fields occupy the first 53 characters. When
    /// `long_format` is set the payload additionally carries the
    /// physical connector and channel at offsets 63 and 65. Textual
    /// fields are space padded on the wire and stored trimmed.
    pub fn parse(payload: &[u8], long_format: bool) -> Result<PortInfo> {
        let mut info = PortInfo {
            tool_type: text_field(payload, 0, 8)?,
            manufacturer: text_field(payload, 8, 12)?,
            revision: text_field(payload, 20, 3)?,
            serial_number: text_field(payload, 23, 8)?,
            status_bits: hex_field(payload, 31, 2)? as u8,
            part_number: text_field(payload, 33, 20)?,
            connector: None,
            channel: None,
        };
        if long_format {
            info.connector = Some(text_field(payload, 63, 2)?);
            info.channel = Some(text_field(payload, 65, 2)?);
        }
        Ok(info)
    }

    /// Returns the status bits decoded into flag form.
    pub fn status(&self) -> HandleStatus {
        let mut status = HandleStatus::default();
        status.apply_port_bits(self.status_bits);
        status
    }
}

fn text_field(payload: &[u8], offset: usize, width: usize) -> Result<String> {
    let bytes = payload.get(offset..offset + width).ok_or_else(|| {
        NdiError::MalformedReply(format!(
            "port information reply ends before the field at offset {}",
            offset
        ))
    })?;
    Ok(String::from_utf8_lossy(bytes)
        .trim_end_matches(|c| c == ' ' || c == '\0')
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 53 characters: tool type, manufacturer, revision, serial,
    // status and part number, all space padded to width.
    const SHORT_PAYLOAD: &[u8] = b"01      NDI         012A1B2C3D431NDI-038-0001        ";

    fn long_payload() -> Vec<u8> {
        let mut payload = SHORT_PAYLOAD.to_vec();
        payload.extend_from_slice(b"**********");
        payload.extend_from_slice(b"0901");
        payload
    }

    #[test]
    fn test_parse_short_layout() {
        let info = PortInfo::parse(SHORT_PAYLOAD, false).unwrap();
        assert_eq!(info.tool_type, "01");
        assert_eq!(info.manufacturer, "NDI");
        assert_eq!(info.revision, "012");
        assert_eq!(info.serial_number, "A1B2C3D4");
        assert_eq!(info.status_bits, 0x31);
        assert_eq!(info.part_number, "NDI-038-0001");
        assert_eq!(info.connector, None);
        assert_eq!(info.channel, None);
    }

    #[test]
    fn test_parse_long_layout() {
        let info = PortInfo::parse(&long_payload(), true).unwrap();
        assert_eq!(info.part_number, "NDI-038-0001");
        assert_eq!(info.connector.as_deref(), Some("09"));
        assert_eq!(info.channel.as_deref(), Some("01"));
    }

    #[test]
    fn test_parse_long_layout_requires_connector_fields() {
        let result = PortInfo::parse(SHORT_PAYLOAD, true);
        assert!(matches!(result, Err(NdiError::MalformedReply(_))));
    }

    #[test]
    fn test_status_decoding() {
        let info = PortInfo::parse(SHORT_PAYLOAD, false).unwrap();
        let status = info.status();
        assert!(status.tool_in_port);
        assert!(status.initialized);
        assert!(status.enabled);
        assert!(!status.tip_current_sensing);
        assert!(!status.gpio1);
    }

    #[test]
    fn test_port_bits_leave_tracking_flags() {
        let mut status = HandleStatus::default();
        status.apply_tracking_bits(0x0000_0261);
        assert!(status.out_of_volume);
        assert!(status.disturbance);
        // A later port information refresh reports fewer flags and
        // must not clear the tracking-only ones.
        status.apply_port_bits(0x31);
        assert!(status.out_of_volume);
        assert!(status.disturbance);
        assert!(status.initialized);
    }

    #[test]
    fn test_tracking_bits() {
        let mut status = HandleStatus::default();
        status.apply_tracking_bits(0x0000_3C00);
        assert!(status.signal_too_small);
        assert!(status.signal_too_big);
        assert!(status.processing_exception);
        assert!(status.hardware_failure);
        assert!(!status.disturbance);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(Handle(0x0A).to_string(), "0A");
        assert_eq!(Handle(0xFF).to_string(), "FF");
        assert_eq!(Handle(1).to_string(), "01");
    }

    #[test]
    fn test_search_codes() {
        assert_eq!(HandleSearch::All.code(), "00");
        assert_eq!(HandleSearch::StaleHandles.code(), "01");
        assert_eq!(HandleSearch::NeedInitialization.code(), "02");
        assert_eq!(HandleSearch::NeedEnabling.code(), "03");
        assert_eq!(HandleSearch::Enabled.code(), "04");
    }

    #[test]
    fn test_parse_handle_list() {
        let handles = parse_handle_list(b"030A0010B0011F001").unwrap();
        assert_eq!(handles, vec![Handle(0x0A), Handle(0x0B), Handle(0x1F)]);
    }

    #[test]
    fn test_parse_handle_list_empty() {
        let handles = parse_handle_list(b"00").unwrap();
        assert!(handles.is_empty());
    }

    #[test]
    fn test_parse_handle_list_truncated() {
        let result = parse_handle_list(b"020A001");
        assert!(matches!(result, Err(NdiError::MalformedReply(_))));
    }

    #[test]
    fn test_parse_handle_list_bad_count() {
        let result = parse_handle_list(b"0G");
        assert!(matches!(result, Err(NdiError::MalformedReply(_))));
    }
}
