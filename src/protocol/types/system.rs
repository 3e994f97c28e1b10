//! System identity, feature summary, and status decoding

/// Product family reported by the version query.
///
/// The family drives several behavioral switches: which port
/// information layout the device supports, whether magnetic commands
/// apply, and whether the activation rate is adjustable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemFamily {
    /// Full-size optical tracker
    Polaris,
    /// Entry-level optical tracker
    Accedo,
    /// Compact optical tracker
    Vicra,
    /// Wide-volume optical tracker
    Spectra,
    /// Magnetic tracker
    Aurora,
}

impl SystemFamily {
    /// Whether the device reports the abbreviated port information
    /// layout without connector fields.
    pub fn short_port_info(self) -> bool {
        matches!(self, SystemFamily::Vicra | SystemFamily::Spectra)
    }

    /// Whether the device is a magnetic tracker.
    pub fn magnetic(self) -> bool {
        matches!(self, SystemFamily::Aurora)
    }

    /// Whether the device supports only its default activation rate.
    pub fn fixed_activation_rate(self) -> bool {
        matches!(self, SystemFamily::Accedo | SystemFamily::Vicra)
    }
}

/// Determines the product family from a version reply payload.
///
/// Optical trackers identify themselves with a banner starting with
/// `POLARIS`; the sub-family appears later in the text. Magnetic
/// trackers start with `AURORA`. Returns `None` for anything else.
pub fn detect_family(version_payload: &[u8]) -> Option<SystemFamily> {
    if starts_with_ignore_case(version_payload, b"POLARIS") {
        if contains_ignore_case(version_payload, b"ACCEDO") {
            Some(SystemFamily::Accedo)
        } else if contains_ignore_case(version_payload, b"VICRA") {
            Some(SystemFamily::Vicra)
        } else if contains_ignore_case(version_payload, b"SPECTRA") {
            Some(SystemFamily::Spectra)
        } else {
            Some(SystemFamily::Polaris)
        }
    } else if starts_with_ignore_case(version_payload, b"AURORA") {
        Some(SystemFamily::Aurora)
    } else {
        None
    }
}

fn starts_with_ignore_case(text: &[u8], prefix: &[u8]) -> bool {
    text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn contains_ignore_case(text: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || text.len() < needle.len() {
        return false;
    }
    text.windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}

/// Feature bits from the supported-features summary query.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    /// Active tool ports are present
    pub active_ports: bool,
    /// Passive tool ports are present
    pub passive_ports: bool,
    /// Multiple characterized volumes are available
    pub multiple_volumes: bool,
    /// Tool-in-port sensing is available
    pub tool_in_port_sensing: bool,
    /// Active wireless tools are supported
    pub active_wireless: bool,
    /// Magnetic sensor ports are present
    pub magnetic_ports: bool,
    /// A field generator is attached
    pub field_generator: bool,
}

impl Features {
    /// Decodes the eight-digit feature summary field.
    pub fn from_bits(bits: u32) -> Self {
        Features {
            active_ports: bits & 0x0000_0001 != 0,
            passive_ports: bits & 0x0000_0002 != 0,
            multiple_volumes: bits & 0x0000_0004 != 0,
            tool_in_port_sensing: bits & 0x0000_0008 != 0,
            active_wireless: bits & 0x0000_0010 != 0,
            magnetic_ports: bits & 0x0000_8000 != 0,
            field_generator: bits & 0x0004_0000 != 0,
        }
    }
}

/// Port population counts gathered from the per-type feature queries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PortCounts {
    /// Wired active tool ports
    pub active: usize,
    /// Passive tool ports
    pub passive: usize,
    /// Active ports with tool-in-port sensing
    pub active_tip: usize,
    /// Active wireless tool slots
    pub active_wireless: usize,
    /// Magnetic sensor ports
    pub magnetic: usize,
    /// Field generator interface cards
    pub field_generator_cards: usize,
    /// Attached field generators
    pub field_generators: usize,
}

/// System status bits carried at the tail of every tracking reply.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SystemStatus {
    /// A communication synchronization error occurred
    pub communication_sync_error: bool,
    /// Too much ambient interference to measure reliably
    pub too_much_interference: bool,
    /// The device detected an internal checksum error
    pub system_crc_error: bool,
    /// A recoverable processing exception occurred
    pub recoverable_exception: bool,
    /// The device detected a hardware failure
    pub hardware_failure: bool,
    /// The attached hardware configuration changed
    pub hardware_change: bool,
    /// A tool was plugged into a port
    pub port_occupied: bool,
    /// A tool was removed from a port
    pub port_unoccupied: bool,
    /// Diagnostic results are pending
    pub diagnostics_pending: bool,
    /// Operating temperature is out of range
    pub temperature_out_of_range: bool,
}

impl SystemStatus {
    /// Decodes the four-digit system status field.
    pub fn from_bits(bits: u16) -> Self {
        SystemStatus {
            communication_sync_error: bits & 0x0001 != 0,
            too_much_interference: bits & 0x0002 != 0,
            system_crc_error: bits & 0x0004 != 0,
            recoverable_exception: bits & 0x0008 != 0,
            hardware_failure: bits & 0x0010 != 0,
            hardware_change: bits & 0x0020 != 0,
            port_occupied: bits & 0x0040 != 0,
            port_unoccupied: bits & 0x0080 != 0,
            diagnostics_pending: bits & 0x0100 != 0,
            temperature_out_of_range: bits & 0x0200 != 0,
        }
    }

    /// True when any status bit was reported.
    pub fn any_set(&self) -> bool {
        *self != SystemStatus::default()
    }
}

/// Identity and capabilities discovered from a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemProfile {
    /// Product family
    pub family: SystemFamily,
    /// Firmware version text, one banner per queried revision
    pub version: String,
    /// Feature summary, left at its default for magnetic trackers
    pub features: Features,
    /// Port population counts
    pub ports: PortCounts,
}
