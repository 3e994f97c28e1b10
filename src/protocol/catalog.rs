//! Coded device message catalog
//!
//! `ERROR` and `WARNING` replies carry a two-digit hex code instead of
//! text. The catalog collaborator turns codes into human-readable
//! messages; callers may supply their own implementation (for example
//! one backed by a translation file) or use [`BuiltinCatalog`], which
//! carries the standard API code set.

/// Which coded message table a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCategory {
    Error,
    Warning,
}

/// Resolves device message codes to display text.
pub trait MessageCatalog {
    /// Look up the text for a code, or `None` when the code is not in
    /// the catalog. Callers apply their own fallback text for unknown
    /// codes.
    fn lookup(&self, category: MessageCategory, code: u8) -> Option<String>;
}

/// Catalog of the standard API error and warning codes.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinCatalog;

impl MessageCatalog for BuiltinCatalog {
    fn lookup(&self, category: MessageCategory, code: u8) -> Option<String> {
        let text = match category {
            MessageCategory::Error => error_text(code),
            MessageCategory::Warning => warning_text(code),
        };
        text.map(str::to_owned)
    }
}

fn error_text(code: u8) -> Option<&'static str> {
    let text = match code {
        0x01 => "Invalid command",
        0x02 => "Command too long",
        0x03 => "Command too short",
        0x04 => "Invalid CRC calculated for command",
        0x05 => "Time-out on command execution",
        0x06 => "Unable to set up new communication parameters",
        0x07 => "Incorrect number of command parameters",
        0x08 => "Invalid port handle selected",
        0x09 => "Invalid tracking priority selected",
        0x0A => "Invalid LED selected",
        0x0B => "Invalid LED state selected",
        0x0C => "Command is invalid while in the current mode",
        0x0D => "No tool is assigned to the selected port",
        0x0E => "Selected port is already initialized",
        0x0F => "Selected port is already enabled",
        0x10 => "System not initialized",
        0x11 => "Unable to stop tracking",
        0x12 => "Unable to start tracking",
        0x13 => "Unable to initialize the tool in the port",
        0x14 => "Invalid Position Sensor characterization parameters",
        0x15 => "Unable to initialize the Measurement System",
        0x16 => "Unable to start diagnostic mode",
        0x17 => "Unable to stop diagnostic mode",
        0x1D => "Unable to search for SROM device IDs",
        0x1E => "Unable to read SROM device data",
        0x1F => "Unable to write SROM device data",
        0x20 => "Unable to select SROM device",
        0x21 => "Unable to perform tool current test",
        0x22 => "Unable to find camera parameters for the enabled tool wavelength",
        0x23 => "Command parameter is out of range",
        0x2A => "No memory is available for dynamic allocation",
        0x2B => "The requested port handle has not been allocated",
        0x2C => "The requested port handle has become unoccupied",
        0x2D => "All port handles have been allocated",
        0x31 => "Invalid input or output state",
        _ => return None,
    };
    Some(text)
}

fn warning_text(code: u8) -> Option<&'static str> {
    let text = match code {
        0x01 => "Tool geometry is similar to an already enabled tool geometry",
        _ => return None,
    };
    Some(text)
}
