//! Session configuration
//!
//! Host applications keep their tracking preferences in a
//! configuration store; this module gives those settings a typed
//! shape. [`SessionConfig`] derives serde traits so it can be loaded
//! from any format the host already uses.
//!
//! Tool definition images are keyed by port identity: wired ports use
//! `Port <n>` keys, wireless slots use `Wireless Tool <nn>` keys. A
//! value holding the literal `TTCFG` asks the device to load the
//! tool's definition from its own configuration memory instead of a
//! file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Key prefix naming a wireless tool slot.
pub const WIRELESS_KEY_PREFIX: &str = "Wireless Tool";

/// Key prefix naming a wired port.
pub const WIRED_KEY_PREFIX: &str = "Port ";

/// Tracking session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Write a log of every framed command and reply
    pub log_to_file: bool,
    /// Where the wire log is written
    pub log_file: PathBuf,
    /// Prefix each wire log entry with a timestamp line
    pub date_stamp_log: bool,
    /// Truncate the wire log when the session starts
    pub clear_log_on_start: bool,
    /// Reply deadline for commands the device lists no timeout for
    pub default_timeout_secs: u64,
    /// Illuminator activation rate setting
    pub activation_rate: u8,
    /// Sound the device beeper when a command fails
    pub beep_on_error: bool,
    /// How many beeps an error produces
    pub error_beeps: u8,
    /// Sound the device beeper when the device reports a warning
    pub beep_on_warning: bool,
    /// How many beeps a warning produces
    pub warning_beeps: u8,
    /// Classify and report reply errors while tracking
    pub report_while_tracking: bool,
    /// Tool definition images keyed by port identity
    pub tool_images: BTreeMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            log_to_file: false,
            log_file: PathBuf::from("ndi_api.log"),
            date_stamp_log: false,
            clear_log_on_start: false,
            default_timeout_secs: 10,
            activation_rate: 0,
            beep_on_error: false,
            error_beeps: 1,
            beep_on_warning: false,
            warning_beeps: 1,
            report_while_tracking: true,
            tool_images: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    /// Tool images configured for wireless slots, in key order.
    pub fn wireless_tool_images(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.tool_images
            .iter()
            .filter(|(key, _)| key.starts_with(WIRELESS_KEY_PREFIX))
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Tool images configured for wired ports, in key order.
    pub fn wired_tool_images(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.tool_images
            .iter()
            .filter(|(key, _)| key.starts_with(WIRED_KEY_PREFIX))
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(!config.log_to_file);
        assert_eq!(config.default_timeout_secs, 10);
        assert_eq!(config.activation_rate, 0);
        assert_eq!(config.error_beeps, 1);
        assert!(config.report_while_tracking);
        assert!(config.tool_images.is_empty());
    }

    #[test]
    fn test_load_partial_toml() {
        let config: SessionConfig = toml::from_str(
            r#"
            log_to_file = true
            log_file = "wire.log"
            beep_on_error = true
            error_beeps = 3

            [tool_images]
            "Wireless Tool 01" = "/srv/tools/probe.rom"
            "Port 3" = "TTCFG"
            "Port 1" = "/srv/tools/reference.rom"
            "#,
        )
        .unwrap();
        assert!(config.log_to_file);
        assert_eq!(config.log_file, PathBuf::from("wire.log"));
        assert_eq!(config.error_beeps, 3);
        // Unlisted settings keep their defaults.
        assert_eq!(config.default_timeout_secs, 10);
        assert!(config.report_while_tracking);

        let wireless: Vec<_> = config.wireless_tool_images().collect();
        assert_eq!(wireless, vec![("Wireless Tool 01", "/srv/tools/probe.rom")]);
        let wired: Vec<_> = config.wired_tool_images().collect();
        assert_eq!(
            wired,
            vec![
                ("Port 1", "/srv/tools/reference.rom"),
                ("Port 3", "TTCFG"),
            ]
        );
    }

    #[test]
    fn test_round_trip_serialization() {
        let mut config = SessionConfig::default();
        config.beep_on_warning = true;
        config
            .tool_images
            .insert("Port 2".to_string(), "/srv/tools/stylus.rom".to_string());
        let text = toml::to_string(&config).unwrap();
        let restored: SessionConfig = toml::from_str(&text).unwrap();
        assert!(restored.beep_on_warning);
        assert_eq!(
            restored.tool_images.get("Port 2").map(String::as_str),
            Some("/srv/tools/stylus.rom")
        );
    }
}
