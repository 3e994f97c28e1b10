//! Device alert query decoding

use crate::error::{NdiError, Result};

/// Decoded alert flags from an alert status query.
///
/// The device reports active alert conditions as a decimal bitfield.
/// Each flag maps to one condition, in the device's bit order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AlertSet {
    /// Fatal parameter fault
    pub fatal_parameter_fault: bool,
    /// Sensor parameter fault
    pub sensor_parameter_fault: bool,
    /// Main voltage out of range
    pub main_voltage_fault: bool,
    /// Sensor voltage out of range
    pub sensor_voltage_fault: bool,
    /// Illuminator voltage out of range
    pub illuminator_voltage_fault: bool,
    /// Illuminator current out of range
    pub illuminator_current_fault: bool,
    /// Left sensor over temperature
    pub left_sensor_temperature: bool,
    /// Right sensor over temperature
    pub right_sensor_temperature: bool,
    /// Main board over temperature
    pub main_board_temperature: bool,
    /// Battery fault
    pub battery_fault: bool,
    /// The device was bumped
    pub bump_detected: bool,
    /// Cable fault
    pub cable_fault: bool,
    /// Firmware is incompatible with the hardware
    pub firmware_incompatible: bool,
    /// Non-fatal parameter fault
    pub non_fatal_parameter_fault: bool,
    /// Flash memory is full
    pub flash_memory_full: bool,
    /// Laser battery fault
    pub laser_battery_fault: bool,
    /// Temperature too high to operate
    pub temperature_too_high: bool,
    /// Temperature too low to operate
    pub temperature_too_low: bool,
}

impl AlertSet {
    /// Decodes the alert bitfield.
    pub fn from_bits(bits: u32) -> Self {
        AlertSet {
            fatal_parameter_fault: bits & 0x0000_0001 != 0,
            sensor_parameter_fault: bits & 0x0000_0002 != 0,
            main_voltage_fault: bits & 0x0000_0004 != 0,
            sensor_voltage_fault: bits & 0x0000_0008 != 0,
            illuminator_voltage_fault: bits & 0x0000_0010 != 0,
            illuminator_current_fault: bits & 0x0000_0020 != 0,
            left_sensor_temperature: bits & 0x0000_0040 != 0,
            right_sensor_temperature: bits & 0x0000_0080 != 0,
            main_board_temperature: bits & 0x0000_0100 != 0,
            battery_fault: bits & 0x0000_0200 != 0,
            bump_detected: bits & 0x0000_0400 != 0,
            cable_fault: bits & 0x0000_0800 != 0,
            firmware_incompatible: bits & 0x0000_1000 != 0,
            non_fatal_parameter_fault: bits & 0x0000_2000 != 0,
            flash_memory_full: bits & 0x0000_4000 != 0,
            laser_battery_fault: bits & 0x0000_8000 != 0,
            temperature_too_high: bits & 0x0001_0000 != 0,
            temperature_too_low: bits & 0x0002_0000 != 0,
        }
    }

    /// True when any alert is active.
    pub fn any_active(&self) -> bool {
        *self != AlertSet::default()
    }

    /// Returns a short label for every active alert.
    pub fn active_labels(&self) -> Vec<&'static str> {
        let flags = [
            (self.fatal_parameter_fault, "fatal parameter fault"),
            (self.sensor_parameter_fault, "sensor parameter fault"),
            (self.main_voltage_fault, "main voltage fault"),
            (self.sensor_voltage_fault, "sensor voltage fault"),
            (self.illuminator_voltage_fault, "illuminator voltage fault"),
            (self.illuminator_current_fault, "illuminator current fault"),
            (self.left_sensor_temperature, "left sensor temperature"),
            (self.right_sensor_temperature, "right sensor temperature"),
            (self.main_board_temperature, "main board temperature"),
            (self.battery_fault, "battery fault"),
            (self.bump_detected, "bump detected"),
            (self.cable_fault, "cable fault"),
            (self.firmware_incompatible, "firmware incompatible"),
            (self.non_fatal_parameter_fault, "non-fatal parameter fault"),
            (self.flash_memory_full, "flash memory full"),
            (self.laser_battery_fault, "laser battery fault"),
            (self.temperature_too_high, "temperature too high"),
            (self.temperature_too_low, "temperature too low"),
        ];
        flags
            .iter()
            .filter(|(active, _)| *active)
            .map(|(_, label)| *label)
            .collect()
    }
}

/// Parses an alert query reply payload.
///
/// The payload has the form `Info.Status.Alerts=<decimal>`. Only the
/// text after the first `=` is interpreted.
pub fn parse_alerts(payload: &[u8]) -> Result<AlertSet> {
    let separator = payload
        .iter()
        .position(|&byte| byte == b'=')
        .ok_or_else(|| {
            NdiError::MalformedReply("alert reply carries no value separator".into())
        })?;
    let value = std::str::from_utf8(&payload[separator + 1..])
        .map_err(|_| NdiError::MalformedReply("alert reply value is not ASCII".into()))?;
    let bits: u32 = value.trim().parse().map_err(|_| {
        NdiError::MalformedReply(format!("malformed alert value {:?}", value.trim()))
    })?;
    Ok(AlertSet::from_bits(bits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_alerts() {
        let alerts = parse_alerts(b"Info.Status.Alerts=0").unwrap();
        assert!(!alerts.any_active());
        assert!(alerts.active_labels().is_empty());
    }

    #[test]
    fn test_parse_alert_bits() {
        // 1024 = bump, 512 = battery, 1 = fatal parameter fault
        let alerts = parse_alerts(b"Info.Status.Alerts=1537").unwrap();
        assert!(alerts.fatal_parameter_fault);
        assert!(alerts.battery_fault);
        assert!(alerts.bump_detected);
        assert!(!alerts.cable_fault);
        assert_eq!(
            alerts.active_labels(),
            vec!["fatal parameter fault", "battery fault", "bump detected"]
        );
    }

    #[test]
    fn test_parse_high_bits() {
        let alerts = parse_alerts(b"Info.Status.New Alerts=196608").unwrap();
        assert!(alerts.temperature_too_high);
        assert!(alerts.temperature_too_low);
    }

    #[test]
    fn test_parse_missing_separator() {
        let result = parse_alerts(b"Info.Status.Alerts");
        assert!(matches!(result, Err(NdiError::MalformedReply(_))));
    }

    #[test]
    fn test_parse_malformed_value() {
        let result = parse_alerts(b"Info.Status.Alerts=banana");
        assert!(matches!(result, Err(NdiError::MalformedReply(_))));
    }
}
