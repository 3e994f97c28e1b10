//! System identity, timeout, and alert queries
//!
//! After initialization the device is asked who it is and what it
//! can do. The version banner fixes the product family, which in turn
//! selects the feature queries that make sense: optical trackers
//! report a feature summary and port counts, magnetic trackers report
//! sensor and field generator counts plus extra firmware banners.

use crate::error::{NdiError, Result};
use crate::protocol::reply::{classify, hex_field, ReplyKind};
use crate::protocol::types::{
    detect_family, parse_alerts, AlertSet, Features, PortCounts, SystemProfile,
};

use super::{text_payload, TrackingSystem};

impl TrackingSystem {
    /// Queries the device's identity and capabilities.
    ///
    /// Populates the profile returned by
    /// [`TrackingSystem::profile`]. Several later operations change
    /// behavior with the family, so hosts should run this right after
    /// initialization.
    pub fn query_system_info(&mut self) -> Result<()> {
        let reply = self.text_command(b"VER 4")?;
        let banner = text_payload(&reply)?.to_vec();
        let family = detect_family(&banner).ok_or_else(|| {
            NdiError::MalformedReply("unrecognized system version banner".into())
        })?;
        let mut version = String::from_utf8_lossy(&banner).trim_end().to_string();
        let mut features = Features::default();
        let mut ports = PortCounts::default();

        if family.magnetic() {
            let sensors = self.query_payload(b"SFLIST 10")?;
            ports.magnetic = hex_field(&sensors, 0, 2)? as usize;
            let generators = self.query_payload(b"SFLIST 12")?;
            ports.field_generator_cards = hex_field(&generators, 0, 1)? as usize;
            ports.field_generators = hex_field(&generators, 1, 1)? as usize;
            // Magnetic trackers carry separate control unit and field
            // generator firmware with their own banners.
            for revision in [b"VER 7".as_slice(), b"VER 8".as_slice()] {
                let extra = self.query_payload(revision)?;
                version.push('\n');
                version.push_str(String::from_utf8_lossy(&extra).trim_end());
            }
        } else {
            let summary = self.query_payload(b"SFLIST 00")?;
            features = Features::from_bits(hex_field(&summary, 0, 8)?);
            ports.active = self.query_count(b"SFLIST 01")?;
            ports.passive = self.query_count(b"SFLIST 02")?;
            ports.active_tip = self.query_count(b"SFLIST 04")?;
            ports.active_wireless = self.query_count(b"SFLIST 05")?;
        }

        tracing::info!(family = ?family, "System identified");
        self.profile = Some(SystemProfile {
            family,
            version,
            features,
            ports,
        });
        Ok(())
    }

    /// Reloads the per-command timeout table from the device.
    ///
    /// Returns how many entries the device published. Firmware old
    /// enough to reject the query leaves the table empty, which is not
    /// an error; every command then runs with the default timeout.
    pub fn refresh_timeouts(&mut self) -> Result<usize> {
        self.timeouts.clear();
        self.send(b"GET Info.Timeout.*")?;
        let reply = self.read_text()?;
        let kind = classify(reply.bytes(), true);
        if kind == ReplyKind::Error {
            tracing::debug!("Device does not publish command timeouts");
            return Ok(0);
        }
        self.interpret(kind, reply.bytes())?;
        let payload = text_payload(&reply)?;
        let added = self.timeouts.populate(payload);
        tracing::debug!(entries = added, "Command timeout table refreshed");
        Ok(added)
    }

    /// Queries active alert conditions.
    ///
    /// With `new_only` set, the device reports only alerts raised
    /// since the last query.
    pub fn alerts(&mut self, new_only: bool) -> Result<AlertSet> {
        let command: &[u8] = if new_only {
            b"GET Info.Status.New Alerts"
        } else {
            b"GET Info.Status.Alerts"
        };
        let reply = self.text_command(command)?;
        let payload = text_payload(&reply)?;
        parse_alerts(payload)
    }

    fn query_payload(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        let reply = self.text_command(command)?;
        Ok(text_payload(&reply)?.to_vec())
    }

    fn query_count(&mut self, command: &[u8]) -> Result<usize> {
        let payload = self.query_payload(command)?;
        Ok(hex_field(&payload, 0, 1)? as usize)
    }
}
