//! Tracking mode and pose acquisition
//!
//! Once ports are activated the device is put into tracking mode and
//! polled for poses, in either the textual or the binary reply
//! format. Decoded records land in the registry; when a reference
//! tool is selected, every other enabled pose is re-expressed
//! relative to it before the call returns.

use crate::error::Result;
use crate::protocol::reply::strip_framing;
use crate::protocol::types::{parse_bx, SystemStatus, TxReader};

use super::{text_payload, TrackingSystem};

/// Base reply option: poses with per-handle status and frame number.
const POSE_REPORT: u16 = 0x0001;

/// Option bit asking for poses beyond the characterized volume.
const BEYOND_VOLUME: u16 = 0x0800;

impl TrackingSystem {
    /// Puts the device into tracking mode.
    ///
    /// Whether tracking replies are classified and reported is latched
    /// here from the configuration, so a host can flip the setting
    /// between tracking runs but not inside one.
    pub fn start_tracking(&mut self) -> Result<()> {
        self.report_while_tracking = self.config.report_while_tracking;
        self.text_command(b"TSTART ")?;
        tracing::info!("Tracking started");
        Ok(())
    }

    /// Takes the device out of tracking mode.
    pub fn stop_tracking(&mut self) -> Result<()> {
        self.text_command(b"TSTOP ")?;
        tracing::info!("Tracking stopped");
        Ok(())
    }

    /// Requests one textual pose report and ingests it.
    ///
    /// Returns the system status carried at the tail of the reply.
    /// Records are committed as they decode; if a record is damaged,
    /// its handle is flagged missing and the error is returned after
    /// every earlier record has already been applied.
    pub fn read_poses(&mut self, beyond_volume: bool) -> Result<SystemStatus> {
        let command = format!("TX {:04X}", report_mode(beyond_volume));
        self.send(command.as_bytes())?;
        let reply = self.read_text()?;
        let payload = if self.report_while_tracking {
            self.check(&reply, true)?;
            text_payload(&reply)?
        } else {
            strip_framing(reply.bytes())
        };

        let mut reader = TxReader::new(payload)?;
        loop {
            match reader.next_tool() {
                Ok(Some(update)) => self.registry.ingest(&update),
                Ok(None) => break,
                Err(error) => {
                    if let Some(handle) = reader.current_handle() {
                        self.registry.mark_missing(handle);
                    }
                    return Err(error);
                }
            }
        }
        let status = reader.finish()?;
        self.system_status = status;
        self.registry.apply_reference(self.reference);
        Ok(status)
    }

    /// Requests one binary pose report and ingests it.
    ///
    /// The binary format carries full-precision floats and is the
    /// cheaper choice at high frame rates. The frame is validated
    /// before any record is applied, so a damaged reply leaves the
    /// registry untouched.
    pub fn read_poses_binary(&mut self, beyond_volume: bool) -> Result<SystemStatus> {
        let command = format!("BX {:04X}", report_mode(beyond_volume));
        self.send(command.as_bytes())?;
        let reply = self.read_binary()?;
        if self.report_while_tracking {
            self.check(&reply, true)?;
        }
        let (updates, status) = parse_bx(reply.bytes())?;
        for update in &updates {
            self.registry.ingest(update);
        }
        self.system_status = status;
        self.registry.apply_reference(self.reference);
        Ok(status)
    }
}

fn report_mode(beyond_volume: bool) -> u16 {
    if beyond_volume {
        POSE_REPORT | BEYOND_VOLUME
    } else {
        POSE_REPORT
    }
}
