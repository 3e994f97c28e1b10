//! Tracking system session
//!
//! [`TrackingSystem`] owns the serial link and drives the device
//! through its command set: reset and initialization, port handle
//! management, tool definition loading, tracking, and the system
//! information queries. The submodules group the command surfaces;
//! this module holds the session state and the shared
//! send/read/classify plumbing every operation goes through.
//!
//! Sessions are assembled with [`TrackingSystem::builder`], which
//! accepts the host configuration plus optional replacements for the
//! message catalog, the timeout escalation handler, and the wire log.

pub mod info;
pub mod ports;
pub mod registry;
pub mod tracking;

pub use registry::{HandleRegistry, ToolRecord, HANDLE_CAPACITY};

use std::thread;
use std::time::Duration;

use crate::config::SessionConfig;
use crate::error::{NdiError, Result};
use crate::io::{
    read_reply, AbortOnTimeout, CommParams, FileLog, NoopLog, ReadMode, SerialTransport,
    TimeoutHandler, Transport, WireLog,
};
use crate::protocol::catalog::{BuiltinCatalog, MessageCatalog, MessageCategory};
use crate::protocol::command::frame_command;
use crate::protocol::crc::verify_text_reply;
use crate::protocol::reply::{
    classify, error_code, warning_code, RawReply, ReplyKind, PREAMBLE_FIRST, PREAMBLE_SECOND,
};
use crate::protocol::types::{Handle, SystemProfile, SystemStatus, TimeoutTable};

/// Reply deadline used before the device publishes its timeout table.
const INITIAL_TIMEOUT: Duration = Duration::from_secs(3);

/// Pause between the serial break and reading the reset banner.
const RESET_SETTLE: Duration = Duration::from_millis(500);

/// Pause after the banner while attached hardware finishes its own
/// power-on cycle.
const RESET_BOOT_DELAY: Duration = Duration::from_secs(3);

/// Pause after a serial reconfiguration command before the host side
/// switches over.
const COMM_SETTLE: Duration = Duration::from_millis(100);

/// Session with one tracking device.
pub struct TrackingSystem {
    transport: Option<Box<dyn Transport>>,
    config: SessionConfig,
    catalog: Box<dyn MessageCatalog>,
    escalation: Box<dyn TimeoutHandler>,
    wire_log: Box<dyn WireLog>,
    registry: HandleRegistry,
    timeouts: TimeoutTable,
    profile: Option<SystemProfile>,
    system_status: SystemStatus,
    reference: Option<Handle>,
    last_command: Vec<u8>,
    active_timeout: Duration,
    report_while_tracking: bool,
    in_report_beep: bool,
}

/// Builder for [`TrackingSystem`].
pub struct TrackingSystemBuilder {
    config: SessionConfig,
    catalog: Box<dyn MessageCatalog>,
    escalation: Box<dyn TimeoutHandler>,
    wire_log: Option<Box<dyn WireLog>>,
}

impl TrackingSystemBuilder {
    fn new() -> Self {
        TrackingSystemBuilder {
            config: SessionConfig::default(),
            catalog: Box::new(BuiltinCatalog),
            escalation: Box::new(AbortOnTimeout),
            wire_log: None,
        }
    }

    /// Uses the given session configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the message catalog.
    pub fn catalog(mut self, catalog: impl MessageCatalog + 'static) -> Self {
        self.catalog = Box::new(catalog);
        self
    }

    /// Replaces the timeout escalation handler.
    pub fn escalation(mut self, handler: impl TimeoutHandler + 'static) -> Self {
        self.escalation = Box::new(handler);
        self
    }

    /// Replaces the wire log, overriding the configuration's logging
    /// settings.
    pub fn wire_log(mut self, log: impl WireLog + 'static) -> Self {
        self.wire_log = Some(Box::new(log));
        self
    }

    /// Finishes the session.
    pub fn build(self) -> TrackingSystem {
        let wire_log = match self.wire_log {
            Some(log) => log,
            None => default_wire_log(&self.config),
        };
        let timeouts = TimeoutTable::new(self.config.default_timeout_secs);
        let report_while_tracking = self.config.report_while_tracking;
        TrackingSystem {
            transport: None,
            config: self.config,
            catalog: self.catalog,
            escalation: self.escalation,
            wire_log,
            registry: HandleRegistry::new(),
            timeouts,
            profile: None,
            system_status: SystemStatus::default(),
            reference: None,
            last_command: Vec::new(),
            active_timeout: INITIAL_TIMEOUT,
            report_while_tracking,
            in_report_beep: false,
        }
    }
}

fn default_wire_log(config: &SessionConfig) -> Box<dyn WireLog> {
    if !config.log_to_file {
        return Box::new(NoopLog);
    }
    match FileLog::create(
        &config.log_file,
        config.date_stamp_log,
        config.clear_log_on_start,
    ) {
        Ok(log) => Box::new(log),
        Err(error) => {
            tracing::warn!(
                error = %error,
                path = %config.log_file.display(),
                "Could not open the wire log, logging disabled"
            );
            Box::new(NoopLog)
        }
    }
}

impl TrackingSystem {
    /// Starts building a session.
    pub fn builder() -> TrackingSystemBuilder {
        TrackingSystemBuilder::new()
    }

    /// Opens a serial port and attaches it to the session.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ndicapi_rust::system::TrackingSystem;
    ///
    /// let mut system = TrackingSystem::builder().build();
    /// system.open("/dev/ttyUSB0")?;
    /// system.hardware_reset()?;
    /// system.initialize()?;
    /// # Ok::<(), ndicapi_rust::error::NdiError>(())
    /// ```
    pub fn open(&mut self, port_name: &str) -> Result<()> {
        let transport = SerialTransport::open(port_name)?;
        self.attach(Box::new(transport));
        Ok(())
    }

    /// Attaches an already-open transport to the session.
    pub fn attach(&mut self, transport: Box<dyn Transport>) {
        self.transport = Some(transport);
    }

    /// Detaches and drops the transport.
    pub fn close(&mut self) {
        self.transport = None;
    }

    /// True while a transport is attached.
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The tool record registry.
    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// Convenience lookup of one tool record.
    pub fn tool(&self, handle: Handle) -> Option<&ToolRecord> {
        self.registry.get(handle)
    }

    /// The device profile, once it has been queried.
    pub fn profile(&self) -> Option<&SystemProfile> {
        self.profile.as_ref()
    }

    /// System status bits from the most recent tracking reply.
    pub fn system_status(&self) -> SystemStatus {
        self.system_status
    }

    /// The reference tool handle, if one is set.
    pub fn reference(&self) -> Option<Handle> {
        self.reference
    }

    /// Selects the tool every other pose is re-expressed against, or
    /// `None` to report raw tracker-frame poses.
    pub fn set_reference(&mut self, reference: Option<Handle>) {
        self.reference = reference;
    }

    /// Hardware resets the device with a serial break.
    ///
    /// The break drops the device back to its power-on serial
    /// settings, so the host side is reconfigured to match before the
    /// reset banner is read. The banner carries its own checksum,
    /// which is verified after the boot delay.
    pub fn hardware_reset(&mut self) -> Result<()> {
        self.last_command.clear();
        self.active_timeout = INITIAL_TIMEOUT;
        {
            let transport = self
                .transport
                .as_mut()
                .ok_or(NdiError::TransportUnavailable)?;
            transport.set_params(CommParams::DEFAULT)?;
            transport.send_break()?;
        }
        thread::sleep(RESET_SETTLE);
        let reply = self.read_text()?;
        let kind = classify(reply.bytes(), true);
        self.interpret(kind, reply.bytes())?;
        // Attached accessories take a while to finish their own
        // power-on cycle even after the banner arrives.
        thread::sleep(RESET_BOOT_DELAY);
        if kind == ReplyKind::Reset {
            verify_text_reply(reply.bytes())?;
        }
        tracing::info!("Hardware reset complete");
        Ok(())
    }

    /// Resets the device with the soft reset command.
    ///
    /// Used instead of a serial break when the link cannot carry one,
    /// such as some USB adapters.
    pub fn wireless_reset(&mut self) -> Result<()> {
        self.text_command(b"RESET 0").map(|_| ())
    }

    /// Initializes the device.
    ///
    /// Initialization makes the device forget port assignments, so
    /// the registry's port bindings are cleared to match.
    pub fn initialize(&mut self) -> Result<()> {
        self.registry.clear_bindings();
        self.text_command(b"INIT ")?;
        tracing::info!("System initialized");
        Ok(())
    }

    /// Sounds the device beeper.
    pub fn beep(&mut self, beeps: u8) -> Result<()> {
        let command = format!("BEEP {}", beeps);
        self.text_command(command.as_bytes()).map(|_| ())
    }

    /// Applies the configured illuminator activation rate.
    ///
    /// Magnetic trackers have no illuminators, so the command is
    /// skipped for them. Families with a fixed rate always get the
    /// default setting regardless of configuration.
    pub fn set_activation_rate(&mut self) -> Result<()> {
        let family = self.profile.as_ref().map(|profile| profile.family);
        if family.map_or(false, |family| family.magnetic()) {
            return Ok(());
        }
        let mut rate = self.config.activation_rate;
        if family.map_or(false, |family| family.fixed_activation_rate()) && rate != 0 {
            tracing::debug!(
                requested = rate,
                "Device supports only its default activation rate"
            );
            rate = 0;
        }
        let command = format!("IRATE {}", rate);
        self.text_command(command.as_bytes()).map(|_| ())
    }

    /// Reconfigures the serial link on both ends.
    ///
    /// The five codes follow the device's serial configuration
    /// command. The device acknowledges at the old settings, then both
    /// sides switch.
    pub fn set_comm_params(
        &mut self,
        baud: u8,
        data_bits: u8,
        parity: u8,
        stop_bits: u8,
        handshake: u8,
    ) -> Result<()> {
        let params = CommParams::from_codes(baud, data_bits, parity, stop_bits, handshake)?;
        let command = format!("COMM {}{}{}{}{}", baud, data_bits, parity, stop_bits, handshake);
        self.text_command(command.as_bytes())?;
        thread::sleep(COMM_SETTLE);
        let transport = self
            .transport
            .as_mut()
            .ok_or(NdiError::TransportUnavailable)?;
        transport.set_params(params)?;
        Ok(())
    }

    /// Frames and writes a command, remembering it for resends.
    fn send(&mut self, command: &[u8]) -> Result<()> {
        let magnetic = self.is_magnetic();
        self.active_timeout = self.timeouts.lookup(command, magnetic);
        let framed = frame_command(command, true)?;
        let transport = self
            .transport
            .as_mut()
            .ok_or(NdiError::TransportUnavailable)?;
        transport.write_all(&framed)?;
        transport.flush()?;
        self.wire_log.sent(&framed);
        self.last_command = framed;
        Ok(())
    }

    /// Reads one textual reply.
    fn read_text(&mut self) -> Result<RawReply> {
        let bytes = self.read_raw(ReadMode::Text)?;
        Ok(RawReply::Text(bytes))
    }

    /// Reads one binary reply.
    ///
    /// A reply without the binary preamble is tagged as text; the
    /// device answers in text when it rejects a binary request.
    fn read_binary(&mut self) -> Result<RawReply> {
        let bytes = self.read_raw(ReadMode::Binary)?;
        if bytes.starts_with(&[PREAMBLE_FIRST, PREAMBLE_SECOND]) {
            Ok(RawReply::Binary(bytes))
        } else {
            Ok(RawReply::Text(bytes))
        }
    }

    fn read_raw(&mut self, mode: ReadMode) -> Result<Vec<u8>> {
        let Self {
            transport,
            escalation,
            wire_log,
            last_command,
            active_timeout,
            ..
        } = self;
        let transport = transport.as_mut().ok_or(NdiError::TransportUnavailable)?;
        read_reply(
            transport.as_mut(),
            last_command,
            *active_timeout,
            mode,
            escalation.as_mut(),
            wire_log.as_mut(),
        )
    }

    /// Classifies a reply and reports what it carries.
    fn check(&mut self, reply: &RawReply, check_crc: bool) -> Result<()> {
        let kind = classify(reply.bytes(), check_crc);
        self.interpret(kind, reply.bytes())
    }

    /// Turns a classified reply into the session's verdict on it.
    ///
    /// Device errors fail the operation after the catalog message is
    /// logged and the configured error beep sounds. Warnings do the
    /// same reporting but do not fail the operation.
    fn interpret(&mut self, kind: ReplyKind, reply: &[u8]) -> Result<()> {
        match kind {
            ReplyKind::Reset | ReplyKind::Okay | ReplyKind::Other => Ok(()),
            ReplyKind::Error => {
                let code = parse_code(error_code(reply))?;
                let message = self
                    .catalog
                    .lookup(MessageCategory::Error, code)
                    .unwrap_or_else(|| "Unknown Error".to_string());
                if self.config.beep_on_error {
                    let beeps = self.config.error_beeps;
                    self.beep_for_report(beeps);
                }
                tracing::error!(code, message = %message, "Device reported an error");
                Err(NdiError::DeviceError { code, message })
            }
            ReplyKind::Warning => {
                let code = parse_code(warning_code(reply))?;
                let message = self
                    .catalog
                    .lookup(MessageCategory::Warning, code)
                    .unwrap_or_else(|| {
                        "A non-fatal tool error has been encountered".to_string()
                    });
                if self.config.beep_on_warning {
                    let beeps = self.config.warning_beeps;
                    self.beep_for_report(beeps);
                }
                let warning = NdiError::DeviceWarning { code, message };
                tracing::warn!(warning = %warning, "Device reported a warning");
                Ok(())
            }
            ReplyKind::BadCrc => {
                tracing::error!("Reply failed its checksum");
                Err(NdiError::BadChecksum)
            }
            ReplyKind::Invalid => {
                tracing::error!("Reply structure is invalid");
                Err(NdiError::MalformedReply("reply structure is invalid".to_string()))
            }
        }
    }

    /// Sounds the beeper for an error or warning report.
    ///
    /// The beep command's own reply goes through the usual reporting,
    /// so a guard keeps a failing beep from beeping about itself.
    fn beep_for_report(&mut self, beeps: u8) {
        if self.in_report_beep {
            return;
        }
        self.in_report_beep = true;
        if let Err(error) = self.beep(beeps) {
            tracing::debug!(error = %error, "Report beep failed");
        }
        self.in_report_beep = false;
    }

    /// Sends a command and fully checks its textual reply.
    fn text_command(&mut self, command: &[u8]) -> Result<RawReply> {
        self.send(command)?;
        let reply = self.read_text()?;
        self.check(&reply, true)?;
        Ok(reply)
    }

    fn is_magnetic(&self) -> bool {
        self.profile
            .as_ref()
            .map_or(false, |profile| profile.family.magnetic())
    }

    fn short_port_info(&self) -> bool {
        self.profile
            .as_ref()
            .map_or(false, |profile| profile.family.short_port_info())
    }
}

/// Extracts the verified payload of a textual reply.
fn text_payload(reply: &RawReply) -> Result<&[u8]> {
    match reply {
        RawReply::Text(bytes) => verify_text_reply(bytes),
        RawReply::Binary(_) => Err(NdiError::ProtocolViolation(
            "expected a textual reply".into(),
        )),
    }
}

/// Parses the two-digit hex code of an error or warning reply.
fn parse_code(field: Option<&[u8]>) -> Result<u8> {
    let field = field.ok_or_else(|| {
        NdiError::MalformedReply("reply is too short to carry a code".into())
    })?;
    let text = std::str::from_utf8(field)
        .map_err(|_| NdiError::MalformedReply("reply code is not ASCII".into()))?;
    u8::from_str_radix(text, 16)
        .map_err(|_| NdiError::MalformedReply(format!("malformed reply code {:?}", text)))
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;

    #[test]
    fn test_parse_code() {
        assert_eq!(parse_code(Some(b"01")).unwrap(), 0x01);
        assert_eq!(parse_code(Some(b"2A")).unwrap(), 0x2A);
        assert!(parse_code(None).is_err());
        assert!(parse_code(Some(b"ZZ")).is_err());
    }

    #[test]
    fn test_commands_require_transport() {
        let mut system = TrackingSystem::builder().build();
        let result = system.initialize();
        assert!(matches!(result, Err(NdiError::TransportUnavailable)));
    }

    #[test]
    fn test_initialize_round_trip() {
        let transport = ScriptedTransport::new().expect("INIT ", "OKAY");
        let state = transport.state();
        let mut system = TrackingSystem::builder().build();
        system.attach(Box::new(transport));
        system.initialize().unwrap();
        assert_eq!(state.borrow().written.len(), 1);
    }

    #[test]
    fn test_device_error_reply_fails_command() {
        let transport = ScriptedTransport::new().expect("INIT ", "ERROR01");
        let mut system = TrackingSystem::builder().build();
        system.attach(Box::new(transport));
        match system.initialize() {
            Err(NdiError::DeviceError { code, message }) => {
                assert_eq!(code, 0x01);
                assert_eq!(message, "Invalid command");
            }
            other => panic!("expected device error, got {:?}", other),
        }
    }

    #[test]
    fn test_warning_reply_succeeds() {
        let transport = ScriptedTransport::new().expect("PENA 0AD", "WARNING01");
        let mut system = TrackingSystem::builder().build();
        system.attach(Box::new(transport));
        system.text_command(b"PENA 0AD").unwrap();
    }

    #[test]
    fn test_error_beep_sounds_when_configured() {
        let transport = ScriptedTransport::new()
            .expect("INIT ", "ERROR01")
            .expect("BEEP 2", "1");
        let state = transport.state();
        let mut config = SessionConfig::default();
        config.beep_on_error = true;
        config.error_beeps = 2;
        let mut system = TrackingSystem::builder().config(config).build();
        system.attach(Box::new(transport));
        assert!(system.initialize().is_err());
        // Both the failing command and the report beep hit the wire.
        assert_eq!(state.borrow().written.len(), 2);
    }

    #[test]
    fn test_beep_failure_does_not_recurse() {
        // The beep command itself fails; without the guard this would
        // try to beep about the beep failing.
        let transport = ScriptedTransport::new()
            .expect("INIT ", "ERROR01")
            .expect("BEEP 1", "ERROR01");
        let state = transport.state();
        let mut config = SessionConfig::default();
        config.beep_on_error = true;
        let mut system = TrackingSystem::builder().config(config).build();
        system.attach(Box::new(transport));
        assert!(system.initialize().is_err());
        assert_eq!(state.borrow().written.len(), 2);
    }

    #[test]
    fn test_set_reference() {
        let mut system = TrackingSystem::builder().build();
        assert_eq!(system.reference(), None);
        system.set_reference(Some(Handle(3)));
        assert_eq!(system.reference(), Some(Handle(3)));
        system.set_reference(None);
        assert_eq!(system.reference(), None);
    }

    #[test]
    fn test_wireless_reset() {
        let transport = ScriptedTransport::new().expect("RESET 0", "OKAY");
        let mut system = TrackingSystem::builder().build();
        system.attach(Box::new(transport));
        system.wireless_reset().unwrap();
    }

    #[test]
    fn test_set_comm_params_validates_codes() {
        let mut system = TrackingSystem::builder().build();
        let result = system.set_comm_params(9, 0, 0, 0, 0);
        assert!(matches!(result, Err(NdiError::InvalidParameter(_))));
    }

    #[test]
    fn test_set_comm_params_switches_host_side() {
        let transport = ScriptedTransport::new().expect("COMM 50001", "OKAY");
        let state = transport.state();
        let mut system = TrackingSystem::builder().build();
        system.attach(Box::new(transport));
        system.set_comm_params(5, 0, 0, 0, 1).unwrap();
        let params = state.borrow().params.clone();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].baud, 115_200);
        assert!(params[0].handshake);
    }
}
