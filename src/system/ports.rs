//! Port handle commands
//!
//! Tool tracking starts with port handle management: stale handles
//! are freed, occupied ports are discovered and initialized, tool
//! definitions are loaded where the tool itself carries none, and the
//! surviving handles are enabled. [`TrackingSystem::activate_ports`]
//! runs the whole sequence; the finer-grained operations are public
//! for hosts that manage ports themselves.

use crate::config::WIRED_KEY_PREFIX;
use crate::error::{NdiError, Result};
use crate::protocol::reply::hex_field;
use crate::protocol::types::port_info::{LONG_OPTIONS, SHORT_OPTIONS};
use crate::protocol::types::{parse_handle_list, Handle, HandleSearch, PortInfo};

use super::{text_payload, TrackingSystem};

/// Passes of the discovery loop before it is declared stuck.
const MAX_DISCOVERY_PASSES: usize = 8;

/// Bytes of tool definition data carried per write command.
const ROM_CHUNK: usize = 64;

/// Largest tool definition image the device accepts.
const MAX_ROM_IMAGE: usize = 1024;

/// Configuration value that selects the device's own stored tool
/// definition instead of an image file.
const DEVICE_PROFILE_VALUE: &str = "TTCFG";

impl TrackingSystem {
    /// Asks the device which handles fall in the searched population.
    pub fn search_handles(&mut self, search: HandleSearch) -> Result<Vec<Handle>> {
        let command = format!("PHSR {}", search.code());
        let reply = self.text_command(command.as_bytes())?;
        let payload = text_payload(&reply)?;
        parse_handle_list(payload)
    }

    /// Frees every handle the device has marked stale.
    pub fn free_stale_handles(&mut self) -> Result<usize> {
        let stale = self.search_handles(HandleSearch::StaleHandles)?;
        let count = stale.len();
        for handle in stale {
            let command = format!("PHF {}", handle);
            self.text_command(command.as_bytes())?;
            self.registry.release(handle);
        }
        if count > 0 {
            tracing::debug!(count, "Freed stale port handles");
        }
        Ok(count)
    }

    /// Queries port information for a handle and merges it into the
    /// registry.
    pub fn refresh_port_info(&mut self, handle: Handle) -> Result<()> {
        let short = self.short_port_info();
        let options = if short { SHORT_OPTIONS } else { LONG_OPTIONS };
        let command = format!("PHINF {}{}", handle, options);
        let reply = self.text_command(command.as_bytes())?;
        let payload = text_payload(&reply)?;
        let info = PortInfo::parse(payload, !short)?;
        self.registry.apply_port_info(handle, &info);
        Ok(())
    }

    /// Finds the allocated handle whose port label matches a port
    /// identifier.
    ///
    /// Labels compare on their first two characters, which covers both
    /// a bare connector designator and its `-a`/`-b` channel forms.
    pub fn handle_for_port(&mut self, port_id: &str) -> Result<Option<Handle>> {
        let handles = self.search_handles(HandleSearch::All)?;
        for handle in handles {
            self.refresh_port_info(handle)?;
            let matched = self
                .registry
                .get(handle)
                .map_or(false, |record| labels_match(&record.port_label, port_id));
            if matched {
                return Ok(Some(handle));
            }
        }
        Ok(None)
    }

    /// Initializes one port handle.
    pub fn initialize_handle(&mut self, handle: Handle) -> Result<()> {
        let command = format!("PINIT {}", handle);
        self.text_command(command.as_bytes())?;
        self.registry.allocate(handle).status.initialized = true;
        Ok(())
    }

    /// Enables one handle for tracking with dynamic priority, then
    /// refreshes its port information.
    pub fn enable_handle(&mut self, handle: Handle) -> Result<()> {
        let command = format!("PENA {}D", handle);
        self.text_command(command.as_bytes())?;
        self.refresh_port_info(handle)
    }

    /// Takes one handle out of tracking.
    pub fn disable_handle(&mut self, handle: Handle) -> Result<()> {
        let command = format!("PDIS {}", handle);
        self.text_command(command.as_bytes())?;
        self.refresh_port_info(handle)
    }

    /// Enables every initialized handle that is not yet tracking.
    pub fn enable_ports(&mut self) -> Result<usize> {
        let pending = self.search_handles(HandleSearch::NeedEnabling)?;
        let count = pending.len();
        for handle in pending {
            self.enable_handle(handle)?;
        }
        Ok(count)
    }

    /// Discovers and initializes every occupied port.
    ///
    /// Wireless tool definitions from the configuration are loaded
    /// first, since the device cannot discover a wireless tool it has
    /// no definition for. Discovery then repeats until the device
    /// stops reporting uninitialized handles: each pass loads wired
    /// definitions for configured ports and initializes whatever the
    /// search returned. Loading a definition can surface a new handle,
    /// which the next pass picks up.
    pub fn initialize_ports(&mut self) -> Result<()> {
        let wireless: Vec<(String, String)> = self
            .config
            .wireless_tool_images()
            .map(|(key, path)| (key.to_string(), path.to_string()))
            .collect();
        for (port_key, image_path) in &wireless {
            self.load_wireless_image(port_key, image_path)?;
        }
        let wired: Vec<(String, String)> = self
            .config
            .wired_tool_images()
            .map(|(key, path)| (key.to_string(), path.to_string()))
            .collect();
        let mut passes = 0;
        loop {
            let pending = self.search_handles(HandleSearch::NeedInitialization)?;
            if pending.is_empty() {
                break;
            }
            passes += 1;
            if passes > MAX_DISCOVERY_PASSES {
                return Err(NdiError::ProtocolViolation(
                    "handle discovery did not converge".into(),
                ));
            }
            for (port_key, image_path) in &wired {
                let Some(port_id) = wired_port_id(port_key) else {
                    tracing::warn!(key = %port_key, "Unrecognized wired port key in configuration");
                    continue;
                };
                let handle = if image_path.starts_with(DEVICE_PROFILE_VALUE) {
                    self.load_device_profile(&port_id)?
                } else {
                    self.load_wired_image(&port_id, image_path)?
                };
                if let Some(handle) = handle {
                    self.initialize_handle(handle)?;
                }
            }
            for handle in pending {
                self.refresh_port_info(handle)?;
                let initialized = self
                    .registry
                    .get(handle)
                    .map_or(false, |record| record.status.initialized);
                if !initialized {
                    self.initialize_handle(handle)?;
                }
            }
        }
        Ok(())
    }

    /// Runs the full port activation sequence and returns how many
    /// handles were enabled.
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
    /// let enabled = system.activate_ports()?;
    /// println!("tracking {} tools", enabled);
    /// # Ok::<(), ndicapi_rust::error::NdiError>(())
    /// ```
    pub fn activate_ports(&mut self) -> Result<usize> {
        self.free_stale_handles()?;
        self.initialize_ports()?;
        self.enable_ports()
    }

    /// Asks the device to load its own stored definition for the tool
    /// on a wired port.
    fn load_device_profile(&mut self, port_id: &str) -> Result<Option<Handle>> {
        let Some(handle) = self.handle_for_port(port_id)? else {
            return Ok(None);
        };
        let command = format!("TTCFG {}", handle);
        self.text_command(command.as_bytes())?;
        Ok(Some(handle))
    }

    /// Writes an image file as the definition of the tool on a wired
    /// port.
    fn load_wired_image(&mut self, port_id: &str, image_path: &str) -> Result<Option<Handle>> {
        let Some(handle) = self.handle_for_port(port_id)? else {
            return Ok(None);
        };
        let initialized = self
            .registry
            .get(handle)
            .map_or(false, |record| record.status.initialized);
        if initialized {
            return Ok(Some(handle));
        }
        let image = load_image_bytes(image_path)?;
        self.write_rom(handle, &image)?;
        Ok(Some(handle))
    }

    /// Requests a fresh wireless handle and writes an image file as
    /// its tool definition.
    ///
    /// Slots that already have a definition are skipped, keyed by the
    /// full configuration key. Systems with the abbreviated port
    /// information layout never report a label for wireless handles,
    /// so the configuration key is recorded as the label there.
    fn load_wireless_image(&mut self, port_key: &str, image_path: &str) -> Result<Option<Handle>> {
        let occupied = self
            .registry
            .iter()
            .any(|(_, record)| record.port_label == port_key);
        if occupied {
            tracing::debug!(slot = %port_key, "Wireless slot already has a tool definition");
            return Ok(None);
        }
        let image = load_image_bytes(image_path)?;
        let reply = self.text_command(b"PHRQ ********01****")?;
        let payload = text_payload(&reply)?;
        let handle = Handle(hex_field(payload, 0, 2)? as u8);
        let initialized = self
            .registry
            .get(handle)
            .map_or(false, |record| record.status.initialized);
        if initialized {
            return Ok(Some(handle));
        }
        if self.short_port_info() {
            self.registry.allocate(handle).port_label = port_key.to_string();
        }
        self.write_rom(handle, &image)?;
        Ok(Some(handle))
    }

    /// Writes a tool definition image to a handle in fixed-size
    /// chunks.
    fn write_rom(&mut self, handle: Handle, image: &[u8]) -> Result<()> {
        if image.is_empty() {
            return Err(NdiError::InvalidParameter(
                "tool definition image is empty".into(),
            ));
        }
        if image.len() > MAX_ROM_IMAGE {
            return Err(NdiError::InvalidParameter(format!(
                "tool definition image is {} bytes, the device accepts at most {}",
                image.len(),
                MAX_ROM_IMAGE
            )));
        }
        for (index, chunk) in image.chunks(ROM_CHUNK).enumerate() {
            let offset = index * ROM_CHUNK;
            let mut padded = chunk.to_vec();
            padded.resize(ROM_CHUNK, 0);
            let mut command = format!("PVWR:{}{:04X}", handle, offset);
            for byte in &padded {
                command.push_str(&format!("{:02X}", byte));
            }
            self.text_command(command.as_bytes())?;
        }
        tracing::debug!(handle = %handle, bytes = image.len(), "Tool definition written");
        Ok(())
    }
}

fn load_image_bytes(path: &str) -> Result<Vec<u8>> {
    let image = std::fs::read(path)?;
    Ok(image)
}

/// Normalizes a `Port <n>` configuration key to the two-digit port
/// identifier used on wire labels.
fn wired_port_id(port_key: &str) -> Option<String> {
    let number: u32 = port_key.strip_prefix(WIRED_KEY_PREFIX)?.trim().parse().ok()?;
    Some(format!("{:02}", number))
}

fn labels_match(label: &str, port_id: &str) -> bool {
    !label.is_empty() && label.bytes().take(2).eq(port_id.bytes().take(2))
}
