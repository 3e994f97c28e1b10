//! Tool record registry
//!
//! The device assigns every tracked tool a single-byte handle. The
//! registry keeps one record slot per possible handle and carries
//! everything the session has learned about each: identity fields
//! from port information queries, decoded status flags, the port
//! label used to match configuration entries, and the most recent
//! pose.

use crate::protocol::types::{
    Handle, HandleStatus, PortInfo, Pose, PoseFlag, ToolUpdate, BAD_FLOAT, MAX_NEGATIVE,
};
use crate::transform::{Quaternion, Vector3};

/// Number of handle slots a device can assign.
pub const HANDLE_CAPACITY: usize = 256;

/// Channel value that marks the second tool on a shared connector.
const SECOND_CHANNEL: &str = "01";

/// Everything known about one handle.
#[derive(Debug, Clone, Default)]
pub struct ToolRecord {
    /// Tool type field from port information
    pub tool_type: String,
    /// Manufacturer identifier
    pub manufacturer: String,
    /// Tool revision
    pub revision: String,
    /// Serial number
    pub serial_number: String,
    /// Part number
    pub part_number: String,
    /// Port label used to match configuration entries
    pub port_label: String,
    /// Connector channel
    pub channel: String,
    /// Decoded status flags
    pub status: HandleStatus,
    /// Most recent pose
    pub pose: Pose,
}

/// Registry of tool records indexed by handle.
#[derive(Debug, Clone)]
pub struct HandleRegistry {
    slots: Vec<Option<ToolRecord>>,
}

impl Default for HandleRegistry {
    fn default() -> Self {
        HandleRegistry {
            slots: (0..HANDLE_CAPACITY).map(|_| None).collect(),
        }
    }
}

impl HandleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        HandleRegistry::default()
    }

    /// Returns the record for a handle, if one is allocated.
    pub fn get(&self, handle: Handle) -> Option<&ToolRecord> {
        self.slots[handle.index()].as_ref()
    }

    /// Returns a mutable record for a handle, if one is allocated.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut ToolRecord> {
        self.slots[handle.index()].as_mut()
    }

    /// Returns the record for a handle, allocating a fresh one first
    /// if the slot was empty.
    pub fn allocate(&mut self, handle: Handle) -> &mut ToolRecord {
        self.slots[handle.index()].get_or_insert_with(ToolRecord::default)
    }

    /// Releases a handle, clearing the whole slot.
    pub fn release(&mut self, handle: Handle) {
        self.slots[handle.index()] = None;
    }

    /// Iterates over every allocated record.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &ToolRecord)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref().map(|record| (Handle(index as u8), record))
        })
    }

    /// Number of allocated records.
    pub fn allocated_count(&self) -> usize {
        self.iter().count()
    }

    /// Number of records currently enabled for tracking.
    pub fn enabled_count(&self) -> usize {
        self.iter().filter(|(_, record)| record.status.enabled).count()
    }

    /// Clears port bindings before the device is reinitialized.
    ///
    /// Identity fields and poses survive; labels and the
    /// initialized/enabled flags do not, because initialization makes
    /// the device forget them too.
    pub fn clear_bindings(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(record) = slot {
                record.port_label.clear();
                record.channel.clear();
                record.status.initialized = false;
                record.status.enabled = false;
            }
        }
    }

    /// Merges a port information reply into a handle's record.
    ///
    /// When the reply names a connector, the record's port label
    /// becomes the connector designator. A tool on the second channel
    /// of a shared connector takes a `-b` suffix and renames every
    /// sibling on the same connector to the `-a` form.
    pub fn apply_port_info(&mut self, handle: Handle, info: &PortInfo) {
        {
            let record = self.allocate(handle);
            record.tool_type = info.tool_type.clone();
            record.manufacturer = info.manufacturer.clone();
            record.revision = info.revision.clone();
            record.serial_number = info.serial_number.clone();
            record.part_number = info.part_number.clone();
            record.status.apply_port_bits(info.status_bits);
            if let Some(connector) = &info.connector {
                record.port_label = connector.clone();
                record.channel = info.channel.clone().unwrap_or_default();
                if info.channel.as_deref() == Some(SECOND_CHANNEL) {
                    record.port_label.push_str("-b");
                }
            }
        }
        if info.channel.as_deref() == Some(SECOND_CHANNEL) {
            if let Some(connector) = info.connector.as_deref().filter(|c| !c.is_empty()) {
                let label_b = format!("{}-b", connector);
                for (index, slot) in self.slots.iter_mut().enumerate() {
                    if index == handle.index() {
                        continue;
                    }
                    let Some(record) = slot else { continue };
                    if record.port_label != label_b && record.port_label.starts_with(connector) {
                        record.port_label = format!("{}-a", connector);
                    }
                }
            }
        }
    }

    /// Commits one decoded tracking record.
    pub fn ingest(&mut self, update: &ToolUpdate) {
        let record = self.allocate(update.handle);
        record.pose.flag = update.flag;
        record.pose.rotation = update.rotation;
        record.pose.translation = update.translation;
        record.pose.error = update.error;
        if let Some(bits) = update.status_bits {
            record.status.apply_tracking_bits(bits);
        }
        if let Some(frame) = update.frame_number {
            record.pose.frame_number = frame;
        }
    }

    /// Marks a handle's pose as unusable.
    pub fn mark_missing(&mut self, handle: Handle) {
        let record = self.allocate(handle);
        record.pose.flag = PoseFlag::Missing;
        record.pose.set_invalid();
    }

    /// Re-expresses every enabled pose relative to the reference tool.
    ///
    /// Does nothing when no reference is set. When the reference pose
    /// itself is unusable, every other enabled handle is flagged
    /// missing with sentinel pose fields; its fit error is left alone.
    pub fn apply_reference(&mut self, reference: Option<Handle>) {
        let Some(ref_handle) = reference else { return };
        let inverse = self.slots[ref_handle.index()]
            .as_ref()
            .map(|record| record.pose)
            .filter(|pose| pose.translation.x > MAX_NEGATIVE)
            .map(|pose| pose.transform().inverse());
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if index == ref_handle.index() {
                continue;
            }
            let Some(record) = slot else { continue };
            if !record.status.enabled {
                continue;
            }
            match inverse {
                Some(inverse) => {
                    let rebased = record.pose.transform().then(inverse);
                    record.pose.rotation = rebased.rotation;
                    record.pose.translation = rebased.translation;
                }
                None => {
                    record.pose.rotation =
                        Quaternion::new(BAD_FLOAT, BAD_FLOAT, BAD_FLOAT, BAD_FLOAT);
                    record.pose.translation = Vector3::new(BAD_FLOAT, BAD_FLOAT, BAD_FLOAT);
                    record.pose.flag = PoseFlag::Missing;
                }
            }
        }
    }
}
