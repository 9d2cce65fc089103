// SPDX-License-Identifier: GPL-3.0-only
//! Display server protocols
//!
//! Every component talks to the display server through [`DisplayServer`].
//! The production implementation speaks X11 RandR over x11rb; tests use a
//! headless in-memory server.

pub mod x11;

#[cfg(test)]
pub mod headless;

use std::time::Duration;

use x11rb::protocol::randr::ModeInfo;

use crate::error::Result;
use crate::monitor::{ConnectionStatus, ScreenGeometry};

pub type OutputId = u32;
pub type ModeId = u32;
pub type Atom = u32;

/// Rotation bit for "no rotation, no reflection"
pub const ROTATE_0: u16 = 1;

/// Snapshot of the legacy whole-screen configuration
///
/// Size indices are only meaningful together with the `config_timestamp`
/// of the snapshot they were read from.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenInfo {
    pub sizes: Vec<ScreenGeometry>,
    pub size_id: u16,
    pub rotation: u16,
    pub timestamp: u32,
    pub config_timestamp: u32,
}

impl ScreenInfo {
    /// The entry of the size catalog that is currently active
    pub fn current(&self) -> Option<&ScreenGeometry> {
        self.sizes.get(usize::from(self.size_id))
    }
}

/// Outputs and modes as advertised by the server
#[derive(Debug, Clone, Default)]
pub struct ScreenResources {
    pub outputs: Vec<OutputId>,
    pub modes: Vec<ModeInfo>,
    /// Mode names, concatenated in the order of `modes`
    pub names: Vec<u8>,
    pub config_timestamp: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputInfo {
    pub name: String,
    pub connection: ConnectionStatus,
    pub modes: Vec<ModeId>,
    pub num_preferred: u16,
}

/// Outcome of a screen configuration submit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStatus {
    Success,
    InvalidConfigTime,
    InvalidTime,
    Failed,
}

/// Reply to a screen configuration submit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigReply {
    pub status: ConfigStatus,
    /// Server time of the change, echoed by the matching notification
    pub timestamp: u32,
}

/// Notifications relevant to a configuration change
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// RandR screen change notification carrying the new geometry
    ScreenChange {
        geometry: ScreenGeometry,
        timestamp: u32,
    },
    /// Structure notification for the root window
    Configure { width: u16, height: u16 },
    Other,
}

/// Raw contents of an output property
#[derive(Debug, Clone, PartialEq)]
pub struct RawProperty {
    pub format: u8,
    pub data: Vec<u8>,
}

impl RawProperty {
    /// First element decoded as a signed 32-bit integer
    pub fn first_i32(&self) -> Option<i32> {
        if self.format != 32 {
            return None;
        }
        let bytes = self.data.get(..4)?;
        Some(i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Declared legal values of an output property
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRange {
    pub range: bool,
    pub valid_values: Vec<i32>,
}

/// Requests the core needs from a display server
pub trait DisplayServer {
    /// Read the legacy screen configuration of the root window
    fn screen_info(&self) -> Result<ScreenInfo>;

    /// Read outputs and modes without forcing a hardware probe
    fn screen_resources(&self) -> Result<ScreenResources>;

    fn output_info(&self, output: OutputId, config_timestamp: u32) -> Result<OutputInfo>;

    /// Subscribe to structure and RandR screen change notifications
    fn select_screen_changes(&self) -> Result<()>;

    /// Submit a whole-screen configuration change
    fn set_screen_config(&self, info: &ScreenInfo, size_id: u16, rotation: u16)
    -> Result<ConfigReply>;

    /// Wait at most `timeout` for the next notification
    fn next_event(&self, timeout: Duration) -> Result<Option<ServerEvent>>;

    /// Look up an existing atom, `None` if the server never interned it
    fn intern_atom(&self, name: &str) -> Result<Option<Atom>>;

    /// Read up to `long_length` 32-bit units, `None` if the property is absent
    fn output_property(
        &self,
        output: OutputId,
        property: Atom,
        long_length: u32,
    ) -> Result<Option<RawProperty>>;

    fn query_output_property(&self, output: OutputId, property: Atom)
    -> Result<Option<PropertyRange>>;

    /// Replace the property with a single 32-bit integer and wait until the
    /// server has processed the request
    fn change_output_property(&self, output: OutputId, property: Atom, value: i32) -> Result<()>;
}
