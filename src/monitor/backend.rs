// SPDX-License-Identifier: GPL-3.0-only
use serde::Serialize;

use crate::protocols::ModeId;

use super::modes::DisplayMode;

/// Connection state of an output as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Unknown,
}

/// Size of the whole screen in pixels and millimetres
///
/// There is exactly one active geometry per screen, shared by every
/// connected output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenGeometry {
    pub width_px: u16,
    pub height_px: u16,
    pub width_mm: u16,
    pub height_mm: u16,
}

impl ScreenGeometry {
    pub fn matches(&self, width: u16, height: u16) -> bool {
        self.width_px == width && self.height_px == height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    /// Output connector name (e.g. "eDP-1", "HDMI-1")
    pub name: String,
    pub status: ConnectionStatus,
    /// Supported modes in server order
    pub mode_ids: Vec<ModeId>,
    /// The first `num_preferred` entries of `mode_ids` are preferred
    pub num_preferred: u16,
    /// `"<width>x<height>"` for every resolvable mode id, in server order
    pub resolutions: Vec<String>,
}

impl OutputRecord {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

/// Result of one enumeration pass
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayList {
    pub geometry: ScreenGeometry,
    pub outputs: Vec<OutputRecord>,
    pub modes: Vec<DisplayMode>,
}

impl DisplayList {
    /// The screen geometry as seen from `output`
    ///
    /// Connected outputs all refer to the same whole-screen geometry,
    /// others have none.
    pub fn geometry_for(&self, output: &OutputRecord) -> Option<&ScreenGeometry> {
        output.is_connected().then_some(&self.geometry)
    }

    pub fn output(&self, name: &str) -> Option<&OutputRecord> {
        self.outputs.iter().find(|output| output.name == name)
    }
}

/// Which output a per-output operation targets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputSelector {
    /// The first output the server reports
    #[default]
    First,
    Index(usize),
    Name(String),
}

impl std::fmt::Display for OutputSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputSelector::First => write!(f, "#0"),
            OutputSelector::Index(index) => write!(f, "#{}", index),
            OutputSelector::Name(name) => write!(f, "{}", name),
        }
    }
}
