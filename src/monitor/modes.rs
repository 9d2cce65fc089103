// SPDX-License-Identifier: GPL-3.0-only
//! Mode catalog and mode resolution
//!
//! The server advertises its modes as fixed-size timing records plus one
//! buffer holding all mode names back to back. [`parse_modes`] turns that
//! into [`DisplayMode`] values, and [`resolve`] picks one of them by id,
//! catalog position or name (optionally closest to a refresh rate).

use x11rb::protocol::randr::{ModeFlag, ModeInfo};

use crate::error::Result;
use crate::protocols::{DisplayServer, ModeId};

use super::backend::OutputRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMode {
    pub id: ModeId,
    pub name: String,
    pub width: u16,
    pub height: u16,
    pub dot_clock: u32,
    pub htotal: u16,
    pub vtotal: u16,
    pub flags: ModeFlag,
}

impl DisplayMode {
    /// Vertical refresh rate in Hz, 0 when the timings are degenerate
    pub fn refresh_hz(&self) -> f64 {
        let mut vtotal = u32::from(self.vtotal);

        // doublescan doubles the number of lines
        if self.flags.contains(ModeFlag::DOUBLE_SCAN) {
            vtotal *= 2;
        }
        // interlace reports the field rate
        if self.flags.contains(ModeFlag::INTERLACE) {
            vtotal /= 2;
        }

        if self.htotal == 0 || vtotal == 0 {
            return 0.0;
        }
        f64::from(self.dot_clock) / (f64::from(self.htotal) * f64::from(vtotal))
    }

    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Split the advertised mode records and their concatenated names
pub fn parse_modes(infos: &[ModeInfo], names: &[u8]) -> Vec<DisplayMode> {
    let mut offset = 0usize;

    infos
        .iter()
        .map(|info| {
            let len = usize::from(info.name_len);
            let start = offset.min(names.len());
            let end = (offset + len).min(names.len());
            offset += len;

            if end - start < len {
                warn!(mode = info.id, "mode name truncated in server reply");
            }

            DisplayMode {
                id: info.id,
                name: String::from_utf8_lossy(&names[start..end]).into_owned(),
                width: info.width,
                height: info.height,
                dot_clock: info.dot_clock,
                htotal: info.htotal,
                vtotal: info.vtotal,
                flags: info.mode_flags,
            }
        })
        .collect()
}

/// Read the current mode catalog from the server
pub fn fetch_modes<S: DisplayServer + ?Sized>(server: &S) -> Result<Vec<DisplayMode>> {
    let resources = server.screen_resources()?;
    Ok(parse_modes(&resources.modes, &resources.names))
}

/// Which mode to pick
///
/// Only the fields that are set take part in matching.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModeSelector {
    pub id: Option<ModeId>,
    pub name: Option<String>,
    /// Position in the candidate list
    pub index: Option<usize>,
    /// Restrict candidates to an output's preferred modes
    pub preferred: bool,
}

impl ModeSelector {
    pub fn by_id(id: ModeId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn by_index(index: usize) -> Self {
        Self {
            index: Some(index),
            ..Default::default()
        }
    }

    pub fn preferred() -> Self {
        Self {
            preferred: true,
            ..Default::default()
        }
    }

    fn has_key(&self) -> bool {
        self.id.is_some() || self.name.is_some() || self.index.is_some()
    }
}

/// Find the mode matching `selector` in one scan of `candidates`
///
/// An id or index match wins outright. Name matches are ranked by distance
/// to `refresh`; equal distances keep the earliest mode.
fn resolve_in<'a>(
    selector: &ModeSelector,
    refresh: Option<f64>,
    candidates: impl IntoIterator<Item = &'a DisplayMode>,
) -> Option<&'a DisplayMode> {
    let refresh = refresh.filter(|target| *target != 0.0);
    let mut best: Option<(&DisplayMode, f64)> = None;

    for (position, mode) in candidates.into_iter().enumerate() {
        if selector.id == Some(mode.id) || selector.index == Some(position) {
            return Some(mode);
        }

        if selector.name.as_deref() == Some(mode.name.as_str()) {
            let distance = refresh.map_or(0.0, |target| (mode.refresh_hz() - target).abs());
            if best.is_none_or(|(_, best_distance)| distance < best_distance) {
                best = Some((mode, distance));
            }
        }
    }

    best.map(|(mode, _)| mode)
}

pub fn resolve<'a>(
    selector: &ModeSelector,
    refresh: Option<f64>,
    catalog: &'a [DisplayMode],
) -> Option<&'a DisplayMode> {
    resolve_in(selector, refresh, catalog)
}

/// Like [`resolve`], but only among the modes `output` supports, in the
/// output's order
///
/// A `preferred` selector narrows the candidates to the output's preferred
/// modes and, without any other key, picks the first of them.
pub fn resolve_for_output<'a>(
    selector: &ModeSelector,
    refresh: Option<f64>,
    catalog: &'a [DisplayMode],
    output: &OutputRecord,
) -> Option<&'a DisplayMode> {
    let limit = if selector.preferred {
        usize::from(output.num_preferred)
    } else {
        output.mode_ids.len()
    };

    let candidates: Vec<&DisplayMode> = output
        .mode_ids
        .iter()
        .take(limit)
        .filter_map(|id| resolve(&ModeSelector::by_id(*id), None, catalog))
        .collect();

    if selector.preferred && !selector.has_key() {
        return candidates.first().copied();
    }
    resolve_in(selector, refresh, candidates)
}
