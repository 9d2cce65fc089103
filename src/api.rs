// SPDX-License-Identifier: GPL-3.0-only
//! Host call boundary
//!
//! Each call opens its own connection to the display server, runs the
//! blocking core on tokio's blocking pool and converts the result into the
//! records handed to the host.

use serde::Serialize;

use crate::brightness::{self, BacklightLevel};
use crate::config::Config;
use crate::error::{DisplayError, Result};
use crate::monitor::{self, ConnectionStatus, DisplayList, DisplayMode, ModeSelector};
use crate::protocols::x11::X11Server;
use crate::protocols::DisplayServer;
use crate::resolution;

/// Active resolution as reported for a connected output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionEntry {
    pub width: u16,
    pub height: u16,
    pub mwidth: u16,
    pub mheight: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayEntry {
    pub name: String,
    pub status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionEntry>,
    pub available_resolutions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeEntry {
    pub id: u32,
    pub name: String,
    pub width: u16,
    pub height: u16,
    pub refresh: f64,
}

impl From<&DisplayMode> for ModeEntry {
    fn from(mode: &DisplayMode) -> Self {
        Self {
            id: mode.id,
            name: mode.name.clone(),
            width: mode.width,
            height: mode.height,
            refresh: mode.refresh_hz(),
        }
    }
}

/// Flatten the enumeration into one entry per output
pub fn display_entries(list: &DisplayList) -> Vec<DisplayEntry> {
    list.outputs
        .iter()
        .map(|output| DisplayEntry {
            name: output.name.clone(),
            status: output.status,
            resolution: list.geometry_for(output).map(|geometry| ResolutionEntry {
                width: geometry.width_px,
                height: geometry.height_px,
                mwidth: geometry.width_mm,
                mheight: geometry.height_mm,
            }),
            available_resolutions: output.resolutions.clone(),
        })
        .collect()
}

/// Resolve a mode among the modes `output` supports
pub fn find_output_mode<S: DisplayServer + ?Sized>(
    server: &S,
    output: &str,
    selector: &ModeSelector,
    refresh: Option<f64>,
) -> Result<ModeEntry> {
    let list = monitor::list_outputs(server)?;
    let record = list
        .output(output)
        .ok_or_else(|| DisplayError::OutputNotFound(output.to_string()))?;

    monitor::resolve_for_output(selector, refresh, &list.modes, record)
        .map(ModeEntry::from)
        .ok_or(DisplayError::ModeNotFound)
}

/// Switch the screen resolution, host integers are range checked first
pub fn set_resolution_on<S: DisplayServer + ?Sized>(
    server: &S,
    config: &Config,
    width: i64,
    height: i64,
) -> Result<()> {
    let unsupported = || DisplayError::UnsupportedResolution {
        width: u32::try_from(width).unwrap_or(0),
        height: u32::try_from(height).unwrap_or(0),
    };
    let w = u16::try_from(width).map_err(|_| unsupported())?;
    let h = u16::try_from(height).map_err(|_| unsupported())?;

    resolution::apply_resolution(server, w, h, config.confirm_timeout)?;
    Ok(())
}

/// Open a connection and run `f` on tokio's blocking pool
async fn with_server<T, F>(config: &Config, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&X11Server, &Config) -> Result<T> + Send + 'static,
{
    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        let server = X11Server::connect(config.display.as_deref())?;
        f(&server, &config)
    })
    .await
    .map_err(|e| DisplayError::TaskJoin(e.to_string()))?
}

pub async fn get_displays(config: &Config) -> Result<Vec<DisplayEntry>> {
    with_server(config, |server, _| {
        monitor::list_outputs(server).map(|list| display_entries(&list))
    })
    .await
}

pub async fn get_modes(config: &Config) -> Result<Vec<ModeEntry>> {
    with_server(config, |server, _| {
        let modes = monitor::fetch_modes(server)?;
        Ok(modes.iter().map(ModeEntry::from).collect())
    })
    .await
}

pub async fn find_mode(
    config: &Config,
    output: String,
    selector: ModeSelector,
    refresh: Option<f64>,
) -> Result<ModeEntry> {
    with_server(config, move |server, _| {
        find_output_mode(server, &output, &selector, refresh)
    })
    .await
}

pub async fn get_brightness(config: &Config) -> Result<BacklightLevel> {
    with_server(config, |server, config| {
        brightness::read_backlight(server, &config.backlight_output, &config.backlight_property)
    })
    .await
}

/// Returns `false` when the level could not be written
pub async fn set_brightness(config: &Config, value: f64) -> bool {
    let result = with_server(config, move |server, config| {
        brightness::write_backlight(
            server,
            &config.backlight_output,
            &config.backlight_property,
            value,
        )
    })
    .await;

    match result {
        Ok(_) => true,
        Err(e) => {
            error!("Failed to set brightness: {}", e);
            false
        }
    }
}

/// Returns `false` when the resolution was not applied
pub async fn set_screen_resolution(config: &Config, width: i64, height: i64) -> bool {
    let result = with_server(config, move |server, config| {
        set_resolution_on(server, config, width, height)
    })
    .await;

    match result {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to set screen resolution: {}", e);
            false
        }
    }
}
