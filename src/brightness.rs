// SPDX-License-Identifier: GPL-3.0-only
//! Backlight access through a bounded output property
//!
//! The backlight is exposed by the server as a ranged 32-bit integer
//! property on an output. Reads return the raw value with its declared
//! range; writes clamp into that range instead of rejecting.

use serde::Serialize;

use crate::error::{DisplayError, Result};
use crate::monitor::OutputSelector;
use crate::protocols::{Atom, DisplayServer, OutputId};

/// Property name used by the kernel backlight drivers
pub const BACKLIGHT_PROPERTY: &str = "Backlight";

/// Upper bound on the raw transfer; the property holds a single element
const MAX_PROPERTY_UNITS: u32 = 100;

/// Current backlight value and its legal range
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BacklightLevel {
    pub value: i32,
    pub min: f64,
    pub max: f64,
}

/// Clamp a requested level into `[min, max]` and truncate toward zero
pub fn clamp_level(requested: f64, min: f64, max: f64) -> i32 {
    let (low, high) = if min <= max { (min, max) } else { (max, min) };
    if requested.is_nan() {
        return low as i32;
    }
    requested.clamp(low, high).trunc() as i32
}

/// A bounded integer property on one output
pub struct Backlight<'a, S: DisplayServer + ?Sized> {
    server: &'a S,
    output: OutputId,
    output_name: String,
    property: String,
    atom: Atom,
}

impl<'a, S: DisplayServer + ?Sized> Backlight<'a, S> {
    /// Locate `property` on the output picked by `selector`
    ///
    /// # Errors
    ///
    /// * `OutputNotFound` if the selector matches no output
    /// * `PropertyNotFound` if the server has never interned the property name
    pub fn open(server: &'a S, selector: &OutputSelector, property: &str) -> Result<Self> {
        let resources = server.screen_resources()?;

        let by_index = |index: usize| -> Result<(OutputId, String)> {
            let output = *resources
                .outputs
                .get(index)
                .ok_or_else(|| DisplayError::OutputNotFound(selector.to_string()))?;
            let info = server.output_info(output, resources.config_timestamp)?;
            Ok((output, info.name))
        };

        let (output, output_name) = match selector {
            OutputSelector::First => by_index(0)?,
            OutputSelector::Index(index) => by_index(*index)?,
            OutputSelector::Name(name) => {
                let mut found = None;
                for output in &resources.outputs {
                    let info = server.output_info(*output, resources.config_timestamp)?;
                    if info.name == *name {
                        found = Some((*output, info.name));
                        break;
                    }
                }
                found.ok_or_else(|| DisplayError::OutputNotFound(name.clone()))?
            }
        };

        let atom = server
            .intern_atom(property)?
            .ok_or_else(|| DisplayError::PropertyNotFound {
                property: property.to_string(),
                output: output_name.clone(),
            })?;

        debug!(output = %output_name, property, atom, "Resolved bounded property");

        Ok(Self {
            server,
            output,
            output_name,
            property: property.to_string(),
            atom,
        })
    }

    fn not_found(&self) -> DisplayError {
        DisplayError::PropertyNotFound {
            property: self.property.clone(),
            output: self.output_name.clone(),
        }
    }

    /// Declared legal range as `(min, max)`
    pub fn range(&self) -> Result<(f64, f64)> {
        let range = self
            .server
            .query_output_property(self.output, self.atom)?
            .ok_or_else(|| self.not_found())?;

        match range.valid_values.as_slice() {
            [min, max, ..] if range.range => Ok((f64::from(*min), f64::from(*max))),
            _ => {
                warn!(output = %self.output_name, property = %self.property, "property is not a range");
                Err(self.not_found())
            }
        }
    }

    /// Read the current value together with its range
    pub fn read(&self) -> Result<BacklightLevel> {
        let raw = self
            .server
            .output_property(self.output, self.atom, MAX_PROPERTY_UNITS)?
            .ok_or_else(|| self.not_found())?;
        let value = raw.first_i32().ok_or_else(|| {
            warn!(
                output = %self.output_name,
                format = raw.format,
                len = raw.data.len(),
                "property does not hold a 32-bit integer"
            );
            self.not_found()
        })?;
        let (min, max) = self.range()?;

        Ok(BacklightLevel { value, min, max })
    }

    /// Store `requested` clamped into the declared range
    ///
    /// The property has to be readable as a level first, so a property
    /// with unexpected contents is never overwritten. Returns the level
    /// that was written.
    pub fn write(&self, requested: f64) -> Result<BacklightLevel> {
        let BacklightLevel {
            value: previous,
            min,
            max,
        } = self.read()?;
        let value = clamp_level(requested, min, max);

        if f64::from(value) != requested.trunc() {
            debug!(
                output = %self.output_name,
                requested = %requested,
                clamped = value,
                "Clamping backlight into range"
            );
        }

        self.server.change_output_property(self.output, self.atom, value)?;
        info!(output = %self.output_name, previous, value, "Backlight updated");

        Ok(BacklightLevel { value, min, max })
    }
}

/// Read the backlight of the selected output
pub fn read_backlight<S: DisplayServer + ?Sized>(
    server: &S,
    selector: &OutputSelector,
    property: &str,
) -> Result<BacklightLevel> {
    Backlight::open(server, selector, property)?.read()
}

/// Write a clamped backlight level to the selected output
pub fn write_backlight<S: DisplayServer + ?Sized>(
    server: &S,
    selector: &OutputSelector,
    property: &str,
    requested: f64,
) -> Result<BacklightLevel> {
    Backlight::open(server, selector, property)?.write(requested)
}
