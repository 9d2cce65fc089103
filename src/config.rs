// SPDX-License-Identifier: GPL-3.0-only
//! Configuration file handling
//!
//! The configuration lives in `$XDG_CONFIG_HOME/randr-display-control/config.kdl`.
//! Every key is optional:
//!
//! ```kdl
//! display ":0"
//! confirm-timeout-ms 5000
//! backlight-output "eDP-1"
//! backlight-property "Backlight"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use kdl::{KdlDocument, KdlNode, KdlValue};

use crate::brightness::BACKLIGHT_PROPERTY;
use crate::error::{DisplayError, Result};
use crate::monitor::OutputSelector;
use crate::resolution::DEFAULT_CONFIRM_TIMEOUT;

pub const APPID: &str = "randr-display-control";
pub const CONFIG_FILE: &str = "config.kdl";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// X display to connect to, `$DISPLAY` when unset
    pub display: Option<String>,
    /// Bound on the wait for the screen change notification
    pub confirm_timeout: Duration,
    pub backlight_output: OutputSelector,
    pub backlight_property: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display: None,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            backlight_output: OutputSelector::First,
            backlight_property: BACKLIGHT_PROPERTY.to_string(),
        }
    }
}

fn invalid(node: &KdlNode, expected: &str) -> DisplayError {
    DisplayError::Config(format!("{} expects {}", node.name().value(), expected))
}

/// The first positional argument of `node`
fn argument(node: &KdlNode) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .find(|entry| entry.name().is_none())
        .map(|entry| entry.value())
}

fn string_arg(node: &KdlNode) -> Result<String> {
    argument(node)
        .and_then(|value| value.as_string())
        .map(str::to_string)
        .ok_or_else(|| invalid(node, "a string"))
}

impl Config {
    /// Location of the configuration file
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APPID).join(CONFIG_FILE))
    }

    /// Load the configuration file, falling back to defaults when it does
    /// not exist
    pub fn load() -> Result<Self> {
        let Some(path) = Self::path() else {
            debug!("no config directory, using defaults");
            return Ok(Self::default());
        };

        match std::fs::read_to_string(&path) {
            Ok(text) => {
                info!("Loading config from {}", path.display());
                Self::parse(&text)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let doc: KdlDocument = text
            .parse()
            .map_err(|err: kdl::KdlError| DisplayError::Config(err.to_string()))?;
        let mut config = Self::default();

        for node in doc.nodes() {
            match node.name().value() {
                "display" => config.display = Some(string_arg(node)?),
                "confirm-timeout-ms" => {
                    let millis = argument(node)
                        .and_then(|value| value.as_integer())
                        .and_then(|millis| u64::try_from(millis).ok())
                        .filter(|millis| *millis > 0)
                        .ok_or_else(|| invalid(node, "a positive integer"))?;
                    config.confirm_timeout = Duration::from_millis(millis);
                }
                "backlight-output" => {
                    let value = argument(node).ok_or_else(|| invalid(node, "an index or a name"))?;
                    config.backlight_output = if let Some(index) = value.as_integer() {
                        let index =
                            usize::try_from(index).map_err(|_| invalid(node, "an index or a name"))?;
                        OutputSelector::Index(index)
                    } else if let Some(name) = value.as_string() {
                        OutputSelector::Name(name.to_string())
                    } else {
                        return Err(invalid(node, "an index or a name"));
                    };
                }
                "backlight-property" => config.backlight_property = string_arg(node)?,
                other => warn!("unknown config node {:?}, ignoring", other),
            }
        }

        Ok(config)
    }
}
