// SPDX-License-Identifier: GPL-3.0-only
//! Error types for the display control core
//!
//! Every failure is returned to the caller as a typed value. Nothing in the
//! core terminates the process.

use std::time::Duration;

use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError};

use crate::protocols::ConfigStatus;

/// Main error type
#[derive(Error, Debug)]
pub enum DisplayError {
    /// The display server could not be reached
    #[error("Cannot open display: {0}")]
    Connection(#[from] ConnectError),

    /// The server does not speak the resize-and-rotate extension
    #[error("Display server does not support the RandR extension")]
    ExtensionMissing,

    /// A request failed on an open connection
    #[error("X protocol error: {0}")]
    Protocol(#[from] ReplyError),

    /// Requested size is not in the screen size catalog
    #[error("{width}x{height} resolution not available")]
    UnsupportedResolution { width: u32, height: u32 },

    /// The bounded property is missing on the target output
    #[error("Property {property} not found on output {output}")]
    PropertyNotFound { property: String, output: String },

    /// No output matches the requested selector
    #[error("Output {0} not found")]
    OutputNotFound(String),

    /// No mode matches the requested selector
    #[error("No matching mode")]
    ModeNotFound,

    /// The server refused the configuration submit
    #[error("Screen configuration rejected: {0:?}")]
    ConfigRejected(ConfigStatus),

    /// The server never confirmed the configuration change
    #[error("No screen change notification within {0:?}")]
    Timeout(Duration),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Task join error
    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl From<ConnectionError> for DisplayError {
    fn from(err: ConnectionError) -> Self {
        DisplayError::Protocol(ReplyError::from(err))
    }
}

/// Result type alias for DisplayError
pub type Result<T> = std::result::Result<T, DisplayError>;
