// SPDX-License-Identifier: GPL-3.0-only
//! Whole-screen resolution changes
//!
//! A change is only reported as done once the server has confirmed it with
//! a RandR screen change notification that is not older than the submit
//! and carries the requested size. The server keeps a single global screen
//! configuration, so changes from this process are serialized.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use crate::error::{DisplayError, Result};
use crate::monitor::ScreenGeometry;
use crate::protocols::{ConfigStatus, DisplayServer, ServerEvent, ROTATE_0};

/// Default bound on the confirmation wait
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

/// Held for the whole duration of a configuration change
static APPLY_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Server timestamps wrap, so order them by their signed distance
fn not_before(timestamp: u32, reference: u32) -> bool {
    timestamp.wrapping_sub(reference) as i32 >= 0
}

/// Tracks the screen geometry from the notification stream
#[derive(Debug)]
struct ScreenTracker {
    geometry: ScreenGeometry,
    target: (u16, u16),
    submitted: u32,
    confirmed: bool,
}

impl ScreenTracker {
    fn new(geometry: ScreenGeometry, target: (u16, u16), submitted: u32) -> Self {
        Self {
            geometry,
            target,
            submitted,
            confirmed: false,
        }
    }

    /// Update the tracked geometry, returns `true` once the change is confirmed
    fn update(&mut self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::ScreenChange {
                geometry,
                timestamp,
            } => {
                debug!(
                    width = geometry.width_px,
                    height = geometry.height_px,
                    timestamp,
                    "Received screen change notification"
                );
                self.geometry = *geometry;
                let (width, height) = self.target;
                if not_before(*timestamp, self.submitted) && geometry.matches(width, height) {
                    self.confirmed = true;
                } else {
                    debug!(
                        submitted = self.submitted,
                        "Ignoring stale screen change notification"
                    );
                }
            }
            ServerEvent::Configure { width, height } => {
                trace!(width, height, "Received root configure notification");
                self.geometry.width_px = *width;
                self.geometry.height_px = *height;
            }
            ServerEvent::Other => {}
        }
        self.confirmed
    }
}

/// Switch the screen to `width` x `height`
///
/// The size has to be one of the whole-screen sizes the server currently
/// offers. Blocks until the server confirms the change or `timeout`
/// expires, and returns the geometry the server reported.
pub fn apply_resolution<S: DisplayServer + ?Sized>(
    server: &S,
    width: u16,
    height: u16,
    timeout: Duration,
) -> Result<ScreenGeometry> {
    let _guard = APPLY_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

    server.select_screen_changes()?;

    let info = server.screen_info()?;
    debug!(
        timestamp = info.timestamp,
        config_timestamp = info.config_timestamp,
        sizes = info.sizes.len(),
        "Read screen size catalog"
    );
    let Some(size_id) = info.sizes.iter().position(|size| size.matches(width, height)) else {
        warn!("{}x{} resolution not available", width, height);
        return Err(DisplayError::UnsupportedResolution {
            width: u32::from(width),
            height: u32::from(height),
        });
    };
    let size_id = size_id as u16;

    let current = info.current().copied().unwrap_or_default();
    if size_id == info.size_id && info.rotation == ROTATE_0 {
        info!("{}x{} is already active", width, height);
        return Ok(current);
    }

    let reply = server.set_screen_config(&info, size_id, ROTATE_0)?;
    if reply.status != ConfigStatus::Success {
        error!(status = ?reply.status, "Screen configuration rejected");
        return Err(DisplayError::ConfigRejected(reply.status));
    }

    let mut tracker = ScreenTracker::new(current, (width, height), reply.timestamp);
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(DisplayError::Timeout(timeout));
        }

        match server.next_event(remaining)? {
            Some(event) => {
                if tracker.update(&event) {
                    break;
                }
            }
            None => {
                warn!("No screen change notification within {:?}", timeout);
                return Err(DisplayError::Timeout(timeout));
            }
        }
    }

    info!(
        width = tracker.geometry.width_px,
        height = tracker.geometry.height_px,
        "Screen resolution changed"
    );
    Ok(tracker.geometry)
}
