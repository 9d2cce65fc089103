// SPDX-License-Identifier: GPL-3.0-only
//! X11 RandR implementation of [`DisplayServer`]
//!
//! One `X11Server` owns one connection to the X server. The connection is
//! closed when the value is dropped, so every call site releases it on all
//! exit paths.

use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::ReplyError;
use x11rb::protocol::Event;
use x11rb::protocol::randr::{self, ConnectionExt as RandrConnectionExt};
use x11rb::protocol::xproto::{
    self, AtomEnum, ChangeWindowAttributesAux, ConnectionExt as XprotoConnectionExt, EventMask,
    PropMode, Window,
};
use x11rb::rust_connection::RustConnection;

use super::{
    Atom, ConfigReply, ConfigStatus, DisplayServer, ModeId, OutputId, OutputInfo, PropertyRange,
    RawProperty, ScreenInfo, ScreenResources, ServerEvent,
};
use crate::error::{DisplayError, Result};
use crate::monitor::{ConnectionStatus, ScreenGeometry};

/// Connection to an X server with the RandR extension
pub struct X11Server {
    conn: RustConnection,
    root: Window,
}

impl X11Server {
    /// Open a connection to `display` (or `$DISPLAY` when `None`) and check
    /// that RandR is available
    pub fn connect(display: Option<&str>) -> Result<Self> {
        let (conn, screen_num) = RustConnection::connect(display)?;
        let root = conn.setup().roots[screen_num].root;

        let randr = conn
            .extension_information(randr::X11_EXTENSION_NAME)?
            .ok_or(DisplayError::ExtensionMissing)?;
        let version = conn.randr_query_version(1, 3)?.reply()?;
        debug!(
            screen = screen_num,
            event_base = randr.first_event,
            error_base = randr.first_error,
            "RandR {}.{} available",
            version.major_version,
            version.minor_version
        );

        Ok(Self { conn, root })
    }

    fn raw_fd(&self) -> RawFd {
        self.conn.stream().as_raw_fd()
    }

    fn translate(&self, event: Event) -> ServerEvent {
        match event {
            Event::RandrScreenChangeNotify(ev) => ServerEvent::ScreenChange {
                geometry: ScreenGeometry {
                    width_px: ev.width,
                    height_px: ev.height,
                    width_mm: ev.mwidth,
                    height_mm: ev.mheight,
                },
                timestamp: ev.timestamp,
            },
            Event::ConfigureNotify(ev) if ev.window == self.root => ServerEvent::Configure {
                width: ev.width,
                height: ev.height,
            },
            Event::Error(err) => {
                warn!("X error while waiting for events: {:?}", err);
                ServerEvent::Other
            }
            other => {
                trace!("ignoring event {:?}", other);
                ServerEvent::Other
            }
        }
    }
}

/// `BadName`/`BadAtom` replies mean the property does not exist
fn missing_property<T>(result: std::result::Result<T, ReplyError>) -> Result<Option<T>> {
    match result {
        Ok(reply) => Ok(Some(reply)),
        Err(ReplyError::X11Error(err))
            if matches!(
                err.error_kind,
                x11rb::protocol::ErrorKind::Name | x11rb::protocol::ErrorKind::Atom
            ) =>
        {
            debug!("property lookup failed: {:?}", err.error_kind);
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Block until `fd` is readable or `timeout` expires
///
/// Returns `false` on timeout.
fn wait_readable(fd: RawFd, timeout: Duration) -> std::io::Result<bool> {
    let mut poll_fd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX).max(1);

    let poll_result = unsafe { libc::poll(&mut poll_fd, 1, timeout_ms) };
    if poll_result < 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::Interrupted {
            return Ok(true);
        }
        return Err(err);
    }
    Ok(poll_result > 0)
}

impl DisplayServer for X11Server {
    fn screen_info(&self) -> Result<ScreenInfo> {
        let reply = self.conn.randr_get_screen_info(self.root)?.reply()?;
        let sizes = reply
            .sizes
            .iter()
            .map(|size| ScreenGeometry {
                width_px: size.width,
                height_px: size.height,
                width_mm: size.mwidth,
                height_mm: size.mheight,
            })
            .collect();

        Ok(ScreenInfo {
            sizes,
            size_id: reply.size_id,
            rotation: u16::from(reply.rotation),
            timestamp: reply.timestamp,
            config_timestamp: reply.config_timestamp,
        })
    }

    fn screen_resources(&self) -> Result<ScreenResources> {
        let reply = self
            .conn
            .randr_get_screen_resources_current(self.root)?
            .reply()?;
        trace!("screen_resources = {reply:?}");

        Ok(ScreenResources {
            outputs: reply.outputs,
            modes: reply.modes,
            names: reply.names,
            config_timestamp: reply.config_timestamp,
        })
    }

    fn output_info(&self, output: OutputId, config_timestamp: u32) -> Result<OutputInfo> {
        let reply = self
            .conn
            .randr_get_output_info(output, config_timestamp)?
            .reply()?;

        let connection = match reply.connection {
            randr::Connection::CONNECTED => ConnectionStatus::Connected,
            randr::Connection::DISCONNECTED => ConnectionStatus::Disconnected,
            _ => ConnectionStatus::Unknown,
        };
        let modes: Vec<ModeId> = reply.modes;

        Ok(OutputInfo {
            name: String::from_utf8_lossy(&reply.name).into_owned(),
            connection,
            modes,
            num_preferred: reply.num_preferred,
        })
    }

    fn select_screen_changes(&self) -> Result<()> {
        let aux = ChangeWindowAttributesAux::new().event_mask(EventMask::STRUCTURE_NOTIFY);
        self.conn.change_window_attributes(self.root, &aux)?.check()?;
        self.conn
            .randr_select_input(self.root, randr::NotifyMask::SCREEN_CHANGE)?
            .check()?;
        Ok(())
    }

    fn set_screen_config(
        &self,
        info: &ScreenInfo,
        size_id: u16,
        rotation: u16,
    ) -> Result<ConfigReply> {
        let reply = self
            .conn
            .randr_set_screen_config(
                self.root,
                x11rb::CURRENT_TIME,
                info.config_timestamp,
                size_id,
                randr::Rotation::from(rotation),
                0,
            )?
            .reply()?;

        let status = match reply.status {
            randr::SetConfig::SUCCESS => ConfigStatus::Success,
            randr::SetConfig::INVALID_CONFIG_TIME => ConfigStatus::InvalidConfigTime,
            randr::SetConfig::INVALID_TIME => ConfigStatus::InvalidTime,
            _ => ConfigStatus::Failed,
        };
        Ok(ConfigReply {
            status,
            timestamp: reply.new_timestamp,
        })
    }

    fn next_event(&self, timeout: Duration) -> Result<Option<ServerEvent>> {
        self.conn.flush()?;
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(event) = self.conn.poll_for_event()? {
                return Ok(Some(self.translate(event)));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !wait_readable(self.raw_fd(), remaining)? {
                return Ok(None);
            }
        }
    }

    fn intern_atom(&self, name: &str) -> Result<Option<Atom>> {
        let reply = self.conn.intern_atom(true, name.as_bytes())?.reply()?;
        if reply.atom == x11rb::NONE {
            Ok(None)
        } else {
            Ok(Some(reply.atom))
        }
    }

    fn output_property(
        &self,
        output: OutputId,
        property: Atom,
        long_length: u32,
    ) -> Result<Option<RawProperty>> {
        let cookie = self.conn.randr_get_output_property(
            output,
            property,
            x11rb::NONE,
            0,
            long_length,
            false,
            false,
        )?;
        let Some(reply) = missing_property(cookie.reply())? else {
            return Ok(None);
        };
        if reply.type_ == x11rb::NONE {
            return Ok(None);
        }

        Ok(Some(RawProperty {
            format: reply.format,
            data: reply.data,
        }))
    }

    fn query_output_property(
        &self,
        output: OutputId,
        property: Atom,
    ) -> Result<Option<PropertyRange>> {
        let cookie = self.conn.randr_query_output_property(output, property)?;
        Ok(missing_property(cookie.reply())?.map(|reply| PropertyRange {
            range: reply.range,
            valid_values: reply.valid_values,
        }))
    }

    fn change_output_property(&self, output: OutputId, property: Atom, value: i32) -> Result<()> {
        let data = value.to_ne_bytes();
        self.conn
            .randr_change_output_property(
                output,
                property,
                xproto::Atom::from(AtomEnum::INTEGER),
                32,
                PropMode::REPLACE,
                1,
                &data,
            )?
            .check()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "needs X11, manual"]
    fn connect_smoke_test() {
        let server = X11Server::connect(None).unwrap();
        let info = server.screen_info().unwrap();
        assert!(info.current().is_some());
    }

    #[test]
    fn wait_readable_times_out_on_idle_pipe() {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);

        let readable = wait_readable(fds[0], Duration::from_millis(10)).unwrap();
        assert!(!readable);

        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }

    #[test]
    fn wait_readable_reports_pending_data() {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let byte = [1u8];
        assert_eq!(unsafe { libc::write(fds[1], byte.as_ptr().cast(), 1) }, 1);

        let readable = wait_readable(fds[0], Duration::from_secs(1)).unwrap();
        assert!(readable);

        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }
}
