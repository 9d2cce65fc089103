// SPDX-License-Identifier: GPL-3.0-only
//! Headless display server for tests
//!
//! Simulates a RandR capable server in memory: a legacy screen size
//! catalog, outputs with modes, bounded integer properties and a queue of
//! notifications. Switches allow rejecting submits, never confirming
//! them, or leaving a notification from an earlier change in the queue.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use x11rb::protocol::randr::ModeInfo;

use super::{
    Atom, ConfigReply, ConfigStatus, DisplayServer, ModeId, OutputId, OutputInfo, PropertyRange,
    RawProperty, ScreenInfo, ScreenResources, ServerEvent, ROTATE_0,
};
use crate::error::Result;
use crate::monitor::{ConnectionStatus, ScreenGeometry};

#[derive(Debug)]
struct BoundedProperty {
    value: i32,
    /// Stored contents overriding `value` until the next write
    raw: Option<RawProperty>,
    valid_values: Vec<i32>,
    range: bool,
}

#[derive(Debug)]
struct State {
    sizes: Vec<ScreenGeometry>,
    size_id: u16,
    rotation: u16,
    timestamp: u32,
    config_timestamp: u32,
    outputs: Vec<(OutputId, OutputInfo)>,
    modes: Vec<ModeInfo>,
    names: Vec<u8>,
    atoms: HashMap<String, Atom>,
    properties: HashMap<(OutputId, Atom), BoundedProperty>,
    events: VecDeque<ServerEvent>,
    subscribed: bool,
    submit_status: ConfigStatus,
    confirm: bool,
    submits: usize,
    writes: Vec<i32>,
}

pub struct HeadlessServer {
    state: RefCell<State>,
}

impl HeadlessServer {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State {
                sizes: Vec::new(),
                size_id: 0,
                rotation: ROTATE_0,
                timestamp: 1,
                config_timestamp: 1,
                outputs: Vec::new(),
                modes: Vec::new(),
                names: Vec::new(),
                atoms: HashMap::new(),
                properties: HashMap::new(),
                events: VecDeque::new(),
                subscribed: false,
                submit_status: ConfigStatus::Success,
                confirm: true,
                submits: 0,
                writes: Vec::new(),
            }),
        }
    }

    /// Screen size catalog; the first entry is active and mm sizes assume 96 dpi
    pub fn with_sizes(self, sizes: &[(u16, u16)]) -> Self {
        self.state.borrow_mut().sizes = sizes
            .iter()
            .map(|&(width, height)| ScreenGeometry {
                width_px: width,
                height_px: height,
                width_mm: px_to_mm(width),
                height_mm: px_to_mm(height),
            })
            .collect();
        self
    }

    pub fn with_mode(self, id: ModeId, name: &str, width: u16, height: u16) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state.modes.push(ModeInfo {
                id,
                width,
                height,
                dot_clock: u32::from(width) * u32::from(height) * 60,
                htotal: width,
                vtotal: height,
                name_len: name.len() as u16,
                ..Default::default()
            });
            state.names.extend_from_slice(name.as_bytes());
        }
        self
    }

    pub fn with_output(self, name: &str, connection: ConnectionStatus, modes: &[ModeId]) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let id = 0x40 + state.outputs.len() as OutputId;
            state.outputs.push((
                id,
                OutputInfo {
                    name: name.to_string(),
                    connection,
                    modes: modes.to_vec(),
                    num_preferred: u16::from(!modes.is_empty()),
                },
            ));
        }
        self
    }

    fn insert_property(&self, output_index: usize, property: &str, prop: BoundedProperty) {
        let mut state = self.state.borrow_mut();
        let output = state.outputs[output_index].0;
        let next_atom = 100 + state.atoms.len() as Atom;
        let atom = *state.atoms.entry(property.to_string()).or_insert(next_atom);
        state.properties.insert((output, atom), prop);
    }

    /// Attach a ranged integer property to the output at `output_index`
    pub fn with_property(
        self,
        output_index: usize,
        property: &str,
        value: i32,
        min: i32,
        max: i32,
    ) -> Self {
        self.with_declared_values(output_index, property, value, true, &[min, max])
    }

    /// Attach an integer property with arbitrary declared legal values
    pub fn with_declared_values(
        self,
        output_index: usize,
        property: &str,
        value: i32,
        range: bool,
        valid_values: &[i32],
    ) -> Self {
        self.insert_property(
            output_index,
            property,
            BoundedProperty {
                value,
                raw: None,
                valid_values: valid_values.to_vec(),
                range,
            },
        );
        self
    }

    /// Attach a ranged property whose stored contents are `format` / `data`
    pub fn with_raw_property(
        self,
        output_index: usize,
        property: &str,
        format: u8,
        data: &[u8],
        min: i32,
        max: i32,
    ) -> Self {
        self.insert_property(
            output_index,
            property,
            BoundedProperty {
                value: 0,
                raw: Some(RawProperty {
                    format,
                    data: data.to_vec(),
                }),
                valid_values: vec![min, max],
                range: true,
            },
        );
        self
    }

    /// Intern an atom without attaching it to any output
    pub fn with_atom(self, name: &str) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let next_atom = 100 + state.atoms.len() as Atom;
            state.atoms.entry(name.to_string()).or_insert(next_atom);
        }
        self
    }

    pub fn rejecting(self, status: ConfigStatus) -> Self {
        self.state.borrow_mut().submit_status = status;
        self
    }

    /// Accept submits but never send the screen change notification
    pub fn silent(self) -> Self {
        self.state.borrow_mut().confirm = false;
        self
    }

    /// Queue the notification of the change that produced the current
    /// geometry, as if it was still unread when a client subscribes
    pub fn with_pending_screen_change(self) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let event = ServerEvent::ScreenChange {
                geometry: state.sizes[usize::from(state.size_id)],
                timestamp: state.timestamp,
            };
            state.events.push_back(event);
        }
        self
    }

    pub fn current_geometry(&self) -> ScreenGeometry {
        let state = self.state.borrow();
        state.sizes[usize::from(state.size_id)]
    }

    pub fn submits(&self) -> usize {
        self.state.borrow().submits
    }

    pub fn writes(&self) -> Vec<i32> {
        self.state.borrow().writes.clone()
    }
}

fn px_to_mm(px: u16) -> u16 {
    (f32::from(px) * 25.4 / 96.0).round() as u16
}

impl DisplayServer for HeadlessServer {
    fn screen_info(&self) -> Result<ScreenInfo> {
        let state = self.state.borrow();
        Ok(ScreenInfo {
            sizes: state.sizes.clone(),
            size_id: state.size_id,
            rotation: state.rotation,
            timestamp: state.timestamp,
            config_timestamp: state.config_timestamp,
        })
    }

    fn screen_resources(&self) -> Result<ScreenResources> {
        let state = self.state.borrow();
        Ok(ScreenResources {
            outputs: state.outputs.iter().map(|(id, _)| *id).collect(),
            modes: state.modes.clone(),
            names: state.names.clone(),
            config_timestamp: state.config_timestamp,
        })
    }

    fn output_info(&self, output: OutputId, _config_timestamp: u32) -> Result<OutputInfo> {
        let state = self.state.borrow();
        let info = state
            .outputs
            .iter()
            .find(|(id, _)| *id == output)
            .map(|(_, info)| info.clone())
            .expect("unknown output id");
        Ok(info)
    }

    fn select_screen_changes(&self) -> Result<()> {
        self.state.borrow_mut().subscribed = true;
        Ok(())
    }

    fn set_screen_config(
        &self,
        info: &ScreenInfo,
        size_id: u16,
        rotation: u16,
    ) -> Result<ConfigReply> {
        let mut state = self.state.borrow_mut();
        state.submits += 1;

        let rejected = if state.submit_status != ConfigStatus::Success {
            Some(state.submit_status)
        } else if info.config_timestamp != state.config_timestamp {
            Some(ConfigStatus::InvalidConfigTime)
        } else {
            None
        };
        if let Some(status) = rejected {
            return Ok(ConfigReply {
                status,
                timestamp: state.timestamp,
            });
        }

        state.size_id = size_id;
        state.rotation = rotation;
        state.timestamp += 1;
        let timestamp = state.timestamp;

        let geometry = state.sizes[usize::from(size_id)];
        if state.confirm && state.subscribed {
            state.events.push_back(ServerEvent::Other);
            state.events.push_back(ServerEvent::Configure {
                width: geometry.width_px,
                height: geometry.height_px,
            });
            state.events.push_back(ServerEvent::ScreenChange {
                geometry,
                timestamp,
            });
        }
        Ok(ConfigReply {
            status: ConfigStatus::Success,
            timestamp,
        })
    }

    fn next_event(&self, _timeout: Duration) -> Result<Option<ServerEvent>> {
        Ok(self.state.borrow_mut().events.pop_front())
    }

    fn intern_atom(&self, name: &str) -> Result<Option<Atom>> {
        Ok(self.state.borrow().atoms.get(name).copied())
    }

    fn output_property(
        &self,
        output: OutputId,
        property: Atom,
        long_length: u32,
    ) -> Result<Option<RawProperty>> {
        let state = self.state.borrow();
        Ok(state.properties.get(&(output, property)).map(|prop| {
            let mut raw = prop.raw.clone().unwrap_or_else(|| RawProperty {
                format: 32,
                data: prop.value.to_ne_bytes().to_vec(),
            });
            raw.data.truncate(long_length as usize * 4);
            raw
        }))
    }

    fn query_output_property(
        &self,
        output: OutputId,
        property: Atom,
    ) -> Result<Option<PropertyRange>> {
        let state = self.state.borrow();
        Ok(state
            .properties
            .get(&(output, property))
            .map(|prop| PropertyRange {
                range: prop.range,
                valid_values: prop.valid_values.clone(),
            }))
    }

    fn change_output_property(&self, output: OutputId, property: Atom, value: i32) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.writes.push(value);
        if let Some(prop) = state.properties.get_mut(&(output, property)) {
            prop.value = value;
            prop.raw = None;
        }
        Ok(())
    }
}
