// SPDX-License-Identifier: GPL-3.0-only
use crate::error::Result;
use crate::protocols::DisplayServer;

use super::backend::{DisplayList, OutputRecord, ScreenGeometry};
use super::modes::{parse_modes, resolve, ModeSelector};

/// Enumerate all outputs of the default screen
///
/// Returns the active whole-screen geometry once, plus one record per
/// output in server order.
pub fn list_outputs<S: DisplayServer + ?Sized>(server: &S) -> Result<DisplayList> {
    let screen = server.screen_info()?;
    let geometry = match screen.current() {
        Some(geometry) => *geometry,
        None => {
            warn!(
                size_id = screen.size_id,
                sizes = screen.sizes.len(),
                "current size id outside the screen size catalog"
            );
            ScreenGeometry::default()
        }
    };

    let resources = server.screen_resources()?;
    let modes = parse_modes(&resources.modes, &resources.names);
    debug!(
        "Found {} output(s) and {} mode(s)",
        resources.outputs.len(),
        modes.len()
    );

    let mut outputs = Vec::with_capacity(resources.outputs.len());
    for output in &resources.outputs {
        let info = server.output_info(*output, resources.config_timestamp)?;

        let resolutions = info
            .modes
            .iter()
            .filter_map(|id| match resolve(&ModeSelector::by_id(*id), None, &modes) {
                Some(mode) => Some(mode.resolution()),
                None => {
                    warn!(output = %info.name, mode = id, "output lists a mode missing from the catalog");
                    None
                }
            })
            .collect();

        debug!(output = %info.name, status = ?info.connection, "Found output");

        outputs.push(OutputRecord {
            name: info.name,
            status: info.connection,
            mode_ids: info.modes,
            num_preferred: info.num_preferred,
            resolutions,
        });
    }

    Ok(DisplayList {
        geometry,
        outputs,
        modes,
    })
}
