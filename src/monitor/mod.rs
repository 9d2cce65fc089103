mod backend;
mod enumeration;
mod modes;

pub use backend::{ConnectionStatus, DisplayList, OutputSelector, ScreenGeometry};
pub use enumeration::list_outputs;
pub use modes::{fetch_modes, resolve_for_output, DisplayMode, ModeSelector};
