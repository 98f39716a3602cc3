//! Control-law pipeline and the task that drives it.
//!
//! - `components`: the four numeric stage types
//! - `component`: enum dispatch and shared binding
//! - `pipeline`: ordered build/update/reinit
//! - `modes`: master switch and lock table
//! - `task`: one control tick including telemetry gates

pub mod component;
pub mod components;
pub mod modes;
pub mod module_type;
pub mod pipeline;
pub mod task;

pub use component::{Component, ComponentCore};
pub use modes::{lock_table, FlightModes};
pub use module_type::ComponentModule;
pub use pipeline::{ControlPipeline, AUTOPILOT_CONFIG};
pub use task::{ControlTask, AUTOPILOT_SKIP};
