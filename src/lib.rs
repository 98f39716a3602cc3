//! # flightcore: fixed-rate flight-control core
//!
//! The control-law pipeline and navigation fusion layer of a small UAV
//! autopilot. Both run once per scheduler tick against a shared, addressed
//! state bus and never talk to each other directly.
//!
//! ## Architecture
//!
//! - **Bus**: arena-backed property tree; stages resolve their addresses to
//!   `PropId` handles once at build time
//! - **Fusion**: drives pluggable navigation backends and publishes the fused
//!   state plus wind, pitot scale, AGL and Euler rates
//! - **Control**: an ordered chain of PID, predictor and filter stages built
//!   from configuration, preceded by master-switch/mode handling
//! - **Telemetry**: rate gates decide when snapshots go to the remote link
//!   and logging sinks
//!
//! ## Example
//!
//! ```ignore
//! use flightcore::{bus::PropertyTree, config, runtime::FlightCore, telemetry::Telemetry};
//!
//! let mut tree = PropertyTree::new();
//! config::load_file(&mut tree, config::CONFIG_ROOT, "aircraft.toml")?;
//! let mut core = FlightCore::new(tree, Telemetry::null())?;
//! loop {
//!     // sensor drivers write /sensors/... here
//!     core.tick(0.02);
//! }
//! ```

pub mod bus;
pub mod config;
pub mod control;
pub mod error;
pub mod fusion;
pub mod replay;
pub mod runtime;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use bus::{NodeId, PropId, PropertyTree};
pub use config::DriverSettings;
pub use control::{Component, ComponentModule, ControlPipeline, ControlTask, FlightModes};
pub use error::{BuildError, FlightError, PathError, Result, ResultExt};
pub use fusion::{BackendRegistry, FusionOrchestrator, NavBackend};
pub use replay::ReplayReader;
pub use runtime::FlightCore;
pub use telemetry::{RateGate, Telemetry, TelemetryFrame, TelemetrySink};
pub use types::Value;
