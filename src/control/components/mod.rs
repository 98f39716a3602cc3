//! Built-in control components.
//!
//! Each algorithm is its own struct with `build`, `name` and `update`;
//! `Component` in the parent module wraps them for enum dispatch.

mod filter;
mod pid;
mod pid_vel;
mod predictor;

pub use filter::{DigitalFilter, FilterKind};
pub use pid::{PidGains, PositionPid};
pub use pid_vel::{VelocityPid, VelocityPidGains};
pub use predictor::Predictor;
