//! Navigation fusion: backend dispatch plus derived estimates.

pub mod backend;
pub mod derived;
pub mod lowpass;
pub mod orchestrator;

pub use backend::{BackendFactory, BackendRegistry, MirrorBackend, NavBackend, NullBackend};
pub use derived::{euler_rates, AirData, EulerRates, GroundReference, WindEstimate, WindEstimator};
pub use lowpass::LowPassFilter;
pub use orchestrator::{sensor_dt, FusionOrchestrator, TrackSource, FILTERS_CONFIG, FILTER_SKIP};
