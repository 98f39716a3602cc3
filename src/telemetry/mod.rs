//! Throttled telemetry: rate gates, frames, sinks and tick profiling.

pub mod profile;
pub mod rate_gate;
pub mod sink;

pub use profile::{TickProfile, SLOW_UPDATE};
pub use rate_gate::{GatePair, RateGate};
pub use sink::{ChannelSink, JsonLinesSink, NullSink, Telemetry, TelemetryFrame, TelemetrySink};
