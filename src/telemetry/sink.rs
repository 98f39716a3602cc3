//! Downstream telemetry consumers.
//!
//! The flight core only decides *when* something is emitted. What a sink
//! does with a frame (radio link, log file, test channel) is its own
//! business; `send` never fails back into the tick loop.

use chrono::{DateTime, Utc};
use crossbeam_channel::{Sender, TrySendError};
use serde::Serialize;
use std::io::Write;
use tracing::{info, warn};

/// A snapshot handed to a sink when a rate gate fires.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryFrame {
    /// Control task state: mode, locks and targets.
    Autopilot {
        timestamp: f64,
        master_switch: bool,
        mode: String,
        locks: serde_json::Value,
        targets: serde_json::Value,
    },
    /// One navigation backend's output node.
    Filter {
        index: usize,
        estimate: serde_json::Value,
    },
    /// Human-readable event log entry.
    Event {
        time: DateTime<Utc>,
        source: String,
        message: String,
    },
    /// Configuration dump taken at build time.
    Config {
        name: String,
        body: serde_json::Value,
    },
}

impl TelemetryFrame {
    pub fn event(source: impl Into<String>, message: impl Into<String>) -> Self {
        TelemetryFrame::Event {
            time: Utc::now(),
            source: source.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryFrame::Autopilot { .. } => "autopilot",
            TelemetryFrame::Filter { .. } => "filter",
            TelemetryFrame::Event { .. } => "event",
            TelemetryFrame::Config { .. } => "config",
        }
    }
}

/// A downstream consumer of telemetry frames.
pub trait TelemetrySink: Send {
    fn send(&mut self, frame: &TelemetryFrame);

    fn flush(&mut self) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn send(&mut self, _frame: &TelemetryFrame) {}
}

/// Forwards frames over a crossbeam channel without blocking the tick.
///
/// Frames are dropped (and counted) when the channel is full.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<TelemetryFrame>,
    dropped: u64,
}

impl ChannelSink {
    pub fn new(tx: Sender<TelemetryFrame>) -> Self {
        Self { tx, dropped: 0 }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl TelemetrySink for ChannelSink {
    fn send(&mut self, frame: &TelemetryFrame) {
        match self.tx.try_send(frame.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
            }
        }
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    errors: u64,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, errors: 0 }
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> TelemetrySink for JsonLinesSink<W> {
    fn send(&mut self, frame: &TelemetryFrame) {
        let result = serde_json::to_writer(&mut self.writer, frame)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"));
        if let Err(e) = result {
            // Only the first failure is worth a log line.
            if self.errors == 0 {
                warn!("telemetry write failed: {}", e);
            }
            self.errors += 1;
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!("telemetry flush failed: {}", e);
        }
    }
}

/// The two consumers every rate gate pair serves.
pub struct Telemetry {
    pub remote_link: Box<dyn TelemetrySink>,
    pub logging: Box<dyn TelemetrySink>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::null()
    }
}

impl Telemetry {
    pub fn new(remote_link: Box<dyn TelemetrySink>, logging: Box<dyn TelemetrySink>) -> Self {
        Self {
            remote_link,
            logging,
        }
    }

    pub fn null() -> Self {
        Self::new(Box::new(NullSink), Box::new(NullSink))
    }

    /// Record an event: traced immediately and written to the logging sink.
    pub fn event(&mut self, source: &str, message: &str) {
        info!(target: "flightcore::events", "{}: {}", source, message);
        self.logging.send(&TelemetryFrame::event(source, message));
    }

    pub fn flush(&mut self) {
        self.remote_link.flush();
        self.logging.flush();
    }
}
