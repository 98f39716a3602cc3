//! Channel-backed telemetry for observing what the flight core emits

use crossbeam_channel::{unbounded, Receiver};
use flightcore::telemetry::ChannelSink;
use flightcore::{Telemetry, TelemetryFrame};

/// Receivers for the remote link and logging sinks of a `Telemetry`.
pub struct Captured {
    pub remote_link: Receiver<TelemetryFrame>,
    pub logging: Receiver<TelemetryFrame>,
}

impl Captured {
    pub fn remote_frames(&self) -> Vec<TelemetryFrame> {
        self.remote_link.try_iter().collect()
    }

    pub fn logging_frames(&self) -> Vec<TelemetryFrame> {
        self.logging.try_iter().collect()
    }

    /// Drain logging and keep only event messages.
    pub fn events(&self) -> Vec<String> {
        self.logging
            .try_iter()
            .filter_map(|frame| match frame {
                TelemetryFrame::Event { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }
}

/// Telemetry whose sinks forward into unbounded channels.
pub fn channel_telemetry() -> (Telemetry, Captured) {
    let (rtx, rrx) = unbounded();
    let (ltx, lrx) = unbounded();
    let telemetry = Telemetry::new(
        Box::new(ChannelSink::new(rtx)),
        Box::new(ChannelSink::new(ltx)),
    );
    (
        telemetry,
        Captured {
            remote_link: rrx,
            logging: lrx,
        },
    )
}

/// Count frames of the given kind.
pub fn count_kind(frames: &[TelemetryFrame], kind: &str) -> usize {
    frames.iter().filter(|f| f.kind() == kind).count()
}
