//! Execution-time statistics for the per-tick stages.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Size of the rolling window for recent update times
const RECENT_WINDOW_SIZE: usize = 100;

/// Updates slower than this are reported as events.
pub const SLOW_UPDATE: Duration = Duration::from_millis(100);

/// Timing statistics for one stage (e.g. "filter", "control").
///
/// Tracks count, totals, min/max and a rolling window for jitter.
#[derive(Debug, Clone)]
pub struct TickProfile {
    name: String,
    /// Number of completed updates
    pub count: u64,
    /// Sum of all update durations
    pub total: Duration,
    /// Most recent update duration
    pub last: Duration,
    /// Minimum update duration observed
    pub min: Duration,
    /// Maximum update duration observed
    pub max: Duration,
    /// Rolling window of recent update times for jitter calculation
    pub recent: VecDeque<Duration>,
    first_start: Option<Instant>,
    started: Option<Instant>,
}

impl TickProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
            total: Duration::ZERO,
            last: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
            recent: VecDeque::with_capacity(RECENT_WINDOW_SIZE),
            first_start: None,
            started: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&mut self) {
        let now = Instant::now();
        self.first_start.get_or_insert(now);
        self.started = Some(now);
    }

    /// Close the interval opened by `start`. Returns the elapsed time, or
    /// `None` if `start` was never called.
    pub fn stop(&mut self) -> Option<Duration> {
        let elapsed = self.started.take()?.elapsed();
        self.record(elapsed);
        Some(elapsed)
    }

    /// Record one update duration. Returns true if it was slow.
    pub fn record(&mut self, elapsed: Duration) -> bool {
        self.count += 1;
        self.total += elapsed;
        self.last = elapsed;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);

        self.recent.push_back(elapsed);
        if self.recent.len() > RECENT_WINDOW_SIZE {
            self.recent.pop_front();
        }
        elapsed > SLOW_UPDATE
    }

    pub fn avg(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total.div_f64(self.count as f64)
        }
    }

    /// Max minus min over the recent window.
    pub fn jitter(&self) -> Duration {
        let min = self.recent.iter().min().copied().unwrap_or_default();
        let max = self.recent.iter().max().copied().unwrap_or_default();
        max.saturating_sub(min)
    }

    /// Average update rate since the first `start`, once a second has passed.
    pub fn rate_hz(&self) -> f64 {
        let Some(first) = self.first_start else {
            return 0.0;
        };
        let wall = first.elapsed().as_secs_f64();
        if wall > 1.0 {
            self.count as f64 / wall
        } else {
            0.0
        }
    }

    /// One-line summary for shutdown logging.
    pub fn summary(&self) -> String {
        let min = if self.count == 0 { Duration::ZERO } else { self.min };
        format!(
            "{} avg: {:.4} num: {} tot: {:.4} (range: {:.4}-{:.4}) hz: {:.3}",
            self.name,
            self.avg().as_secs_f64(),
            self.count,
            self.total.as_secs_f64(),
            min.as_secs_f64(),
            self.max.as_secs_f64(),
            self.rate_hz()
        )
    }

    /// Event message for a slow update.
    pub fn slow_message(&self) -> String {
        format!("slow update: int = {:.3}", self.last.as_secs_f64())
    }

    pub fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.name));
    }
}
