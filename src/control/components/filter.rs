//! Digital filter bank with four build-time selectable algorithms.
//!
//! All four share a ring of the most recent `samples + 1` inputs (newest
//! first) and the last two outputs. The input ring is fed every tick even
//! while disabled; outputs are computed and written only when enabled.

use crate::bus::{NodeId, PropertyTree};
use crate::control::component::{knob, ComponentCore};
use crate::error::BuildError;
use std::collections::VecDeque;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Single-pole IIR.
    Exponential,
    /// Critically damped second-order IIR.
    DoubleExponential,
    /// Exact windowed mean, O(1) per tick.
    MovingAverage,
    /// Slew-rate limiter.
    NoiseSpike,
}

impl FilterKind {
    pub fn from_config_name(name: &str) -> Option<Self> {
        match name {
            "exponential" => Some(FilterKind::Exponential),
            "double-exponential" => Some(FilterKind::DoubleExponential),
            "moving-average" => Some(FilterKind::MovingAverage),
            "noise-spike" => Some(FilterKind::NoiseSpike),
            _ => None,
        }
    }

    pub fn config_name(&self) -> &'static str {
        match self {
            FilterKind::Exponential => "exponential",
            FilterKind::DoubleExponential => "double-exponential",
            FilterKind::MovingAverage => "moving-average",
            FilterKind::NoiseSpike => "noise-spike",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DigitalFilter {
    pub(crate) core: ComponentCore,
    kind: FilterKind,
    filter_time: f64,
    samples: usize,
    max_rate: f64,
    /// `input[0]` is the newest sample.
    input: VecDeque<f64>,
    /// `output[0]` is y_n-1, `output[1]` is y_n-2.
    output: [f64; 2],
    /// False once a tick pushed input without computing output, so the
    /// running moving-average sum no longer matches the window.
    in_step: bool,
}

impl DigitalFilter {
    pub fn build(tree: &mut PropertyTree, node: NodeId) -> Result<Self, BuildError> {
        let core = ComponentCore::bind(tree, node)?;

        let kind_name = tree
            .find_prop(node, "type")
            .map(|p| tree.get_string(p))
            .unwrap_or_default();
        let kind = FilterKind::from_config_name(&kind_name).ok_or_else(|| {
            BuildError::UnknownFilterType {
                component: core.name.clone(),
                kind: kind_name.clone(),
            }
        })?;

        let mut filter_time = knob(tree, Some(node), "filter_time", 0.0);
        if filter_time < 0.0 {
            warn!("{}: negative filter_time {}, using 0", core.name, filter_time);
            filter_time = 0.0;
        }

        let configured = knob(tree, Some(node), "samples", 1.0) as i64;
        let samples = if configured < 1 {
            warn!("{}: samples = {} is not usable, using 1", core.name, configured);
            1
        } else {
            configured as usize
        };

        let max_rate = knob(tree, Some(node), "max_rate_of_change", 0.0).abs();

        Ok(Self {
            core,
            kind,
            filter_time,
            samples,
            max_rate,
            input: VecDeque::from(vec![0.0; samples + 1]),
            output: [0.0; 2],
            in_step: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Most recent computed output.
    pub fn last_output(&self) -> f64 {
        self.output[0]
    }

    /// Mean of the `samples` entries that were newest before this tick's push.
    fn previous_window_mean(&self) -> f64 {
        self.input.iter().skip(1).take(self.samples).sum::<f64>() / self.samples as f64
    }

    pub fn update(&mut self, tree: &mut PropertyTree, dt: f64) {
        let enabled = self.core.enable.is_open(tree);

        self.input.push_front(self.core.input.read(tree));
        self.input.truncate(self.samples + 1);

        if !enabled || dt <= 0.0 {
            self.in_step = false;
            return;
        }

        if !self.in_step && self.kind == FilterKind::MovingAverage {
            self.output[0] = self.previous_window_mean();
        }
        self.in_step = true;

        let x_n = self.input[0];
        let [y_1, y_2] = self.output;
        let y_n = match self.kind {
            FilterKind::Exponential => {
                let alpha = 1.0 / ((self.filter_time / dt) + 1.0);
                alpha * x_n + (1.0 - alpha) * y_1
            }
            FilterKind::DoubleExponential => {
                let alpha = 1.0 / ((self.filter_time / dt) + 1.0);
                let beta = 1.0 - alpha;
                alpha * alpha * x_n + 2.0 * beta * y_1 - beta * beta * y_2
            }
            FilterKind::MovingAverage => {
                let oldest = self.input.back().copied().unwrap_or(0.0);
                y_1 + (x_n - oldest) / self.samples as f64
            }
            FilterKind::NoiseSpike => {
                let max_change = self.max_rate * dt;
                let delta = y_1 - x_n;
                if delta > max_change {
                    y_1 - max_change
                } else if delta < -max_change {
                    y_1 + max_change
                } else {
                    x_n
                }
            }
        };

        self.output = [y_n, y_1];
        self.core.outputs.write_all(tree, y_n);

        if self.core.debug(tree) {
            debug!("{}: input: {:.3}\toutput: {:.3}", self.core.name, x_n, y_n);
        }
    }
}
