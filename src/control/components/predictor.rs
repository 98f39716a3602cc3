//! Lead filter: extrapolates the input forward by `seconds`.
//!
//! ```text
//! current = (input - last) / dt
//! average = (1 - dt)*average + dt*current      (dt < 1)
//!         = current                            (otherwise)
//! output  = input + (1 - g)*average*seconds + g*current*seconds
//! ```
//!
//! `last` tracks the input every tick, enabled or not, so activation never
//! sees a rate spike equal to the full input magnitude.

use crate::bus::{NodeId, PropertyTree};
use crate::control::component::{knob, ComponentCore};
use crate::error::BuildError;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Predictor {
    pub(crate) core: ComponentCore,
    seconds: f64,
    filter_gain: f64,
    last_value: Option<f64>,
    average: f64,
}

impl Predictor {
    pub fn build(tree: &mut PropertyTree, node: NodeId) -> Result<Self, BuildError> {
        let core = ComponentCore::bind(tree, node)?;
        let seconds = knob(tree, Some(node), "seconds", 0.0);
        let mut filter_gain = knob(tree, Some(node), "filter_gain", 0.0);
        if !(0.0..=1.0).contains(&filter_gain) {
            warn!(
                "{}: filter_gain {} outside [0, 1], clamped",
                core.name, filter_gain
            );
            filter_gain = filter_gain.clamp(0.0, 1.0);
        }
        Ok(Self {
            core,
            seconds,
            filter_gain,
            last_value: None,
            average: 0.0,
        })
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Smoothed rate of change of the input (units per second).
    pub fn average_rate(&self) -> f64 {
        self.average
    }

    pub fn update(&mut self, tree: &mut PropertyTree, dt: f64) {
        let enabled = self.core.enable.is_open(tree);
        let ivalue = self.core.input.read(tree);
        let last = *self.last_value.get_or_insert(ivalue);

        if enabled && dt > 0.0 {
            let current = (ivalue - last) / dt;
            self.average = if dt < 1.0 {
                (1.0 - dt) * self.average + current * dt
            } else {
                current
            };

            let g = self.filter_gain;
            let output =
                ivalue + (1.0 - g) * (self.average * self.seconds) + g * (current * self.seconds);
            self.core.outputs.write_all(tree, output);

            if self.core.debug(tree) {
                debug!(
                    "{}: input={:.3} rate={:.3} avg={:.3} output={:.3}",
                    self.core.name, ivalue, current, self.average, output
                );
            }
        }

        self.last_value = Some(ivalue);
    }
}
