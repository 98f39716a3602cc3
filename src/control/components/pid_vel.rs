//! Velocity-form (incremental) PID.
//!
//! ```text
//! du_n = Kp * [ (ep_n - ep_n-1) + (Ts/Ti)*e_n + (Td/Ts)*(edf_n - 2*edf_n-1 + edf_n-2) ]
//! u_n  = u_n-1 + du_n
//!
//! ep  = beta*(r - y)          reference-weighted proportional error
//! e   = r - y
//! ed  = gamma*r - y
//! edf = first-order filtered ed, Tf = alpha*Td
//! ```
//!
//! `Ts` is not the tick `dt`: elapsed time accumulates until it exceeds the
//! configured minimum sample period, and only then does the law run.
//! `du` is clamped against `u_n-1` so the output never leaves
//! `[u_min, u_max]` and there is nothing to unwind.
//!
//! While disabled the output shadows whatever is on the first output
//! address, so re-enabling starts from the value the surface already has.

use crate::bus::{NodeId, PropertyTree, ReferenceSource};
use crate::control::component::{clamp_output, knob, ComponentCore};
use crate::error::BuildError;
use tracing::debug;

/// Gains and limits read from the `config` section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityPidGains {
    pub kp: f64,
    pub ti: f64,
    pub td: f64,
    pub u_min: f64,
    pub u_max: f64,
    pub beta: f64,
    pub alpha: f64,
    pub gamma: f64,
    /// Minimum sample period (`Ts` in config).
    pub desired_ts: f64,
}

impl Default for VelocityPidGains {
    fn default() -> Self {
        Self {
            kp: 0.0,
            ti: 0.0,
            td: 0.0,
            u_min: 0.0,
            u_max: 0.0,
            beta: 1.0,
            alpha: 0.1,
            gamma: 0.0,
            desired_ts: 0.00001,
        }
    }
}

impl VelocityPidGains {
    /// Read the `config` child, writing the weighting defaults back so the
    /// effective values are visible on the bus.
    pub fn read(tree: &mut PropertyTree, component: NodeId) -> Self {
        let d = Self::default();
        let config = tree.find_child(component, "config");
        let gains = Self {
            kp: knob(tree, config, "Kp", d.kp),
            ti: knob(tree, config, "Ti", d.ti),
            td: knob(tree, config, "Td", d.td),
            u_min: knob(tree, config, "u_min", d.u_min),
            u_max: knob(tree, config, "u_max", d.u_max),
            beta: knob(tree, config, "beta", d.beta),
            alpha: knob(tree, config, "alpha", d.alpha),
            gamma: knob(tree, config, "gamma", d.gamma),
            desired_ts: knob(tree, config, "Ts", d.desired_ts),
        };
        if let Ok(config) = tree.child(component, "config") {
            for (attr, value) in [("beta", gains.beta), ("alpha", gains.alpha), ("gamma", gains.gamma)] {
                if let Ok(p) = tree.prop(config, attr) {
                    if !tree.is_set(p) {
                        tree.set_f64(p, value);
                    }
                }
            }
        }
        gains
    }
}

#[derive(Debug, Clone)]
pub struct VelocityPid {
    pub(crate) core: ComponentCore,
    reference: ReferenceSource,
    gains: VelocityPidGains,
    elapsed: f64,
    ep_n_1: f64,
    edf_n_1: f64,
    edf_n_2: f64,
    u_n_1: f64,
}

impl VelocityPid {
    pub fn build(tree: &mut PropertyTree, node: NodeId) -> Result<Self, BuildError> {
        let core = ComponentCore::bind(tree, node)?;
        let reference = ReferenceSource::bind(tree, node, &core.name)?;
        let gains = VelocityPidGains::read(tree, node);
        Ok(Self {
            core,
            reference,
            gains,
            elapsed: 0.0,
            ep_n_1: 0.0,
            edf_n_1: 0.0,
            edf_n_2: 0.0,
            u_n_1: 0.0,
        })
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn gains(&self) -> &VelocityPidGains {
        &self.gains
    }

    /// Previous output `u_n-1`.
    pub fn last_output(&self) -> f64 {
        self.u_n_1
    }

    pub fn update(&mut self, tree: &mut PropertyTree, dt: f64) {
        self.elapsed += dt;
        if self.elapsed <= self.gains.desired_ts {
            return;
        }
        let ts = self.elapsed;
        self.elapsed = 0.0;

        let g = self.gains;
        let enabled = self.core.enable.is_open(tree);
        let verbose = self.core.debug(tree);

        let y_n = self.core.input.read(tree);
        let r_n = self.reference.read(tree);

        let ep_n = g.beta * (r_n - y_n);
        let e_n = r_n - y_n;
        let ed_n = g.gamma * r_n - y_n;

        let tf = g.alpha * g.td;
        let edf_n = if g.td > 0.0 && tf > 0.0 {
            let k = ts / tf;
            self.edf_n_1 / (k + 1.0) + ed_n * k / (k + 1.0)
        } else {
            ed_n
        };

        if enabled {
            let mut du_n = 0.0;
            if g.ti > 0.0 {
                du_n = g.kp
                    * ((ep_n - self.ep_n_1)
                        + (ts / g.ti) * e_n
                        + (g.td / ts) * (edf_n - 2.0 * self.edf_n_1 + self.edf_n_2));
            }

            // Anti-windup: limit the increment, not the integrated output.
            if du_n > g.u_max - self.u_n_1 {
                du_n = g.u_max - self.u_n_1;
            } else if du_n < g.u_min - self.u_n_1 {
                du_n = g.u_min - self.u_n_1;
            }

            let u_n = self.u_n_1 + du_n;
            self.core.outputs.write_all(tree, u_n);
            if verbose {
                debug!(
                    "{}: Ts={:.3} y={:.3} r={:.3} ep={:.3} e={:.3} edf={:.3} du={:.3} u={:.3}",
                    self.core.name, ts, y_n, r_n, ep_n, e_n, edf_n, du_n, u_n
                );
            }
            self.u_n_1 = u_n;
        } else {
            let shadow = clamp_output(self.core.outputs.read_first(tree), g.u_min, g.u_max);
            if verbose {
                debug!("{}: disabled, shadowing output {:.3}", self.core.name, shadow);
            }
            self.u_n_1 = shadow;
        }

        self.ep_n_1 = ep_n;
        self.edf_n_2 = self.edf_n_1;
        self.edf_n_1 = edf_n;
    }
}
