//! Position-form (ISA) PID.
//!
//! Computed every tick. The derivative acts on the measured input rather
//! than on the error, so a setpoint step produces no derivative kick.
//! Saturation is handled by subtracting the clamped excess back out of the
//! integrator. Disabling forces the integrator to zero; unlike the velocity
//! form this variant does not shadow the output.

use crate::bus::{NodeId, PropertyTree, ReferenceSource};
use crate::control::component::{clamp_output, knob, ComponentCore};
use crate::error::BuildError;
use tracing::debug;

/// Integral gain is zero for `Ti` at or below this.
const MIN_TI: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PidGains {
    pub kp: f64,
    pub ti: f64,
    pub td: f64,
    pub u_min: f64,
    pub u_max: f64,
}

impl PidGains {
    pub fn read(tree: &PropertyTree, component: NodeId) -> Self {
        let config = tree.find_child(component, "config");
        Self {
            kp: knob(tree, config, "Kp", 0.0),
            ti: knob(tree, config, "Ti", 0.0),
            td: knob(tree, config, "Td", 0.0),
            u_min: knob(tree, config, "u_min", 0.0),
            u_max: knob(tree, config, "u_max", 0.0),
        }
    }

    pub fn ki(&self) -> f64 {
        if self.ti > MIN_TI {
            self.kp / self.ti
        } else {
            0.0
        }
    }

    pub fn kd(&self) -> f64 {
        self.kp * self.td
    }
}

#[derive(Debug, Clone)]
pub struct PositionPid {
    pub(crate) core: ComponentCore,
    reference: ReferenceSource,
    gains: PidGains,
    iterm: f64,
    /// Seeded from the first input so start-up does not kick.
    y_n_1: Option<f64>,
}

impl PositionPid {
    pub fn build(tree: &mut PropertyTree, node: NodeId) -> Result<Self, BuildError> {
        let core = ComponentCore::bind(tree, node)?;
        let reference = ReferenceSource::bind(tree, node, &core.name)?;
        let gains = PidGains::read(tree, node);
        Ok(Self {
            core,
            reference,
            gains,
            iterm: 0.0,
            y_n_1: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn gains(&self) -> &PidGains {
        &self.gains
    }

    pub fn iterm(&self) -> f64 {
        self.iterm
    }

    pub fn update(&mut self, tree: &mut PropertyTree, dt: f64) {
        let g = self.gains;
        let enabled = self.core.enable.is_open(tree);

        let y_n = self.core.input.read(tree);
        let r_n = self.reference.read(tree);
        let error = r_n - y_n;

        let pterm = clamp_output(g.kp * error, g.u_min, g.u_max);

        self.iterm += g.ki() * error * dt;

        let dy = y_n - self.y_n_1.unwrap_or(y_n);
        self.y_n_1 = Some(y_n);
        let dterm = if dt > 0.0 { g.kd() * -dy / dt } else { 0.0 };

        let mut output = pterm + self.iterm + dterm;
        if output < g.u_min {
            self.iterm += g.u_min - output;
            output = g.u_min;
        }
        if output > g.u_max {
            self.iterm -= output - g.u_max;
            output = g.u_max;
        }

        if self.core.debug(tree) {
            debug!(
                "{}: input={:.3} ref={:.3} error={:.3} p={:.3} i={:.3} d={:.3} out={:.3}",
                self.core.name, y_n, r_n, error, pterm, self.iterm, dterm, output
            );
        }

        if enabled {
            self.core.outputs.write_all(tree, output);
        } else {
            self.iterm = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "/config/autopilot/component";

    fn setup(tree: &mut PropertyTree, kp: f64, ti: f64, td: f64) -> PositionPid {
        tree.set_at(&format!("{}/enable", BASE), "prop", "/autopilot/locks/roll")
            .unwrap();
        tree.set_at(&format!("{}/enable", BASE), "value", "aileron")
            .unwrap();
        tree.set_at(&format!("{}/input", BASE), "prop", "/orientation/roll_deg")
            .unwrap();
        tree.set_at(&format!("{}/reference", BASE), "prop", "/autopilot/targets/roll_deg")
            .unwrap();
        tree.set_at(&format!("{}/output", BASE), "prop", "/controls/aileron")
            .unwrap();
        let config = format!("{}/config", BASE);
        tree.set_at(&config, "Kp", kp).unwrap();
        tree.set_at(&config, "Ti", ti).unwrap();
        tree.set_at(&config, "Td", td).unwrap();
        tree.set_at(&config, "u_min", -1.0).unwrap();
        tree.set_at(&config, "u_max", 1.0).unwrap();
        tree.set_at("/autopilot/locks", "roll", "aileron").unwrap();

        let node = tree.find_node(BASE).unwrap();
        PositionPid::build(tree, node).unwrap()
    }

    fn aileron(tree: &PropertyTree) -> f64 {
        tree.get_f64_at("/controls", "aileron")
    }

    #[test]
    fn test_ki_guard() {
        let g = PidGains {
            kp: 2.0,
            ti: 0.00005,
            ..Default::default()
        };
        assert_eq!(g.ki(), 0.0);
        let g = PidGains { ti: 4.0, ..g };
        assert_eq!(g.ki(), 0.5);
    }

    #[test]
    fn test_setpoint_step_has_no_derivative_kick() {
        let mut tree = PropertyTree::new();
        let mut pid = setup(&mut tree, 0.01, 0.0, 5.0);
        tree.set_at("/orientation", "roll_deg", 2.0).unwrap();
        pid.update(&mut tree, 0.02);

        tree.set_at("/autopilot/targets", "roll_deg", 30.0).unwrap();
        pid.update(&mut tree, 0.02);
        // pure P: 0.01 * (30 - 2); the 5 s derivative contributes nothing
        assert!((aileron(&tree) - 0.28).abs() < 1e-12);
    }

    #[test]
    fn test_derivative_opposes_input_motion() {
        let mut tree = PropertyTree::new();
        let mut pid = setup(&mut tree, 0.01, 0.0, 1.0);
        pid.update(&mut tree, 0.1);
        tree.set_at("/orientation", "roll_deg", 1.0).unwrap();
        pid.update(&mut tree, 0.1);
        // p = -0.01, d = 0.01 * 1.0 * -(1/0.1) = -0.1
        assert!((aileron(&tree) - (-0.11)).abs() < 1e-12);
    }

    #[test]
    fn test_saturation_corrects_integrator() {
        let mut tree = PropertyTree::new();
        let mut pid = setup(&mut tree, 0.5, 1.0, 0.0);
        tree.set_at("/autopilot/targets", "roll_deg", 10.0).unwrap();
        for _ in 0..100 {
            pid.update(&mut tree, 0.1);
        }
        assert_eq!(aileron(&tree), 1.0);
        // pterm is pre-clamped to 1.0, so the integrator is held at zero
        assert!(pid.iterm().abs() < 1e-12);

        tree.set_at("/autopilot/targets", "roll_deg", -10.0).unwrap();
        pid.update(&mut tree, 0.1);
        assert_eq!(aileron(&tree), -1.0);
    }

    #[test]
    fn test_disable_zeroes_integrator_without_writing() {
        let mut tree = PropertyTree::new();
        let mut pid = setup(&mut tree, 0.01, 1.0, 0.0);
        tree.set_at("/autopilot/targets", "roll_deg", 5.0).unwrap();
        for _ in 0..10 {
            pid.update(&mut tree, 0.1);
        }
        assert!(pid.iterm() > 0.0);

        tree.set_at("/autopilot/locks", "roll", "").unwrap();
        tree.set_at("/controls", "aileron", 0.77).unwrap();
        pid.update(&mut tree, 0.1);
        assert_eq!(pid.iterm(), 0.0);
        assert_eq!(aileron(&tree), 0.77);
    }

    #[test]
    fn test_zero_dt_is_finite() {
        let mut tree = PropertyTree::new();
        let mut pid = setup(&mut tree, 0.1, 1.0, 1.0);
        pid.update(&mut tree, 0.0);
        tree.set_at("/orientation", "roll_deg", 3.0).unwrap();
        pid.update(&mut tree, 0.0);
        assert!(aileron(&tree).is_finite());
    }
}
