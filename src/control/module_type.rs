//! Autopilot module names accepted in `component` sections.

use serde::{Deserialize, Serialize};

/// Control component variants that can be instantiated from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentModule {
    /// Incremental (velocity-form) PID with sub-sampling.
    #[serde(rename = "pid_vel_component")]
    VelocityPid,
    /// Positional (ISA-form) PID with integrator correction.
    #[serde(rename = "pid_component")]
    Pid,
    /// Lead filter extrapolating the input forward in time.
    #[serde(rename = "predict_simple")]
    Predictor,
    /// Digital filter bank.
    #[serde(rename = "filter")]
    Filter,
}

impl ComponentModule {
    /// Name used in the `module` attribute.
    pub fn config_name(&self) -> &'static str {
        match self {
            ComponentModule::VelocityPid => "pid_vel_component",
            ComponentModule::Pid => "pid_component",
            ComponentModule::Predictor => "predict_simple",
            ComponentModule::Filter => "filter",
        }
    }

    pub fn from_config_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|m| m.config_name() == name)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ComponentModule::VelocityPid => "Velocity PID",
            ComponentModule::Pid => "Position PID",
            ComponentModule::Predictor => "Predictor",
            ComponentModule::Filter => "Digital Filter",
        }
    }

    /// Get all available modules.
    pub fn all() -> &'static [ComponentModule] {
        &[
            ComponentModule::VelocityPid,
            ComponentModule::Pid,
            ComponentModule::Predictor,
            ComponentModule::Filter,
        ]
    }

    /// True for the variants that take a `reference` section.
    pub fn uses_reference(&self) -> bool {
        matches!(self, ComponentModule::VelocityPid | ComponentModule::Pid)
    }
}

impl std::fmt::Display for ComponentModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.config_name())
    }
}
