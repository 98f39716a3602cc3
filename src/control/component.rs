//! Control component abstraction.
//!
//! `Component` is a closed enum with one case per algorithm, each carrying
//! its own state struct. The pipeline calls `update` through a single match
//! so the hot path has no dynamic dispatch and adding a variant is checked
//! for exhaustiveness.
//!
//! `ComponentCore` holds the bindings every variant shares: name, enable
//! gate, input, outputs and the live `debug` flag.

use crate::bus::{bind_input, EnableGate, NodeId, OutputSet, PropId, PropRef, PropertyTree};
use crate::control::components::{DigitalFilter, PositionPid, Predictor, VelocityPid};
use crate::control::module_type::ComponentModule;
use crate::error::BuildError;

/// Clamp without panicking on inverted bounds (`f64::clamp` asserts).
#[inline]
pub fn clamp_output(value: f64, min: f64, max: f64) -> f64 {
    let mut v = value;
    if v < min {
        v = min;
    }
    if v > max {
        v = max;
    }
    v
}

/// Numeric knob of a config node; `default` when absent.
pub fn knob(tree: &PropertyTree, node: Option<NodeId>, attr: &str, default: f64) -> f64 {
    match node.and_then(|n| tree.find_prop(n, attr)) {
        Some(p) if tree.is_set(p) => tree.get_f64(p),
        _ => default,
    }
}

/// Bindings common to every component variant.
#[derive(Debug, Clone)]
pub struct ComponentCore {
    pub name: String,
    pub enable: EnableGate,
    pub input: PropRef,
    pub outputs: OutputSet,
    debug: Option<PropId>,
}

impl ComponentCore {
    pub fn bind(tree: &mut PropertyTree, node: NodeId) -> Result<Self, BuildError> {
        let name = match tree.find_prop(node, "name").map(|p| tree.get_string(p)) {
            Some(n) if !n.is_empty() => n,
            _ => tree.node_path(node).to_string(),
        };
        let enable = EnableGate::bind(tree, node, &name);
        let input = bind_input(tree, node, &name)?;
        let outputs = OutputSet::bind(tree, node, &name)?;
        let debug = tree.prop(node, "debug").ok();
        Ok(Self {
            name,
            enable,
            input,
            outputs,
            debug,
        })
    }

    /// Live debug flag, re-read every tick.
    #[inline]
    pub fn debug(&self, tree: &PropertyTree) -> bool {
        self.debug.map(|p| tree.get_bool(p)).unwrap_or(false)
    }
}

/// Enum dispatch over the built-in control algorithms.
#[derive(Debug, Clone)]
pub enum Component {
    VelocityPid(VelocityPid),
    Pid(PositionPid),
    Predictor(Predictor),
    Filter(DigitalFilter),
}

impl Component {
    /// Instantiate `module` from the config node `node`.
    pub fn build(
        tree: &mut PropertyTree,
        node: NodeId,
        module: ComponentModule,
    ) -> Result<Self, BuildError> {
        Ok(match module {
            ComponentModule::VelocityPid => Component::VelocityPid(VelocityPid::build(tree, node)?),
            ComponentModule::Pid => Component::Pid(PositionPid::build(tree, node)?),
            ComponentModule::Predictor => Component::Predictor(Predictor::build(tree, node)?),
            ComponentModule::Filter => Component::Filter(DigitalFilter::build(tree, node)?),
        })
    }

    pub fn name(&self) -> &str {
        &self.core().name
    }

    pub fn module(&self) -> ComponentModule {
        match self {
            Component::VelocityPid(_) => ComponentModule::VelocityPid,
            Component::Pid(_) => ComponentModule::Pid,
            Component::Predictor(_) => ComponentModule::Predictor,
            Component::Filter(_) => ComponentModule::Filter,
        }
    }

    pub fn core(&self) -> &ComponentCore {
        match self {
            Component::VelocityPid(c) => &c.core,
            Component::Pid(c) => &c.core,
            Component::Predictor(c) => &c.core,
            Component::Filter(c) => &c.core,
        }
    }

    #[inline]
    pub fn update(&mut self, tree: &mut PropertyTree, dt: f64) {
        match self {
            Component::VelocityPid(c) => c.update(tree, dt),
            Component::Pid(c) => c.update(tree, dt),
            Component::Predictor(c) => c.update(tree, dt),
            Component::Filter(c) => c.update(tree, dt),
        }
    }
}
