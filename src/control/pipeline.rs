//! Control pipeline: an ordered chain of components built from configuration.
//!
//! Execution order is declaration order. Later stages routinely consume
//! what earlier stages wrote to the bus during the same tick (an outer
//! altitude loop feeding a pitch target to an inner loop), so the builder
//! never reorders.
//!
//! Build is all-or-nothing: any fatal error leaves the pipeline empty.

use crate::bus::{path, NodeId, PropertyTree};
use crate::control::component::Component;
use crate::control::module_type::ComponentModule;
use crate::error::BuildError;
use tracing::{debug, info, warn};

/// Default configuration section for the pipeline.
pub const AUTOPILOT_CONFIG: &str = "/config/autopilot";

#[derive(Debug, Clone)]
pub struct ControlPipeline {
    config_path: String,
    components: Vec<Component>,
}

impl Default for ControlPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPipeline {
    pub fn new() -> Self {
        Self::with_config_path(AUTOPILOT_CONFIG)
    }

    pub fn with_config_path(path: impl Into<String>) -> Self {
        Self {
            config_path: path.into(),
            components: Vec::new(),
        }
    }

    pub fn config_path(&self) -> &str {
        &self.config_path
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Component names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name()).collect()
    }

    /// Discard the current chain and build a new one from configuration.
    pub fn build(&mut self, tree: &mut PropertyTree) -> Result<(), BuildError> {
        self.components.clear();

        let Some(root) = tree.find_node(&self.config_path) else {
            warn!("no autopilot configuration at {}", self.config_path);
            return Ok(());
        };

        let sections: Vec<(NodeId, String)> = tree
            .children(root)
            .map(|n| (n.id, n.name.clone()))
            .collect();

        let mut built = Vec::with_capacity(sections.len());
        for (node, section) in sections {
            match path::base_name(&section) {
                "component" => {
                    let component = build_component(tree, node)?;
                    info!(
                        "ap stage: {} -> {} ({})",
                        section,
                        component.name(),
                        component.module()
                    );
                    built.push(component);
                }
                "L1_controller" => {
                    debug!("{} is informational only", section);
                }
                _ => {
                    warn!("unknown top level autopilot section: {}", section);
                }
            }
        }

        self.components = built;
        Ok(())
    }

    /// Rebuild from current configuration. No component state survives.
    pub fn reinit(&mut self, tree: &mut PropertyTree) -> Result<(), BuildError> {
        self.build(tree)
    }

    /// Run every component once, in order.
    pub fn update(&mut self, tree: &mut PropertyTree, dt: f64) {
        for component in &mut self.components {
            component.update(tree, dt);
        }
    }
}

fn build_component(tree: &mut PropertyTree, node: NodeId) -> Result<Component, BuildError> {
    let section = tree.node_path(node).to_string();
    let module_name = tree
        .find_prop(node, "module")
        .map(|p| tree.get_string(p))
        .unwrap_or_default();
    if module_name.is_empty() {
        return Err(BuildError::MissingModule { section });
    }
    let module = ComponentModule::from_config_name(&module_name).ok_or(
        BuildError::UnknownModule {
            section,
            module: module_name,
        },
    )?;
    Component::build(tree, node, module)
}
