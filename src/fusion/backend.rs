//! Navigation filter backends and the registry that builds them by name.
//!
//! A backend owns one output node (`/filters/filter[i]`) and writes its
//! fused estimate there. The orchestrator only cares whether the estimate
//! is fresh this tick.

use crate::bus::{NodeId, PropId, PropertyTree};
use crate::error::{FlightError, Result};
use crate::types::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Common interface for every navigation filter implementation.
///
/// Implementations must be `Send` so a whole flight core can move to a
/// dedicated thread.
pub trait NavBackend: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Prepare to write estimates into `output` using the section `config`.
    fn init(&mut self, tree: &mut PropertyTree, output: NodeId, config: NodeId) -> Result<()>;

    /// Run one step. Returns true when a fresh estimate was written.
    fn update(&mut self, tree: &mut PropertyTree) -> bool;

    /// Release anything held by the backend.
    fn close(&mut self, tree: &mut PropertyTree);
}

pub type BackendFactory = Box<dyn Fn() -> Box<dyn NavBackend> + Send + Sync>;

/// Name to constructor map consulted when the orchestrator is built.
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl BackendRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding `null` and `mirror`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("null", || Box::new(NullBackend));
        registry.register("mirror", || Box::new(MirrorBackend::new()));
        registry
    }

    /// Add or replace a backend constructor.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn NavBackend> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn NavBackend>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

/// Placeholder backend that never produces an estimate.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl NavBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn init(&mut self, _tree: &mut PropertyTree, _output: NodeId, _config: NodeId) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, _tree: &mut PropertyTree) -> bool {
        false
    }

    fn close(&mut self, _tree: &mut PropertyTree) {}
}

/// Copies a precomputed solution from another bus node.
///
/// The section's `source` attribute names the node to copy (for example an
/// external INS publishing to `/sensors/ins`). A copy happens whenever the
/// source `timestamp` advances, and that tick reports fresh.
#[derive(Debug, Default, Clone)]
pub struct MirrorBackend {
    source: Option<NodeId>,
    output: Option<NodeId>,
    timestamp: Option<PropId>,
    last_timestamp: Option<f64>,
}

impl MirrorBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn copy(&self, tree: &mut PropertyTree, source: NodeId, output: NodeId) {
        let values: Vec<(String, Value)> = tree
            .attributes(source)
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        for (name, value) in values {
            match tree.prop(output, &name) {
                Ok(prop) => tree.set(prop, value),
                Err(e) => warn!("mirror: cannot write {}: {}", name, e),
            }
        }
    }
}

impl NavBackend for MirrorBackend {
    fn name(&self) -> &'static str {
        "mirror"
    }

    fn init(&mut self, tree: &mut PropertyTree, output: NodeId, config: NodeId) -> Result<()> {
        let source_path = tree
            .find_prop(config, "source")
            .map(|p| tree.get_string(p))
            .unwrap_or_default();
        if source_path.is_empty() {
            return Err(FlightError::Backend {
                name: "mirror".to_string(),
                message: format!("no source configured in {}", tree.node_path(config)),
            });
        }
        let source = tree.node(&source_path)?;
        self.timestamp = Some(tree.prop(source, "timestamp")?);
        self.source = Some(source);
        self.output = Some(output);
        self.last_timestamp = None;
        debug!(
            "mirror: {} -> {}",
            source_path,
            tree.node_path(output)
        );
        Ok(())
    }

    fn update(&mut self, tree: &mut PropertyTree) -> bool {
        let (Some(source), Some(output), Some(ts)) = (self.source, self.output, self.timestamp)
        else {
            return false;
        };
        if !tree.is_set(ts) {
            return false;
        }
        let now = tree.get_f64(ts);
        if self.last_timestamp.is_some_and(|last| now <= last) {
            return false;
        }
        self.last_timestamp = Some(now);
        self.copy(tree, source, output);
        true
    }

    fn close(&mut self, _tree: &mut PropertyTree) {
        self.source = None;
        self.output = None;
        self.timestamp = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirror_setup(tree: &mut PropertyTree) -> MirrorBackend {
        tree.set_at("/config/filters/filter", "source", "/sensors/ins")
            .unwrap();
        let config = tree.find_node("/config/filters/filter").unwrap();
        let output = tree.node("/filters/filter").unwrap();
        let mut m = MirrorBackend::new();
        m.init(tree, output, config).unwrap();
        m
    }

    #[test]
    fn test_registry_builtins() {
        let registry = BackendRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["mirror", "null"]);
        assert!(registry.create("ekf15").is_none());
        assert_eq!(registry.create("null").unwrap().name(), "null");
    }

    #[test]
    fn test_register_custom() {
        let mut registry = BackendRegistry::empty();
        registry.register("quiet", || Box::new(NullBackend));
        assert!(registry.contains("quiet"));
        assert!(!registry.contains("mirror"));
    }

    #[test]
    fn test_mirror_copies_on_new_timestamp() {
        let mut tree = PropertyTree::new();
        let mut m = mirror_setup(&mut tree);
        assert!(!m.update(&mut tree));

        tree.set_at("/sensors/ins", "roll_deg", 3.5).unwrap();
        tree.set_at("/sensors/ins", "navigation", "valid").unwrap();
        tree.set_at("/sensors/ins", "timestamp", 10.0).unwrap();
        assert!(m.update(&mut tree));
        assert_eq!(tree.get_f64_at("/filters/filter", "roll_deg"), 3.5);
        assert_eq!(tree.get_string_at("/filters/filter", "navigation"), "valid");

        // same timestamp: stale
        tree.set_at("/sensors/ins", "roll_deg", 4.0).unwrap();
        assert!(!m.update(&mut tree));
        assert_eq!(tree.get_f64_at("/filters/filter", "roll_deg"), 3.5);

        tree.set_at("/sensors/ins", "timestamp", 10.02).unwrap();
        assert!(m.update(&mut tree));
        assert_eq!(tree.get_f64_at("/filters/filter", "roll_deg"), 4.0);
    }

    #[test]
    fn test_mirror_requires_source() {
        let mut tree = PropertyTree::new();
        let config = tree.node("/config/filters/filter").unwrap();
        let output = tree.node("/filters/filter").unwrap();
        let err = MirrorBackend::new()
            .init(&mut tree, output, config)
            .unwrap_err();
        assert!(matches!(err, FlightError::Backend { .. }));
    }

    #[test]
    fn test_null_never_fresh() {
        let mut tree = PropertyTree::new();
        let mut b = NullBackend;
        assert!(!b.update(&mut tree));
    }
}
