//! Build-time bindings from configuration onto cached bus handles.
//!
//! Every control component resolves its addresses exactly once here; the
//! per-tick code only ever touches `PropId`s.

use crate::bus::id::{NodeId, PropId};
use crate::bus::tree::PropertyTree;
use crate::error::BuildError;
use tracing::warn;

/// A resolved `/node/path/attr` address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropRef(pub PropId);

impl PropRef {
    #[inline]
    pub fn read(self, tree: &PropertyTree) -> f64 {
        tree.get_f64(self.0)
    }

    #[inline]
    pub fn write(self, tree: &mut PropertyTree, value: f64) {
        tree.set_f64(self.0, value);
    }
}

/// Read a string attribute of a config section, `""` when absent.
fn section_string(tree: &PropertyTree, section: Option<NodeId>, attr: &str) -> String {
    section
        .and_then(|s| tree.find_prop(s, attr))
        .map(|p| tree.get_string(p))
        .unwrap_or_default()
}

/// Resolve the required `input/prop` of a component.
pub fn bind_input(
    tree: &mut PropertyTree,
    component: NodeId,
    name: &str,
) -> Result<PropRef, BuildError> {
    let section = tree.find_child(component, "input");
    let address = section_string(tree, section, "prop");
    tree.resolve(&address)
        .map(PropRef)
        .map_err(|_| BuildError::UnresolvedInput {
            component: name.to_string(),
            path: address,
        })
}

/// Condition under which a component's update takes observable effect.
///
/// Open iff the watched attribute's string form equals `expected`. A gate
/// whose address could not be resolved stays shut forever.
#[derive(Debug, Clone, PartialEq)]
pub struct EnableGate {
    prop: Option<PropId>,
    expected: String,
}

impl EnableGate {
    pub fn bind(tree: &mut PropertyTree, component: NodeId, name: &str) -> Self {
        let section = tree.find_child(component, "enable");
        let address = section_string(tree, section, "prop");
        let expected = section_string(tree, section, "value");
        match tree.resolve(&address) {
            Ok(prop) => Self {
                prop: Some(prop),
                expected,
            },
            Err(e) => {
                warn!("{}: enable gate '{}' unusable ({}), stays disabled", name, address, e);
                Self::closed()
            }
        }
    }

    /// A gate that never opens.
    pub fn closed() -> Self {
        Self {
            prop: None,
            expected: String::new(),
        }
    }

    #[inline]
    pub fn is_open(&self, tree: &PropertyTree) -> bool {
        match self.prop {
            Some(p) => tree.string_equals(p, &self.expected),
            None => false,
        }
    }
}

/// Setpoint for the PID variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceSource {
    /// Parsed once at build time.
    Literal(f64),
    /// Read every tick.
    Live(PropId),
}

impl ReferenceSource {
    /// A non-empty `reference/value` wins over `reference/prop`.
    pub fn bind(tree: &mut PropertyTree, component: NodeId, name: &str) -> Result<Self, BuildError> {
        let section = tree.find_child(component, "reference");
        let literal = section_string(tree, section, "value");
        if !literal.trim().is_empty() {
            return literal
                .trim()
                .parse::<f64>()
                .map(ReferenceSource::Literal)
                .map_err(|_| BuildError::InvalidReference {
                    component: name.to_string(),
                    reason: format!("literal '{}' is not a number", literal),
                });
        }

        let address = section_string(tree, section, "prop");
        if address.is_empty() {
            return Err(BuildError::InvalidReference {
                component: name.to_string(),
                reason: "neither value nor prop given".to_string(),
            });
        }
        tree.resolve(&address)
            .map(ReferenceSource::Live)
            .map_err(|e| BuildError::InvalidReference {
                component: name.to_string(),
                reason: e.to_string(),
            })
    }

    #[inline]
    pub fn read(&self, tree: &PropertyTree) -> f64 {
        match *self {
            ReferenceSource::Literal(v) => v,
            ReferenceSource::Live(p) => tree.get_f64(p),
        }
    }
}

/// Every resolved output address of a component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSet {
    props: Vec<PropId>,
}

impl OutputSet {
    /// Bind every `prop*` attribute of the `output` section. Malformed
    /// addresses and unknown tags are skipped with a warning; an empty
    /// result is an error.
    pub fn bind(tree: &mut PropertyTree, component: NodeId, name: &str) -> Result<Self, BuildError> {
        let entries: Vec<(String, String)> = match tree.find_child(component, "output") {
            Some(section) => tree
                .attributes(section)
                .map(|(tag, v)| (tag.to_string(), v.to_string()))
                .collect(),
            None => Vec::new(),
        };

        let mut props = Vec::with_capacity(entries.len());
        for (tag, address) in entries {
            if !tag.starts_with("prop") {
                warn!("{}: unknown tag in output section: {}", name, tag);
                continue;
            }
            match tree.resolve(&address) {
                Ok(p) => props.push(p),
                Err(e) => warn!("{}: requested bad output path '{}': {}", name, address, e),
            }
        }

        if props.is_empty() {
            return Err(BuildError::NoOutputs {
                component: name.to_string(),
            });
        }
        Ok(Self { props })
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Current bus value at the first output.
    #[inline]
    pub fn read_first(&self, tree: &PropertyTree) -> f64 {
        self.props.first().map(|&p| tree.get_f64(p)).unwrap_or(0.0)
    }

    /// Write the same scalar to every output.
    #[inline]
    pub fn write_all(&self, tree: &mut PropertyTree, value: f64) {
        for &p in &self.props {
            tree.set_f64(p, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(tree: &mut PropertyTree) -> NodeId {
        tree.node("/config/autopilot/component").unwrap()
    }

    #[test]
    fn test_enable_gate_string_compare() {
        let mut tree = PropertyTree::new();
        let c = component(&mut tree);
        tree.set_at("/config/autopilot/component/enable", "prop", "/autopilot/locks/roll")
            .unwrap();
        tree.set_at("/config/autopilot/component/enable", "value", "aileron")
            .unwrap();

        let gate = EnableGate::bind(&mut tree, c, "roll");
        assert!(!gate.is_open(&tree));
        tree.set_at("/autopilot/locks", "roll", "aileron").unwrap();
        assert!(gate.is_open(&tree));
        tree.set_at("/autopilot/locks", "roll", "").unwrap();
        assert!(!gate.is_open(&tree));
    }

    #[test]
    fn test_misconfigured_gate_is_closed() {
        let mut tree = PropertyTree::new();
        let c = component(&mut tree);
        tree.set_at("/config/autopilot/component/enable", "prop", "no_slash")
            .unwrap();
        let gate = EnableGate::bind(&mut tree, c, "x");
        assert_eq!(gate, EnableGate::closed());
        assert!(!gate.is_open(&tree));
    }

    #[test]
    fn test_input_required() {
        let mut tree = PropertyTree::new();
        let c = component(&mut tree);
        let err = bind_input(&mut tree, c, "pitch").unwrap_err();
        assert!(matches!(err, BuildError::UnresolvedInput { .. }));

        tree.set_at("/config/autopilot/component/input", "prop", "/orientation/pitch_deg")
            .unwrap();
        let input = bind_input(&mut tree, c, "pitch").unwrap();
        tree.set_at("/orientation", "pitch_deg", 4.0).unwrap();
        assert_eq!(input.read(&tree), 4.0);
    }

    #[test]
    fn test_reference_literal_wins() {
        let mut tree = PropertyTree::new();
        let c = component(&mut tree);
        tree.set_at("/config/autopilot/component/reference", "prop", "/targets/x")
            .unwrap();
        tree.set_at("/config/autopilot/component/reference", "value", "2.5")
            .unwrap();
        let r = ReferenceSource::bind(&mut tree, c, "x").unwrap();
        assert_eq!(r, ReferenceSource::Literal(2.5));
    }

    #[test]
    fn test_reference_errors() {
        let mut tree = PropertyTree::new();
        let c = component(&mut tree);
        assert!(ReferenceSource::bind(&mut tree, c, "x").is_err());

        tree.set_at("/config/autopilot/component/reference", "value", "fast")
            .unwrap();
        assert!(matches!(
            ReferenceSource::bind(&mut tree, c, "x"),
            Err(BuildError::InvalidReference { .. })
        ));
    }

    #[test]
    fn test_outputs_skip_bad_entries() {
        let mut tree = PropertyTree::new();
        let c = component(&mut tree);
        let out = "/config/autopilot/component/output";
        tree.set_at(out, "prop", "/controls/aileron").unwrap();
        tree.set_at(out, "prop[1]", "bad").unwrap();
        tree.set_at(out, "other", "/controls/rudder").unwrap();
        tree.set_at(out, "prop2", "/controls/flaperon").unwrap();

        let outputs = OutputSet::bind(&mut tree, c, "roll").unwrap();
        assert_eq!(outputs.len(), 2);
        outputs.write_all(&mut tree, 0.25);
        assert_eq!(tree.get_f64_at("/controls", "aileron"), 0.25);
        assert_eq!(tree.get_f64_at("/controls", "flaperon"), 0.25);
        assert!(tree.find("/controls/rudder").is_none());
    }

    #[test]
    fn test_empty_outputs_is_error() {
        let mut tree = PropertyTree::new();
        let c = component(&mut tree);
        tree.set_at("/config/autopilot/component/output", "prop", "bad")
            .unwrap();
        assert!(matches!(
            OutputSet::bind(&mut tree, c, "roll"),
            Err(BuildError::NoOutputs { .. })
        ));
    }
}
