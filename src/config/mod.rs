//! Configuration import for the flight core
//!
//! Configuration files are mounted onto the state bus (conventionally under
//! `/config`) so that every stage reads its knobs through the same
//! addressed tree it uses at runtime:
//!
//! - tables become nodes
//! - scalars become attributes
//! - arrays of tables become repeated children `name`, `name[1]`, ...
//! - arrays of scalars become repeated attributes `name`, `name[1]`, ...
//!
//! Document order is preserved, which is what makes component execution
//! order equal configuration order.
//!
//! # Example
//!
//! ```ignore
//! use flightcore::{bus::PropertyTree, config};
//!
//! let mut tree = PropertyTree::new();
//! config::load_file(&mut tree, "/config", "aircraft.toml")?;
//! let settings = config::DriverSettings::load("aircraft.toml")?;
//! ```

pub mod settings;

pub use settings::*;

use crate::bus::{NodeId, PropertyTree};
use crate::error::{FlightError, Result};
use crate::types::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Default mount point for configuration on the bus.
pub const CONFIG_ROOT: &str = "/config";

fn indexed(key: &str, i: usize) -> String {
    if i == 0 {
        key.to_string()
    } else {
        format!("{}[{}]", key, i)
    }
}

// ==================== TOML ====================

/// Parse TOML text and mount it under `mount`.
pub fn import_toml(tree: &mut PropertyTree, mount: &str, text: &str) -> Result<NodeId> {
    let table: toml::Table = text.parse()?;
    let node = tree.node(mount)?;
    import_toml_table(tree, node, &table)?;
    Ok(node)
}

fn import_toml_table(tree: &mut PropertyTree, node: NodeId, table: &toml::Table) -> Result<()> {
    for (key, value) in table {
        match value {
            toml::Value::Table(t) => {
                let child = tree.child(node, key)?;
                import_toml_table(tree, child, t)?;
            }
            toml::Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    let seg = indexed(key, i);
                    match item {
                        toml::Value::Table(t) => {
                            let child = tree.child(node, &seg)?;
                            import_toml_table(tree, child, t)?;
                        }
                        toml::Value::Array(_) => {
                            warn!("nested array '{}' under {} ignored", key, tree.node_path(node));
                        }
                        scalar => {
                            let prop = tree.prop(node, &seg)?;
                            tree.set(prop, toml_scalar(scalar));
                        }
                    }
                }
            }
            scalar => {
                let prop = tree.prop(node, key)?;
                tree.set(prop, toml_scalar(scalar));
            }
        }
    }
    Ok(())
}

fn toml_scalar(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Float(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        other => Value::Str(other.to_string()),
    }
}

// ==================== JSON ====================

/// Parse JSON text and mount it under `mount`.
pub fn import_json(tree: &mut PropertyTree, mount: &str, text: &str) -> Result<NodeId> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let node = tree.node(mount)?;
    import_json_value(tree, node, &value)?;
    Ok(node)
}

/// Mount an already-parsed JSON object under `node`.
pub fn import_json_value(
    tree: &mut PropertyTree,
    node: NodeId,
    value: &serde_json::Value,
) -> Result<()> {
    let serde_json::Value::Object(map) = value else {
        return Err(FlightError::Config(format!(
            "expected a JSON object at {}",
            tree.node_path(node)
        )));
    };

    for (key, value) in map {
        match value {
            serde_json::Value::Object(_) => {
                let child = tree.child(node, key)?;
                import_json_value(tree, child, value)?;
            }
            serde_json::Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    let seg = indexed(key, i);
                    match item {
                        serde_json::Value::Object(_) => {
                            let child = tree.child(node, &seg)?;
                            import_json_value(tree, child, item)?;
                        }
                        serde_json::Value::Array(_) | serde_json::Value::Null => {
                            warn!("unsupported array item '{}' under {} ignored", key, tree.node_path(node));
                        }
                        scalar => {
                            if let Some(v) = json_scalar(scalar) {
                                let prop = tree.prop(node, &seg)?;
                                tree.set(prop, v);
                            }
                        }
                    }
                }
            }
            scalar => {
                if let Some(v) = json_scalar(scalar) {
                    let prop = tree.prop(node, key)?;
                    tree.set(prop, v);
                }
            }
        }
    }
    Ok(())
}

fn json_scalar(value: &serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::String(s) => Some(Value::Str(s.clone())),
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float)),
        _ => None,
    }
}

/// Render a subtree back to JSON: attributes first, then child nodes.
pub fn export_json(tree: &PropertyTree, node: NodeId) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (name, value) in tree.attributes(node) {
        let json = match value {
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
        };
        map.insert(name.to_string(), json);
    }
    for child in tree.children(node) {
        map.insert(child.name.clone(), export_json(tree, child.id));
    }
    serde_json::Value::Object(map)
}

// ==================== Files ====================

/// Load a `.toml` or `.json` file and mount it under `mount`.
pub fn load_file(tree: &mut PropertyTree, mount: &str, path: impl AsRef<Path>) -> Result<NodeId> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        FlightError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;

    let node = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => import_json(tree, mount, &content),
        Some("toml") => import_toml(tree, mount, &content),
        other => {
            return Err(FlightError::Config(format!(
                "Unsupported config format {:?} for {:?}",
                other, path
            )))
        }
    }
    .map_err(|e| e.with_context(format!("Failed to parse config file {:?}", path)))?;

    debug!("mounted {:?} at {}", path, mount);
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[remote_link]
autopilot_skip = 4

[[autopilot.component]]
module = "pid_component"
name = "roll"
[autopilot.component.config]
Kp = 0.5

[autopilot.L1_controller]
bank_limit_deg = 20.0

[[autopilot.component]]
module = "filter"
name = "smooth"
[autopilot.component.output]
prop = ["/a/b", "/c/d"]
"#;

    #[test]
    fn test_toml_import_layout() {
        let mut tree = PropertyTree::new();
        import_toml(&mut tree, "/config", SAMPLE).unwrap();

        assert_eq!(tree.get_i64_at("/config/remote_link", "autopilot_skip"), 4);
        assert_eq!(
            tree.get_string_at("/config/autopilot/component[1]", "module"),
            "filter"
        );
        assert_eq!(
            tree.get_f64_at("/config/autopilot/component/config", "Kp"),
            0.5
        );
        assert_eq!(
            tree.get_string_at("/config/autopilot/component[1]/output", "prop[1]"),
            "/c/d"
        );
    }

    #[test]
    fn test_toml_preserves_document_order() {
        let mut tree = PropertyTree::new();
        let root = import_toml(&mut tree, "/config", SAMPLE).unwrap();
        let ap = tree.find_child(root, "autopilot").unwrap();
        assert_eq!(
            tree.child_names(ap),
            vec!["component", "component[1]", "L1_controller"]
        );
    }

    #[test]
    fn test_json_import() {
        let mut tree = PropertyTree::new();
        import_json(
            &mut tree,
            "/config",
            r#"{"filters": {"filter": [{"module": "null", "enable": true}, {"module": "mirror"}]}}"#,
        )
        .unwrap();
        assert!(tree.get_bool_at("/config/filters/filter", "enable"));
        assert_eq!(
            tree.get_string_at("/config/filters/filter[1]", "module"),
            "mirror"
        );
    }

    #[test]
    fn test_json_import_rejects_non_object() {
        let mut tree = PropertyTree::new();
        assert!(import_json(&mut tree, "/config", "[1, 2]").is_err());
    }

    #[test]
    fn test_export_json() {
        let mut tree = PropertyTree::new();
        tree.set_at("/config/autopilot/component", "module", "filter")
            .unwrap();
        tree.set_at("/config/autopilot/component", "samples", 4i64)
            .unwrap();
        let node = tree.find_node("/config/autopilot").unwrap();
        let json = export_json(&tree, node);
        assert_eq!(json["component"]["module"], "filter");
        assert_eq!(json["component"]["samples"], 4);
    }

    #[test]
    fn test_load_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aircraft.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let mut tree = PropertyTree::new();
        load_file(&mut tree, CONFIG_ROOT, &path).unwrap();
        assert_eq!(tree.get_i64_at("/config/remote_link", "autopilot_skip"), 4);

        let bad = dir.path().join("aircraft.ini");
        std::fs::write(&bad, "x=1").unwrap();
        assert!(load_file(&mut tree, CONFIG_ROOT, &bad).is_err());
    }

    #[test]
    fn test_load_file_parse_error_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[unterminated").unwrap();

        let mut tree = PropertyTree::new();
        let err = load_file(&mut tree, CONFIG_ROOT, &path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
