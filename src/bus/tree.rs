//! Hierarchical key/value state bus.
//!
//! Nodes are stored in a flat `Vec` indexed by `NodeId`, with
//! parent/child/sibling links forming an intrusive tree so children keep
//! insertion order. Attributes live in a second flat `Vec` indexed by
//! `PropId`; each node lists its attributes in insertion order.
//!
//! ```text
//! /                      (root, NodeId(0))
//! +-- orientation        roll_deg=2.5 pitch_deg=-1.0
//! +-- filters
//!     +-- filter         timestamp=12.02 roll_deg=2.5
//!     +-- filter[1]      timestamp=12.01
//! ```
//!
//! Resolution creates missing nodes and attributes, so components can bind
//! to addresses that nothing has written yet. A resolved-but-unwritten
//! attribute reads as zero/empty and does not count as a child.

use crate::bus::id::{NodeId, PropId};
use crate::bus::path;
use crate::error::PathError;
use crate::types::Value;
use std::collections::HashMap;

/// A single node in the bus tree.
#[derive(Debug, Clone)]
pub struct BusNode {
    pub id: NodeId,
    /// Canonical segment, e.g. `"filter[1]"`.
    pub name: String,
    /// Canonical absolute path, e.g. `"/filters/filter[1]"`.
    pub path: String,
    pub parent: NodeId,
    pub first_child: NodeId,
    last_child: NodeId,
    pub next_sibling: NodeId,
    props: Vec<PropId>,
}

#[derive(Debug, Clone)]
struct Prop {
    node: NodeId,
    name: String,
    value: Option<Value>,
}

/// Flat-storage hierarchical state bus.
#[derive(Debug)]
pub struct PropertyTree {
    nodes: Vec<BusNode>,
    props: Vec<Prop>,
    path_index: HashMap<String, NodeId>,
}

impl Default for PropertyTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyTree {
    pub fn new() -> Self {
        let root = BusNode {
            id: NodeId::ROOT,
            name: String::new(),
            path: "/".to_string(),
            parent: NodeId::INVALID,
            first_child: NodeId::INVALID,
            last_child: NodeId::INVALID,
            next_sibling: NodeId::INVALID,
            props: Vec::new(),
        };
        let mut path_index = HashMap::new();
        path_index.insert("/".to_string(), NodeId::ROOT);
        Self {
            nodes: vec![root],
            props: Vec::new(),
            path_index,
        }
    }

    /// Total number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1 && self.props.is_empty()
    }

    // ---- nodes -------------------------------------------------------

    /// Resolve a node path, creating missing nodes along the way.
    pub fn node(&mut self, path: &str) -> Result<NodeId, PathError> {
        let segments = path::split_node_path(path)?;
        let mut cur = NodeId::ROOT;
        for seg in &segments {
            cur = self.child_canonical(cur, seg);
        }
        Ok(cur)
    }

    /// Look up a node path without creating anything.
    pub fn find_node(&self, path: &str) -> Option<NodeId> {
        let segments = path::split_node_path(path).ok()?;
        if segments.is_empty() {
            return Some(NodeId::ROOT);
        }
        let key = format!("/{}", segments.join("/"));
        self.path_index.get(&key).copied()
    }

    /// Resolve (creating if missing) a direct child by segment name.
    pub fn child(&mut self, parent: NodeId, segment: &str) -> Result<NodeId, PathError> {
        let parent_path = self.node_path(parent).to_string();
        let seg = path::canonical_segment(&parent_path, segment)?;
        Ok(self.child_canonical(parent, &seg))
    }

    /// Look up a direct child by segment name.
    pub fn find_child(&self, parent: NodeId, segment: &str) -> Option<NodeId> {
        let parent_node = self.get_node(parent)?;
        let seg = path::canonical_segment(&parent_node.path, segment).ok()?;
        self.path_index
            .get(&path::join(&parent_node.path, &seg))
            .copied()
    }

    fn child_canonical(&mut self, parent: NodeId, seg: &str) -> NodeId {
        let full = path::join(&self.nodes[parent.index()].path, seg);
        if let Some(&id) = self.path_index.get(&full) {
            return id;
        }

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(BusNode {
            id,
            name: seg.to_string(),
            path: full.clone(),
            parent,
            first_child: NodeId::INVALID,
            last_child: NodeId::INVALID,
            next_sibling: NodeId::INVALID,
            props: Vec::new(),
        });
        self.path_index.insert(full, id);

        // Link into parent's child list
        let last = self.nodes[parent.index()].last_child;
        if last.is_valid() {
            self.nodes[last.index()].next_sibling = id;
        } else {
            self.nodes[parent.index()].first_child = id;
        }
        self.nodes[parent.index()].last_child = id;
        id
    }

    #[inline]
    pub fn get_node(&self, id: NodeId) -> Option<&BusNode> {
        if id.is_valid() {
            self.nodes.get(id.index())
        } else {
            None
        }
    }

    /// Canonical path of a node (`"/"` for the root or an unknown id).
    pub fn node_path(&self, id: NodeId) -> &str {
        self.get_node(id).map(|n| n.path.as_str()).unwrap_or("/")
    }

    /// Iterate over the child nodes of `parent` in insertion order.
    pub fn children(&self, parent: NodeId) -> ChildIter<'_> {
        let first = self
            .get_node(parent)
            .map(|n| n.first_child)
            .unwrap_or(NodeId::INVALID);
        ChildIter {
            tree: self,
            current: first,
        }
    }

    /// Child node names in insertion order.
    pub fn child_names(&self, parent: NodeId) -> Vec<String> {
        self.children(parent).map(|n| n.name.clone()).collect()
    }

    /// True if `name` is a child node or a written attribute of `node`.
    pub fn has_child(&self, node: NodeId, name: &str) -> bool {
        if self.find_child(node, name).is_some() {
            return true;
        }
        self.find_prop(node, name)
            .map(|p| self.is_set(p))
            .unwrap_or(false)
    }

    // ---- attributes --------------------------------------------------

    /// Resolve (creating if missing) an attribute of `node`.
    pub fn prop(&mut self, node: NodeId, attr: &str) -> Result<PropId, PathError> {
        let node_path = self.node_path(node).to_string();
        let name = path::canonical_segment(&node_path, attr)?;
        if let Some(id) = self.find_prop_canonical(node, &name) {
            return Ok(id);
        }
        let id = PropId(self.props.len() as u32);
        self.props.push(Prop {
            node,
            name,
            value: None,
        });
        self.nodes[node.index()].props.push(id);
        Ok(id)
    }

    /// Look up an attribute of `node` without creating it.
    pub fn find_prop(&self, node: NodeId, attr: &str) -> Option<PropId> {
        let node_path = self.get_node(node)?.path.as_str();
        let name = path::canonical_segment(node_path, attr).ok()?;
        self.find_prop_canonical(node, &name)
    }

    fn find_prop_canonical(&self, node: NodeId, name: &str) -> Option<PropId> {
        self.get_node(node)?
            .props
            .iter()
            .copied()
            .find(|p| self.props[p.index()].name == name)
    }

    /// Resolve a full `/node/path/attr` address, creating as needed.
    pub fn resolve(&mut self, address: &str) -> Result<PropId, PathError> {
        let (node_path, attr) = path::split_address(address)?;
        let node = self.node(node_path)?;
        self.prop(node, attr)
    }

    /// Look up a full address without creating anything.
    pub fn find(&self, address: &str) -> Option<PropId> {
        let (node_path, attr) = path::split_address(address).ok()?;
        let node = self.find_node(node_path)?;
        self.find_prop(node, attr)
    }

    /// Written attributes of `node` in insertion order.
    pub fn attributes(&self, node: NodeId) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.get_node(node)
            .map(|n| n.props.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |p| {
                let prop = &self.props[p.index()];
                prop.value.as_ref().map(|v| (prop.name.as_str(), v))
            })
    }

    /// Attribute name of a handle.
    pub fn prop_name(&self, id: PropId) -> &str {
        self.props
            .get(id.index())
            .map(|p| p.name.as_str())
            .unwrap_or("")
    }

    /// Full address of a handle, for diagnostics.
    pub fn prop_address(&self, id: PropId) -> String {
        match self.props.get(id.index()) {
            Some(p) => path::join(self.node_path(p.node), &p.name),
            None => "<invalid>".to_string(),
        }
    }

    // ---- values ------------------------------------------------------

    #[inline]
    pub fn get(&self, id: PropId) -> Option<&Value> {
        self.props.get(id.index()).and_then(|p| p.value.as_ref())
    }

    #[inline]
    pub fn is_set(&self, id: PropId) -> bool {
        self.get(id).is_some()
    }

    #[inline]
    pub fn get_f64(&self, id: PropId) -> f64 {
        self.get(id).map(Value::as_f64).unwrap_or(0.0)
    }

    #[inline]
    pub fn get_i64(&self, id: PropId) -> i64 {
        self.get(id).map(Value::as_i64).unwrap_or(0)
    }

    #[inline]
    pub fn get_bool(&self, id: PropId) -> bool {
        self.get(id).map(Value::as_bool).unwrap_or(false)
    }

    pub fn get_string(&self, id: PropId) -> String {
        self.get(id).map(|v| v.to_string()).unwrap_or_default()
    }

    /// True if the attribute's string form equals `expected`, without
    /// allocating for string-typed values.
    pub fn string_equals(&self, id: PropId, expected: &str) -> bool {
        match self.get(id) {
            Some(Value::Str(s)) => s == expected,
            Some(other) => other.to_string() == expected,
            None => expected.is_empty(),
        }
    }

    #[inline]
    pub fn set(&mut self, id: PropId, value: impl Into<Value>) {
        if let Some(p) = self.props.get_mut(id.index()) {
            p.value = Some(value.into());
        }
    }

    #[inline]
    pub fn set_f64(&mut self, id: PropId, value: f64) {
        if let Some(p) = self.props.get_mut(id.index()) {
            p.value = Some(Value::Float(value));
        }
    }

    // ---- path-addressed helpers (setup code and tests) ---------------

    pub fn get_f64_at(&self, node_path: &str, attr: &str) -> f64 {
        self.find_node(node_path)
            .and_then(|n| self.find_prop(n, attr))
            .map(|p| self.get_f64(p))
            .unwrap_or(0.0)
    }

    pub fn get_i64_at(&self, node_path: &str, attr: &str) -> i64 {
        self.find_node(node_path)
            .and_then(|n| self.find_prop(n, attr))
            .map(|p| self.get_i64(p))
            .unwrap_or(0)
    }

    pub fn get_bool_at(&self, node_path: &str, attr: &str) -> bool {
        self.find_node(node_path)
            .and_then(|n| self.find_prop(n, attr))
            .map(|p| self.get_bool(p))
            .unwrap_or(false)
    }

    pub fn get_string_at(&self, node_path: &str, attr: &str) -> String {
        self.find_node(node_path)
            .and_then(|n| self.find_prop(n, attr))
            .map(|p| self.get_string(p))
            .unwrap_or_default()
    }

    pub fn set_at(
        &mut self,
        node_path: &str,
        attr: &str,
        value: impl Into<Value>,
    ) -> Result<PropId, PathError> {
        let node = self.node(node_path)?;
        let prop = self.prop(node, attr)?;
        self.set(prop, value);
        Ok(prop)
    }
}

/// Iterator over the children of a node.
pub struct ChildIter<'a> {
    tree: &'a PropertyTree,
    current: NodeId,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = &'a BusNode;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.current.is_valid() {
            return None;
        }
        let node = &self.tree.nodes[self.current.index()];
        self.current = node.next_sibling;
        Some(node)
    }
}
