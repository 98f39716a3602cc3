//! Handle types for the state bus.
//!
//! Both IDs are newtypes over `u32` that index directly into the bus's
//! storage vectors, so a resolved handle costs one bounds check per access.

use std::fmt;

/// Index into `PropertyTree::nodes`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const INVALID: NodeId = NodeId(u32::MAX);
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "NodeId(INVALID)")
        } else {
            write!(f, "NodeId({})", self.0)
        }
    }
}

/// Index into `PropertyTree::props`: one attribute of one node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PropId(pub u32);

impl PropId {
    pub const INVALID: PropId = PropId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for PropId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "PropId(INVALID)")
        } else {
            write!(f, "PropId({})", self.0)
        }
    }
}
