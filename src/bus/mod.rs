//! State bus: the addressed key/value tree every stage communicates through.
//!
//! - `tree`: arena-backed `PropertyTree` with ordered children
//! - `id`: `NodeId` / `PropId` handles
//! - `path`: segment and address parsing
//! - `handle`: build-time bindings (`EnableGate`, `ReferenceSource`, `OutputSet`)

pub mod handle;
pub mod id;
pub mod path;
pub mod tree;

pub use handle::{bind_input, EnableGate, OutputSet, PropRef, ReferenceSource};
pub use id::{NodeId, PropId};
pub use tree::{BusNode, PropertyTree};
