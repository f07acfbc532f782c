//! # Selection DAG
//!
//! This crate defines the graph that the backend type legalizer operates on:
//! a directed acyclic graph whose nodes are machine-level operations producing
//! typed values.
//!
//! ## Architecture
//!
//! ```text
//! SelectionDag
//! nodes: IndexVec<NodeId, Node>
//! uses:  IndexVec<NodeId, [Use]>
//! root:  Output node
//!
//! Node
//! opcode, operands: [SdValue], results: [ValueType], attr: NodeAttr
//! ```
//!
//! Nodes are immutable once added. Rewrites create new nodes and move use
//! entries between them; dead nodes are dropped by [`SelectionDag::extract_live`].
//!
//! The [`interp`] module evaluates a graph on concrete inputs. It defines the
//! meaning every rewrite of the graph must preserve.

pub use graph::SelectionDag;
pub use interp::{evaluate, BitBuffer, DagValue, EvalError};
pub use node::{Node, NodeAttr, SdValue, Use};
pub use opcode::{CondCode, Opcode};
pub use types::ValueType;

pub mod graph;
pub mod interp;
pub mod node;
pub mod opcode;
pub mod types;

// --- Core Identifiers ---

index_vec::define_index_type! {
    /// Stable handle of a node within a `SelectionDag`
    pub struct NodeId = usize;
}

// --- Pretty Printing Support ---

/// Trait for pretty-printing DAG constructs
pub trait PrettyPrint {
    fn pretty_print(&self, indent: usize) -> String;
}

/// Helper function to create indentation
pub(crate) fn indent_str(level: usize) -> String {
    "  ".repeat(level)
}
