//! # DAG Nodes
//!
//! A node is one operation: an opcode, its ordered operand edges, the types of
//! the values it produces, and any immediate data. Nodes are never modified
//! after they are added to a [`crate::SelectionDag`]; a changed operation is a
//! new node.

use smallvec::SmallVec;

use crate::{CondCode, NodeId, Opcode, ValueType};

/// A reference to one result of a node: the unit every edge points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SdValue {
    pub node: NodeId,
    pub slot: u32,
}

impl SdValue {
    pub const fn new(node: NodeId, slot: u32) -> Self {
        Self { node, slot }
    }
}

impl std::fmt::Display for SdValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.slot == 0 {
            write!(f, "t{}", self.node.index())
        } else {
            write!(f, "t{}:{}", self.node.index(), self.slot)
        }
    }
}

/// One operand edge, seen from the node it reads.
///
/// `user.operands[operand]` reads result `slot` of the node whose use list
/// holds this entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: NodeId,
    pub operand: u32,
    pub slot: u32,
}

/// Immediate data attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NodeAttr {
    #[default]
    None,
    /// Constant bits (`Constant`, `ConstantFp`).
    Imm(u128),
    /// Comparison predicate (`SetCc`).
    Cond(CondCode),
    /// Shuffle selector; lane `i` of the result reads lane `mask[i]` of the
    /// concatenated inputs, `None` is an undefined lane.
    Mask(Vec<Option<u32>>),
    /// Bits `[offset, offset + width)` of incoming argument `index`.
    Arg { index: u32, offset: u32 },
    /// Meaningful low bits of each `Output` operand.
    Widths(Vec<u32>),
}

/// A single DAG operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub opcode: Opcode,
    pub operands: SmallVec<[SdValue; 3]>,
    pub results: SmallVec<[ValueType; 1]>,
    pub attr: NodeAttr,
}

impl Node {
    pub fn new(
        opcode: Opcode,
        operands: &[SdValue],
        results: &[ValueType],
        attr: NodeAttr,
    ) -> Self {
        Self {
            opcode,
            operands: operands.iter().copied().collect(),
            results: results.iter().copied().collect(),
            attr,
        }
    }

    pub fn num_operands(&self) -> usize {
        self.operands.len()
    }

    pub fn num_results(&self) -> usize {
        self.results.len()
    }

    /// Type of result 0; `None` for nodes without results.
    pub fn result_type(&self) -> Option<ValueType> {
        self.results.first().copied()
    }

    pub const fn imm(&self) -> Option<u128> {
        match self.attr {
            NodeAttr::Imm(bits) => Some(bits),
            _ => None,
        }
    }

    pub const fn cond(&self) -> Option<CondCode> {
        match self.attr {
            NodeAttr::Cond(cc) => Some(cc),
            _ => None,
        }
    }

    pub fn mask(&self) -> Option<&[Option<u32>]> {
        match &self.attr {
            NodeAttr::Mask(mask) => Some(mask),
            _ => None,
        }
    }

    pub const fn arg(&self) -> Option<(u32, u32)> {
        match self.attr {
            NodeAttr::Arg { index, offset } => Some((index, offset)),
            _ => None,
        }
    }

    pub fn widths(&self) -> Option<&[u32]> {
        match &self.attr {
            NodeAttr::Widths(widths) => Some(widths),
            _ => None,
        }
    }
}
