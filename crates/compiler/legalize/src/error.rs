use seldag_compiler_dag::{NodeId, Opcode, SdValue, ValueType};
use thiserror::Error;

use crate::action::LegalizeAction;
use crate::maps::ConversionKind;
use crate::state::NodeState;

/// Invariant violations detected during a legalization run.
///
/// None of these are recoverable: each one means the handler set or the
/// engine bookkeeping is wrong, so a run stops at the first error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LegalizeError {
    #[error("no {action} handler for the result of {opcode} (t{})", .node.index())]
    NoResultHandler {
        action: LegalizeAction,
        opcode: Opcode,
        node: NodeId,
    },

    #[error("no {action} handler for operand {operand} of {opcode} (t{})", .node.index())]
    NoOperandHandler {
        action: LegalizeAction,
        opcode: Opcode,
        node: NodeId,
        operand: u32,
    },

    #[error("{value} has no {kind} entry")]
    MissingConversion { kind: ConversionKind, value: SdValue },

    #[error("{value} already has a {kind} entry")]
    DuplicateConversion { kind: ConversionKind, value: SdValue },

    #[error("{value} cannot get a {kind} entry: it already has a {existing} entry")]
    ConflictingConversion {
        kind: ConversionKind,
        existing: ConversionKind,
        value: SdValue,
    },

    #[error("{kind} is not a {expected} table")]
    TableShape {
        kind: ConversionKind,
        expected: &'static str,
    },

    #[error("type {vt} is not handled by {action}")]
    UnsupportedType { vt: ValueType, action: LegalizeAction },

    #[error("t{} is {state}, expected {expected}", .node.index())]
    InvalidNodeState {
        node: NodeId,
        state: NodeState,
        expected: &'static str,
    },

    #[error("t{} is reachable from the root but was never processed", .node.index())]
    UnprocessedNode { node: NodeId },

    #[error("t{} ({opcode}) still produces illegal type {vt}", .node.index())]
    IllegalTypeRemains {
        node: NodeId,
        opcode: Opcode,
        vt: ValueType,
    },

    #[error("graph has no root")]
    NoRoot,

    #[error("cannot legalize {opcode} (t{}): {reason}", .node.index())]
    Unsupported {
        opcode: Opcode,
        node: NodeId,
        reason: String,
    },
}

pub type LegalizeResult<T> = Result<T, LegalizeError>;
