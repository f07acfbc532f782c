//! # Handler Registry
//!
//! Result and operand handlers keyed by `(action, opcode)`. Each legalizer
//! family registers its handlers in [`HandlerTable::new`]; a combination that
//! nobody registered is reported by the driver as an error rather than
//! guessed at.
//!
//! A result handler records the substitute(s) of one illegal result. An
//! operand handler returns what supersedes the node whose operand is
//! illegal.

use rustc_hash::FxHashMap;
use seldag_compiler_dag::types::mask_bits;
use seldag_compiler_dag::{NodeAttr, NodeId, Opcode, SdValue, ValueType};
use smallvec::SmallVec;

use crate::action::LegalizeAction;
use crate::error::{LegalizeError, LegalizeResult};
use crate::legalizer::TypeLegalizer;

mod float_expand;
mod float_promote;
mod integer_expand;
mod integer_promote;
mod vector_scalarize;
mod vector_split;

/// Outcome of an operand handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandRewrite {
    /// A node superseding the legalized node, result for result. Returning
    /// the node itself means nothing changed.
    Node(NodeId),
    /// The replacement for the single result of the legalized node.
    Value(SdValue),
}

pub type ResultHandler = fn(&mut TypeLegalizer<'_>, NodeId, u32) -> LegalizeResult<()>;
pub type OperandHandler = fn(&mut TypeLegalizer<'_>, NodeId, u32) -> LegalizeResult<OperandRewrite>;

/// Opcodes applied lane by lane with one operand.
pub(crate) const LANEWISE_UNARY: [Opcode; 5] = [
    Opcode::Ctpop,
    Opcode::Ctlz,
    Opcode::Cttz,
    Opcode::FNeg,
    Opcode::FAbs,
];

/// Opcodes applied lane by lane with two operands of the result type.
pub(crate) const LANEWISE_BINARY: [Opcode; 16] = [
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::MulHiU,
    Opcode::UDiv,
    Opcode::SDiv,
    Opcode::And,
    Opcode::Or,
    Opcode::Xor,
    Opcode::Shl,
    Opcode::Srl,
    Opcode::Sra,
    Opcode::FAdd,
    Opcode::FSub,
    Opcode::FMul,
    Opcode::FCopySign,
];

#[derive(Default)]
pub struct HandlerTable {
    results: FxHashMap<(LegalizeAction, Opcode), ResultHandler>,
    operands: FxHashMap<(LegalizeAction, Opcode), OperandHandler>,
}

impl HandlerTable {
    /// The table with every legalizer family registered.
    pub fn new() -> Self {
        let mut table = Self::default();
        integer_promote::register(&mut table);
        integer_expand::register(&mut table);
        float_promote::register(&mut table);
        float_expand::register(&mut table);
        vector_scalarize::register(&mut table);
        vector_split::register(&mut table);
        table
    }

    pub fn add_result(&mut self, action: LegalizeAction, opcode: Opcode, handler: ResultHandler) {
        let previous = self.results.insert((action, opcode), handler);
        debug_assert!(previous.is_none(), "{action} result handler for {opcode} registered twice");
    }

    pub fn add_operand(&mut self, action: LegalizeAction, opcode: Opcode, handler: OperandHandler) {
        let previous = self.operands.insert((action, opcode), handler);
        debug_assert!(previous.is_none(), "{action} operand handler for {opcode} registered twice");
    }

    pub fn result(&self, action: LegalizeAction, opcode: Opcode) -> Option<ResultHandler> {
        self.results.get(&(action, opcode)).copied()
    }

    pub fn operand(&self, action: LegalizeAction, opcode: Opcode) -> Option<OperandHandler> {
        self.operands.get(&(action, opcode)).copied()
    }

    pub fn len(&self) -> usize {
        self.results.len() + self.operands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerTable")
            .field("results", &self.results.len())
            .field("operands", &self.operands.len())
            .finish()
    }
}

// --- Shared conversions ---

impl TypeLegalizer<'_> {
    pub(crate) fn unsupported(&self, id: NodeId, reason: impl Into<String>) -> LegalizeError {
        LegalizeError::Unsupported {
            opcode: self.node(id).opcode,
            node: id,
            reason: reason.into(),
        }
    }

    /// Argument index and bit offset of the `Argument` node `id`.
    pub(crate) fn argument_slot(&self, id: NodeId) -> LegalizeResult<(u32, u32)> {
        self.node(id)
            .arg()
            .ok_or_else(|| self.unsupported(id, "argument without an index"))
    }

    /// Immediate bits of the constant node `id`.
    pub(crate) fn immediate(&self, id: NodeId) -> LegalizeResult<u128> {
        self.node(id)
            .imm()
            .ok_or_else(|| self.unsupported(id, "constant without an immediate"))
    }

    /// Type of result `slot` of `id`.
    pub(crate) fn result_type(&self, id: NodeId, slot: u32) -> ValueType {
        self.node(id).results[slot as usize]
    }

    /// Clears the bits of `value` above the width of `from`.
    pub(crate) fn zero_extend_in_reg(&mut self, value: SdValue, from: ValueType) -> SdValue {
        let vt = self.value_type(value);
        if from.size_in_bits() >= vt.size_in_bits() {
            return value;
        }
        let mask = self.constant(mask_bits(from.size_in_bits()), vt);
        self.binary(Opcode::And, value, mask)
    }

    /// Replicates bit `from.size_in_bits() - 1` of `value` into the bits above it.
    pub(crate) fn sign_extend_in_reg(&mut self, value: SdValue, from: ValueType) -> SdValue {
        let vt = self.value_type(value);
        let shift = vt.size_in_bits().saturating_sub(from.size_in_bits());
        if shift == 0 {
            return value;
        }
        let amount = self.constant(u128::from(shift), vt);
        let shifted = self.binary(Opcode::Shl, value, amount);
        self.binary(Opcode::Sra, shifted, amount)
    }

    /// The promoted form of `value` with its high bits cleared.
    pub(crate) fn zext_promoted(&mut self, value: SdValue) -> LegalizeResult<SdValue> {
        let from = self.value_type(value);
        let promoted = self.get_promoted_integer(value)?;
        Ok(self.zero_extend_in_reg(promoted, from))
    }

    /// The promoted form of `value` with its high bits sign filled.
    pub(crate) fn sext_promoted(&mut self, value: SdValue) -> LegalizeResult<SdValue> {
        let from = self.value_type(value);
        let promoted = self.get_promoted_integer(value)?;
        Ok(self.sign_extend_in_reg(promoted, from))
    }

    fn resize(&mut self, value: SdValue, vt: ValueType, extend: Opcode) -> SdValue {
        let from = self.value_type(value);
        if from == vt {
            value
        } else if from.size_in_bits() < vt.size_in_bits() {
            self.cast(extend, value, vt)
        } else {
            self.cast(Opcode::Truncate, value, vt)
        }
    }

    pub(crate) fn zext_or_trunc(&mut self, value: SdValue, vt: ValueType) -> SdValue {
        self.resize(value, vt, Opcode::ZeroExtend)
    }

    pub(crate) fn sext_or_trunc(&mut self, value: SdValue, vt: ValueType) -> SdValue {
        self.resize(value, vt, Opcode::SignExtend)
    }

    pub(crate) fn any_ext_or_trunc(&mut self, value: SdValue, vt: ValueType) -> SdValue {
        self.resize(value, vt, Opcode::AnyExtend)
    }

    /// `value` reinterpreted as `vt`, or `value` itself when it already has
    /// that type.
    pub(crate) fn bitcast_to(&mut self, value: SdValue, vt: ValueType) -> SdValue {
        if self.value_type(value) == vt {
            value
        } else {
            self.cast(Opcode::Bitcast, value, vt)
        }
    }

    /// Low and high `half` parts of the integer `value`, as new nodes that
    /// are legalized like any other.
    pub(crate) fn split_integer(&mut self, value: SdValue, half: ValueType) -> (SdValue, SdValue) {
        let vt = self.value_type(value);
        let lo = self.cast(Opcode::Truncate, value, half);
        let amount = self.constant(u128::from(half.size_in_bits()), vt);
        let shifted = self.binary(Opcode::Srl, value, amount);
        let hi = self.cast(Opcode::Truncate, shifted, half);
        (lo, hi)
    }

    /// `zext(lo) | (hi << width(lo))` at the integer type `vt`.
    pub(crate) fn join_integer_halves(&mut self, lo: SdValue, hi: SdValue, vt: ValueType) -> SdValue {
        let half_bits = self.value_type(lo).size_in_bits();
        let lo = self.zext_or_trunc(lo, vt);
        let hi = self.any_ext_or_trunc(hi, vt);
        let amount = self.constant(u128::from(half_bits), vt);
        let hi = self.binary(Opcode::Shl, hi, amount);
        self.binary(Opcode::Or, lo, hi)
    }

    /// A copy of the `Output` node `id` that observes `parts` in place of
    /// operand `operand`.
    ///
    /// The observed width of the replaced operand is handed out to the parts
    /// in order, each taking at most its own size.
    pub(crate) fn rewrite_output(
        &mut self,
        id: NodeId,
        operand: u32,
        parts: &[SdValue],
    ) -> OperandRewrite {
        let widths = self.node(id).widths().map(<[u32]>::to_vec).unwrap_or_default();
        let operands = self.operands(id);

        let mut new_operands: SmallVec<[SdValue; 3]> = SmallVec::new();
        let mut new_widths = Vec::with_capacity(operands.len() + parts.len());
        for (index, value) in operands.iter().enumerate() {
            let width = widths
                .get(index)
                .copied()
                .unwrap_or_else(|| self.value_type(*value).size_in_bits());
            if index == operand as usize {
                let mut remaining = width;
                for part in parts {
                    let taken = remaining.min(self.value_type(*part).size_in_bits());
                    new_operands.push(*part);
                    new_widths.push(taken);
                    remaining -= taken;
                }
            } else {
                new_operands.push(*value);
                new_widths.push(width);
            }
        }
        OperandRewrite::Node(self.get_node(
            Opcode::Output,
            &new_operands,
            &[],
            NodeAttr::Widths(new_widths),
        ))
    }
}
