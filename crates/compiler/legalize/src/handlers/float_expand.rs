//! Double-double floats split into their `f64` halves.
//!
//! The low half lives in the low 64 bits of the 128-bit pattern.

use seldag_compiler_dag::{NodeId, Opcode, SdValue, ValueType};

use super::{HandlerTable, OperandRewrite};
use crate::action::LegalizeAction;
use crate::error::LegalizeResult;
use crate::legalizer::TypeLegalizer;

pub(crate) fn register(table: &mut HandlerTable) {
    let action = LegalizeAction::ExpandFloat;
    table.add_result(action, Opcode::Argument, expand_argument);
    table.add_result(action, Opcode::ConstantFp, expand_constant);
    table.add_result(action, Opcode::Undef, expand_undef);
    table.add_result(action, Opcode::FNeg, expand_fneg);
    table.add_result(action, Opcode::Select, expand_select);

    table.add_operand(action, Opcode::FpRound, expand_op_fp_round);
    table.add_operand(action, Opcode::Output, expand_op_output);
}

fn part_type(lz: &TypeLegalizer<'_>, id: NodeId, slot: u32) -> ValueType {
    lz.transform_to(lz.result_type(id, slot))
}

fn expand_argument(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let part = part_type(lz, id, slot);
    let (index, offset) = lz.argument_slot(id)?;
    let lo = lz.argument(index, offset, part);
    let hi = lz.argument(index, offset + part.size_in_bits(), part);
    lz.set_expanded_float(SdValue::new(id, slot), lo, hi)
}

fn expand_constant(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let part = part_type(lz, id, slot);
    let bits = lz.immediate(id)?;
    let lo = lz.constant_fp(bits, part);
    let hi = lz.constant_fp(bits >> part.size_in_bits(), part);
    lz.set_expanded_float(SdValue::new(id, slot), lo, hi)
}

fn expand_undef(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let part = part_type(lz, id, slot);
    let lo = lz.undef(part);
    let hi = lz.undef(part);
    lz.set_expanded_float(SdValue::new(id, slot), lo, hi)
}

// -(hi + lo) == -hi + -lo, exactly.
fn expand_fneg(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let value = lz.operand(id, 0);
    let (lo, hi) = lz.get_expanded_float(value)?;
    let lo = lz.unary(Opcode::FNeg, lo);
    let hi = lz.unary(Opcode::FNeg, hi);
    lz.set_expanded_float(SdValue::new(id, slot), lo, hi)
}

fn expand_select(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let cond = lz.operand(id, 0);
    let (if_true, if_false) = (lz.operand(id, 1), lz.operand(id, 2));
    let (tl, th) = lz.get_expanded_float(if_true)?;
    let (fl, fh) = lz.get_expanded_float(if_false)?;
    let lo = lz.select(cond, tl, fl);
    let hi = lz.select(cond, th, fh);
    lz.set_expanded_float(SdValue::new(id, slot), lo, hi)
}

/// Rounding to the part type is the sum of the parts.
fn expand_op_fp_round(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    _operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let vt = lz.result_type(id, 0);
    let value = lz.operand(id, 0);
    let (lo, hi) = lz.get_expanded_float(value)?;
    if lz.value_type(hi) != vt {
        return Err(lz.unsupported(id, "rounding below the part type"));
    }
    Ok(OperandRewrite::Value(lz.binary(Opcode::FAdd, hi, lo)))
}

fn expand_op_output(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let value = lz.operand(id, operand);
    let (lo, hi) = lz.get_expanded_float(value)?;
    Ok(lz.rewrite_output(id, operand, &[lo, hi]))
}
