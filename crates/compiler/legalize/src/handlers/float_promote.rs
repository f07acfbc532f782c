//! Floats carried as the integer of the same width.
//!
//! Only operations that act on the bit pattern (sign manipulation, moves,
//! reinterpretation) are lowered; arithmetic has no integer counterpart.

use seldag_compiler_dag::{NodeId, Opcode, SdValue, ValueType};

use super::{HandlerTable, OperandRewrite};
use crate::action::LegalizeAction;
use crate::error::LegalizeResult;
use crate::legalizer::TypeLegalizer;

pub(crate) fn register(table: &mut HandlerTable) {
    let action = LegalizeAction::PromoteFloat;
    table.add_result(action, Opcode::Argument, soften_argument);
    table.add_result(action, Opcode::ConstantFp, soften_constant);
    table.add_result(action, Opcode::Undef, soften_undef);
    table.add_result(action, Opcode::FNeg, soften_fneg);
    table.add_result(action, Opcode::FAbs, soften_fabs);
    table.add_result(action, Opcode::FCopySign, soften_copysign);
    table.add_result(action, Opcode::Select, soften_select);
    table.add_result(action, Opcode::Bitcast, soften_bitcast);
    table.add_result(action, Opcode::BuildPair, soften_build_pair);
    table.add_result(action, Opcode::ExtractElement, soften_extract_element);

    table.add_operand(action, Opcode::Bitcast, soften_op_bitcast);
    table.add_operand(action, Opcode::Output, soften_op_output);
}

fn soften_argument(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let nvt = lz.transform_to(lz.result_type(id, slot));
    let (index, offset) = lz.argument_slot(id)?;
    let promoted = lz.argument(index, offset, nvt);
    lz.set_promoted_float(SdValue::new(id, slot), promoted)
}

fn soften_constant(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let nvt = lz.transform_to(lz.result_type(id, slot));
    let bits = lz.immediate(id)?;
    let promoted = lz.constant(bits, nvt);
    lz.set_promoted_float(SdValue::new(id, slot), promoted)
}

fn soften_undef(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let nvt = lz.transform_to(lz.result_type(id, slot));
    let promoted = lz.undef(nvt);
    lz.set_promoted_float(SdValue::new(id, slot), promoted)
}

/// The sign bit of the integer carrying `value`.
fn sign_bit(lz: &mut TypeLegalizer<'_>, value: SdValue) -> SdValue {
    let vt = lz.value_type(value);
    lz.constant(1u128 << (vt.size_in_bits() - 1), vt)
}

/// Every bit but the sign.
fn magnitude_bits(lz: &mut TypeLegalizer<'_>, value: SdValue) -> SdValue {
    let vt = lz.value_type(value);
    lz.constant(vt.bit_mask() >> 1, vt)
}

fn soften_fneg(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let value = lz.operand(id, 0);
    let value = lz.get_promoted_float(value)?;
    let sign = sign_bit(lz, value);
    let promoted = lz.binary(Opcode::Xor, value, sign);
    lz.set_promoted_float(SdValue::new(id, slot), promoted)
}

fn soften_fabs(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let value = lz.operand(id, 0);
    let value = lz.get_promoted_float(value)?;
    let magnitude = magnitude_bits(lz, value);
    let promoted = lz.binary(Opcode::And, value, magnitude);
    lz.set_promoted_float(SdValue::new(id, slot), promoted)
}

fn soften_copysign(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (magnitude, sign) = (lz.operand(id, 0), lz.operand(id, 1));
    let magnitude = lz.get_promoted_float(magnitude)?;
    let sign = lz.get_promoted_float(sign)?;
    if lz.value_type(magnitude) != lz.value_type(sign) {
        return Err(lz.unsupported(id, "copysign operands of different widths"));
    }
    let magnitude_mask = magnitude_bits(lz, magnitude);
    let sign_mask = sign_bit(lz, sign);
    let magnitude = lz.binary(Opcode::And, magnitude, magnitude_mask);
    let sign = lz.binary(Opcode::And, sign, sign_mask);
    let promoted = lz.binary(Opcode::Or, magnitude, sign);
    lz.set_promoted_float(SdValue::new(id, slot), promoted)
}

fn soften_select(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let cond = lz.operand(id, 0);
    let (if_true, if_false) = (lz.operand(id, 1), lz.operand(id, 2));
    let if_true = lz.get_promoted_float(if_true)?;
    let if_false = lz.get_promoted_float(if_false)?;
    let promoted = lz.select(cond, if_true, if_false);
    lz.set_promoted_float(SdValue::new(id, slot), promoted)
}

/// A bitcast into a promoted float is the source bits at the integer type.
/// A source of another type is recast to that integer, which is legalized
/// on its own.
fn soften_bitcast(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let nvt = lz.transform_to(lz.result_type(id, slot));
    let value = lz.operand(id, 0);
    let promoted = lz.bitcast_to(value, nvt);
    lz.set_promoted_float(SdValue::new(id, slot), promoted)
}

/// The halves are joined as an integer of the float's width.
/// The lane is read from the vector reinterpreted with integer lanes of the
/// same width.
fn soften_extract_element(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    slot: u32,
) -> LegalizeResult<()> {
    let nvt = lz.transform_to(lz.result_type(id, slot));
    let (vector, index) = (lz.operand(id, 0), lz.operand(id, 1));
    let vt = lz.value_type(vector);
    let Some(lanes) = ValueType::integer_of_bits(vt.scalar_size_in_bits())
        .and_then(|int| ValueType::vector_of(int, vt.vector_num_elements()))
    else {
        return Err(lz.unsupported(id, "no integer vector of the same lane width"));
    };
    let vector = lz.bitcast_to(vector, lanes);
    let promoted = lz.extract_element_as(vector, index, nvt);
    lz.set_promoted_float(SdValue::new(id, slot), promoted)
}

fn soften_build_pair(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let nvt = lz.transform_to(lz.result_type(id, slot));
    let (lo, hi) = (lz.operand(id, 0), lz.operand(id, 1));
    let promoted = lz.build_pair(lo, hi, nvt);
    lz.set_promoted_float(SdValue::new(id, slot), promoted)
}

fn soften_op_bitcast(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    _operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let vt = lz.result_type(id, 0);
    let value = lz.operand(id, 0);
    let promoted = lz.get_promoted_float(value)?;
    Ok(OperandRewrite::Value(lz.bitcast_to(promoted, vt)))
}

fn soften_op_output(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let value = lz.operand(id, operand);
    let promoted = lz.get_promoted_float(value)?;
    Ok(lz.rewrite_output(id, operand, &[promoted]))
}
