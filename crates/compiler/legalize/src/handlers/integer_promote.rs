//! Promotion of narrow integers into a wider legal register.
//!
//! A promoted value only defines the bits of the original type; the bits
//! above are unspecified. Handlers that depend on them (right shifts,
//! division, comparisons, bit counts) extend in register first.

use seldag_compiler_dag::{NodeId, Opcode, SdValue, ValueType};

use super::{HandlerTable, OperandRewrite};
use crate::action::LegalizeAction;
use crate::error::{LegalizeError, LegalizeResult};
use crate::legalizer::TypeLegalizer;

pub(crate) fn register(table: &mut HandlerTable) {
    let action = LegalizeAction::PromoteInteger;
    table.add_result(action, Opcode::Argument, promote_argument);
    table.add_result(action, Opcode::Constant, promote_constant);
    table.add_result(action, Opcode::Undef, promote_undef);
    for opcode in [
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::And,
        Opcode::Or,
        Opcode::Xor,
    ] {
        table.add_result(action, opcode, promote_low_bits_binary);
    }
    table.add_result(action, Opcode::Shl, promote_shl);
    table.add_result(action, Opcode::Srl, promote_srl);
    table.add_result(action, Opcode::Sra, promote_sra);
    table.add_result(action, Opcode::UDiv, promote_udiv);
    table.add_result(action, Opcode::SDiv, promote_sdiv);
    table.add_result(action, Opcode::Ctpop, promote_ctpop);
    table.add_result(action, Opcode::Ctlz, promote_ctlz);
    table.add_result(action, Opcode::Cttz, promote_cttz);
    table.add_result(action, Opcode::SetCc, promote_setcc);
    table.add_result(action, Opcode::Select, promote_select);
    table.add_result(action, Opcode::Truncate, promote_truncate);
    table.add_result(action, Opcode::ZeroExtend, promote_zero_extend);
    table.add_result(action, Opcode::SignExtend, promote_sign_extend);
    table.add_result(action, Opcode::AnyExtend, promote_any_extend);
    table.add_result(action, Opcode::ExtractElement, promote_extract_element);
    table.add_result(action, Opcode::Bitcast, promote_bitcast);
    table.add_result(action, Opcode::BuildPair, promote_build_pair);

    table.add_operand(action, Opcode::SetCc, promote_op_setcc);
    table.add_operand(action, Opcode::Select, promote_op_select);
    table.add_operand(action, Opcode::ZeroExtend, promote_op_zero_extend);
    table.add_operand(action, Opcode::SignExtend, promote_op_sign_extend);
    table.add_operand(action, Opcode::AnyExtend, promote_op_any_extend);
    table.add_operand(action, Opcode::BuildPair, promote_op_build_pair);
    table.add_operand(action, Opcode::BuildVector, promote_op_build_vector);
    table.add_operand(action, Opcode::InsertElement, promote_op_insert_element);
    table.add_operand(action, Opcode::ExtractElement, promote_op_extract_element);
    table.add_operand(action, Opcode::Output, promote_op_output);
}

// --- Results ---

fn promote_argument(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let nvt = lz.transform_to(lz.result_type(id, slot));
    let (index, offset) = lz.argument_slot(id)?;
    let promoted = lz.argument(index, offset, nvt);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

fn promote_constant(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let nvt = lz.transform_to(lz.result_type(id, slot));
    let bits = lz.immediate(id)?;
    let promoted = lz.constant(bits, nvt);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

fn promote_undef(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let nvt = lz.transform_to(lz.result_type(id, slot));
    let promoted = lz.undef(nvt);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

/// Operations whose low bits only depend on the low bits of the inputs.
fn promote_low_bits_binary(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let opcode = lz.node(id).opcode;
    let (lhs, rhs) = (lz.operand(id, 0), lz.operand(id, 1));
    let lhs = lz.get_promoted_integer(lhs)?;
    let rhs = lz.get_promoted_integer(rhs)?;
    let promoted = lz.binary(opcode, lhs, rhs);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

// The shift amount is zero extended so an amount past the original width
// still shifts every original bit out.

fn promote_shl(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (value, amount) = (lz.operand(id, 0), lz.operand(id, 1));
    let value = lz.get_promoted_integer(value)?;
    let amount = lz.zext_promoted(amount)?;
    let promoted = lz.binary(Opcode::Shl, value, amount);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

fn promote_srl(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (value, amount) = (lz.operand(id, 0), lz.operand(id, 1));
    let value = lz.zext_promoted(value)?;
    let amount = lz.zext_promoted(amount)?;
    let promoted = lz.binary(Opcode::Srl, value, amount);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

fn promote_sra(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (value, amount) = (lz.operand(id, 0), lz.operand(id, 1));
    let value = lz.sext_promoted(value)?;
    let amount = lz.zext_promoted(amount)?;
    let promoted = lz.binary(Opcode::Sra, value, amount);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

fn promote_udiv(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (lhs, rhs) = (lz.operand(id, 0), lz.operand(id, 1));
    let lhs = lz.zext_promoted(lhs)?;
    let rhs = lz.zext_promoted(rhs)?;
    let promoted = lz.binary(Opcode::UDiv, lhs, rhs);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

fn promote_sdiv(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (lhs, rhs) = (lz.operand(id, 0), lz.operand(id, 1));
    let lhs = lz.sext_promoted(lhs)?;
    let rhs = lz.sext_promoted(rhs)?;
    let promoted = lz.binary(Opcode::SDiv, lhs, rhs);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

fn promote_ctpop(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let value = lz.operand(id, 0);
    let value = lz.zext_promoted(value)?;
    let promoted = lz.unary(Opcode::Ctpop, value);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

fn promote_ctlz(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let value = lz.operand(id, 0);
    let old_bits = lz.value_type(value).size_in_bits();
    let value = lz.zext_promoted(value)?;
    let nvt = lz.value_type(value);
    // The zero-extended value has `new - old` extra leading zeros.
    let count = lz.unary(Opcode::Ctlz, value);
    let extra = lz.constant(u128::from(nvt.size_in_bits() - old_bits), nvt);
    let promoted = lz.binary(Opcode::Sub, count, extra);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

/// A bit just above the original width stops the count there when every
/// original bit is clear.
fn promote_cttz(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let value = lz.operand(id, 0);
    let old_bits = lz.value_type(value).size_in_bits();
    let value = lz.get_promoted_integer(value)?;
    let nvt = lz.value_type(value);
    let stop = lz.constant(1u128 << old_bits, nvt);
    let value = lz.binary(Opcode::Or, value, stop);
    let promoted = lz.unary(Opcode::Cttz, value);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

/// The comparison is rebuilt with a wide result; illegal operands are left
/// for the operand handlers of the new node.
fn promote_setcc(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let nvt = lz.transform_to(lz.result_type(id, slot));
    let cc = lz
        .node(id)
        .cond()
        .ok_or_else(|| lz.unsupported(id, "setcc without a predicate"))?;
    let (lhs, rhs) = (lz.operand(id, 0), lz.operand(id, 1));
    let svt = lz.target().setcc_result_type(lz.value_type(lhs));
    let compare = lz.setcc(lhs, rhs, cc, svt);
    let promoted = lz.zext_or_trunc(compare, nvt);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

fn promote_select(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let cond = lz.operand(id, 0);
    let (if_true, if_false) = (lz.operand(id, 1), lz.operand(id, 2));
    let if_true = lz.get_promoted_integer(if_true)?;
    let if_false = lz.get_promoted_integer(if_false)?;
    let promoted = lz.select(cond, if_true, if_false);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

fn promote_truncate(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let nvt = lz.transform_to(lz.result_type(id, slot));
    let value = lz.operand(id, 0);
    let vt = lz.value_type(value);
    let source = match lz.action(vt) {
        LegalizeAction::Legal => value,
        LegalizeAction::PromoteInteger => lz.get_promoted_integer(value)?,
        LegalizeAction::ExpandInteger => lz.get_expanded_integer(value)?.0,
        action => return Err(LegalizeError::UnsupportedType { vt, action }),
    };
    let promoted = lz.any_ext_or_trunc(source, nvt);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

/// How an extension fills the bits above its operand.
#[derive(Clone, Copy)]
enum Fill {
    Zero,
    Sign,
    Any,
}

/// The operand of an extension at the width `nvt`, filled per `fill`.
fn extend_operand(
    lz: &mut TypeLegalizer<'_>,
    value: SdValue,
    nvt: ValueType,
    fill: Fill,
) -> LegalizeResult<SdValue> {
    let vt = lz.value_type(value);
    let source = match (lz.action(vt), fill) {
        (LegalizeAction::Legal, _) => value,
        (LegalizeAction::PromoteInteger, Fill::Zero) => lz.zext_promoted(value)?,
        (LegalizeAction::PromoteInteger, Fill::Sign) => lz.sext_promoted(value)?,
        (LegalizeAction::PromoteInteger, Fill::Any) => lz.get_promoted_integer(value)?,
        (action, _) => return Err(LegalizeError::UnsupportedType { vt, action }),
    };
    Ok(match fill {
        Fill::Zero => lz.zext_or_trunc(source, nvt),
        Fill::Sign => lz.sext_or_trunc(source, nvt),
        Fill::Any => lz.any_ext_or_trunc(source, nvt),
    })
}

fn promote_extension(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    slot: u32,
    fill: Fill,
) -> LegalizeResult<()> {
    let nvt = lz.transform_to(lz.result_type(id, slot));
    let value = lz.operand(id, 0);
    let promoted = extend_operand(lz, value, nvt, fill)?;
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

fn promote_zero_extend(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    promote_extension(lz, id, slot, Fill::Zero)
}

fn promote_sign_extend(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    promote_extension(lz, id, slot, Fill::Sign)
}

fn promote_any_extend(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    promote_extension(lz, id, slot, Fill::Any)
}

/// The lane is read straight into the wider type; the vector itself is
/// left for the operand handlers of the new node.
fn promote_extract_element(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    slot: u32,
) -> LegalizeResult<()> {
    let nvt = lz.transform_to(lz.result_type(id, slot));
    let (vector, index) = (lz.operand(id, 0), lz.operand(id, 1));
    let promoted = lz.extract_element_as(vector, index, nvt);
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

/// A narrow integer reinterpreting a one-lane vector or a split vector.
fn promote_bitcast(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let vt = lz.result_type(id, slot);
    let nvt = lz.transform_to(vt);
    let source = lz.operand(id, 0);
    let promoted = match lz.action(lz.value_type(source)) {
        LegalizeAction::Scalarize => {
            let element = lz.get_scalarized_vector(source)?;
            let element = lz.bitcast_to(element, vt);
            lz.any_ext_or_trunc(element, nvt)
        }
        LegalizeAction::Split => {
            let (lo, hi) = lz.get_split_vector(source)?;
            let Some(half) = ValueType::integer_of_bits(vt.size_in_bits() / 2) else {
                return Err(lz.unsupported(id, "bitcast result has no integer halves"));
            };
            let lo = lz.bitcast_to(lo, half);
            let hi = lz.bitcast_to(hi, half);
            lz.join_integer_halves(lo, hi, nvt)
        }
        _ => return Err(lz.unsupported(id, "bitcast source is neither scalarized nor split")),
    };
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

fn promote_build_pair(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let nvt = lz.transform_to(lz.result_type(id, slot));
    let promoted = join_pair_operands(lz, id, nvt)?;
    lz.set_promoted_integer(SdValue::new(id, slot), promoted)
}

// --- Operands ---

/// Both sides are extended the way the predicate reads them.
fn promote_op_setcc(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    _operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let vt = lz.result_type(id, 0);
    let cc = lz
        .node(id)
        .cond()
        .ok_or_else(|| lz.unsupported(id, "setcc without a predicate"))?;
    let (lhs, rhs) = (lz.operand(id, 0), lz.operand(id, 1));
    let (lhs, rhs) = if cc.is_signed() {
        (lz.sext_promoted(lhs)?, lz.sext_promoted(rhs)?)
    } else {
        (lz.zext_promoted(lhs)?, lz.zext_promoted(rhs)?)
    };
    Ok(OperandRewrite::Value(lz.setcc(lhs, rhs, cc, vt)))
}

fn promote_op_select(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    operand: u32,
) -> LegalizeResult<OperandRewrite> {
    if operand != 0 {
        return Err(lz.unsupported(id, "only the condition of a legal select can be promoted"));
    }
    let cond = lz.operand(id, 0);
    let cond = lz.zext_promoted(cond)?;
    let (if_true, if_false) = (lz.operand(id, 1), lz.operand(id, 2));
    Ok(OperandRewrite::Value(lz.select(cond, if_true, if_false)))
}

fn promote_op_extension(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    fill: Fill,
) -> LegalizeResult<OperandRewrite> {
    let vt = lz.result_type(id, 0);
    let value = lz.operand(id, 0);
    Ok(OperandRewrite::Value(extend_operand(lz, value, vt, fill)?))
}

fn promote_op_zero_extend(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    _operand: u32,
) -> LegalizeResult<OperandRewrite> {
    promote_op_extension(lz, id, Fill::Zero)
}

fn promote_op_sign_extend(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    _operand: u32,
) -> LegalizeResult<OperandRewrite> {
    promote_op_extension(lz, id, Fill::Sign)
}

fn promote_op_any_extend(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    _operand: u32,
) -> LegalizeResult<OperandRewrite> {
    promote_op_extension(lz, id, Fill::Any)
}

/// The halves of the `BuildPair` node `id` joined as `zext(lo) | (hi << half)`
/// at the integer type `int`. Promoted halves are read through their
/// promoted form.
fn join_pair_operands(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    int: ValueType,
) -> LegalizeResult<SdValue> {
    let (lo, hi) = (lz.operand(id, 0), lz.operand(id, 1));
    let half_bits = lz.value_type(lo).size_in_bits();
    let lo = match lz.action(lz.value_type(lo)) {
        LegalizeAction::PromoteInteger => lz.zext_promoted(lo)?,
        _ => lo,
    };
    let hi = match lz.action(lz.value_type(hi)) {
        LegalizeAction::PromoteInteger => lz.get_promoted_integer(hi)?,
        _ => hi,
    };
    let lo = lz.zext_or_trunc(lo, int);
    let hi = lz.any_ext_or_trunc(hi, int);
    let amount = lz.constant(u128::from(half_bits), int);
    let hi = lz.binary(Opcode::Shl, hi, amount);
    Ok(lz.binary(Opcode::Or, lo, hi))
}

/// `build_pair lo, hi` with a legal result. A float result is joined as the
/// integer of its width and reinterpreted.
fn promote_op_build_pair(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    _operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let vt = lz.result_type(id, 0);
    let Some(int) = ValueType::integer_of_bits(vt.size_in_bits()) else {
        return Err(lz.unsupported(id, "pair result has no integer of its width"));
    };
    let joined = join_pair_operands(lz, id, int)?;
    Ok(OperandRewrite::Value(lz.bitcast_to(joined, vt)))
}

fn promote_op_output(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let value = lz.operand(id, operand);
    let promoted = lz.get_promoted_integer(value)?;
    Ok(lz.rewrite_output(id, operand, &[promoted]))
}

/// Lanes truncate what they are given, so the promoted elements can be used
/// as they are.
fn promote_op_build_vector(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    _operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let vt = lz.result_type(id, 0);
    let mut elements = lz.operands(id);
    for element in elements.iter_mut() {
        if lz.action(lz.value_type(*element)) == LegalizeAction::PromoteInteger {
            *element = lz.get_promoted_integer(*element)?;
        }
    }
    Ok(OperandRewrite::Value(lz.build_vector(&elements, vt)))
}

fn promote_op_insert_element(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let (vector, mut element, mut index) = (lz.operand(id, 0), lz.operand(id, 1), lz.operand(id, 2));
    match operand {
        1 => element = lz.get_promoted_integer(element)?,
        2 => {
            let vt = lz.target().vector_index_type();
            let promoted = lz.zext_promoted(index)?;
            index = lz.zext_or_trunc(promoted, vt);
        }
        _ => return Err(lz.unsupported(id, "a legal vector cannot be promoted")),
    }
    Ok(OperandRewrite::Value(lz.insert_element(vector, element, index)))
}

/// Only the index can be promoted here; an illegal lane type makes the
/// result illegal too and is handled as a result.
fn promote_op_extract_element(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    operand: u32,
) -> LegalizeResult<OperandRewrite> {
    if operand != 1 {
        return Err(lz.unsupported(id, "only the index of an extract can be promoted"));
    }
    let vt = lz.result_type(id, 0);
    let (vector, index) = (lz.operand(id, 0), lz.operand(id, 1));
    let index_type = lz.target().vector_index_type();
    let promoted = lz.zext_promoted(index)?;
    let index = lz.zext_or_trunc(promoted, index_type);
    Ok(OperandRewrite::Value(lz.extract_element_as(vector, index, vt)))
}
