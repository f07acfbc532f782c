//! One-lane vectors replaced by their only element.

use seldag_compiler_dag::{NodeId, Opcode, SdValue, ValueType};

use super::{HandlerTable, OperandRewrite, LANEWISE_BINARY, LANEWISE_UNARY};
use crate::action::LegalizeAction;
use crate::error::LegalizeResult;
use crate::legalizer::TypeLegalizer;

pub(crate) fn register(table: &mut HandlerTable) {
    let action = LegalizeAction::Scalarize;
    table.add_result(action, Opcode::Argument, scalarize_argument);
    table.add_result(action, Opcode::Undef, scalarize_undef);
    for opcode in LANEWISE_UNARY {
        table.add_result(action, opcode, scalarize_unary);
    }
    for opcode in LANEWISE_BINARY {
        table.add_result(action, opcode, scalarize_binary);
    }
    table.add_result(action, Opcode::Select, scalarize_select);
    table.add_result(action, Opcode::BuildVector, scalarize_build_vector);
    table.add_result(action, Opcode::InsertElement, scalarize_insert_element);
    table.add_result(action, Opcode::VectorShuffle, scalarize_shuffle);
    table.add_result(action, Opcode::Bitcast, scalarize_bitcast);

    table.add_operand(action, Opcode::ExtractElement, scalarize_op_extract_element);
    table.add_operand(action, Opcode::Bitcast, scalarize_op_bitcast);
    table.add_operand(action, Opcode::Output, scalarize_op_output);
}

fn element_type(lz: &TypeLegalizer<'_>, id: NodeId, slot: u32) -> ValueType {
    lz.result_type(id, slot).scalar_type()
}

fn scalarize_argument(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let elt = element_type(lz, id, slot);
    let (index, offset) = lz.argument_slot(id)?;
    let element = lz.argument(index, offset, elt);
    lz.set_scalarized_vector(SdValue::new(id, slot), element)
}

fn scalarize_undef(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let elt = element_type(lz, id, slot);
    let element = lz.undef(elt);
    lz.set_scalarized_vector(SdValue::new(id, slot), element)
}

fn scalarize_unary(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let opcode = lz.node(id).opcode;
    let value = lz.operand(id, 0);
    let value = lz.get_scalarized_vector(value)?;
    let element = lz.unary(opcode, value);
    lz.set_scalarized_vector(SdValue::new(id, slot), element)
}

fn scalarize_binary(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let opcode = lz.node(id).opcode;
    let (lhs, rhs) = (lz.operand(id, 0), lz.operand(id, 1));
    let lhs = lz.get_scalarized_vector(lhs)?;
    let rhs = lz.get_scalarized_vector(rhs)?;
    let element = lz.binary(opcode, lhs, rhs);
    lz.set_scalarized_vector(SdValue::new(id, slot), element)
}

fn scalarize_select(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let cond = lz.operand(id, 0);
    let (if_true, if_false) = (lz.operand(id, 1), lz.operand(id, 2));
    let if_true = lz.get_scalarized_vector(if_true)?;
    let if_false = lz.get_scalarized_vector(if_false)?;
    let element = lz.select(cond, if_true, if_false);
    lz.set_scalarized_vector(SdValue::new(id, slot), element)
}

fn scalarize_build_vector(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let element = lz.operand(id, 0);
    lz.set_scalarized_vector(SdValue::new(id, slot), element)
}

/// The only lane is overwritten, whatever the index.
fn scalarize_insert_element(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    slot: u32,
) -> LegalizeResult<()> {
    let element = lz.operand(id, 1);
    lz.set_scalarized_vector(SdValue::new(id, slot), element)
}

fn scalarize_shuffle(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let elt = element_type(lz, id, slot);
    let lane = lz.node(id).mask().and_then(|mask| mask.first().copied().flatten());
    let element = match lane {
        None => lz.undef(elt),
        Some(lane) => {
            let (lhs, rhs) = (lz.operand(id, 0), lz.operand(id, 1));
            let lhs_lanes = lz.value_type(lhs).vector_num_elements();
            let (source, lane) = if lane < lhs_lanes {
                (lhs, lane)
            } else {
                (rhs, lane - lhs_lanes)
            };
            if lz.action(lz.value_type(source)) == LegalizeAction::Scalarize {
                lz.get_scalarized_vector(source)?
            } else {
                lz.extract_lane(source, lane)
            }
        }
    };
    lz.set_scalarized_vector(SdValue::new(id, slot), element)
}

fn scalarize_bitcast(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let elt = element_type(lz, id, slot);
    let source = lz.operand(id, 0);
    let source = match lz.action(lz.value_type(source)) {
        LegalizeAction::Scalarize => lz.get_scalarized_vector(source)?,
        _ => source,
    };
    let element = lz.bitcast_to(source, elt);
    lz.set_scalarized_vector(SdValue::new(id, slot), element)
}

fn scalarize_op_extract_element(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    operand: u32,
) -> LegalizeResult<OperandRewrite> {
    if operand != 0 {
        return Err(lz.unsupported(id, "extract index cannot be scalarized"));
    }
    let vt = lz.result_type(id, 0);
    let vector = lz.operand(id, 0);
    let element = lz.get_scalarized_vector(vector)?;
    Ok(OperandRewrite::Value(lz.any_ext_or_trunc(element, vt)))
}

fn scalarize_op_bitcast(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    _operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let vt = lz.result_type(id, 0);
    let source = lz.operand(id, 0);
    let element = lz.get_scalarized_vector(source)?;
    Ok(OperandRewrite::Value(lz.bitcast_to(element, vt)))
}

fn scalarize_op_output(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let value = lz.operand(id, operand);
    let element = lz.get_scalarized_vector(value)?;
    Ok(lz.rewrite_output(id, operand, &[element]))
}
