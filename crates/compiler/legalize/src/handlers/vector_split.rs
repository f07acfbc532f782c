//! Vectors divided into a low and a high half of equal length.

use itertools::Itertools;
use seldag_compiler_dag::{NodeId, Opcode, SdValue, ValueType};
use smallvec::SmallVec;

use super::{HandlerTable, OperandRewrite, LANEWISE_BINARY, LANEWISE_UNARY};
use crate::action::LegalizeAction;
use crate::error::LegalizeResult;
use crate::legalizer::TypeLegalizer;

pub(crate) fn register(table: &mut HandlerTable) {
    let action = LegalizeAction::Split;
    table.add_result(action, Opcode::Argument, split_argument);
    table.add_result(action, Opcode::Undef, split_undef);
    for opcode in LANEWISE_UNARY {
        table.add_result(action, opcode, split_unary);
    }
    for opcode in LANEWISE_BINARY {
        table.add_result(action, opcode, split_binary);
    }
    table.add_result(action, Opcode::Select, split_select);
    table.add_result(action, Opcode::BuildVector, split_build_vector);
    table.add_result(action, Opcode::ConcatVectors, split_concat_vectors);
    table.add_result(action, Opcode::InsertElement, split_insert_element);
    table.add_result(action, Opcode::VectorShuffle, split_shuffle);
    table.add_result(action, Opcode::Bitcast, split_bitcast);
    table.add_result(action, Opcode::BuildPair, split_build_pair);

    table.add_operand(action, Opcode::ExtractElement, split_op_extract_element);
    table.add_operand(action, Opcode::Bitcast, split_op_bitcast);
    table.add_operand(action, Opcode::VectorShuffle, split_op_shuffle);
    table.add_operand(action, Opcode::Output, split_op_output);
}

fn half_of(lz: &TypeLegalizer<'_>, id: NodeId, slot: u32) -> (ValueType, u32) {
    let half = lz.transform_to(lz.result_type(id, slot));
    (half, half.vector_num_elements())
}

fn set_halves(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    slot: u32,
    (lo, hi): (SdValue, SdValue),
) -> LegalizeResult<()> {
    lz.set_split_vector(SdValue::new(id, slot), lo, hi)
}

fn split_argument(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, _) = half_of(lz, id, slot);
    let (index, offset) = lz.argument_slot(id)?;
    let lo = lz.argument(index, offset, half);
    let hi = lz.argument(index, offset + half.size_in_bits(), half);
    set_halves(lz, id, slot, (lo, hi))
}

fn split_undef(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, _) = half_of(lz, id, slot);
    let lo = lz.undef(half);
    let hi = lz.undef(half);
    set_halves(lz, id, slot, (lo, hi))
}

fn split_unary(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let opcode = lz.node(id).opcode;
    let value = lz.operand(id, 0);
    let (lo, hi) = lz.get_split_vector(value)?;
    let lo = lz.unary(opcode, lo);
    let hi = lz.unary(opcode, hi);
    set_halves(lz, id, slot, (lo, hi))
}

fn split_binary(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let opcode = lz.node(id).opcode;
    let (lhs, rhs) = (lz.operand(id, 0), lz.operand(id, 1));
    let (ll, lh) = lz.get_split_vector(lhs)?;
    let (rl, rh) = lz.get_split_vector(rhs)?;
    let lo = lz.binary(opcode, ll, rl);
    let hi = lz.binary(opcode, lh, rh);
    set_halves(lz, id, slot, (lo, hi))
}

fn split_select(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let cond = lz.operand(id, 0);
    if lz.value_type(cond).is_vector() {
        return Err(lz.unsupported(id, "lane-wise select conditions are not split"));
    }
    let (if_true, if_false) = (lz.operand(id, 1), lz.operand(id, 2));
    let (tl, th) = lz.get_split_vector(if_true)?;
    let (fl, fh) = lz.get_split_vector(if_false)?;
    let lo = lz.select(cond, tl, fl);
    let hi = lz.select(cond, th, fh);
    set_halves(lz, id, slot, (lo, hi))
}

fn split_build_vector(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, lanes) = half_of(lz, id, slot);
    let elements = lz.operands(id);
    if elements.len() != 2 * lanes as usize {
        return Err(lz.unsupported(id, "element count differs from the lane count"));
    }
    let (lo, hi) = elements.split_at(lanes as usize);
    let lo = lz.build_vector(lo, half);
    let hi = lz.build_vector(hi, half);
    set_halves(lz, id, slot, (lo, hi))
}

fn split_concat_vectors(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, _) = half_of(lz, id, slot);
    let (lo, hi) = (lz.operand(id, 0), lz.operand(id, 1));
    if lz.value_type(lo) != half || lz.value_type(hi) != half {
        return Err(lz.unsupported(id, "concatenated inputs are not the split halves"));
    }
    set_halves(lz, id, slot, (lo, hi))
}

/// Only constant indices are supported: the half receiving the element
/// must be known.
fn split_insert_element(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (_, lanes) = half_of(lz, id, slot);
    let (vector, element, index) = (lz.operand(id, 0), lz.operand(id, 1), lz.operand(id, 2));
    let Some(position) = lz.constant_value(index) else {
        return Err(lz.unsupported(id, "insert at a variable index"));
    };
    let lanes = u128::from(lanes);
    if position >= 2 * lanes {
        return Err(lz.unsupported(id, "insert index out of range"));
    }
    let (mut lo, mut hi) = lz.get_split_vector(vector)?;
    let index_type = lz.value_type(index);
    if position < lanes {
        let index = lz.constant(position, index_type);
        lo = lz.insert_element(lo, element, index);
    } else {
        let index = lz.constant(position - lanes, index_type);
        hi = lz.insert_element(hi, element, index);
    }
    set_halves(lz, id, slot, (lo, hi))
}

/// Each output half draws from the four input quarters.
fn split_shuffle(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let vt = lz.result_type(id, slot);
    let (half, lanes) = half_of(lz, id, slot);
    let (lhs, rhs) = (lz.operand(id, 0), lz.operand(id, 1));
    if lz.value_type(lhs) != vt || lz.value_type(rhs) != vt {
        return Err(lz.unsupported(id, "shuffle inputs differ from the result type"));
    }
    let (mask, quarters) = shuffle_quarters(lz, id, lhs, rhs)?;
    if mask.len() != 2 * lanes as usize {
        return Err(lz.unsupported(id, "shuffle mask length differs from the result"));
    }
    let lo = select_from_quarters(lz, &quarters, &mask[..lanes as usize], half);
    let hi = select_from_quarters(lz, &quarters, &mask[lanes as usize..], half);
    set_halves(lz, id, slot, (lo, hi))
}

/// The mask of the shuffle `id` and the split halves of both inputs, in
/// lane order.
fn shuffle_quarters(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    lhs: SdValue,
    rhs: SdValue,
) -> LegalizeResult<(Vec<Option<u32>>, [SdValue; 4])> {
    let mask: Vec<Option<u32>> = lz
        .node(id)
        .mask()
        .map(<[Option<u32>]>::to_vec)
        .ok_or_else(|| lz.unsupported(id, "shuffle without a mask"))?;
    let (ll, lh) = lz.get_split_vector(lhs)?;
    let (rl, rh) = lz.get_split_vector(rhs)?;
    let lanes = lz.value_type(ll).vector_num_elements();
    if mask.iter().flatten().any(|lane| *lane >= 4 * lanes) {
        return Err(lz.unsupported(id, "shuffle mask reads past its inputs"));
    }
    Ok((mask, [ll, lh, rl, rh]))
}

/// The `vt` vector whose lanes are `mask` indices into the concatenated
/// quarters. Reading at most two quarters stays a shuffle; anything wider
/// is rebuilt lane by lane.
fn select_from_quarters(
    lz: &mut TypeLegalizer<'_>,
    quarters: &[SdValue; 4],
    mask: &[Option<u32>],
    vt: ValueType,
) -> SdValue {
    let lanes = lz.value_type(quarters[0]).vector_num_elements();
    let used: SmallVec<[u32; 4]> = mask
        .iter()
        .flatten()
        .map(|lane| lane / lanes)
        .unique()
        .collect();
    match used.as_slice() {
        [] => lz.undef(vt),
        [first, rest @ ..] if rest.len() <= 1 => {
            let second = rest.first().copied().unwrap_or(*first);
            let remapped = mask
                .iter()
                .map(|lane| {
                    lane.map(|lane| {
                        let base = if lane / lanes == *first { 0 } else { lanes };
                        base + lane % lanes
                    })
                })
                .collect();
            lz.shuffle(
                quarters[*first as usize],
                quarters[second as usize],
                remapped,
                vt,
            )
        }
        _ => {
            let elt = vt.scalar_type();
            let elements: SmallVec<[SdValue; 8]> = mask
                .iter()
                .map(|lane| match lane {
                    Some(lane) => {
                        lz.extract_lane(quarters[(lane / lanes) as usize], lane % lanes)
                    }
                    None => lz.undef(elt),
                })
                .collect();
            lz.build_vector(&elements, vt)
        }
    }
}

/// Halves of a vector assembled from two values of half its width.
fn split_build_pair(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, _) = half_of(lz, id, slot);
    let (lo, hi) = (lz.operand(id, 0), lz.operand(id, 1));
    let half_bits = half.size_in_bits();
    if [lo, hi]
        .iter()
        .any(|part| lz.value_type(*part).size_in_bits() != half_bits)
    {
        return Err(lz.unsupported(id, "pair halves differ from the split halves"));
    }
    let lo = lz.bitcast_to(lo, half);
    let hi = lz.bitcast_to(hi, half);
    set_halves(lz, id, slot, (lo, hi))
}

fn split_bitcast(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, _) = half_of(lz, id, slot);
    let source = lz.operand(id, 0);
    let (lo, hi) = source_halves(lz, id, source)?;
    if lz.value_type(lo).size_in_bits() != half.size_in_bits() {
        return Err(lz.unsupported(id, "bitcast source halves differ in width"));
    }
    let lo = lz.bitcast_to(lo, half);
    let hi = lz.bitcast_to(hi, half);
    set_halves(lz, id, slot, (lo, hi))
}

/// The low and high halves of the bits of `source`, in whatever form its
/// own legalization left them.
fn source_halves(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    source: SdValue,
) -> LegalizeResult<(SdValue, SdValue)> {
    let vt = lz.value_type(source);
    match lz.action(vt) {
        LegalizeAction::Split => lz.get_split_vector(source),
        LegalizeAction::ExpandInteger => lz.get_expanded_integer(source),
        LegalizeAction::ExpandFloat => lz.get_expanded_float(source),
        LegalizeAction::Legal if vt.is_vector() => {
            let (Some(part), lanes) = (vt.half_vector(), vt.vector_num_elements()) else {
                return Err(lz.unsupported(id, "bitcast source has no half vector"));
            };
            let mut halves: SmallVec<[SdValue; 2]> = SmallVec::new();
            for range in [0..lanes / 2, lanes / 2..lanes] {
                let elements: SmallVec<[SdValue; 8]> =
                    range.map(|lane| lz.extract_lane(source, lane)).collect();
                halves.push(lz.build_vector(&elements, part));
            }
            Ok((halves[0], halves[1]))
        }
        LegalizeAction::PromoteInteger => {
            let promoted = lz.get_promoted_integer(source)?;
            integer_halves(lz, id, promoted, vt.size_in_bits())
        }
        LegalizeAction::PromoteFloat => {
            let promoted = lz.get_promoted_float(source)?;
            integer_halves(lz, id, promoted, vt.size_in_bits())
        }
        LegalizeAction::Scalarize => {
            let element = lz.get_scalarized_vector(source)?;
            integer_halves(lz, id, element, vt.size_in_bits())
        }
        LegalizeAction::Legal => integer_halves(lz, id, source, vt.size_in_bits()),
    }
}

/// Splits the low `bits` bits of `value` as two integers of half that width.
fn integer_halves(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    value: SdValue,
    bits: u32,
) -> LegalizeResult<(SdValue, SdValue)> {
    let vt = lz.value_type(value);
    let (Some(int), Some(half)) = (
        ValueType::integer_of_bits(vt.size_in_bits()),
        ValueType::integer_of_bits(bits / 2),
    ) else {
        return Err(lz.unsupported(id, "bitcast source has no integer halves"));
    };
    let value = lz.bitcast_to(value, int);
    Ok(lz.split_integer(value, half))
}

fn split_op_extract_element(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    operand: u32,
) -> LegalizeResult<OperandRewrite> {
    if operand != 0 {
        return Err(lz.unsupported(id, "extract index cannot be split"));
    }
    let (vector, index) = (lz.operand(id, 0), lz.operand(id, 1));
    let Some(position) = lz.constant_value(index) else {
        return Err(lz.unsupported(id, "extract at a variable index"));
    };
    let (lo, hi) = lz.get_split_vector(vector)?;
    let lanes = u128::from(lz.value_type(lo).vector_num_elements());
    if position >= 2 * lanes {
        return Err(lz.unsupported(id, "extract index out of range"));
    }
    let index_type = lz.value_type(index);
    let (part, position) = if position < lanes {
        (lo, position)
    } else {
        (hi, position - lanes)
    };
    let index = lz.constant(position, index_type);
    let vt = lz.result_type(id, 0);
    Ok(OperandRewrite::Value(lz.extract_element_as(part, index, vt)))
}

/// A legal scalar result is joined from the halves as integers; a legal
/// vector result is rebuilt lane by lane from the halves recast to its half
/// vector.
fn split_op_bitcast(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    _operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let vt = lz.result_type(id, 0);
    let source = lz.operand(id, 0);
    let (lo, hi) = lz.get_split_vector(source)?;
    if !vt.is_vector() {
        let (Some(int), Some(half)) = (
            ValueType::integer_of_bits(vt.size_in_bits()),
            ValueType::integer_of_bits(vt.size_in_bits() / 2),
        ) else {
            return Err(lz.unsupported(id, "bitcast result has no integer halves"));
        };
        let lo = lz.bitcast_to(lo, half);
        let hi = lz.bitcast_to(hi, half);
        let joined = lz.join_integer_halves(lo, hi, int);
        return Ok(OperandRewrite::Value(lz.bitcast_to(joined, vt)));
    }
    let Some(half) = vt.half_vector() else {
        return Err(lz.unsupported(id, "bitcast result has no half vector"));
    };
    let mut elements: SmallVec<[SdValue; 8]> = SmallVec::new();
    for part in [lo, hi] {
        let part = lz.bitcast_to(part, half);
        for lane in 0..half.vector_num_elements() {
            elements.push(lz.extract_lane(part, lane));
        }
    }
    Ok(OperandRewrite::Value(lz.build_vector(&elements, vt)))
}

/// A legal shuffle result selecting lanes from split inputs.
fn split_op_shuffle(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    _operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let vt = lz.result_type(id, 0);
    let (lhs, rhs) = (lz.operand(id, 0), lz.operand(id, 1));
    if lz.value_type(lhs) != lz.value_type(rhs) {
        return Err(lz.unsupported(id, "shuffle inputs differ in type"));
    }
    let (mask, quarters) = shuffle_quarters(lz, id, lhs, rhs)?;
    if mask.len() != vt.vector_num_elements() as usize {
        return Err(lz.unsupported(id, "shuffle mask length differs from the result"));
    }
    Ok(OperandRewrite::Value(select_from_quarters(lz, &quarters, &mask, vt)))
}

fn split_op_output(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let value = lz.operand(id, operand);
    let (lo, hi) = lz.get_split_vector(value)?;
    Ok(lz.rewrite_output(id, operand, &[lo, hi]))
}
