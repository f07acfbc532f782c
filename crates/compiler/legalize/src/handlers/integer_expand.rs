//! Expansion of wide integers into a `(lo, hi)` pair of half-width parts.

use seldag_compiler_dag::{CondCode, NodeId, Opcode, SdValue, ValueType};

use super::{HandlerTable, OperandRewrite};
use crate::action::LegalizeAction;
use crate::error::{LegalizeError, LegalizeResult};
use crate::legalizer::TypeLegalizer;

pub(crate) fn register(table: &mut HandlerTable) {
    let action = LegalizeAction::ExpandInteger;
    table.add_result(action, Opcode::Argument, expand_argument);
    table.add_result(action, Opcode::Constant, expand_constant);
    table.add_result(action, Opcode::Undef, expand_undef);
    for opcode in [Opcode::And, Opcode::Or, Opcode::Xor] {
        table.add_result(action, opcode, expand_bitwise);
    }
    table.add_result(action, Opcode::Add, expand_add);
    table.add_result(action, Opcode::Sub, expand_sub);
    table.add_result(action, Opcode::Mul, expand_mul);
    table.add_result(action, Opcode::MulHiU, expand_mul_hi);
    for opcode in [Opcode::Shl, Opcode::Srl, Opcode::Sra] {
        table.add_result(action, opcode, expand_shift);
    }
    table.add_result(action, Opcode::UDiv, expand_udiv);
    table.add_result(action, Opcode::SDiv, expand_sdiv);
    table.add_result(action, Opcode::Ctpop, expand_ctpop);
    table.add_result(action, Opcode::Ctlz, expand_ctlz);
    table.add_result(action, Opcode::Cttz, expand_cttz);
    table.add_result(action, Opcode::Select, expand_select);
    table.add_result(action, Opcode::ZeroExtend, expand_zero_extend);
    table.add_result(action, Opcode::SignExtend, expand_sign_extend);
    table.add_result(action, Opcode::AnyExtend, expand_any_extend);
    table.add_result(action, Opcode::Truncate, expand_truncate);
    table.add_result(action, Opcode::BuildPair, expand_build_pair);
    table.add_result(action, Opcode::Bitcast, expand_bitcast);
    table.add_result(action, Opcode::ExtractElement, expand_extract_element);

    table.add_operand(action, Opcode::Truncate, expand_op_truncate);
    table.add_operand(action, Opcode::SetCc, expand_op_setcc);
    table.add_operand(action, Opcode::Select, expand_op_select);
    table.add_operand(action, Opcode::Bitcast, expand_op_bitcast);
    table.add_operand(action, Opcode::Output, expand_op_output);
}

/// The half type of result `slot` and its width.
fn half_of(lz: &TypeLegalizer<'_>, id: NodeId, slot: u32) -> (ValueType, u32) {
    let half = lz.transform_to(lz.result_type(id, slot));
    (half, half.size_in_bits())
}

fn set_parts(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    slot: u32,
    (lo, hi): (SdValue, SdValue),
) -> LegalizeResult<()> {
    lz.set_expanded_integer(SdValue::new(id, slot), lo, hi)
}

fn expanded_operands(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
) -> LegalizeResult<((SdValue, SdValue), (SdValue, SdValue))> {
    let (lhs, rhs) = (lz.operand(id, 0), lz.operand(id, 1));
    Ok((lz.get_expanded_integer(lhs)?, lz.get_expanded_integer(rhs)?))
}

// --- Results ---

fn expand_argument(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, bits) = half_of(lz, id, slot);
    let (index, offset) = lz.argument_slot(id)?;
    let lo = lz.argument(index, offset, half);
    let hi = lz.argument(index, offset + bits, half);
    set_parts(lz, id, slot, (lo, hi))
}

fn expand_constant(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, bits) = half_of(lz, id, slot);
    let imm = lz.immediate(id)?;
    let lo = lz.constant(imm, half);
    let hi = lz.constant(imm >> bits, half);
    set_parts(lz, id, slot, (lo, hi))
}

fn expand_undef(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, _) = half_of(lz, id, slot);
    let lo = lz.undef(half);
    let hi = lz.undef(half);
    set_parts(lz, id, slot, (lo, hi))
}

fn expand_bitwise(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let opcode = lz.node(id).opcode;
    let ((al, ah), (bl, bh)) = expanded_operands(lz, id)?;
    let lo = lz.binary(opcode, al, bl);
    let hi = lz.binary(opcode, ah, bh);
    set_parts(lz, id, slot, (lo, hi))
}

/// `(a < b) as half`, unsigned.
fn unsigned_less(lz: &mut TypeLegalizer<'_>, a: SdValue, b: SdValue) -> SdValue {
    let half = lz.value_type(a);
    let svt = lz.target().setcc_result_type(half);
    let less = lz.setcc(a, b, CondCode::Ult, svt);
    lz.zext_or_trunc(less, half)
}

fn expand_add(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let ((al, ah), (bl, bh)) = expanded_operands(lz, id)?;
    let lo = lz.binary(Opcode::Add, al, bl);
    // The low sum wrapped iff it is below either addend.
    let carry = unsigned_less(lz, lo, al);
    let hi = lz.binary(Opcode::Add, ah, bh);
    let hi = lz.binary(Opcode::Add, hi, carry);
    set_parts(lz, id, slot, (lo, hi))
}

fn expand_sub(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let ((al, ah), (bl, bh)) = expanded_operands(lz, id)?;
    let lo = lz.binary(Opcode::Sub, al, bl);
    let borrow = unsigned_less(lz, al, bl);
    let hi = lz.binary(Opcode::Sub, ah, bh);
    let hi = lz.binary(Opcode::Sub, hi, borrow);
    set_parts(lz, id, slot, (lo, hi))
}

/// `lo = al * bl`, `hi = mulhu(al, bl) + al * bh + ah * bl`.
fn expand_mul(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let ((al, ah), (bl, bh)) = expanded_operands(lz, id)?;
    let lo = lz.binary(Opcode::Mul, al, bl);
    let carry = lz.binary(Opcode::MulHiU, al, bl);
    let cross_lo = lz.binary(Opcode::Mul, al, bh);
    let cross_hi = lz.binary(Opcode::Mul, ah, bl);
    let hi = lz.binary(Opcode::Add, carry, cross_lo);
    let hi = lz.binary(Opcode::Add, hi, cross_hi);
    set_parts(lz, id, slot, (lo, hi))
}

/// `x + y` and its carry out, as a half-width 0 or 1.
fn add_with_carry(lz: &mut TypeLegalizer<'_>, x: SdValue, y: SdValue) -> (SdValue, SdValue) {
    let sum = lz.binary(Opcode::Add, x, y);
    let carry = unsigned_less(lz, sum, x);
    (sum, carry)
}

/// High half of the double-width product, schoolbook over the four
/// cross products of the parts. Limbs 0..4 of the product are `ll`, then
/// the column sums with their carries; the result is limbs 2 and 3.
fn expand_mul_hi(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let ((al, ah), (bl, bh)) = expanded_operands(lz, id)?;
    let ll_hi = lz.binary(Opcode::MulHiU, al, bl);
    let lh_lo = lz.binary(Opcode::Mul, al, bh);
    let lh_hi = lz.binary(Opcode::MulHiU, al, bh);
    let hl_lo = lz.binary(Opcode::Mul, ah, bl);
    let hl_hi = lz.binary(Opcode::MulHiU, ah, bl);
    let hh_lo = lz.binary(Opcode::Mul, ah, bh);
    let hh_hi = lz.binary(Opcode::MulHiU, ah, bh);

    let (column, c0) = add_with_carry(lz, ll_hi, lh_lo);
    let (_, c1) = add_with_carry(lz, column, hl_lo);
    let carry_in = lz.binary(Opcode::Add, c0, c1);

    let (column, c2) = add_with_carry(lz, lh_hi, hl_hi);
    let (column, c3) = add_with_carry(lz, column, hh_lo);
    let (lo, c4) = add_with_carry(lz, column, carry_in);
    let carry_out = lz.binary(Opcode::Add, c2, c3);
    let carry_out = lz.binary(Opcode::Add, carry_out, c4);
    // The full product fits, so the top limb cannot overflow.
    let hi = lz.binary(Opcode::Add, hh_hi, carry_out);
    set_parts(lz, id, slot, (lo, hi))
}

fn expand_shift(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let opcode = lz.node(id).opcode;
    let (value, amount) = (lz.operand(id, 0), lz.operand(id, 1));
    let parts = lz.get_expanded_integer(value)?;
    let parts = match lz.constant_value(amount) {
        Some(amount) => shift_by_constant(lz, opcode, parts, amount),
        None => shift_by_value(lz, id, opcode, parts, amount)?,
    };
    set_parts(lz, id, slot, parts)
}

fn shift_by_constant(
    lz: &mut TypeLegalizer<'_>,
    opcode: Opcode,
    (lo, hi): (SdValue, SdValue),
    amount: u128,
) -> (SdValue, SdValue) {
    let half = lz.value_type(lo);
    let bits = u128::from(half.size_in_bits());
    let zero = lz.constant(0, half);
    if amount == 0 {
        return (lo, hi);
    }
    if opcode == Opcode::Sra {
        let sign_amount = lz.constant(bits - 1, half);
        let sign = lz.binary(Opcode::Sra, hi, sign_amount);
        return if amount >= 2 * bits {
            (sign, sign)
        } else if amount > bits {
            let shift = lz.constant(amount - bits, half);
            (lz.binary(Opcode::Sra, hi, shift), sign)
        } else if amount == bits {
            (hi, sign)
        } else {
            let lo = funnel_right(lz, lo, hi, amount, bits);
            let shift = lz.constant(amount, half);
            (lo, lz.binary(Opcode::Sra, hi, shift))
        };
    }
    if amount >= 2 * bits {
        return (zero, zero);
    }
    match opcode {
        Opcode::Shl if amount > bits => {
            let shift = lz.constant(amount - bits, half);
            (zero, lz.binary(Opcode::Shl, lo, shift))
        }
        Opcode::Shl if amount == bits => (zero, lo),
        Opcode::Shl => {
            let shift = lz.constant(amount, half);
            let back = lz.constant(bits - amount, half);
            let new_lo = lz.binary(Opcode::Shl, lo, shift);
            let carried = lz.binary(Opcode::Srl, lo, back);
            let new_hi = lz.binary(Opcode::Shl, hi, shift);
            (new_lo, lz.binary(Opcode::Or, new_hi, carried))
        }
        _ if amount > bits => {
            let shift = lz.constant(amount - bits, half);
            (lz.binary(Opcode::Srl, hi, shift), zero)
        }
        _ if amount == bits => (hi, zero),
        _ => {
            let lo = funnel_right(lz, lo, hi, amount, bits);
            let shift = lz.constant(amount, half);
            (lo, lz.binary(Opcode::Srl, hi, shift))
        }
    }
}

/// Low part of a right shift by `0 < amount < bits`.
fn funnel_right(
    lz: &mut TypeLegalizer<'_>,
    lo: SdValue,
    hi: SdValue,
    amount: u128,
    bits: u128,
) -> SdValue {
    let half = lz.value_type(lo);
    let shift = lz.constant(amount, half);
    let back = lz.constant(bits - amount, half);
    let low = lz.binary(Opcode::Srl, lo, shift);
    let carried = lz.binary(Opcode::Shl, hi, back);
    lz.binary(Opcode::Or, low, carried)
}

/// Low part of the shift amount in the half type and, when the amount is
/// itself expanded, its high part.
fn shift_amount(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    amount: SdValue,
    half: ValueType,
) -> LegalizeResult<(SdValue, Option<SdValue>)> {
    let vt = lz.value_type(amount);
    let narrow = |lz: &TypeLegalizer<'_>, value: SdValue| {
        lz.value_type(value).size_in_bits() <= half.size_in_bits()
    };
    match lz.action(vt) {
        LegalizeAction::ExpandInteger => {
            let (lo, hi) = lz.get_expanded_integer(amount)?;
            if lz.value_type(lo) != half {
                return Err(lz.unsupported(id, "shift amount parts differ from the value parts"));
            }
            Ok((lo, Some(hi)))
        }
        LegalizeAction::Legal if narrow(lz, amount) => Ok((lz.zext_or_trunc(amount, half), None)),
        LegalizeAction::PromoteInteger => {
            let promoted = lz.zext_promoted(amount)?;
            if !narrow(lz, promoted) {
                return Err(lz.unsupported(id, "promoted shift amount is wider than the parts"));
            }
            Ok((lz.zext_or_trunc(promoted, half), None))
        }
        _ => Err(lz.unsupported(id, "shift amount is wider than the parts")),
    }
}

/// Shift by a value only known at run time: both the in-range and the
/// cross-part results are built and selected between.
fn shift_by_value(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    opcode: Opcode,
    (lo, hi): (SdValue, SdValue),
    amount: SdValue,
) -> LegalizeResult<(SdValue, SdValue)> {
    let half = lz.value_type(lo);
    let bits = u128::from(half.size_in_bits());
    let svt = lz.target().setcc_result_type(half);
    let (amount, amount_hi) = shift_amount(lz, id, amount, half)?;

    let zero = lz.constant(0, half);
    let width = lz.constant(bits, half);
    let double_width = lz.constant(2 * bits, half);
    let small = lz.setcc(amount, width, CondCode::Ult, svt);
    let mut overflow = lz.setcc(amount, double_width, CondCode::Uge, svt);
    if let Some(amount_hi) = amount_hi {
        let high_set = lz.setcc(amount_hi, zero, CondCode::Ne, svt);
        overflow = lz.binary(Opcode::Or, overflow, high_set);
    }
    // A zero amount makes `inverse` the full width, which shifts to zero.
    let inverse = lz.binary(Opcode::Sub, width, amount);
    let past_half = lz.binary(Opcode::Sub, amount, width);

    let (small_parts, big_parts, fill) = match opcode {
        Opcode::Shl => {
            let small_lo = lz.binary(Opcode::Shl, lo, amount);
            let shifted_hi = lz.binary(Opcode::Shl, hi, amount);
            let carried = lz.binary(Opcode::Srl, lo, inverse);
            let small_hi = lz.binary(Opcode::Or, shifted_hi, carried);
            let big_hi = lz.binary(Opcode::Shl, lo, past_half);
            ((small_lo, small_hi), (zero, big_hi), (zero, zero))
        }
        Opcode::Srl | Opcode::Sra => {
            let shifted_lo = lz.binary(Opcode::Srl, lo, amount);
            let carried = lz.binary(Opcode::Shl, hi, inverse);
            let small_lo = lz.binary(Opcode::Or, shifted_lo, carried);
            let small_hi = lz.binary(opcode, hi, amount);
            let big_lo = lz.binary(opcode, hi, past_half);
            let fill = if opcode == Opcode::Sra {
                let sign_amount = lz.constant(bits - 1, half);
                lz.binary(Opcode::Sra, hi, sign_amount)
            } else {
                zero
            };
            ((small_lo, small_hi), (big_lo, fill), (fill, fill))
        }
        _ => return Err(lz.unsupported(id, "not a shift")),
    };

    let lo = lz.select(small, small_parts.0, big_parts.0);
    let lo = lz.select(overflow, fill.0, lo);
    let hi = lz.select(small, small_parts.1, big_parts.1);
    let hi = lz.select(overflow, fill.1, hi);
    Ok((lo, hi))
}

/// Restoring long division over the wide type. Every node it emits is
/// itself wide and gets expanded in turn.
fn unsigned_divide(lz: &mut TypeLegalizer<'_>, dividend: SdValue, divisor: SdValue) -> SdValue {
    let vt = lz.value_type(dividend);
    let bits = vt.size_in_bits();
    let svt = lz.target().setcc_result_type(vt);
    let zero = lz.constant(0, vt);
    let one = lz.constant(1, vt);
    let top_shift = lz.constant(u128::from(bits - 1), vt);

    let mut remainder = zero;
    let mut quotient = zero;
    for bit in (0..bits).rev() {
        let carried_out = lz.binary(Opcode::Srl, remainder, top_shift);
        let position = lz.constant(u128::from(bit), vt);
        let next = lz.binary(Opcode::Srl, dividend, position);
        let next = lz.binary(Opcode::And, next, one);
        let doubled = lz.binary(Opcode::Shl, remainder, one);
        remainder = lz.binary(Opcode::Or, doubled, next);

        let overflowed = lz.setcc(carried_out, zero, CondCode::Ne, svt);
        let large = lz.setcc(remainder, divisor, CondCode::Uge, svt);
        let fits = lz.binary(Opcode::Or, overflowed, large);
        let reduced = lz.binary(Opcode::Sub, remainder, divisor);
        remainder = lz.select(fits, reduced, remainder);
        let place = lz.constant(1u128 << bit, vt);
        let digit = lz.select(fits, place, zero);
        quotient = lz.binary(Opcode::Or, quotient, digit);
    }
    quotient
}

fn expand_udiv(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, _) = half_of(lz, id, slot);
    let (lhs, rhs) = (lz.operand(id, 0), lz.operand(id, 1));
    let quotient = unsigned_divide(lz, lhs, rhs);
    let parts = lz.split_integer(quotient, half);
    set_parts(lz, id, slot, parts)
}

/// `|a| / |b|`, negated when the signs differ.
fn expand_sdiv(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let vt = lz.result_type(id, slot);
    let (half, _) = half_of(lz, id, slot);
    let svt = lz.target().setcc_result_type(vt);
    let (lhs, rhs) = (lz.operand(id, 0), lz.operand(id, 1));
    let zero = lz.constant(0, vt);

    let magnitude = |lz: &mut TypeLegalizer<'_>, value: SdValue| {
        let negative = lz.setcc(value, zero, CondCode::Slt, svt);
        let negated = lz.binary(Opcode::Sub, zero, value);
        (negative, lz.select(negative, negated, value))
    };
    let (lhs_negative, lhs_abs) = magnitude(lz, lhs);
    let (rhs_negative, rhs_abs) = magnitude(lz, rhs);

    let quotient = lz.binary(Opcode::UDiv, lhs_abs, rhs_abs);
    let flip = lz.binary(Opcode::Xor, lhs_negative, rhs_negative);
    let negated = lz.binary(Opcode::Sub, zero, quotient);
    let result = lz.select(flip, negated, quotient);
    let parts = lz.split_integer(result, half);
    set_parts(lz, id, slot, parts)
}

fn expand_ctpop(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, _) = half_of(lz, id, slot);
    let value = lz.operand(id, 0);
    let (lo, hi) = lz.get_expanded_integer(value)?;
    let lo = lz.unary(Opcode::Ctpop, lo);
    let hi = lz.unary(Opcode::Ctpop, hi);
    let count = lz.binary(Opcode::Add, lo, hi);
    let zero = lz.constant(0, half);
    set_parts(lz, id, slot, (count, zero))
}

fn expand_ctlz(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, bits) = half_of(lz, id, slot);
    let svt = lz.target().setcc_result_type(half);
    let value = lz.operand(id, 0);
    let (lo, hi) = lz.get_expanded_integer(value)?;
    let zero = lz.constant(0, half);
    let hi_is_zero = lz.setcc(hi, zero, CondCode::Eq, svt);
    let lo_count = lz.unary(Opcode::Ctlz, lo);
    let width = lz.constant(u128::from(bits), half);
    let lo_count = lz.binary(Opcode::Add, lo_count, width);
    let hi_count = lz.unary(Opcode::Ctlz, hi);
    let count = lz.select(hi_is_zero, lo_count, hi_count);
    set_parts(lz, id, slot, (count, zero))
}

fn expand_cttz(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, bits) = half_of(lz, id, slot);
    let svt = lz.target().setcc_result_type(half);
    let value = lz.operand(id, 0);
    let (lo, hi) = lz.get_expanded_integer(value)?;
    let zero = lz.constant(0, half);
    let lo_is_zero = lz.setcc(lo, zero, CondCode::Eq, svt);
    let hi_count = lz.unary(Opcode::Cttz, hi);
    let width = lz.constant(u128::from(bits), half);
    let hi_count = lz.binary(Opcode::Add, hi_count, width);
    let lo_count = lz.unary(Opcode::Cttz, lo);
    let count = lz.select(lo_is_zero, hi_count, lo_count);
    set_parts(lz, id, slot, (count, zero))
}

fn expand_select(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let cond = lz.operand(id, 0);
    let (if_true, if_false) = (lz.operand(id, 1), lz.operand(id, 2));
    let (tl, th) = lz.get_expanded_integer(if_true)?;
    let (fl, fh) = lz.get_expanded_integer(if_false)?;
    let lo = lz.select(cond, tl, fl);
    let hi = lz.select(cond, th, fh);
    set_parts(lz, id, slot, (lo, hi))
}

fn expand_zero_extend(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, _) = half_of(lz, id, slot);
    let value = lz.operand(id, 0);
    let lo = lz.zext_or_trunc(value, half);
    let hi = lz.constant(0, half);
    set_parts(lz, id, slot, (lo, hi))
}

fn expand_sign_extend(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, bits) = half_of(lz, id, slot);
    let value = lz.operand(id, 0);
    let lo = lz.sext_or_trunc(value, half);
    let sign_amount = lz.constant(u128::from(bits - 1), half);
    let hi = lz.binary(Opcode::Sra, lo, sign_amount);
    set_parts(lz, id, slot, (lo, hi))
}

fn expand_any_extend(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, _) = half_of(lz, id, slot);
    let value = lz.operand(id, 0);
    let lo = lz.any_ext_or_trunc(value, half);
    let hi = lz.undef(half);
    set_parts(lz, id, slot, (lo, hi))
}

fn expand_truncate(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, _) = half_of(lz, id, slot);
    let value = lz.operand(id, 0);
    let parts = lz.split_integer(value, half);
    set_parts(lz, id, slot, parts)
}

fn expand_build_pair(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, _) = half_of(lz, id, slot);
    let (lo, hi) = (lz.operand(id, 0), lz.operand(id, 1));
    if lz.value_type(lo) != half || lz.value_type(hi) != half {
        let vt = lz.result_type(id, slot);
        return Err(LegalizeError::UnsupportedType {
            vt,
            action: LegalizeAction::ExpandInteger,
        });
    }
    set_parts(lz, id, slot, (lo, hi))
}

fn expand_bitcast(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, _) = half_of(lz, id, slot);
    let value = lz.operand(id, 0);
    let source = lz.value_type(value);
    let parts = match lz.action(source) {
        LegalizeAction::PromoteFloat => {
            let promoted = lz.get_promoted_float(value)?;
            lz.split_integer(promoted, half)
        }
        LegalizeAction::Scalarize => {
            let vt = lz.result_type(id, slot);
            let element = lz.get_scalarized_vector(value)?;
            let element = lz.bitcast_to(element, vt);
            lz.split_integer(element, half)
        }
        LegalizeAction::Legal
            if source.vector_num_elements() == 2
                && source.scalar_size_in_bits() == half.size_in_bits() =>
        {
            let lo = lz.extract_lane(value, 0);
            let hi = lz.extract_lane(value, 1);
            (lz.bitcast_to(lo, half), lz.bitcast_to(hi, half))
        }
        action @ (LegalizeAction::ExpandFloat | LegalizeAction::Split) => {
            let (lo, hi) = if action == LegalizeAction::ExpandFloat {
                lz.get_expanded_float(value)?
            } else {
                lz.get_split_vector(value)?
            };
            if lz.value_type(lo).size_in_bits() != half.size_in_bits() {
                return Err(lz.unsupported(id, "bitcast parts differ in width"));
            }
            (lz.cast(Opcode::Bitcast, lo, half), lz.cast(Opcode::Bitcast, hi, half))
        }
        _ => return Err(lz.unsupported(id, "bitcast source cannot be split")),
    };
    set_parts(lz, id, slot, parts)
}

/// Reads the two halves of the lane as adjacent lanes of the same vector
/// reinterpreted with half-width lanes.
fn expand_extract_element(lz: &mut TypeLegalizer<'_>, id: NodeId, slot: u32) -> LegalizeResult<()> {
    let (half, _) = half_of(lz, id, slot);
    let (vector, index) = (lz.operand(id, 0), lz.operand(id, 1));
    let vt = lz.value_type(vector);
    let Some(wide) = ValueType::vector_of(half, 2 * vt.vector_num_elements()) else {
        return Err(lz.unsupported(id, "no vector of the expanded lane type"));
    };
    let lanes = lz.cast(Opcode::Bitcast, vector, wide);
    let index_type = lz.value_type(index);
    let (lo_index, hi_index) = match lz.constant_value(index) {
        Some(position) => (
            lz.constant(2 * position, index_type),
            lz.constant(2 * position + 1, index_type),
        ),
        None => {
            let one = lz.constant(1, index_type);
            let doubled = lz.binary(Opcode::Shl, index, one);
            (doubled, lz.binary(Opcode::Add, doubled, one))
        }
    };
    let lo = lz.extract_element(lanes, lo_index);
    let hi = lz.extract_element(lanes, hi_index);
    set_parts(lz, id, slot, (lo, hi))
}

// --- Operands ---

fn expand_op_truncate(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    _operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let vt = lz.result_type(id, 0);
    let value = lz.operand(id, 0);
    let (lo, _) = lz.get_expanded_integer(value)?;
    Ok(OperandRewrite::Value(lz.any_ext_or_trunc(lo, vt)))
}

/// Equality compares the folded difference against zero; orderings compare
/// the high parts and fall back to an unsigned low compare on a tie.
fn expand_op_setcc(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    _operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let vt = lz.result_type(id, 0);
    let cc = lz
        .node(id)
        .cond()
        .ok_or_else(|| lz.unsupported(id, "setcc without a predicate"))?;
    let ((al, ah), (bl, bh)) = expanded_operands(lz, id)?;
    let half = lz.value_type(al);

    if cc.is_equality() {
        let lo = lz.binary(Opcode::Xor, al, bl);
        let hi = lz.binary(Opcode::Xor, ah, bh);
        let diff = lz.binary(Opcode::Or, lo, hi);
        let zero = lz.constant(0, half);
        return Ok(OperandRewrite::Value(lz.setcc(diff, zero, cc, vt)));
    }

    let svt = lz.target().setcc_result_type(half);
    let lo_cmp = lz.setcc(al, bl, cc.to_unsigned(), svt);
    let hi_cmp = lz.setcc(ah, bh, cc, svt);
    let hi_equal = lz.setcc(ah, bh, CondCode::Eq, svt);
    let result = lz.select(hi_equal, lo_cmp, hi_cmp);
    Ok(OperandRewrite::Value(lz.zext_or_trunc(result, vt)))
}

fn expand_op_select(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    operand: u32,
) -> LegalizeResult<OperandRewrite> {
    if operand != 0 {
        return Err(lz.unsupported(id, "only the condition of a legal select can be expanded"));
    }
    let cond = lz.operand(id, 0);
    let (lo, hi) = lz.get_expanded_integer(cond)?;
    let half = lz.value_type(lo);
    let svt = lz.target().setcc_result_type(half);
    let any = lz.binary(Opcode::Or, lo, hi);
    let zero = lz.constant(0, half);
    let cond = lz.setcc(any, zero, CondCode::Ne, svt);
    let (if_true, if_false) = (lz.operand(id, 1), lz.operand(id, 2));
    Ok(OperandRewrite::Value(lz.select(cond, if_true, if_false)))
}

/// A legal scalar is rebuilt from the parts with `build_pair`; a legal
/// two-lane vector with lanes of the part width takes the parts as its lanes.
fn expand_op_bitcast(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    _operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let vt = lz.result_type(id, 0);
    let value = lz.operand(id, 0);
    let (lo, hi) = lz.get_expanded_integer(value)?;
    let half = lz.value_type(lo);
    let rebuilt = if !vt.is_vector() {
        lz.build_pair(lo, hi, vt)
    } else if vt.vector_num_elements() == 2 && vt.scalar_size_in_bits() == half.size_in_bits() {
        let elt = vt.scalar_type();
        let lo = lz.bitcast_to(lo, elt);
        let hi = lz.bitcast_to(hi, elt);
        lz.build_vector(&[lo, hi], vt)
    } else {
        return Err(lz.unsupported(id, "bitcast result cannot be built from the parts"));
    };
    Ok(OperandRewrite::Value(rebuilt))
}

fn expand_op_output(
    lz: &mut TypeLegalizer<'_>,
    id: NodeId,
    operand: u32,
) -> LegalizeResult<OperandRewrite> {
    let value = lz.operand(id, operand);
    let (lo, hi) = lz.get_expanded_integer(value)?;
    Ok(lz.rewrite_output(id, operand, &[lo, hi]))
}
