//! # Reference Interpreter
//!
//! Evaluates a DAG on concrete argument values. The result is the bit string
//! observed by the root `Output` node, so a graph and its legalized form can
//! be compared directly even though legalization changes how many values
//! carry the data and of which types.

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::types::mask_bits;
use crate::{NodeId, Opcode, SdValue, SelectionDag, ValueType};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("graph has no root")]
    NoRoot,
    #[error("argument {0} was not supplied")]
    MissingArgument(u32),
    #[error("cannot evaluate {opcode} producing {ty}")]
    Unsupported { opcode: Opcode, ty: ValueType },
    #[error("lane index {index} out of range for {ty}")]
    IndexOutOfRange { index: u128, ty: ValueType },
    #[error("node t{0} referenced before it was evaluated")]
    Unevaluated(usize),
    #[error("node t{node} has no operand {operand}")]
    MissingOperand { node: usize, operand: usize },
}

/// A concrete value: scalar bits, or one entry per vector lane.
///
/// Floats are carried as their bit patterns; a `ppcf128` holds its low `f64`
/// in bits 0..64 and its high `f64` in bits 64..128.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DagValue {
    Scalar(u128),
    Vector(Vec<u128>),
}

impl DagValue {
    pub fn lanes(&self) -> Vec<u128> {
        match self {
            Self::Scalar(bits) => vec![*bits],
            Self::Vector(lanes) => lanes.clone(),
        }
    }

    fn from_lanes(lanes: Vec<u128>, vt: ValueType) -> Self {
        if vt.is_vector() {
            Self::Vector(lanes)
        } else {
            Self::Scalar(lanes[0])
        }
    }

    fn scalar(&self) -> u128 {
        match self {
            Self::Scalar(bits) => *bits,
            Self::Vector(lanes) => lanes[0],
        }
    }
}

/// A little-endian bit string.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct BitBuffer {
    bits: Vec<bool>,
}

impl BitBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Appends the low `width` bits of `value` (at most 128).
    pub fn push(&mut self, value: u128, width: u32) {
        for bit in 0..width {
            self.bits.push(bit < 128 && (value >> bit) & 1 == 1);
        }
    }

    /// Reads `width` bits starting at `offset`; bits past the end read as zero.
    pub fn read(&self, offset: u32, width: u32) -> u128 {
        let mut value = 0u128;
        for bit in 0..width.min(128) {
            if self
                .bits
                .get((offset + bit) as usize)
                .copied()
                .unwrap_or(false)
            {
                value |= 1 << bit;
            }
        }
        value
    }

    /// Lays out `value` as `vt`: lanes in order, each at the lane width.
    pub fn from_value(value: &DagValue, vt: ValueType) -> Self {
        let mut buffer = Self::new();
        buffer.push_value(value, vt);
        buffer
    }

    pub fn push_value(&mut self, value: &DagValue, vt: ValueType) {
        let lane_bits = vt.scalar_size_in_bits();
        for lane in value.lanes() {
            self.push(lane, lane_bits);
        }
    }

    /// Reinterprets the bits at `offset` as a value of type `vt`.
    pub fn read_value(&self, offset: u32, vt: ValueType) -> DagValue {
        let lane_bits = vt.scalar_size_in_bits();
        let count = vt.vector_num_elements().max(1);
        let lanes = (0..count)
            .map(|lane| self.read(offset + lane * lane_bits, lane_bits))
            .collect();
        DagValue::from_lanes(lanes, vt)
    }

    /// The buffer packed into 64-bit words, least significant first.
    pub fn to_words(&self) -> Vec<u64> {
        self.bits
            .chunks(64)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u64, |acc, (i, bit)| acc | (u64::from(*bit) << i))
            })
            .collect()
    }
}

impl std::fmt::Debug for BitBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BitBuffer[{}](", self.bits.len())?;
        for (i, word) in self.to_words().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{word:#018x}")?;
        }
        write!(f, ")")
    }
}

/// Evaluates the graph rooted at its `Output` node.
///
/// `args[i]` supplies argument `i` together with its source-level type.
pub fn evaluate(dag: &SelectionDag, args: &[(ValueType, DagValue)]) -> Result<BitBuffer, EvalError> {
    let root = dag.root().ok_or(EvalError::NoRoot)?;
    let arg_buffers: Vec<BitBuffer> = args
        .iter()
        .map(|(vt, value)| BitBuffer::from_value(value, *vt))
        .collect();

    // Operands are always created before their users, so ascending id order
    // evaluates every operand first.
    let live = reachable(dag, root);
    let mut values: Vec<Option<DagValue>> = vec![None; dag.len()];
    let mut ids: Vec<NodeId> = live.into_iter().collect();
    ids.sort_unstable();

    let mut output = BitBuffer::new();
    for id in ids {
        let node = dag.node(id);
        let operand = |i: usize| -> Result<&DagValue, EvalError> {
            let value = node.operands[i];
            values[value.node.index()]
                .as_ref()
                .ok_or(EvalError::Unevaluated(value.node.index()))
        };
        if node.opcode == Opcode::Output {
            let widths = node.widths().unwrap_or_default();
            for (i, value) in node.operands.iter().enumerate() {
                let vt = dag.value_type(*value);
                let bits = BitBuffer::from_value(operand(i)?, vt);
                let width = widths.get(i).copied().unwrap_or(vt.size_in_bits());
                for bit in 0..width {
                    output.push(bits.read(bit, 1), 1);
                }
            }
            continue;
        }
        let value = eval_node(dag, id, &values, &arg_buffers)?;
        values[id.index()] = Some(value);
    }
    Ok(output)
}

fn reachable(dag: &SelectionDag, root: NodeId) -> FxHashSet<NodeId> {
    let mut seen = FxHashSet::default();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if seen.insert(id) {
            stack.extend(dag.node(id).operands.iter().map(|v| v.node));
        }
    }
    seen
}

fn unsupported(opcode: Opcode, vt: ValueType) -> EvalError {
    EvalError::Unsupported { opcode, ty: vt }
}

fn sign_extend(value: u128, bits: u32) -> i128 {
    if bits >= 128 {
        value as i128
    } else {
        let shift = 128 - bits;
        ((value << shift) as i128) >> shift
    }
}

fn is_negative(value: u128, bits: u32) -> bool {
    bits > 0 && (value >> (bits - 1)) & 1 == 1
}

fn negate(value: u128, bits: u32) -> u128 {
    value.wrapping_neg() & mask_bits(bits)
}

/// High 128 bits of the 256-bit product of two `u128`s.
fn mul_hi_u128(a: u128, b: u128) -> u128 {
    let (a_lo, a_hi) = (a & u64::MAX as u128, a >> 64);
    let (b_lo, b_hi) = (b & u64::MAX as u128, b >> 64);
    let lo_lo = a_lo * b_lo;
    let hi_lo = a_hi * b_lo;
    let lo_hi = a_lo * b_hi;
    let hi_hi = a_hi * b_hi;
    let cross = (lo_lo >> 64) + (hi_lo & u64::MAX as u128) + (lo_hi & u64::MAX as u128);
    hi_hi + (hi_lo >> 64) + (lo_hi >> 64) + (cross >> 64)
}

fn int_binary(opcode: Opcode, a: u128, b: u128, bits: u32) -> Option<u128> {
    let mask = mask_bits(bits);
    let value = match opcode {
        Opcode::Add => a.wrapping_add(b),
        Opcode::Sub => a.wrapping_sub(b),
        Opcode::Mul => a.wrapping_mul(b),
        Opcode::MulHiU => {
            if bits <= 64 {
                (a * b) >> bits
            } else {
                mul_hi_u128(a, b)
            }
        }
        Opcode::UDiv => {
            if b == 0 {
                mask
            } else {
                a / b
            }
        }
        Opcode::SDiv => {
            let (neg_a, neg_b) = (is_negative(a, bits), is_negative(b, bits));
            let abs_a = if neg_a { negate(a, bits) } else { a };
            let abs_b = if neg_b { negate(b, bits) } else { b };
            let quotient = if abs_b == 0 { mask } else { abs_a / abs_b };
            if neg_a != neg_b {
                negate(quotient, bits)
            } else {
                quotient
            }
        }
        Opcode::And => a & b,
        Opcode::Or => a | b,
        Opcode::Xor => a ^ b,
        Opcode::Shl => {
            if b >= u128::from(bits) {
                0
            } else {
                a << b
            }
        }
        Opcode::Srl => {
            if b >= u128::from(bits) {
                0
            } else {
                a >> b
            }
        }
        Opcode::Sra => {
            let signed = sign_extend(a, bits);
            if b >= u128::from(bits) {
                if signed < 0 {
                    mask
                } else {
                    0
                }
            } else {
                (signed >> b) as u128
            }
        }
        _ => return None,
    };
    Some(value & mask)
}

fn float_binary(opcode: Opcode, a: u128, b: u128, vt: ValueType) -> Option<u128> {
    match vt {
        ValueType::F32 => {
            let (x, y) = (f32::from_bits(a as u32), f32::from_bits(b as u32));
            let r = match opcode {
                Opcode::FAdd => x + y,
                Opcode::FSub => x - y,
                Opcode::FMul => x * y,
                _ => return None,
            };
            Some(u128::from(r.to_bits()))
        }
        ValueType::F64 => {
            let (x, y) = (f64::from_bits(a as u64), f64::from_bits(b as u64));
            let r = match opcode {
                Opcode::FAdd => x + y,
                Opcode::FSub => x - y,
                Opcode::FMul => x * y,
                _ => return None,
            };
            Some(u128::from(r.to_bits()))
        }
        _ => None,
    }
}

/// Sign-bit positions of a float lane (both halves for double-double).
fn sign_mask(vt: ValueType) -> u128 {
    match vt {
        ValueType::PpcF128 => (1u128 << 63) | (1u128 << 127),
        other => 1u128 << (other.size_in_bits() - 1),
    }
}

fn eval_node(
    dag: &SelectionDag,
    id: NodeId,
    values: &[Option<DagValue>],
    args: &[BitBuffer],
) -> Result<DagValue, EvalError> {
    let node = dag.node(id);
    let vt = node
        .result_type()
        .ok_or_else(|| unsupported(node.opcode, ValueType::I1))?;
    let lane_bits = vt.scalar_size_in_bits();
    let lane_mask = mask_bits(lane_bits);
    let operand = |i: usize| -> Result<&DagValue, EvalError> {
        let value: SdValue = *node.operands.get(i).ok_or(EvalError::MissingOperand {
            node: id.index(),
            operand: i,
        })?;
        values[value.node.index()]
            .as_ref()
            .ok_or(EvalError::Unevaluated(value.node.index()))
    };
    let operand_type = |i: usize| node.operands.get(i).map_or(vt, |v| dag.value_type(*v));
    let lanewise2 = |f: &dyn Fn(u128, u128) -> Option<u128>| -> Result<DagValue, EvalError> {
        let (a, b) = (operand(0)?.lanes(), operand(1)?.lanes());
        let lanes = a
            .iter()
            .zip(&b)
            .map(|(x, y)| f(*x, *y).ok_or_else(|| unsupported(node.opcode, vt)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DagValue::from_lanes(lanes, vt))
    };
    let lanewise1 = |f: &dyn Fn(u128) -> u128| -> Result<DagValue, EvalError> {
        let lanes = operand(0)?.lanes().into_iter().map(f).collect();
        Ok(DagValue::from_lanes(lanes, vt))
    };

    match node.opcode {
        Opcode::Argument => {
            let (index, offset) = node
                .arg()
                .ok_or_else(|| unsupported(node.opcode, vt))?;
            let buffer = args
                .get(index as usize)
                .ok_or(EvalError::MissingArgument(index))?;
            Ok(buffer.read_value(offset, vt))
        }
        Opcode::Constant | Opcode::ConstantFp => {
            let bits = node
                .imm()
                .ok_or_else(|| unsupported(node.opcode, vt))?
                & lane_mask;
            let count = vt.vector_num_elements().max(1) as usize;
            Ok(DagValue::from_lanes(vec![bits; count], vt))
        }
        Opcode::Undef => {
            let count = vt.vector_num_elements().max(1) as usize;
            Ok(DagValue::from_lanes(vec![0; count], vt))
        }
        op if op.is_int_binary() && vt.is_integer() => {
            lanewise2(&|a, b| int_binary(op, a, b, lane_bits))
        }
        Opcode::FAdd | Opcode::FSub | Opcode::FMul => {
            let scalar = vt.scalar_type();
            lanewise2(&|a, b| float_binary(node.opcode, a, b, scalar))
        }
        Opcode::FCopySign => {
            let sign = sign_mask(vt.scalar_type());
            lanewise2(&|a, b| Some((a & !sign) | (b & sign)))
        }
        Opcode::FNeg => {
            let sign = sign_mask(vt.scalar_type());
            lanewise1(&|a| a ^ sign)
        }
        Opcode::FAbs if vt.scalar_type() != ValueType::PpcF128 => {
            let sign = sign_mask(vt.scalar_type());
            lanewise1(&|a| a & !sign)
        }
        Opcode::Ctpop => lanewise1(&|a| u128::from(a.count_ones())),
        Opcode::Ctlz => lanewise1(&|a| {
            if a == 0 {
                u128::from(lane_bits)
            } else {
                u128::from(lane_bits - (128 - a.leading_zeros()))
            }
        }),
        Opcode::Cttz => lanewise1(&|a| {
            let a = a & lane_mask;
            if a == 0 {
                u128::from(lane_bits)
            } else {
                u128::from(a.trailing_zeros())
            }
        }),
        Opcode::SetCc if !vt.is_vector() => {
            let cc = node.cond().ok_or_else(|| unsupported(node.opcode, vt))?;
            let bits = operand_type(0).size_in_bits();
            let result = cc.evaluate(operand(0)?.scalar(), operand(1)?.scalar(), bits);
            Ok(DagValue::Scalar(u128::from(result)))
        }
        Opcode::Select => {
            if operand(0)?.scalar() != 0 {
                Ok(operand(1)?.clone())
            } else {
                Ok(operand(2)?.clone())
            }
        }
        Opcode::ZeroExtend | Opcode::AnyExtend | Opcode::Truncate => {
            lanewise1(&|a| a & lane_mask)
        }
        Opcode::SignExtend => {
            let from_bits = operand_type(0).scalar_size_in_bits();
            lanewise1(&|a| (sign_extend(a, from_bits) as u128) & lane_mask)
        }
        Opcode::Bitcast => {
            let bits = BitBuffer::from_value(operand(0)?, operand_type(0));
            Ok(bits.read_value(0, vt))
        }
        Opcode::BuildPair => {
            let mut bits = BitBuffer::from_value(operand(0)?, operand_type(0));
            bits.push_value(operand(1)?, operand_type(1));
            Ok(bits.read_value(0, vt))
        }
        Opcode::FpRound => {
            let source = operand(0)?.scalar();
            match (operand_type(0), vt) {
                (ValueType::PpcF128, ValueType::F64) => {
                    let lo = f64::from_bits(source as u64);
                    let hi = f64::from_bits((source >> 64) as u64);
                    Ok(DagValue::Scalar(u128::from((hi + lo).to_bits())))
                }
                (ValueType::F64, ValueType::F32) => {
                    let value = f64::from_bits(source as u64) as f32;
                    Ok(DagValue::Scalar(u128::from(value.to_bits())))
                }
                _ => Err(unsupported(node.opcode, vt)),
            }
        }
        Opcode::BuildVector => {
            let lanes = (0..node.num_operands())
                .map(|i| operand(i).map(|v| v.scalar() & lane_mask))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DagValue::Vector(lanes))
        }
        Opcode::ExtractElement => {
            let lanes = operand(0)?.lanes();
            let index = operand(1)?.scalar();
            lanes
                .get(index as usize)
                .map(|lane| DagValue::Scalar(*lane))
                .ok_or(EvalError::IndexOutOfRange {
                    index,
                    ty: operand_type(0),
                })
        }
        Opcode::InsertElement => {
            let mut lanes = operand(0)?.lanes();
            let element = operand(1)?.scalar() & lane_mask;
            let index = operand(2)?.scalar();
            let slot = lanes
                .get_mut(index as usize)
                .ok_or(EvalError::IndexOutOfRange { index, ty: vt })?;
            *slot = element;
            Ok(DagValue::from_lanes(lanes, vt))
        }
        Opcode::VectorShuffle => {
            let mut inputs = operand(0)?.lanes();
            inputs.extend(operand(1)?.lanes());
            let mask = node.mask().ok_or_else(|| unsupported(node.opcode, vt))?;
            let lanes = mask
                .iter()
                .map(|lane| match lane {
                    Some(l) => inputs.get(*l as usize).copied().ok_or(
                        EvalError::IndexOutOfRange {
                            index: u128::from(*l),
                            ty: vt,
                        },
                    ),
                    None => Ok(0),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DagValue::from_lanes(lanes, vt))
        }
        Opcode::ConcatVectors => {
            let mut lanes = operand(0)?.lanes();
            lanes.extend(operand(1)?.lanes());
            Ok(DagValue::Vector(lanes))
        }
        other => Err(unsupported(other, vt)),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::CondCode;

    fn run(dag: &SelectionDag, args: &[(ValueType, DagValue)]) -> Vec<u64> {
        evaluate(dag, args).unwrap().to_words()
    }

    #[test]
    fn malformed_nodes_are_reported() {
        let mut dag = SelectionDag::new();
        let a = dag.argument(0, 0, ValueType::I32);
        let lonely = dag.add_node(crate::Node::new(
            Opcode::Add,
            &[a],
            &[ValueType::I32],
            crate::NodeAttr::None,
        ));
        let out = dag.output(&[SdValue::new(lonely, 0)]);
        dag.set_root(out);

        let args = [(ValueType::I32, DagValue::Scalar(1))];
        assert_eq!(
            evaluate(&dag, &args),
            Err(EvalError::MissingOperand {
                node: lonely.index(),
                operand: 1
            })
        );
        assert_eq!(evaluate(&dag, &[]), Err(EvalError::MissingArgument(0)));
        assert_eq!(evaluate(&SelectionDag::new(), &[]), Err(EvalError::NoRoot));

        let mut dag = SelectionDag::new();
        let bare = dag.get_value(Opcode::Argument, &[], ValueType::I32, crate::NodeAttr::None);
        let out = dag.output(&[bare]);
        dag.set_root(out);
        assert_eq!(
            evaluate(&dag, &args),
            Err(EvalError::Unsupported {
                opcode: Opcode::Argument,
                ty: ValueType::I32
            })
        );
    }

    #[test]
    fn shifts_saturate_past_width() {
        let mut dag = SelectionDag::new();
        let a = dag.argument(0, 0, ValueType::I8);
        let amt = dag.argument(1, 0, ValueType::I8);
        let shl = dag.binary(Opcode::Shl, a, amt);
        let sra = dag.binary(Opcode::Sra, a, amt);
        let out = dag.output(&[shl, sra]);
        dag.set_root(out);

        let args = [
            (ValueType::I8, DagValue::Scalar(0x81)),
            (ValueType::I8, DagValue::Scalar(9)),
        ];
        // shl -> 0x00, sra -> 0xff
        assert_eq!(run(&dag, &args), vec![0xff00]);
    }

    #[test]
    fn signed_division_wraps_and_handles_zero() {
        let mut dag = SelectionDag::new();
        let a = dag.argument(0, 0, ValueType::I8);
        let b = dag.argument(1, 0, ValueType::I8);
        let q = dag.binary(Opcode::SDiv, a, b);
        let out = dag.output(&[q]);
        dag.set_root(out);

        let div = |x: u128, y: u128| {
            run(
                &dag,
                &[
                    (ValueType::I8, DagValue::Scalar(x)),
                    (ValueType::I8, DagValue::Scalar(y)),
                ],
            )[0]
        };
        assert_eq!(div(0x80, 0xff), 0x80);
        assert_eq!(div(0xf9, 2), 0xfd); // -7 / 2 == -3
        assert_eq!(div(5, 0), 0xff);
        assert_eq!(div(0xfb, 0), 0x01);
    }

    #[test]
    fn mul_hi_matches_wide_product() {
        assert_eq!(mul_hi_u128(u128::MAX, 2), 1);
        assert_eq!(mul_hi_u128(1 << 127, 1 << 127), 1 << 126);
        assert_eq!(int_binary(Opcode::MulHiU, u128::from(u32::MAX), 2, 32), Some(1));
    }

    #[test]
    fn trailing_zeros_count_the_lane_width_for_zero() {
        let mut dag = SelectionDag::new();
        let a = dag.argument(0, 0, ValueType::I16);
        let tz = dag.unary(Opcode::Cttz, a);
        let out = dag.output(&[tz]);
        dag.set_root(out);

        let count = |x: u128| run(&dag, &[(ValueType::I16, DagValue::Scalar(x))])[0];
        assert_eq!(count(0x8000), 15);
        assert_eq!(count(0x0c), 2);
        assert_eq!(count(0), 16);
    }

    #[test]
    fn pairs_of_vectors_concatenate_their_lanes() {
        let mut dag = SelectionDag::new();
        let lo = dag.argument(0, 0, ValueType::V2I32);
        let hi = dag.argument(1, 0, ValueType::V2I32);
        let pair = dag.build_pair(lo, hi, ValueType::V4I32);
        let out = dag.output(&[pair]);
        dag.set_root(out);

        let args = [
            (ValueType::V2I32, DagValue::Vector(vec![1, 2])),
            (ValueType::V2I32, DagValue::Vector(vec![3, 4])),
        ];
        assert_eq!(run(&dag, &args), vec![0x2_0000_0001, 0x4_0000_0003]);
    }

    #[test]
    fn arguments_are_sliced_by_offset() {
        let mut dag = SelectionDag::new();
        let lo = dag.argument(0, 0, ValueType::I32);
        let hi = dag.argument(0, 32, ValueType::I32);
        let lt = dag.setcc(lo, hi, CondCode::Ult, ValueType::I32);
        let out = dag.output(&[hi, lo, lt]);
        dag.set_root(out);

        let args = [(ValueType::I64, DagValue::Scalar(0x0000_0002_0000_0001))];
        let words = run(&dag, &args);
        assert_eq!(words, vec![0x0000_0001_0000_0002, 1]);
    }

    #[test]
    fn shuffle_and_extract_vector_lanes() {
        let mut dag = SelectionDag::new();
        let a = dag.argument(0, 0, ValueType::V4I32);
        let b = dag.argument(1, 0, ValueType::V4I32);
        let shuf = dag.shuffle(a, b, vec![Some(7), Some(0), None, Some(5)]);
        let idx = dag.constant(3, ValueType::I32);
        let lane = dag.extract_element(shuf, idx);
        let out = dag.output(&[lane]);
        dag.set_root(out);

        let args = [
            (ValueType::V4I32, DagValue::Vector(vec![10, 11, 12, 13])),
            (ValueType::V4I32, DagValue::Vector(vec![20, 21, 22, 23])),
        ];
        assert_eq!(run(&dag, &args), vec![21]);
    }

    #[test]
    fn double_double_round_adds_halves() {
        let mut dag = SelectionDag::new();
        let x = dag.argument(0, 0, ValueType::PpcF128);
        let neg = dag.unary(Opcode::FNeg, x);
        let rounded = dag.cast(Opcode::FpRound, neg, ValueType::F64);
        let out = dag.output(&[rounded]);
        dag.set_root(out);

        let bits = u128::from(0.5f64.to_bits()) | (u128::from(2.0f64.to_bits()) << 64);
        let words = run(&dag, &[(ValueType::PpcF128, DagValue::Scalar(bits))]);
        assert_eq!(f64::from_bits(words[0]), -2.5);
    }

    proptest! {
        #[test]
        fn mul_hi_of_shifted_operand(a in any::<u64>(), b in any::<u64>()) {
            let product = u128::from(a) * u128::from(b);
            prop_assert_eq!(mul_hi_u128(u128::from(a) << 64, u128::from(b)), product >> 64);
        }

        #[test]
        fn bit_buffer_reads_back_pushed_values(value in any::<u64>(), width in 1u32..=64) {
            let mut buffer = BitBuffer::new();
            buffer.push(0b101, 3);
            buffer.push(u128::from(value), width);
            prop_assert_eq!(buffer.read(3, width), u128::from(value) & mask_bits(width));
            prop_assert_eq!(buffer.read(0, 3), 0b101);
        }
    }
}
