//! # Opcodes
//!
//! Operations a DAG node may perform, and the comparison predicates carried by
//! `SetCc`.

/// The operation performed by a node.
///
/// Integer opcodes apply lanewise to integer vectors and float opcodes
/// lanewise to float vectors. Immediate data (constants, predicates, shuffle
/// masks, argument locations) lives in the node's [`crate::NodeAttr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Opcode {
    /// A slice of an incoming argument, located by `NodeAttr::Arg`.
    Argument,
    /// Integer constant, bits in `NodeAttr::Imm`.
    Constant,
    /// Float constant, bit pattern in `NodeAttr::Imm`.
    ConstantFp,
    Undef,

    Add,
    Sub,
    Mul,
    /// High half of the double-width unsigned product.
    MulHiU,
    UDiv,
    SDiv,
    And,
    Or,
    Xor,
    Shl,
    Srl,
    Sra,
    Ctpop,
    Ctlz,
    Cttz,

    /// Compare two values with the `NodeAttr::Cond` predicate.
    SetCc,
    /// `select cond, if_true, if_false`.
    Select,

    ZeroExtend,
    SignExtend,
    AnyExtend,
    Truncate,
    Bitcast,
    /// Join `lo, hi` into a value of twice the width.
    BuildPair,

    FNeg,
    FAbs,
    FCopySign,
    FAdd,
    FSub,
    FMul,
    /// Narrow a float to a smaller float type.
    FpRound,

    BuildVector,
    /// `extract_element vec, index`.
    ExtractElement,
    /// `insert_element vec, elt, index`.
    InsertElement,
    /// Two-input lane permutation, selector in `NodeAttr::Mask`.
    VectorShuffle,
    ConcatVectors,

    /// Graph root: the observable values of the program.
    Output,
}

impl Opcode {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Argument => "argument",
            Self::Constant => "constant",
            Self::ConstantFp => "constant_fp",
            Self::Undef => "undef",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::MulHiU => "mulhu",
            Self::UDiv => "udiv",
            Self::SDiv => "sdiv",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Shl => "shl",
            Self::Srl => "srl",
            Self::Sra => "sra",
            Self::Ctpop => "ctpop",
            Self::Ctlz => "ctlz",
            Self::Cttz => "cttz",
            Self::SetCc => "setcc",
            Self::Select => "select",
            Self::ZeroExtend => "zero_extend",
            Self::SignExtend => "sign_extend",
            Self::AnyExtend => "any_extend",
            Self::Truncate => "truncate",
            Self::Bitcast => "bitcast",
            Self::BuildPair => "build_pair",
            Self::FNeg => "fneg",
            Self::FAbs => "fabs",
            Self::FCopySign => "fcopysign",
            Self::FAdd => "fadd",
            Self::FSub => "fsub",
            Self::FMul => "fmul",
            Self::FpRound => "fp_round",
            Self::BuildVector => "build_vector",
            Self::ExtractElement => "extract_element",
            Self::InsertElement => "insert_element",
            Self::VectorShuffle => "vector_shuffle",
            Self::ConcatVectors => "concat_vectors",
            Self::Output => "output",
        }
    }

    /// Two-operand integer operations with one result of the operand type.
    pub const fn is_int_binary(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Sub
                | Self::Mul
                | Self::MulHiU
                | Self::UDiv
                | Self::SDiv
                | Self::And
                | Self::Or
                | Self::Xor
                | Self::Shl
                | Self::Srl
                | Self::Sra
        )
    }

    /// Two-operand float operations with one result of the operand type.
    pub const fn is_float_binary(self) -> bool {
        matches!(self, Self::FAdd | Self::FSub | Self::FMul | Self::FCopySign)
    }

    /// One-operand operations whose result type equals the operand type.
    pub const fn is_same_type_unary(self) -> bool {
        matches!(
            self,
            Self::Ctpop | Self::Ctlz | Self::Cttz | Self::FNeg | Self::FAbs
        )
    }

    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Mul | Self::MulHiU | Self::And | Self::Or | Self::Xor | Self::FAdd | Self::FMul
        )
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Integer comparison predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CondCode {
    Eq,
    Ne,
    Ult,
    Ule,
    Ugt,
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl CondCode {
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::Slt | Self::Sle | Self::Sgt | Self::Sge)
    }

    pub const fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }

    /// The unsigned predicate with the same ordering (`slt -> ult`).
    pub const fn to_unsigned(self) -> Self {
        match self {
            Self::Slt => Self::Ult,
            Self::Sle => Self::Ule,
            Self::Sgt => Self::Ugt,
            Self::Sge => Self::Uge,
            other => other,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Ult => "ult",
            Self::Ule => "ule",
            Self::Ugt => "ugt",
            Self::Uge => "uge",
            Self::Slt => "slt",
            Self::Sle => "sle",
            Self::Sgt => "sgt",
            Self::Sge => "sge",
        }
    }

    /// Evaluate the predicate on two `bits`-wide values.
    pub fn evaluate(self, lhs: u128, rhs: u128, bits: u32) -> bool {
        let to_signed = |v: u128| -> i128 {
            if bits >= 128 {
                v as i128
            } else {
                let shift = 128 - bits;
                ((v << shift) as i128) >> shift
            }
        };
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Ult => lhs < rhs,
            Self::Ule => lhs <= rhs,
            Self::Ugt => lhs > rhs,
            Self::Uge => lhs >= rhs,
            Self::Slt => to_signed(lhs) < to_signed(rhs),
            Self::Sle => to_signed(lhs) <= to_signed(rhs),
            Self::Sgt => to_signed(lhs) > to_signed(rhs),
            Self::Sge => to_signed(lhs) >= to_signed(rhs),
        }
    }
}

impl std::fmt::Display for CondCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
