//! Narrow integers and soft floats carried in 32-bit registers.

mod common;

use common::{assert_all_legal, assert_equivalent, legalize, scalar, vector};
use proptest::prelude::*;
use seldag_compiler_dag::{CondCode, Opcode, SelectionDag, ValueType};
use seldag_compiler_legalize::TargetInfo;

fn compare(cc: CondCode) -> SelectionDag {
    let mut dag = SelectionDag::new();
    let a = dag.argument(0, 0, ValueType::I8);
    let b = dag.argument(1, 0, ValueType::I8);
    let cmp = dag.setcc(a, b, cc, ValueType::I1);
    let out = dag.output(&[cmp]);
    dag.set_root(out);
    dag
}

fn count(dag: &SelectionDag, opcode: Opcode) -> usize {
    dag.nodes().filter(|(_, node)| node.opcode == opcode).count()
}

#[test]
fn narrow_compare_becomes_a_word_compare() {
    let target = TargetInfo::int32();
    for (cc, extension) in [(CondCode::Slt, Opcode::Sra), (CondCode::Ult, Opcode::And)] {
        let legal = legalize(&compare(cc), &target);
        assert_all_legal(&legal, &target);

        let (_, setcc) = legal
            .nodes()
            .find(|(_, node)| node.opcode == Opcode::SetCc)
            .expect("a compare survives");
        assert_eq!(setcc.cond(), Some(cc));
        for operand in &setcc.operands {
            assert_eq!(legal.value_type(*operand), ValueType::I32);
            assert_eq!(legal.node(operand.node).opcode, extension);
        }
    }
}

#[test]
fn signed_compare_sees_sign_extended_bytes() {
    let target = TargetInfo::int32();
    // 0x80 is -128: below 1 when signed, above it when unsigned.
    let args = [scalar(ValueType::I8, 0x80), scalar(ValueType::I8, 0x01)];
    let signed = assert_equivalent(&compare(CondCode::Slt), &target, &args);
    let unsigned = assert_equivalent(&compare(CondCode::Ult), &target, &args);
    assert_eq!(common::run(&signed, &args).read(0, 1), 1);
    assert_eq!(common::run(&unsigned, &args).read(0, 1), 0);
}

#[test]
fn promoted_ops_keep_low_bits_exact() {
    let target = TargetInfo::int32();
    let mut dag = SelectionDag::new();
    let a = dag.argument(0, 0, ValueType::I16);
    let b = dag.argument(1, 0, ValueType::I16);
    let ops = [
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Xor,
        Opcode::UDiv,
        Opcode::SDiv,
        Opcode::Shl,
        Opcode::Srl,
        Opcode::Sra,
    ];
    let results: Vec<_> = ops.iter().map(|op| dag.binary(*op, a, b)).collect();
    let out = dag.output(&results);
    dag.set_root(out);

    for (x, y) in [(0xFFFF, 1), (0x8000, 0xFFFF), (1234, 0), (0x8001, 3), (7, 20)] {
        let legal = assert_equivalent(
            &dag,
            &target,
            &[scalar(ValueType::I16, x), scalar(ValueType::I16, y)],
        );
        assert_all_legal(&legal, &target);
    }
}

#[test]
fn leading_zeros_discount_the_padding() {
    let target = TargetInfo::int32();
    let mut dag = SelectionDag::new();
    let a = dag.argument(0, 0, ValueType::I8);
    let lz = dag.unary(Opcode::Ctlz, a);
    let pop = dag.unary(Opcode::Ctpop, a);
    let out = dag.output(&[lz, pop]);
    dag.set_root(out);

    for value in [0, 1, 0x80, 0xFF] {
        assert_equivalent(&dag, &target, &[scalar(ValueType::I8, value)]);
    }
}

#[test]
fn trailing_zeros_stop_at_the_original_width() {
    let target = TargetInfo::int32();
    let mut dag = SelectionDag::new();
    let a = dag.argument(0, 0, ValueType::I8);
    let b = dag.argument(1, 0, ValueType::I16);
    let tz8 = dag.unary(Opcode::Cttz, a);
    let tz16 = dag.unary(Opcode::Cttz, b);
    let out = dag.output(&[tz8, tz16]);
    dag.set_root(out);

    for (x, y) in [(0, 0), (0x80, 0x8000), (0x0c, 0x0100), (0xff, 1)] {
        assert_equivalent(
            &dag,
            &target,
            &[scalar(ValueType::I8, x), scalar(ValueType::I16, y)],
        );
    }
}

/// Halfword vectors live in registers but halfword scalars do not.
fn halfword_vector_target() -> TargetInfo {
    TargetInfo::from_json(
        r#"{ "name": "vec16", "legal_types": ["i32", "v8i16"], "setcc_result_type": "i32" }"#,
    )
    .expect("valid target")
}

#[test]
fn lanes_of_a_legal_vector_are_promoted_on_the_way_in_and_out() {
    let target = halfword_vector_target();
    let mut dag = SelectionDag::new();
    let elements: Vec<_> = (0..8).map(|i| dag.argument(i, 0, ValueType::I16)).collect();
    let built = dag.build_vector(&elements, ValueType::V8I16);
    let x = dag.argument(8, 0, ValueType::I16);
    let slot = dag.argument(9, 0, ValueType::I8);
    let updated = dag.insert_element(built, x, slot);
    let three = dag.constant(3, ValueType::I32);
    let lane = dag.extract_element(updated, three);
    let doubled = dag.binary(Opcode::Add, lane, lane);
    let out = dag.output(&[updated, doubled]);
    dag.set_root(out);

    let mut args: Vec<_> = (0..8)
        .map(|i| scalar(ValueType::I16, 0x7ff0 + i))
        .collect();
    args.push(scalar(ValueType::I16, 0xabcd));
    for index in [0, 3, 7] {
        args.truncate(9);
        args.push(scalar(ValueType::I8, index));
        let legal = assert_equivalent(&dag, &target, &args);
        assert_all_legal(&legal, &target);
    }
}

#[test]
fn extensions_between_narrow_and_wide_types() {
    let target = TargetInfo::int32();
    let mut dag = SelectionDag::new();
    let a = dag.argument(0, 0, ValueType::I8);
    let w = dag.argument(1, 0, ValueType::I32);
    let zext = dag.cast(Opcode::ZeroExtend, a, ValueType::I32);
    let sext = dag.cast(Opcode::SignExtend, a, ValueType::I16);
    let wide = dag.cast(Opcode::SignExtend, a, ValueType::I64);
    let trunc = dag.cast(Opcode::Truncate, w, ValueType::I8);
    let back = dag.cast(Opcode::ZeroExtend, trunc, ValueType::I32);
    let out = dag.output(&[zext, sext, wide, back]);
    dag.set_root(out);

    for (x, y) in [(0x7F, 0x1234_5678), (0x80, 0xFFFF_FF80), (0, 0)] {
        let legal = assert_equivalent(
            &dag,
            &target,
            &[scalar(ValueType::I8, x), scalar(ValueType::I32, y)],
        );
        assert_all_legal(&legal, &target);
    }
}

#[test]
fn select_on_a_promoted_condition() {
    let target = TargetInfo::int32();
    let mut dag = SelectionDag::new();
    let a = dag.argument(0, 0, ValueType::I8);
    let b = dag.argument(1, 0, ValueType::I8);
    let w = dag.argument(2, 0, ValueType::I32);
    let less = dag.setcc(a, b, CondCode::Ult, ValueType::I1);
    let narrow = dag.select(less, a, b);
    let word = dag.select(less, w, w);
    let out = dag.output(&[narrow, word]);
    dag.set_root(out);

    for (x, y) in [(3, 9), (9, 3), (0xFF, 0)] {
        assert_equivalent(
            &dag,
            &target,
            &[
                scalar(ValueType::I8, x),
                scalar(ValueType::I8, y),
                scalar(ValueType::I32, 77),
            ],
        );
    }
}

#[test]
fn build_pair_of_narrow_halves_is_reassembled_with_shifts() {
    let target = TargetInfo::int32();
    let mut dag = SelectionDag::new();
    let lo = dag.argument(0, 0, ValueType::I16);
    let hi = dag.argument(1, 0, ValueType::I16);
    let pair = dag.build_pair(lo, hi, ValueType::I32);
    let out = dag.output(&[pair]);
    dag.set_root(out);

    let legal = assert_equivalent(
        &dag,
        &target,
        &[scalar(ValueType::I16, 0xBEEF), scalar(ValueType::I16, 0xDEAD)],
    );
    assert_eq!(count(&legal, Opcode::BuildPair), 0);
    assert_eq!(count(&legal, Opcode::Shl), 1);
}

#[test]
fn soft_float_sign_operations_are_integer_masks() {
    let target = TargetInfo::int32();
    let mut dag = SelectionDag::new();
    let x = dag.argument(0, 0, ValueType::F32);
    let y = dag.argument(1, 0, ValueType::F32);
    let neg = dag.unary(Opcode::FNeg, x);
    let abs = dag.unary(Opcode::FAbs, x);
    let copy = dag.binary(Opcode::FCopySign, abs, y);
    let bits = dag.cast(Opcode::Bitcast, copy, ValueType::I32);
    let out = dag.output(&[neg, bits]);
    dag.set_root(out);

    let legal = assert_equivalent(
        &dag,
        &target,
        &[
            scalar(ValueType::F32, u128::from(1.5f32.to_bits())),
            scalar(ValueType::F32, u128::from((-2.0f32).to_bits())),
        ],
    );
    assert_all_legal(&legal, &target);
    assert_eq!(count(&legal, Opcode::FNeg), 0);
}

#[test]
fn soft_double_bitcast_splits_into_words() {
    let target = TargetInfo::int32();
    let mut dag = SelectionDag::new();
    let x = dag.argument(0, 0, ValueType::F64);
    let bits = dag.cast(Opcode::Bitcast, x, ValueType::I64);
    let out = dag.output(&[bits]);
    dag.set_root(out);

    let legal = assert_equivalent(
        &dag,
        &target,
        &[scalar(ValueType::F64, u128::from((-0.1f64).to_bits()))],
    );
    assert_all_legal(&legal, &target);
}

#[test]
fn soft_double_assembled_from_words() {
    let target = TargetInfo::int32();
    let mut dag = SelectionDag::new();
    let lo = dag.argument(0, 0, ValueType::I32);
    let hi = dag.argument(1, 0, ValueType::I32);
    let paired = dag.build_pair(lo, hi, ValueType::F64);
    let neg = dag.unary(Opcode::FNeg, paired);
    let lanes = dag.argument(2, 0, ValueType::V2I32);
    let cast = dag.cast(Opcode::Bitcast, lanes, ValueType::F64);
    let abs = dag.unary(Opcode::FAbs, cast);
    let out = dag.output(&[neg, abs]);
    dag.set_root(out);

    let bits = (-3.25f64).to_bits();
    let legal = assert_equivalent(
        &dag,
        &target,
        &[
            scalar(ValueType::I32, u128::from(bits as u32)),
            scalar(ValueType::I32, u128::from((bits >> 32) as u32)),
            vector(ValueType::V2I32, &[u128::from(bits as u32), u128::from((bits >> 32) as u32)]),
        ],
    );
    assert_all_legal(&legal, &target);
}

#[test]
fn single_assembled_from_promoted_halfwords() {
    let target = TargetInfo::simd128();
    let mut dag = SelectionDag::new();
    let lo = dag.argument(0, 0, ValueType::I16);
    let hi = dag.argument(1, 0, ValueType::I16);
    let paired = dag.build_pair(lo, hi, ValueType::F32);
    let neg = dag.unary(Opcode::FNeg, paired);
    let out = dag.output(&[paired, neg]);
    dag.set_root(out);

    let bits = 1.0f32.to_bits();
    let legal = assert_equivalent(
        &dag,
        &target,
        &[
            scalar(ValueType::I16, u128::from(bits & 0xffff)),
            scalar(ValueType::I16, u128::from(bits >> 16)),
        ],
    );
    assert_all_legal(&legal, &target);
    for (_, node) in legal.nodes() {
        if matches!(node.opcode, Opcode::Shl | Opcode::Or | Opcode::Constant) {
            assert!(node.results[0].is_integer(), "{} on {}", node.opcode, node.results[0]);
        }
    }
    assert_eq!(count(&legal, Opcode::Bitcast), 1);
}

#[test]
fn narrow_pair_is_joined_in_a_word() {
    let target = TargetInfo::int32();
    let mut dag = SelectionDag::new();
    let lo = dag.argument(0, 0, ValueType::I8);
    let hi = dag.argument(1, 0, ValueType::I8);
    let paired = dag.build_pair(lo, hi, ValueType::I16);
    let wide = dag.cast(Opcode::ZeroExtend, paired, ValueType::I32);
    let out = dag.output(&[paired, wide]);
    dag.set_root(out);

    for (a, b) in [(0xab, 0xcd), (0xff, 0x00), (0x00, 0x80)] {
        let legal = assert_equivalent(
            &dag,
            &target,
            &[scalar(ValueType::I8, a), scalar(ValueType::I8, b)],
        );
        assert_all_legal(&legal, &target);
    }
}

proptest! {
    #[test]
    fn byte_compares_match_reference(
        cc in prop::sample::select(vec![
            CondCode::Eq, CondCode::Ne, CondCode::Ult, CondCode::Ule, CondCode::Ugt,
            CondCode::Uge, CondCode::Slt, CondCode::Sle, CondCode::Sgt, CondCode::Sge,
        ]),
        a in any::<u8>(),
        b in any::<u8>(),
    ) {
        assert_equivalent(
            &compare(cc),
            &TargetInfo::int32(),
            &[scalar(ValueType::I8, u128::from(a)), scalar(ValueType::I8, u128::from(b))],
        );
    }

    #[test]
    fn halfword_arithmetic_matches_reference(
        opcode in prop::sample::select(vec![
            Opcode::Add, Opcode::Mul, Opcode::Srl, Opcode::Sra, Opcode::SDiv, Opcode::UDiv,
        ]),
        a in any::<u16>(),
        b in any::<u16>(),
    ) {
        let mut dag = SelectionDag::new();
        let x = dag.argument(0, 0, ValueType::I16);
        let y = dag.argument(1, 0, ValueType::I16);
        let r = dag.binary(opcode, x, y);
        let out = dag.output(&[r]);
        dag.set_root(out);
        assert_equivalent(
            &dag,
            &TargetInfo::int32(),
            &[scalar(ValueType::I16, u128::from(a)), scalar(ValueType::I16, u128::from(b))],
        );
    }
}
