//! Wide integer arithmetic lowered into 32-bit limbs.

mod common;

use common::{assert_all_legal, assert_equivalent, run, scalar, vector};
use proptest::prelude::*;
use seldag_compiler_dag::{CondCode, Opcode, SelectionDag, ValueType};
use seldag_compiler_legalize::TargetInfo;

fn binary(opcode: Opcode, vt: ValueType) -> SelectionDag {
    let mut dag = SelectionDag::new();
    let a = dag.argument(0, 0, vt);
    let b = dag.argument(1, 0, vt);
    let result = dag.binary(opcode, a, b);
    let out = dag.output(&[result]);
    dag.set_root(out);
    dag
}

fn shift_by_constant(opcode: Opcode, amount: u128) -> SelectionDag {
    let mut dag = SelectionDag::new();
    let a = dag.argument(0, 0, ValueType::I64);
    let k = dag.constant(amount, ValueType::I64);
    let result = dag.binary(opcode, a, k);
    let out = dag.output(&[result]);
    dag.set_root(out);
    dag
}

fn count(dag: &SelectionDag, opcode: Opcode) -> usize {
    dag.nodes().filter(|(_, node)| node.opcode == opcode).count()
}

fn check_binary(opcode: Opcode, vt: ValueType, a: u128, b: u128) {
    let target = TargetInfo::int32();
    let dag = binary(opcode, vt);
    let legal = assert_equivalent(&dag, &target, &[scalar(vt, a), scalar(vt, b)]);
    assert_all_legal(&legal, &target);
}

#[test]
fn add_carries_out_of_the_low_limb() {
    let target = TargetInfo::int32();
    let dag = binary(Opcode::Add, ValueType::I64);
    let legal = assert_equivalent(
        &dag,
        &target,
        &[scalar(ValueType::I64, 0xFFFF_FFFF), scalar(ValueType::I64, 1)],
    );
    let out = run(
        &legal,
        &[scalar(ValueType::I64, 0xFFFF_FFFF), scalar(ValueType::I64, 1)],
    );
    assert_eq!(out.to_words(), vec![0x1_0000_0000]);
}

#[test]
fn mul_produces_exact_limbs() {
    let target = TargetInfo::int32();
    let dag = binary(Opcode::Mul, ValueType::I64);
    let args = [
        scalar(ValueType::I64, 0x1_0000_0001),
        scalar(ValueType::I64, 0x2),
    ];
    let legal = assert_equivalent(&dag, &target, &args);
    let out = run(&legal, &args);
    assert_eq!(out.read(0, 32), 0x2);
    assert_eq!(out.read(32, 32), 0x2);
    assert_all_legal(&legal, &target);
}

#[test]
fn mul_high_keeps_every_column_carry() {
    for (a, b) in [
        (u64::MAX, u64::MAX),
        (0xFFFF_FFFF, 0xFFFF_FFFF_0000_0001),
        (0x1_0000_0001, 0x2),
        (0, u64::MAX),
    ] {
        check_binary(Opcode::MulHiU, ValueType::I64, u128::from(a), u128::from(b));
    }
}

#[test]
fn i128_mul_expands_through_i64_limbs() {
    check_binary(
        Opcode::Mul,
        ValueType::I128,
        u128::MAX,
        0x1_0000_0000_0000_0003,
    );
}

#[test]
fn wide_lane_is_read_as_two_word_lanes() {
    let target = TargetInfo::int32();
    let mut dag = SelectionDag::new();
    let v = dag.argument(0, 0, ValueType::V2I64);
    let one = dag.constant(1, ValueType::I32);
    let lane = dag.extract_element(v, one);
    let doubled = dag.binary(Opcode::Add, lane, lane);
    let out = dag.output(&[doubled]);
    dag.set_root(out);

    let legal = assert_equivalent(
        &dag,
        &target,
        &[vector(
            ValueType::V2I64,
            &[0x1111_2222_3333_4444, 0x8000_0000_FFFF_FFFF],
        )],
    );
    assert_all_legal(&legal, &target);
}

#[test]
fn wide_integer_reinterpreted_as_a_legal_double() {
    let target = TargetInfo::from_json(
        r#"{ "name": "fpu32", "legal_types": ["i32", "f64"], "setcc_result_type": "i32" }"#,
    )
    .expect("valid target");
    let mut dag = SelectionDag::new();
    let a = dag.argument(0, 0, ValueType::I64);
    let b = dag.argument(1, 0, ValueType::I64);
    let sum = dag.binary(Opcode::Add, a, b);
    let float = dag.cast(Opcode::Bitcast, sum, ValueType::F64);
    let neg = dag.unary(Opcode::FNeg, float);
    let out = dag.output(&[neg]);
    dag.set_root(out);

    let legal = assert_equivalent(
        &dag,
        &target,
        &[
            scalar(ValueType::I64, u128::from(1.5f64.to_bits())),
            scalar(ValueType::I64, 1),
        ],
    );
    assert_all_legal(&legal, &target);
    assert_eq!(count(&legal, Opcode::BuildPair), 1);
}

#[test]
fn double_lanes_reinterpreted_as_a_wide_integer() {
    let target = TargetInfo::simd128();
    let mut dag = SelectionDag::new();
    let lanes = dag.argument(0, 0, ValueType::V2F64);
    let wide = dag.cast(Opcode::Bitcast, lanes, ValueType::I128);
    let shifted = dag.binary(Opcode::Add, wide, wide);
    let back = dag.cast(Opcode::Bitcast, shifted, ValueType::V2F64);
    let out = dag.output(&[wide, back]);
    dag.set_root(out);

    let legal = assert_equivalent(
        &dag,
        &target,
        &[vector(
            ValueType::V2F64,
            &[u128::from((-2.5f64).to_bits()), u128::from(1.0e300f64.to_bits())],
        )],
    );
    assert_all_legal(&legal, &target);
    assert_eq!(count(&legal, Opcode::BuildVector), 1);
}

#[test]
fn sub_borrows_from_the_high_limb() {
    check_binary(Opcode::Sub, ValueType::I64, 0x1_0000_0000, 1);
    check_binary(Opcode::Sub, ValueType::I64, 0, 1);
}

#[test]
fn constant_shifts_cover_every_boundary() {
    let target = TargetInfo::int32();
    let value = 0x8123_4567_89AB_CDEF;
    for opcode in [Opcode::Shl, Opcode::Srl, Opcode::Sra] {
        for amount in [0, 1, 31, 32, 33, 63, 64, 100] {
            let dag = shift_by_constant(opcode, amount);
            let legal = assert_equivalent(&dag, &target, &[scalar(ValueType::I64, value)]);
            assert_all_legal(&legal, &target);
        }
    }
}

#[test]
fn i128_add_expands_twice() {
    check_binary(
        Opcode::Add,
        ValueType::I128,
        u128::MAX - 5,
        0x1_0000_0000_0000_0007,
    );
}

#[test]
fn division_by_zero_matches_reference() {
    check_binary(Opcode::UDiv, ValueType::I64, 12345, 0);
    check_binary(Opcode::SDiv, ValueType::I64, (-12345i64) as u64 as u128, 0);
}

#[test]
fn bit_counts_combine_both_limbs() {
    let target = TargetInfo::int32();
    for opcode in [Opcode::Ctpop, Opcode::Ctlz, Opcode::Cttz] {
        for value in [0, 1, 0xFFFF_FFFF, 0x1_0000_0000, u128::from(u64::MAX)] {
            let mut dag = SelectionDag::new();
            let a = dag.argument(0, 0, ValueType::I64);
            let count = dag.unary(opcode, a);
            let out = dag.output(&[count]);
            dag.set_root(out);
            assert_equivalent(&dag, &target, &[scalar(ValueType::I64, value)]);
        }
    }
}

#[test]
fn extensions_and_truncation_round_trip_through_limbs() {
    let target = TargetInfo::int32();
    let mut dag = SelectionDag::new();
    let a = dag.argument(0, 0, ValueType::I32);
    let sext = dag.cast(Opcode::SignExtend, a, ValueType::I64);
    let zext = dag.cast(Opcode::ZeroExtend, a, ValueType::I64);
    let sum = dag.binary(Opcode::Add, sext, zext);
    let low = dag.cast(Opcode::Truncate, sum, ValueType::I32);
    let out = dag.output(&[sext, zext, low]);
    dag.set_root(out);

    for value in [0, 7, 0x8000_0000, 0xFFFF_FFFF] {
        let legal = assert_equivalent(&dag, &target, &[scalar(ValueType::I32, value)]);
        assert_all_legal(&legal, &target);
    }
}

#[test]
fn select_of_wide_values_uses_a_folded_condition() {
    let target = TargetInfo::int32();
    let mut dag = SelectionDag::new();
    let cond = dag.argument(0, 0, ValueType::I64);
    let a = dag.argument(1, 0, ValueType::I64);
    let b = dag.argument(2, 0, ValueType::I32);
    let wide = dag.select(cond, a, a);
    let narrow = dag.select(cond, b, b);
    let out = dag.output(&[wide, narrow]);
    dag.set_root(out);

    for cond in [0, 1, 0x1_0000_0000] {
        assert_equivalent(
            &dag,
            &target,
            &[
                scalar(ValueType::I64, cond),
                scalar(ValueType::I64, 0xDEAD_BEEF_0BAD_F00D),
                scalar(ValueType::I32, 42),
            ],
        );
    }
}

#[test]
fn build_pair_of_legal_halves_is_taken_as_is() {
    let target = TargetInfo::int32();
    let mut dag = SelectionDag::new();
    let lo = dag.argument(0, 0, ValueType::I32);
    let hi = dag.argument(1, 0, ValueType::I32);
    let pair = dag.build_pair(lo, hi, ValueType::I64);
    let out = dag.output(&[pair]);
    dag.set_root(out);

    let legal = assert_equivalent(
        &dag,
        &target,
        &[scalar(ValueType::I32, 0x1234), scalar(ValueType::I32, 0x5678)],
    );
    assert_eq!(legal.len(), 3);
}

proptest! {
    #[test]
    fn add_sub_mul_match_reference(
        opcode in prop::sample::select(vec![Opcode::Add, Opcode::Sub, Opcode::Mul]),
        a in any::<u64>(),
        b in any::<u64>(),
    ) {
        check_binary(opcode, ValueType::I64, u128::from(a), u128::from(b));
    }

    #[test]
    fn mul_high_matches_reference(a in any::<u64>(), b in any::<u64>()) {
        check_binary(Opcode::MulHiU, ValueType::I64, u128::from(a), u128::from(b));
    }

    #[test]
    fn bitwise_ops_match_reference(
        opcode in prop::sample::select(vec![Opcode::And, Opcode::Or, Opcode::Xor]),
        a in any::<u64>(),
        b in any::<u64>(),
    ) {
        check_binary(opcode, ValueType::I64, u128::from(a), u128::from(b));
    }

    #[test]
    fn variable_shifts_match_reference(
        opcode in prop::sample::select(vec![Opcode::Shl, Opcode::Srl, Opcode::Sra]),
        value in any::<u64>(),
        amount in prop_oneof![0u64..80, any::<u64>()],
    ) {
        check_binary(opcode, ValueType::I64, u128::from(value), u128::from(amount));
    }

    #[test]
    fn constant_shifts_match_reference(
        opcode in prop::sample::select(vec![Opcode::Shl, Opcode::Srl, Opcode::Sra]),
        value in any::<u64>(),
        amount in 0u128..70,
    ) {
        let dag = shift_by_constant(opcode, amount);
        assert_equivalent(&dag, &TargetInfo::int32(), &[scalar(ValueType::I64, u128::from(value))]);
    }

    #[test]
    fn wide_compares_match_reference(
        cc in prop::sample::select(vec![
            CondCode::Eq, CondCode::Ne, CondCode::Ult, CondCode::Ule, CondCode::Ugt,
            CondCode::Uge, CondCode::Slt, CondCode::Sle, CondCode::Sgt, CondCode::Sge,
        ]),
        a in any::<u64>(),
        b in prop_oneof![any::<u64>(), Just(0u64), Just(u64::MAX)],
        same_high in any::<bool>(),
    ) {
        // Equal high limbs exercise the low-limb tie break.
        let b = if same_high { (a & !0xFFFF_FFFF) | (b & 0xFFFF_FFFF) } else { b };
        let mut dag = SelectionDag::new();
        let x = dag.argument(0, 0, ValueType::I64);
        let y = dag.argument(1, 0, ValueType::I64);
        let cmp = dag.setcc(x, y, cc, ValueType::I32);
        let out = dag.output(&[cmp]);
        dag.set_root(out);
        assert_equivalent(
            &dag,
            &TargetInfo::int32(),
            &[scalar(ValueType::I64, u128::from(a)), scalar(ValueType::I64, u128::from(b))],
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn i128_mul_matches_reference(a in any::<u128>(), b in any::<u128>()) {
        check_binary(Opcode::Mul, ValueType::I128, a, b);
    }

    #[test]
    fn unsigned_division_matches_reference(a in any::<u64>(), b in 1u64..) {
        check_binary(Opcode::UDiv, ValueType::I64, u128::from(a), u128::from(b));
    }

    #[test]
    fn signed_division_matches_reference(a in any::<i64>(), b in any::<i64>()) {
        check_binary(Opcode::SDiv, ValueType::I64, a as u64 as u128, b as u64 as u128);
    }
}
