// Shared helpers for the legalization integration tests

#![allow(dead_code)]

use seldag_compiler_dag::{evaluate, BitBuffer, DagValue, SelectionDag, ValueType};
use seldag_compiler_legalize::{
    classify, legalize_types, LegalizeAction, LegalizeConfig, TargetLowering, ValueTypeActions,
};

/// Routes `tracing` output through the test harness. Safe to call from
/// every test.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn legalize(dag: &SelectionDag, target: &dyn TargetLowering) -> SelectionDag {
    init_tracing();
    legalize_types(dag, target, LegalizeConfig::default()).expect("legalization failed")
}

pub fn run(dag: &SelectionDag, args: &[(ValueType, DagValue)]) -> BitBuffer {
    evaluate(dag, args).expect("evaluation failed")
}

/// Legalizes `dag` and checks that both graphs observe the same bits.
/// Returns the legalized graph for further inspection.
pub fn assert_equivalent(
    dag: &SelectionDag,
    target: &dyn TargetLowering,
    args: &[(ValueType, DagValue)],
) -> SelectionDag {
    let legal = legalize(dag, target);
    let expected = run(dag, args);
    let actual = run(&legal, args);
    assert_eq!(actual, expected, "legalized graph computes different bits");
    legal
}

/// Every value in `dag` has a type `target` supports.
pub fn assert_all_legal(dag: &SelectionDag, target: &dyn TargetLowering) {
    let actions = ValueTypeActions::from_target(target);
    for (id, node) in dag.nodes() {
        for vt in &node.results {
            assert_eq!(
                classify(&actions, target, *vt),
                LegalizeAction::Legal,
                "t{} ({}) still produces {vt}",
                id.index(),
                node.opcode
            );
        }
    }
}

pub fn scalar(vt: ValueType, bits: u128) -> (ValueType, DagValue) {
    (vt, DagValue::Scalar(bits))
}

pub fn vector(vt: ValueType, lanes: &[u128]) -> (ValueType, DagValue) {
    (vt, DagValue::Vector(lanes.to_vec()))
}
