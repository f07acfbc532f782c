//! # Type Legalizer
//!
//! The engine state of one legalization run: the graph being rewritten, the
//! node state tracker, the conversion tables, and the worklist. Handlers
//! receive `&mut TypeLegalizer` and use it to read operands, create nodes and
//! record the substitutes of illegal results.
//!
//! Operand edges are never edited in place. Every read goes through
//! [`TypeLegalizer::remap`], and every node created here has its operands
//! remapped first.

use seldag_compiler_dag::{CondCode, Node, NodeAttr, NodeId, Opcode, SdValue, SelectionDag, ValueType};
use smallvec::SmallVec;
use tracing::trace;

use crate::action::{classify, LegalizeAction, ValueTypeActions};
use crate::driver::LegalizeConfig;
use crate::error::{LegalizeError, LegalizeResult};
use crate::handlers::HandlerTable;
use crate::maps::{ConversionKind, ConversionMaps};
use crate::remap::ReplacementTable;
use crate::state::{NodeState, NodeStates};
use crate::target::TargetLowering;

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegalizeStats {
    pub nodes_visited: usize,
    pub nodes_created: usize,
    pub live_nodes: usize,
}

pub struct TypeLegalizer<'t> {
    pub(crate) dag: SelectionDag,
    target: &'t dyn TargetLowering,
    actions: ValueTypeActions,
    pub(crate) states: NodeStates,
    pub(crate) maps: ConversionMaps,
    pub(crate) replaced: ReplacementTable,
    pub(crate) worklist: Vec<NodeId>,
    pub(crate) handlers: HandlerTable,
    pub(crate) root: Option<NodeId>,
    pub(crate) config: LegalizeConfig,
    pub(crate) stats: LegalizeStats,
}

impl<'t> TypeLegalizer<'t> {
    /// Prepares a run over a copy of the live part of `dag`.
    pub fn new(
        dag: &SelectionDag,
        target: &'t dyn TargetLowering,
        config: LegalizeConfig,
    ) -> LegalizeResult<Self> {
        let root = dag.root().ok_or(LegalizeError::NoRoot)?;
        let dag = dag.extract_live(root, |value| value);
        let root = dag.root();
        Ok(Self {
            dag,
            target,
            actions: ValueTypeActions::from_target(target),
            states: NodeStates::default(),
            maps: ConversionMaps::default(),
            replaced: ReplacementTable::default(),
            worklist: Vec::new(),
            handlers: HandlerTable::new(),
            root,
            config,
            stats: LegalizeStats::default(),
        })
    }

    pub fn target(&self) -> &'t dyn TargetLowering {
        self.target
    }

    pub fn action(&self, vt: ValueType) -> LegalizeAction {
        classify(&self.actions, self.target, vt)
    }

    pub fn transform_to(&self, vt: ValueType) -> ValueType {
        self.target.type_to_transform_to(vt)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.dag.node(id)
    }

    pub fn value_type(&self, value: SdValue) -> ValueType {
        self.dag.value_type(value)
    }

    /// Canonical form of operand `index` of `id`.
    pub fn operand(&mut self, id: NodeId, index: u32) -> SdValue {
        let value = self.dag.operand(id, index as usize);
        self.remap(value)
    }

    pub fn operands(&mut self, id: NodeId) -> SmallVec<[SdValue; 3]> {
        let operands = self.dag.node(id).operands.clone();
        operands.into_iter().map(|value| self.remap(value)).collect()
    }

    /// Immediate of `value` if it is produced by an integer `Constant`.
    pub fn constant_value(&self, value: SdValue) -> Option<u128> {
        let node = self.dag.node(value.node);
        match node.opcode {
            Opcode::Constant => node.imm(),
            _ => None,
        }
    }

    pub(crate) fn push(&mut self, id: NodeId) {
        trace!(node = id.index(), "worklist push");
        self.worklist.push(id);
    }

    // --- Analysis ---

    /// Computes the state of a node created during legalization.
    ///
    /// Unanalyzed operands are analyzed first. The node becomes pending on
    /// every operand edge whose source is not processed yet, or ready (and
    /// queued) if there is none. Nodes that already have a state are left
    /// untouched.
    pub(crate) fn analyze_new_node(&mut self, id: NodeId) -> LegalizeResult<()> {
        if self.states.get(id) != NodeState::NewNode {
            return Ok(());
        }
        let operands = self.dag.node(id).operands.clone();
        let mut pending = 0;
        for value in operands {
            let value = self.remap(value);
            self.analyze_new_node(value.node)?;
            if !self.states.is_processed(value.node) {
                pending += 1;
            }
        }
        if self.states.set_pending(id, pending) {
            self.push(id);
        }
        Ok(())
    }

    /// Recounts the pending operands of a node whose operand edges changed.
    pub(crate) fn reanalyze_node(&mut self, id: NodeId) -> LegalizeResult<()> {
        self.states.set(id, NodeState::NewNode);
        self.analyze_new_node(id)
    }

    // --- Node creation ---

    pub fn get_node(
        &mut self,
        opcode: Opcode,
        operands: &[SdValue],
        results: &[ValueType],
        attr: NodeAttr,
    ) -> NodeId {
        let operands: SmallVec<[SdValue; 3]> =
            operands.iter().map(|value| self.remap(*value)).collect();
        let id = self.dag.get_node(opcode, &operands, results, attr);
        self.stats.nodes_created += 1;
        trace!(node = id.index(), %opcode, "created");
        id
    }

    pub fn get_value(
        &mut self,
        opcode: Opcode,
        operands: &[SdValue],
        vt: ValueType,
        attr: NodeAttr,
    ) -> SdValue {
        SdValue::new(self.get_node(opcode, operands, &[vt], attr), 0)
    }

    pub fn argument(&mut self, index: u32, offset: u32, vt: ValueType) -> SdValue {
        self.get_value(Opcode::Argument, &[], vt, NodeAttr::Arg { index, offset })
    }

    pub fn constant(&mut self, bits: u128, vt: ValueType) -> SdValue {
        self.get_value(Opcode::Constant, &[], vt, NodeAttr::Imm(bits & vt.bit_mask()))
    }

    pub fn constant_fp(&mut self, bits: u128, vt: ValueType) -> SdValue {
        self.get_value(Opcode::ConstantFp, &[], vt, NodeAttr::Imm(bits & vt.bit_mask()))
    }

    pub fn undef(&mut self, vt: ValueType) -> SdValue {
        self.get_value(Opcode::Undef, &[], vt, NodeAttr::None)
    }

    pub fn binary(&mut self, opcode: Opcode, lhs: SdValue, rhs: SdValue) -> SdValue {
        let vt = self.value_type(lhs);
        self.get_value(opcode, &[lhs, rhs], vt, NodeAttr::None)
    }

    pub fn unary(&mut self, opcode: Opcode, value: SdValue) -> SdValue {
        let vt = self.value_type(value);
        self.get_value(opcode, &[value], vt, NodeAttr::None)
    }

    pub fn cast(&mut self, opcode: Opcode, value: SdValue, vt: ValueType) -> SdValue {
        self.get_value(opcode, &[value], vt, NodeAttr::None)
    }

    pub fn setcc(&mut self, lhs: SdValue, rhs: SdValue, cc: CondCode, vt: ValueType) -> SdValue {
        self.get_value(Opcode::SetCc, &[lhs, rhs], vt, NodeAttr::Cond(cc))
    }

    pub fn select(&mut self, cond: SdValue, if_true: SdValue, if_false: SdValue) -> SdValue {
        let vt = self.value_type(if_true);
        self.get_value(Opcode::Select, &[cond, if_true, if_false], vt, NodeAttr::None)
    }

    pub fn build_pair(&mut self, lo: SdValue, hi: SdValue, vt: ValueType) -> SdValue {
        self.get_value(Opcode::BuildPair, &[lo, hi], vt, NodeAttr::None)
    }

    pub fn concat_vectors(&mut self, lo: SdValue, hi: SdValue, vt: ValueType) -> SdValue {
        self.get_value(Opcode::ConcatVectors, &[lo, hi], vt, NodeAttr::None)
    }

    pub fn build_vector(&mut self, elements: &[SdValue], vt: ValueType) -> SdValue {
        self.get_value(Opcode::BuildVector, elements, vt, NodeAttr::None)
    }

    /// `extract_element vector, lane` with a constant lane index.
    pub fn extract_lane(&mut self, vector: SdValue, lane: u32) -> SdValue {
        let index = self.constant(u128::from(lane), self.target.vector_index_type());
        self.extract_element(vector, index)
    }

    pub fn extract_element(&mut self, vector: SdValue, index: SdValue) -> SdValue {
        let vt = self.value_type(vector).scalar_type();
        self.extract_element_as(vector, index, vt)
    }

    /// `extract_element` producing `vt`, which may be wider than the lane:
    /// the bits above the lane are unspecified.
    pub fn extract_element_as(&mut self, vector: SdValue, index: SdValue, vt: ValueType) -> SdValue {
        self.get_value(Opcode::ExtractElement, &[vector, index], vt, NodeAttr::None)
    }

    pub fn insert_element(&mut self, vector: SdValue, element: SdValue, index: SdValue) -> SdValue {
        let vt = self.value_type(vector);
        self.get_value(
            Opcode::InsertElement,
            &[vector, element, index],
            vt,
            NodeAttr::None,
        )
    }

    pub fn shuffle(
        &mut self,
        lhs: SdValue,
        rhs: SdValue,
        mask: Vec<Option<u32>>,
        vt: ValueType,
    ) -> SdValue {
        self.get_value(Opcode::VectorShuffle, &[lhs, rhs], vt, NodeAttr::Mask(mask))
    }

    // --- Conversion tables ---

    fn get_single(&mut self, kind: ConversionKind, value: SdValue) -> LegalizeResult<SdValue> {
        let key = self.remap(value);
        let stored = self.maps.single(kind, key)?;
        let canonical = self.remap(stored);
        if canonical != stored {
            self.maps.refresh_single(kind, key, canonical);
        }
        Ok(canonical)
    }

    fn get_pair(
        &mut self,
        kind: ConversionKind,
        value: SdValue,
    ) -> LegalizeResult<(SdValue, SdValue)> {
        let key = self.remap(value);
        let stored = self.maps.pair(kind, key)?;
        let canonical = (self.remap(stored.0), self.remap(stored.1));
        if canonical != stored {
            self.maps.refresh_pair(kind, key, canonical);
        }
        Ok(canonical)
    }

    fn set_single(
        &mut self,
        kind: ConversionKind,
        value: SdValue,
        substitute: SdValue,
    ) -> LegalizeResult<()> {
        let substitute = self.remap(substitute);
        self.analyze_new_node(substitute.node)?;
        self.maps.insert_single(kind, value, substitute)?;
        trace!(%value, %substitute, %kind, "recorded");
        Ok(())
    }

    fn set_pair(
        &mut self,
        kind: ConversionKind,
        value: SdValue,
        lo: SdValue,
        hi: SdValue,
    ) -> LegalizeResult<()> {
        let (lo, hi) = (self.remap(lo), self.remap(hi));
        self.analyze_new_node(lo.node)?;
        self.analyze_new_node(hi.node)?;
        self.maps.insert_pair(kind, value, lo, hi)?;
        trace!(%value, %lo, %hi, %kind, "recorded");
        Ok(())
    }

    pub fn get_promoted_integer(&mut self, value: SdValue) -> LegalizeResult<SdValue> {
        self.get_single(ConversionKind::Promoted, value)
    }

    pub fn set_promoted_integer(&mut self, value: SdValue, promoted: SdValue) -> LegalizeResult<()> {
        debug_assert!(
            self.value_type(promoted).size_in_bits() > self.value_type(value).size_in_bits(),
            "promotion must widen {value}"
        );
        self.set_single(ConversionKind::Promoted, value, promoted)
    }

    pub fn get_promoted_float(&mut self, value: SdValue) -> LegalizeResult<SdValue> {
        self.get_single(ConversionKind::Promoted, value)
    }

    pub fn set_promoted_float(&mut self, value: SdValue, promoted: SdValue) -> LegalizeResult<()> {
        debug_assert_eq!(
            self.value_type(promoted).size_in_bits(),
            self.value_type(value).size_in_bits(),
            "float promotion must keep the width of {value}"
        );
        self.set_single(ConversionKind::Promoted, value, promoted)
    }

    pub fn get_expanded_integer(&mut self, value: SdValue) -> LegalizeResult<(SdValue, SdValue)> {
        self.get_pair(ConversionKind::ExpandedInteger, value)
    }

    pub fn set_expanded_integer(
        &mut self,
        value: SdValue,
        lo: SdValue,
        hi: SdValue,
    ) -> LegalizeResult<()> {
        self.set_pair(ConversionKind::ExpandedInteger, value, lo, hi)
    }

    pub fn get_expanded_float(&mut self, value: SdValue) -> LegalizeResult<(SdValue, SdValue)> {
        self.get_pair(ConversionKind::ExpandedFloat, value)
    }

    pub fn set_expanded_float(
        &mut self,
        value: SdValue,
        lo: SdValue,
        hi: SdValue,
    ) -> LegalizeResult<()> {
        self.set_pair(ConversionKind::ExpandedFloat, value, lo, hi)
    }

    pub fn get_scalarized_vector(&mut self, value: SdValue) -> LegalizeResult<SdValue> {
        self.get_single(ConversionKind::Scalarized, value)
    }

    pub fn set_scalarized_vector(&mut self, value: SdValue, element: SdValue) -> LegalizeResult<()> {
        self.set_single(ConversionKind::Scalarized, value, element)
    }

    pub fn get_split_vector(&mut self, value: SdValue) -> LegalizeResult<(SdValue, SdValue)> {
        self.get_pair(ConversionKind::Split, value)
    }

    pub fn set_split_vector(&mut self, value: SdValue, lo: SdValue, hi: SdValue) -> LegalizeResult<()> {
        self.set_pair(ConversionKind::Split, value, lo, hi)
    }
}
