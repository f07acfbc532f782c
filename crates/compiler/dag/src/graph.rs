//! # Selection DAG
//!
//! Arena of immutable nodes addressed by stable [`NodeId`] handles. The arena
//! only grows: ids are never reused, so a handle stays meaningful for the
//! whole lifetime of the graph. Each node keeps a use list of the operand
//! edges that read it.

use index_vec::IndexVec;
use itertools::Itertools;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{
    indent_str, CondCode, Node, NodeAttr, NodeId, Opcode, PrettyPrint, SdValue, Use, ValueType,
};

#[derive(Debug, Clone, Default)]
pub struct SelectionDag {
    nodes: IndexVec<NodeId, Node>,
    uses: IndexVec<NodeId, SmallVec<[Use; 2]>>,
    root: Option<NodeId>,
}

impl SelectionDag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node and records one use per operand edge.
    ///
    /// # Panics
    ///
    /// Panics if an operand refers to a node or result slot that does not
    /// exist; operands must be created before their users.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = self.nodes.next_idx();
        for (operand, value) in node.operands.iter().enumerate() {
            let source = &self.nodes[value.node];
            assert!(
                (value.slot as usize) < source.num_results(),
                "operand {operand} of new node reads missing result {value}"
            );
            self.uses[value.node].push(Use {
                user: id,
                operand: operand as u32,
                slot: value.slot,
            });
        }
        self.uses.push(SmallVec::new());
        self.nodes.push(node)
    }

    /// Creates a node from its parts.
    pub fn get_node(
        &mut self,
        opcode: Opcode,
        operands: &[SdValue],
        results: &[ValueType],
        attr: NodeAttr,
    ) -> NodeId {
        self.add_node(Node::new(opcode, operands, results, attr))
    }

    /// Creates a single-result node and returns its value.
    pub fn get_value(
        &mut self,
        opcode: Opcode,
        operands: &[SdValue],
        vt: ValueType,
        attr: NodeAttr,
    ) -> SdValue {
        SdValue::new(self.get_node(opcode, operands, &[vt], attr), 0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter_enumerated()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn value_type(&self, value: SdValue) -> ValueType {
        self.nodes[value.node].results[value.slot as usize]
    }

    pub fn operand(&self, id: NodeId, index: usize) -> SdValue {
        self.nodes[id].operands[index]
    }

    /// The operand edges currently reading any result of `id`.
    pub fn uses(&self, id: NodeId) -> &[Use] {
        &self.uses[id]
    }

    /// Removes and returns the use entries that read `value`.
    pub fn take_uses_of(&mut self, value: SdValue) -> SmallVec<[Use; 2]> {
        let list = &mut self.uses[value.node];
        let (taken, kept): (SmallVec<[Use; 2]>, SmallVec<[Use; 2]>) =
            list.drain(..).partition(|u| u.slot == value.slot);
        *list = kept;
        taken
    }

    /// Attaches an existing operand edge to the use list of `value`'s node.
    pub fn add_use(&mut self, value: SdValue, user: NodeId, operand: u32) {
        self.uses[value.node].push(Use {
            user,
            operand,
            slot: value.slot,
        });
    }

    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    // --- Builders ---

    /// A `vt`-typed slice of argument `index` starting at bit `offset`.
    pub fn argument(&mut self, index: u32, offset: u32, vt: ValueType) -> SdValue {
        self.get_value(Opcode::Argument, &[], vt, NodeAttr::Arg { index, offset })
    }

    /// Integer constant; `bits` is truncated to the lane width.
    pub fn constant(&mut self, bits: u128, vt: ValueType) -> SdValue {
        self.get_value(Opcode::Constant, &[], vt, NodeAttr::Imm(bits & vt.bit_mask()))
    }

    /// Float constant from its bit pattern.
    pub fn constant_fp(&mut self, bits: u128, vt: ValueType) -> SdValue {
        self.get_value(Opcode::ConstantFp, &[], vt, NodeAttr::Imm(bits & vt.bit_mask()))
    }

    pub fn undef(&mut self, vt: ValueType) -> SdValue {
        self.get_value(Opcode::Undef, &[], vt, NodeAttr::None)
    }

    /// Two-operand operation producing the type of `lhs`.
    pub fn binary(&mut self, opcode: Opcode, lhs: SdValue, rhs: SdValue) -> SdValue {
        let vt = self.value_type(lhs);
        self.get_value(opcode, &[lhs, rhs], vt, NodeAttr::None)
    }

    /// One-operand operation producing the operand type.
    pub fn unary(&mut self, opcode: Opcode, value: SdValue) -> SdValue {
        let vt = self.value_type(value);
        self.get_value(opcode, &[value], vt, NodeAttr::None)
    }

    /// Conversion of `value` to `vt` (extensions, truncation, bitcast, rounding).
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

    pub fn build_vector(&mut self, elements: &[SdValue], vt: ValueType) -> SdValue {
        self.get_value(Opcode::BuildVector, elements, vt, NodeAttr::None)
    }

    pub fn extract_element(&mut self, vector: SdValue, index: SdValue) -> SdValue {
        let vt = self.value_type(vector).scalar_type();
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

    pub fn shuffle(&mut self, lhs: SdValue, rhs: SdValue, mask: Vec<Option<u32>>) -> SdValue {
        let elem = self.value_type(lhs).scalar_type();
        let vt = ValueType::vector_of(elem, mask.len() as u32)
            .unwrap_or_else(|| panic!("no {}-lane vector of {elem}", mask.len()));
        self.get_value(Opcode::VectorShuffle, &[lhs, rhs], vt, NodeAttr::Mask(mask))
    }

    pub fn concat_vectors(&mut self, lo: SdValue, hi: SdValue, vt: ValueType) -> SdValue {
        self.get_value(Opcode::ConcatVectors, &[lo, hi], vt, NodeAttr::None)
    }

    /// Output node observing every bit of each value.
    pub fn output(&mut self, values: &[SdValue]) -> NodeId {
        let widths = values
            .iter()
            .map(|v| self.value_type(*v).size_in_bits())
            .collect();
        self.output_with_widths(values, widths)
    }

    pub fn output_with_widths(&mut self, values: &[SdValue], widths: Vec<u32>) -> NodeId {
        self.get_node(Opcode::Output, values, &[], NodeAttr::Widths(widths))
    }

    /// Copies the nodes reachable from `root` into a fresh graph.
    ///
    /// Every operand is passed through `canonical` before it is followed, so
    /// the copy reflects the canonical form of each edge. Canonical edges may
    /// point at nodes created after their user, so the copy is laid out in
    /// post-order rather than by id. Unreachable nodes are dropped.
    pub fn extract_live(
        &self,
        root: NodeId,
        mut canonical: impl FnMut(SdValue) -> SdValue,
    ) -> Self {
        // Post-order walk with an explicit stack: chains can be long.
        let mut operands: FxHashMap<NodeId, SmallVec<[SdValue; 3]>> = FxHashMap::default();
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if operands.contains_key(&id) {
                continue;
            }
            let resolved: SmallVec<[SdValue; 3]> =
                self.nodes[id].operands.iter().map(|v| canonical(*v)).collect();
            stack.push((id, true));
            for value in resolved.iter().rev() {
                if !operands.contains_key(&value.node) {
                    stack.push((value.node, false));
                }
            }
            operands.insert(id, resolved);
        }

        let mut remapped: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        let mut live = Self::new();
        for id in order {
            let old = &self.nodes[id];
            let new_operands: SmallVec<[SdValue; 3]> = operands[&id]
                .iter()
                .map(|v| SdValue::new(remapped[&v.node], v.slot))
                .collect();
            let new_id = live.add_node(Node {
                opcode: old.opcode,
                operands: new_operands,
                results: old.results.clone(),
                attr: old.attr.clone(),
            });
            remapped.insert(id, new_id);
        }
        live.root = Some(remapped[&root]);
        live
    }

    fn format_node(&self, id: NodeId) -> String {
        let node = &self.nodes[id];
        let attr = match &node.attr {
            NodeAttr::None => String::new(),
            NodeAttr::Imm(bits) => format!("<{bits:#x}>"),
            NodeAttr::Cond(cc) => format!("<{cc}>"),
            NodeAttr::Mask(mask) => format!(
                "<{}>",
                mask.iter()
                    .map(|lane| lane.map_or_else(|| "u".to_string(), |l| l.to_string()))
                    .join(",")
            ),
            NodeAttr::Arg { index, offset } => format!("<#{index}+{offset}>"),
            NodeAttr::Widths(widths) => format!("<{}>", widths.iter().join(",")),
        };
        let operands = node.operands.iter().join(", ");
        let head = if node.results.is_empty() {
            format!("t{}", id.index())
        } else {
            format!("t{}: {}", id.index(), node.results.iter().join(","))
        };
        if operands.is_empty() {
            format!("{head} = {}{attr}", node.opcode)
        } else {
            format!("{head} = {}{attr} {operands}", node.opcode)
        }
    }
}

impl PrettyPrint for SelectionDag {
    fn pretty_print(&self, indent: usize) -> String {
        let base = indent_str(indent);
        let mut out = String::new();
        for (id, _) in self.nodes() {
            out.push_str(&base);
            out.push_str(&self.format_node(id));
            if self.root == Some(id) {
                out.push_str("  ; root");
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_node_records_uses() {
        let mut dag = SelectionDag::new();
        let a = dag.argument(0, 0, ValueType::I32);
        let b = dag.argument(1, 0, ValueType::I32);
        let sum = dag.binary(Opcode::Add, a, a);
        let _prod = dag.binary(Opcode::Mul, sum, b);

        assert_eq!(dag.uses(a.node).len(), 2);
        assert!(dag.uses(a.node).iter().all(|u| u.user == sum.node));
        assert_eq!(dag.uses(b.node)[0].operand, 1);
    }

    #[test]
    fn take_uses_moves_only_matching_slot() {
        let mut dag = SelectionDag::new();
        let a = dag.argument(0, 0, ValueType::I32);
        let neg = dag.unary(Opcode::Ctpop, a);
        let taken = dag.take_uses_of(a);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].user, neg.node);
        assert!(dag.uses(a.node).is_empty());

        dag.add_use(neg, neg.node, 0);
        assert_eq!(dag.uses(neg.node).len(), 1);
    }

    #[test]
    fn extract_live_drops_dead_nodes_and_follows_canonical_edges() {
        let mut dag = SelectionDag::new();
        let a = dag.argument(0, 0, ValueType::I32);
        let stale = dag.unary(Opcode::Ctpop, a);
        let fresh = dag.unary(Opcode::Ctlz, a);
        let _dead = dag.constant(7, ValueType::I32);
        let out = dag.output(&[stale]);
        dag.set_root(out);

        let live = dag.extract_live(out, |v| if v == stale { fresh } else { v });
        assert_eq!(live.len(), 3);
        let root = live.root().unwrap();
        let operand = live.operand(root, 0);
        assert_eq!(live.node(operand.node).opcode, Opcode::Ctlz);
    }

    #[test]
    fn pretty_print_graph() {
        let mut dag = SelectionDag::new();
        let a = dag.argument(0, 0, ValueType::I64);
        let one = dag.constant(1, ValueType::I64);
        let sum = dag.binary(Opcode::Add, a, one);
        let lt = dag.setcc(sum, a, CondCode::Ult, ValueType::I1);
        let out = dag.output(&[sum, lt]);
        dag.set_root(out);

        insta::assert_snapshot!(dag.pretty_print(0), @r"
        t0: i64 = argument<#0+0>
        t1: i64 = constant<0x1>
        t2: i64 = add t0, t1
        t3: i1 = setcc<ult> t2, t0
        t4 = output<64,1> t2, t3  ; root
        ");
    }
}
