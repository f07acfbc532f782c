//! # Worklist Driver
//!
//! Runs nodes to a fixed point. A node is visited once all of its operands
//! are processed: illegal results are converted first, and a node with legal
//! results has its first illegal operand rewritten. Rewrites create nodes
//! that are analyzed and visited in turn.

use rustc_hash::FxHashSet;
use seldag_compiler_dag::{NodeId, PrettyPrint, SdValue, SelectionDag, Use};
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::action::LegalizeAction;
use crate::error::{LegalizeError, LegalizeResult};
use crate::handlers::OperandRewrite;
use crate::legalizer::{LegalizeStats, TypeLegalizer};
use crate::state::NodeState;
use crate::target::TargetLowering;

/// Configuration for a legalization run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegalizeConfig {
    /// Check that every live node is processed and legal after the run
    pub verify: bool,
    /// Log the graph before and after the run at debug level
    pub dump_graphs: bool,
}

impl Default for LegalizeConfig {
    fn default() -> Self {
        Self {
            verify: true,
            dump_graphs: false,
        }
    }
}

/// Legalizes the types of `dag` for `target`, returning the live part of the
/// rewritten graph.
pub fn legalize_types(
    dag: &SelectionDag,
    target: &dyn TargetLowering,
    config: LegalizeConfig,
) -> LegalizeResult<SelectionDag> {
    TypeLegalizer::new(dag, target, config)?
        .run()
        .map(|(legalized, _)| legalized)
}

impl TypeLegalizer<'_> {
    /// Runs the worklist to completion, returning the live legalized graph
    /// and the run's counters.
    pub fn run(mut self) -> LegalizeResult<(SelectionDag, LegalizeStats)> {
        if self.config.dump_graphs {
            debug!("before type legalization:\n{}", self.dag.pretty_print(1));
        }

        // Every node is pending on each of its operand edges; leaves start ready.
        let ids: Vec<NodeId> = self.dag.nodes().map(|(id, _)| id).collect();
        for id in ids {
            let operands = self.dag.node(id).num_operands() as u32;
            if self.states.set_pending(id, operands) {
                self.push(id);
            }
        }

        while let Some(id) = self.worklist.pop() {
            let state = self.states.get(id);
            if state != NodeState::ReadyToProcess {
                return Err(LegalizeError::InvalidNodeState {
                    node: id,
                    state,
                    expected: "ready",
                });
            }
            self.stats.nodes_visited += 1;
            self.legalize_node(id)?;
            self.mark_processed(id)?;
        }

        if self.config.verify {
            self.verify()?;
        }

        let root = self.root.ok_or(LegalizeError::NoRoot)?;
        let legalized = self
            .dag
            .extract_live(root, |value| self.replaced.resolve(value));
        self.stats.live_nodes = legalized.len();
        info!(
            target_name = self.target().name(),
            visited = self.stats.nodes_visited,
            created = self.stats.nodes_created,
            live = self.stats.live_nodes,
            "type legalization finished"
        );
        if self.config.dump_graphs {
            debug!("after type legalization:\n{}", legalized.pretty_print(1));
        }
        Ok((legalized, self.stats))
    }

    fn legalize_node(&mut self, id: NodeId) -> LegalizeResult<()> {
        let opcode = self.node(id).opcode;
        let results = self.node(id).results.clone();

        let mut converted = false;
        for (slot, vt) in results.into_iter().enumerate() {
            let action = self.action(vt);
            if action == LegalizeAction::Legal {
                continue;
            }
            debug!(node = id.index(), %opcode, %vt, %action, "legalize result");
            let handler = self.handlers.result(action, opcode).ok_or(
                LegalizeError::NoResultHandler {
                    action,
                    opcode,
                    node: id,
                },
            )?;
            handler(self, id, slot as u32)?;
            converted = true;
        }
        if converted {
            return Ok(());
        }

        // Only the first illegal operand is rewritten here; the rewritten node
        // is visited again for the rest.
        for operand in 0..self.node(id).num_operands() as u32 {
            let value = self.operand(id, operand);
            let vt = self.value_type(value);
            let action = self.action(vt);
            if action == LegalizeAction::Legal {
                continue;
            }
            debug!(node = id.index(), %opcode, operand, %vt, %action, "legalize operand");
            let handler = self.handlers.operand(action, opcode).ok_or(
                LegalizeError::NoOperandHandler {
                    action,
                    opcode,
                    node: id,
                    operand,
                },
            )?;
            match handler(self, id, operand)? {
                OperandRewrite::Node(new) if new == id => {}
                OperandRewrite::Node(new) => self.replace_node_with(id, new)?,
                OperandRewrite::Value(value) => {
                    if self.node(id).num_results() != 1 {
                        return Err(LegalizeError::Unsupported {
                            opcode,
                            node: id,
                            reason: "a value rewrite needs a single-result node".to_string(),
                        });
                    }
                    self.replace_value_with(SdValue::new(id, 0), value)?;
                }
            }
            break;
        }
        Ok(())
    }

    /// Marks `id` processed and resolves one pending edge of each user.
    fn mark_processed(&mut self, id: NodeId) -> LegalizeResult<()> {
        self.states.set(id, NodeState::Processed);
        let users: SmallVec<[Use; 4]> = self.dag.uses(id).iter().copied().collect();
        for entry in users {
            if self.states.operand_resolved(entry.user)? {
                self.push(entry.user);
            }
        }
        Ok(())
    }

    /// Every node reachable from the root must be processed and legal.
    fn verify(&mut self) -> LegalizeResult<()> {
        let root = self.root.ok_or(LegalizeError::NoRoot)?;
        let mut seen = FxHashSet::default();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if !self.states.is_processed(id) {
                return Err(LegalizeError::UnprocessedNode { node: id });
            }
            let node = self.node(id);
            let opcode = node.opcode;
            if let Some(vt) = node
                .results
                .clone()
                .into_iter()
                .find(|vt| self.action(*vt) != LegalizeAction::Legal)
            {
                return Err(LegalizeError::IllegalTypeRemains {
                    node: id,
                    opcode,
                    vt,
                });
            }
            let operands = self.operands(id);
            stack.extend(operands.iter().map(|value| value.node));
        }
        Ok(())
    }
}
