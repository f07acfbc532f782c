//! # Node State Tracker
//!
//! Per-node scheduling state. A node is pending while some of its operand
//! edges read nodes that have not been processed yet; it becomes ready when
//! the last of them is.

use index_vec::IndexVec;
use seldag_compiler_dag::NodeId;

use crate::error::{LegalizeError, LegalizeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Every operand has been processed; the node is on the worklist.
    ReadyToProcess,
    /// Created during legalization and not analyzed yet.
    NewNode,
    /// The node's results are legal or have recorded substitutes.
    Processed,
    /// This many operand edges still read unprocessed nodes.
    Pending(u32),
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadyToProcess => write!(f, "ready"),
            Self::NewNode => write!(f, "new"),
            Self::Processed => write!(f, "processed"),
            Self::Pending(count) => write!(f, "pending({count})"),
        }
    }
}

/// State of every node in the graph. Nodes the tracker has never seen are
/// `NewNode`.
#[derive(Debug, Default)]
pub struct NodeStates {
    states: IndexVec<NodeId, NodeState>,
}

impl NodeStates {
    pub fn get(&self, id: NodeId) -> NodeState {
        self.states.get(id).copied().unwrap_or(NodeState::NewNode)
    }

    pub fn set(&mut self, id: NodeId, state: NodeState) {
        while self.states.len() <= id.index() {
            self.states.push(NodeState::NewNode);
        }
        self.states[id] = state;
    }

    /// Sets the state implied by `pending` unresolved operand edges and
    /// returns true if the node is ready.
    pub fn set_pending(&mut self, id: NodeId, pending: u32) -> bool {
        if pending == 0 {
            self.set(id, NodeState::ReadyToProcess);
            true
        } else {
            self.set(id, NodeState::Pending(pending));
            false
        }
    }

    /// Records that one operand edge of `id` now reads a processed node.
    ///
    /// Returns true when this makes the node ready. Unanalyzed nodes are left
    /// alone: they count their operands when they are analyzed.
    pub fn operand_resolved(&mut self, id: NodeId) -> LegalizeResult<bool> {
        match self.get(id) {
            NodeState::NewNode => Ok(false),
            NodeState::Pending(count) => Ok(self.set_pending(id, count - 1)),
            state => Err(LegalizeError::InvalidNodeState {
                node: id,
                state,
                expected: "a pending user",
            }),
        }
    }

    pub fn is_processed(&self, id: NodeId) -> bool {
        self.get(id) == NodeState::Processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_counts_down_to_ready() {
        let mut states = NodeStates::default();
        let id = NodeId::from_raw(3);
        assert_eq!(states.get(id), NodeState::NewNode);

        assert!(!states.set_pending(id, 2));
        assert!(!states.operand_resolved(id).unwrap());
        assert_eq!(states.get(id), NodeState::Pending(1));
        assert!(states.operand_resolved(id).unwrap());
        assert_eq!(states.get(id), NodeState::ReadyToProcess);
    }

    #[test]
    fn resolving_a_ready_node_is_an_error() {
        let mut states = NodeStates::default();
        let id = NodeId::from_raw(0);
        states.set(id, NodeState::ReadyToProcess);
        assert!(matches!(
            states.operand_resolved(id),
            Err(LegalizeError::InvalidNodeState { .. })
        ));
        assert!(!states.operand_resolved(NodeId::from_raw(9)).unwrap());
    }
}
