//! # Remap / Replace Engine
//!
//! A replaced value keeps its node; the replacement is recorded in a table
//! and every reader resolves edges through it. Use entries are moved to the
//! replacement so the pending counts of users stay exact.

use rustc_hash::FxHashMap;
use seldag_compiler_dag::{NodeId, SdValue};
use smallvec::SmallVec;
use tracing::trace;

use crate::error::{LegalizeError, LegalizeResult};
use crate::legalizer::TypeLegalizer;
use crate::state::NodeState;

/// Value-to-value redirections recorded when a value is superseded.
#[derive(Debug, Default)]
pub struct ReplacementTable {
    replaced: FxHashMap<SdValue, SdValue>,
}

impl ReplacementTable {
    /// Follows the replacement chain of `value` to its end and points every
    /// value on the chain straight at it.
    ///
    /// # Panics
    ///
    /// Panics if the chain is cyclic. Replacements only ever point at values
    /// that were produced later, so a cycle means the table is corrupt.
    pub fn resolve(&mut self, value: SdValue) -> SdValue {
        let mut canonical = value;
        let mut steps = 0usize;
        while let Some(next) = self.replaced.get(&canonical).copied() {
            canonical = next;
            steps += 1;
            assert!(
                steps <= self.replaced.len(),
                "replacement chain from {value} does not terminate"
            );
        }
        if steps > 1 {
            let mut current = value;
            while current != canonical {
                match self.replaced.insert(current, canonical) {
                    Some(next) => current = next,
                    None => break,
                }
            }
        }
        canonical
    }

    pub fn record(&mut self, from: SdValue, to: SdValue) {
        debug_assert_ne!(from, to, "a value cannot replace itself");
        self.replaced.insert(from, to);
    }

    /// Drops the redirection of `value`; returns whether there was one.
    pub fn forget(&mut self, value: SdValue) -> bool {
        self.replaced.remove(&value).is_some()
    }

    pub fn len(&self) -> usize {
        self.replaced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replaced.is_empty()
    }
}

impl TypeLegalizer<'_> {
    /// Canonical form of `value`. Resolving a canonical value returns it
    /// unchanged.
    pub fn remap(&mut self, value: SdValue) -> SdValue {
        self.replaced.resolve(value)
    }

    /// Removes the stale table entries keyed by `value`.
    fn expunge_value(&mut self, value: SdValue) -> usize {
        self.maps.expunge(value) + usize::from(self.replaced.forget(value))
    }

    /// Makes `to` the canonical form of `from` for every existing and future
    /// reader.
    ///
    /// The use entries of `from` move to `to`, and every pending user has its
    /// operand count recomputed (it is queued if that makes it ready). Users
    /// that have not been analyzed yet are left for their own analysis.
    pub(crate) fn replace_value_with(&mut self, from: SdValue, to: SdValue) -> LegalizeResult<()> {
        let to = self.remap(to);
        if from == to {
            return Ok(());
        }
        debug_assert_ne!(from.node, to.node, "potential legalization loop");
        self.analyze_new_node(to.node)?;

        let stale = self.expunge_value(from);
        self.replaced.record(from, to);
        let moved = self.dag.take_uses_of(from);
        trace!(%from, %to, uses = moved.len(), stale, "replace value");

        let mut users: SmallVec<[NodeId; 4]> = SmallVec::new();
        for entry in &moved {
            self.dag.add_use(to, entry.user, entry.operand);
            if !users.contains(&entry.user) {
                users.push(entry.user);
            }
        }
        for user in users {
            match self.states.get(user) {
                NodeState::NewNode => {}
                NodeState::Pending(_) => self.reanalyze_node(user)?,
                state => {
                    return Err(LegalizeError::InvalidNodeState {
                        node: user,
                        state,
                        expected: "a pending or new user",
                    })
                }
            }
        }
        Ok(())
    }

    /// Replaces every result of `from` with the same result of `to`.
    ///
    /// This is also how a root with no results moves to its rewritten copy.
    pub(crate) fn replace_node_with(&mut self, from: NodeId, to: NodeId) -> LegalizeResult<()> {
        let results = self.dag.node(from).num_results();
        debug_assert_eq!(results, self.dag.node(to).num_results());
        for slot in 0..results as u32 {
            self.replace_value_with(SdValue::new(from, slot), SdValue::new(to, slot))?;
        }
        self.analyze_new_node(to)?;
        if self.root == Some(from) {
            trace!(from = from.index(), to = to.index(), "root moved");
            self.root = Some(to);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(id: usize) -> SdValue {
        SdValue::new(NodeId::from_raw(id), 0)
    }

    #[test]
    fn resolve_is_idempotent_on_canonical_values() {
        let mut table = ReplacementTable::default();
        table.record(value(0), value(1));
        assert_eq!(table.resolve(value(1)), value(1));
        assert_eq!(table.resolve(value(7)), value(7));
        let once = table.resolve(value(0));
        assert_eq!(table.resolve(once), value(1));
    }

    #[test]
    fn resolve_compresses_chains() {
        let mut table = ReplacementTable::default();
        table.record(value(0), value(1));
        table.record(value(1), value(2));
        table.record(value(2), value(3));

        assert_eq!(table.resolve(value(0)), value(3));
        assert_eq!(table.replaced[&value(0)], value(3));
        assert_eq!(table.replaced[&value(1)], value(3));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn other_slots_are_independent() {
        let mut table = ReplacementTable::default();
        table.record(value(0), value(1));
        let second = SdValue::new(NodeId::from_raw(0), 1);
        assert_eq!(table.resolve(second), second);
        assert!(table.forget(value(0)));
        assert!(table.is_empty());
    }

    #[test]
    #[should_panic(expected = "does not terminate")]
    fn cyclic_chains_are_detected() {
        let mut table = ReplacementTable::default();
        table.record(value(0), value(1));
        table.record(value(1), value(0));
        table.resolve(value(0));
    }
}
