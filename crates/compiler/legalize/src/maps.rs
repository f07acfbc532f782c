//! # Conversion Map Store
//!
//! Records the substitute values of every illegal result. Each table is keyed
//! by the original value; a key appears in at most one table.

use rustc_hash::FxHashMap;
use seldag_compiler_dag::SdValue;

use crate::error::{LegalizeError, LegalizeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionKind {
    /// One wider integer carrying the value (integers and promoted floats).
    Promoted,
    /// Low and high integer halves.
    ExpandedInteger,
    /// Low and high float parts.
    ExpandedFloat,
    /// The element of a one-lane vector.
    Scalarized,
    /// Low and high vector halves.
    Split,
}

impl ConversionKind {
    pub const ALL: [Self; 5] = [
        Self::Promoted,
        Self::ExpandedInteger,
        Self::ExpandedFloat,
        Self::Scalarized,
        Self::Split,
    ];

    pub const fn is_pair(self) -> bool {
        matches!(self, Self::ExpandedInteger | Self::ExpandedFloat | Self::Split)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Promoted => "promoted",
            Self::ExpandedInteger => "expanded-integer",
            Self::ExpandedFloat => "expanded-float",
            Self::Scalarized => "scalarized",
            Self::Split => "split",
        }
    }
}

impl std::fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Default)]
pub struct ConversionMaps {
    promoted: FxHashMap<SdValue, SdValue>,
    expanded_integers: FxHashMap<SdValue, (SdValue, SdValue)>,
    expanded_floats: FxHashMap<SdValue, (SdValue, SdValue)>,
    scalarized: FxHashMap<SdValue, SdValue>,
    split: FxHashMap<SdValue, (SdValue, SdValue)>,
}

impl ConversionMaps {
    fn singles(&self, kind: ConversionKind) -> Option<&FxHashMap<SdValue, SdValue>> {
        match kind {
            ConversionKind::Promoted => Some(&self.promoted),
            ConversionKind::Scalarized => Some(&self.scalarized),
            _ => None,
        }
    }

    fn singles_mut(&mut self, kind: ConversionKind) -> Option<&mut FxHashMap<SdValue, SdValue>> {
        match kind {
            ConversionKind::Promoted => Some(&mut self.promoted),
            ConversionKind::Scalarized => Some(&mut self.scalarized),
            _ => None,
        }
    }

    fn pairs(&self, kind: ConversionKind) -> Option<&FxHashMap<SdValue, (SdValue, SdValue)>> {
        match kind {
            ConversionKind::ExpandedInteger => Some(&self.expanded_integers),
            ConversionKind::ExpandedFloat => Some(&self.expanded_floats),
            ConversionKind::Split => Some(&self.split),
            _ => None,
        }
    }

    fn pairs_mut(
        &mut self,
        kind: ConversionKind,
    ) -> Option<&mut FxHashMap<SdValue, (SdValue, SdValue)>> {
        match kind {
            ConversionKind::ExpandedInteger => Some(&mut self.expanded_integers),
            ConversionKind::ExpandedFloat => Some(&mut self.expanded_floats),
            ConversionKind::Split => Some(&mut self.split),
            _ => None,
        }
    }

    /// The table holding `value`, if any.
    pub fn kind_of(&self, value: SdValue) -> Option<ConversionKind> {
        ConversionKind::ALL.into_iter().find(|kind| {
            self.singles(*kind)
                .map(|table| table.contains_key(&value))
                .or_else(|| self.pairs(*kind).map(|table| table.contains_key(&value)))
                .unwrap_or(false)
        })
    }

    fn check_vacant(&self, kind: ConversionKind, value: SdValue) -> LegalizeResult<()> {
        match self.kind_of(value) {
            None => Ok(()),
            Some(existing) if existing == kind => {
                Err(LegalizeError::DuplicateConversion { kind, value })
            }
            Some(existing) => Err(LegalizeError::ConflictingConversion {
                kind,
                existing,
                value,
            }),
        }
    }

    pub fn insert_single(
        &mut self,
        kind: ConversionKind,
        key: SdValue,
        value: SdValue,
    ) -> LegalizeResult<()> {
        self.check_vacant(kind, key)?;
        let table = self.singles_mut(kind).ok_or(LegalizeError::TableShape {
            kind,
            expected: "single-value",
        })?;
        table.insert(key, value);
        Ok(())
    }

    pub fn insert_pair(
        &mut self,
        kind: ConversionKind,
        key: SdValue,
        lo: SdValue,
        hi: SdValue,
    ) -> LegalizeResult<()> {
        self.check_vacant(kind, key)?;
        let table = self.pairs_mut(kind).ok_or(LegalizeError::TableShape {
            kind,
            expected: "pair",
        })?;
        table.insert(key, (lo, hi));
        Ok(())
    }

    pub fn single(&self, kind: ConversionKind, key: SdValue) -> LegalizeResult<SdValue> {
        self.singles(kind)
            .and_then(|table| table.get(&key).copied())
            .ok_or(LegalizeError::MissingConversion { kind, value: key })
    }

    pub fn pair(&self, kind: ConversionKind, key: SdValue) -> LegalizeResult<(SdValue, SdValue)> {
        self.pairs(kind)
            .and_then(|table| table.get(&key).copied())
            .ok_or(LegalizeError::MissingConversion { kind, value: key })
    }

    /// Overwrites an existing single entry with its canonical form.
    pub(crate) fn refresh_single(&mut self, kind: ConversionKind, key: SdValue, value: SdValue) {
        if let Some(entry) = self.singles_mut(kind).and_then(|table| table.get_mut(&key)) {
            *entry = value;
        }
    }

    /// Overwrites an existing pair entry with its canonical form.
    pub(crate) fn refresh_pair(
        &mut self,
        kind: ConversionKind,
        key: SdValue,
        parts: (SdValue, SdValue),
    ) {
        if let Some(entry) = self.pairs_mut(kind).and_then(|table| table.get_mut(&key)) {
            *entry = parts;
        }
    }

    /// Drops every entry keyed by `value`; returns how many were removed.
    pub fn expunge(&mut self, value: SdValue) -> usize {
        let mut removed = 0;
        for kind in ConversionKind::ALL {
            let hit = if kind.is_pair() {
                self.pairs_mut(kind)
                    .is_some_and(|table| table.remove(&value).is_some())
            } else {
                self.singles_mut(kind)
                    .is_some_and(|table| table.remove(&value).is_some())
            };
            removed += usize::from(hit);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.promoted.len()
            + self.expanded_integers.len()
            + self.expanded_floats.len()
            + self.scalarized.len()
            + self.split.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use seldag_compiler_dag::NodeId;

    use super::*;

    fn value(id: usize) -> SdValue {
        SdValue::new(NodeId::from_raw(id), 0)
    }

    #[test]
    fn a_value_lives_in_one_table() {
        let mut maps = ConversionMaps::default();
        maps.insert_single(ConversionKind::Promoted, value(0), value(1))
            .unwrap();

        assert_eq!(
            maps.insert_single(ConversionKind::Promoted, value(0), value(2)),
            Err(LegalizeError::DuplicateConversion {
                kind: ConversionKind::Promoted,
                value: value(0),
            })
        );
        assert_eq!(
            maps.insert_pair(ConversionKind::Split, value(0), value(2), value(3)),
            Err(LegalizeError::ConflictingConversion {
                kind: ConversionKind::Split,
                existing: ConversionKind::Promoted,
                value: value(0),
            })
        );
        assert_eq!(maps.kind_of(value(0)), Some(ConversionKind::Promoted));
        assert_eq!(maps.len(), 1);
    }

    #[test]
    fn missing_entries_are_errors() {
        let mut maps = ConversionMaps::default();
        maps.insert_pair(ConversionKind::ExpandedInteger, value(4), value(5), value(6))
            .unwrap();
        assert_eq!(
            maps.pair(ConversionKind::ExpandedInteger, value(4)),
            Ok((value(5), value(6)))
        );
        assert!(matches!(
            maps.pair(ConversionKind::ExpandedFloat, value(4)),
            Err(LegalizeError::MissingConversion { .. })
        ));
        assert!(matches!(
            maps.single(ConversionKind::Scalarized, value(7)),
            Err(LegalizeError::MissingConversion { .. })
        ));
    }

    #[test]
    fn entries_must_match_the_table_shape() {
        let mut maps = ConversionMaps::default();
        assert_eq!(
            maps.insert_single(ConversionKind::Split, value(0), value(1)),
            Err(LegalizeError::TableShape {
                kind: ConversionKind::Split,
                expected: "single-value",
            })
        );
        assert_eq!(
            maps.insert_pair(ConversionKind::Promoted, value(0), value(1), value(2)),
            Err(LegalizeError::TableShape {
                kind: ConversionKind::Promoted,
                expected: "pair",
            })
        );
        assert!(maps.is_empty());
    }

    #[test]
    fn expunge_clears_every_table() {
        let mut maps = ConversionMaps::default();
        maps.insert_single(ConversionKind::Scalarized, value(1), value(2))
            .unwrap();
        assert_eq!(maps.expunge(value(1)), 1);
        assert_eq!(maps.expunge(value(1)), 0);
        assert!(maps.is_empty());
    }
}
