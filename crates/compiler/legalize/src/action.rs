//! # Legality Classifier
//!
//! Maps a value type to the legalization action the driver dispatches on.
//! The target only distinguishes `Legal`, `Promote` and `Expand`; an
//! expansion is refined here by the shape of the type.

use seldag_compiler_dag::ValueType;

use crate::target::{TargetLowering, TypeAction};

/// How a value of some type is made legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegalizeAction {
    Legal,
    /// Carried in a wider integer register.
    PromoteInteger,
    /// Split into a low and a high half-width integer.
    ExpandInteger,
    /// Reinterpreted as the integer of the same width.
    PromoteFloat,
    /// Split into two narrower floats (double-double).
    ExpandFloat,
    /// A one-lane vector replaced by its element.
    Scalarize,
    /// Divided into two half-length vectors.
    Split,
}

impl LegalizeAction {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Legal => "legal",
            Self::PromoteInteger => "promote-integer",
            Self::ExpandInteger => "expand-integer",
            Self::PromoteFloat => "promote-float",
            Self::ExpandFloat => "expand-float",
            Self::Scalarize => "scalarize",
            Self::Split => "split",
        }
    }
}

impl std::fmt::Display for LegalizeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// Two bits per simple type must fit the 64-bit action word.
const _: () = assert!(
    ValueType::COUNT <= 32,
    "too many simple value types for ValueTypeActions"
);

/// Snapshot of the coarse target action of every simple type, two bits each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValueTypeActions {
    bits: u64,
}

impl ValueTypeActions {
    pub fn from_target(target: &dyn TargetLowering) -> Self {
        let mut actions = Self::default();
        for vt in ValueType::ALL {
            actions.set(vt, target.type_action(vt));
        }
        actions
    }

    pub const fn get(&self, vt: ValueType) -> TypeAction {
        TypeAction::from_bits((self.bits >> (2 * vt.index())) & 3)
    }

    pub fn set(&mut self, vt: ValueType, action: TypeAction) {
        let shift = 2 * vt.index();
        self.bits = (self.bits & !(3 << shift)) | (action.to_bits() << shift);
    }
}

/// Classifies `vt` from the action snapshot and the target's transform-to
/// type. Nothing is cached: every call recomputes the answer.
pub fn classify(
    actions: &ValueTypeActions,
    target: &dyn TargetLowering,
    vt: ValueType,
) -> LegalizeAction {
    match actions.get(vt) {
        TypeAction::Legal => LegalizeAction::Legal,
        TypeAction::Promote => LegalizeAction::PromoteInteger,
        TypeAction::Expand => {
            if vt.is_vector() {
                if vt.vector_num_elements() == 1 {
                    LegalizeAction::Scalarize
                } else {
                    LegalizeAction::Split
                }
            } else if vt.is_integer() {
                LegalizeAction::ExpandInteger
            } else if target.type_to_transform_to(vt).size_in_bits() == vt.size_in_bits() {
                LegalizeAction::PromoteFloat
            } else {
                LegalizeAction::ExpandFloat
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetInfo;

    #[test]
    fn action_word_round_trips_every_slot() {
        let mut actions = ValueTypeActions::default();
        actions.set(ValueType::V16I8, TypeAction::Expand);
        actions.set(ValueType::I1, TypeAction::Promote);
        actions.set(ValueType::I8, TypeAction::Expand);
        actions.set(ValueType::I8, TypeAction::Legal);
        assert_eq!(actions.get(ValueType::V16I8), TypeAction::Expand);
        assert_eq!(actions.get(ValueType::I1), TypeAction::Promote);
        assert_eq!(actions.get(ValueType::I8), TypeAction::Legal);
        assert_eq!(actions.get(ValueType::I16), TypeAction::Legal);
    }

    #[test]
    fn expansion_is_refined_by_shape() {
        let target = TargetInfo::int32();
        let actions = ValueTypeActions::from_target(&target);
        let action = |vt| classify(&actions, &target, vt);
        assert_eq!(action(ValueType::I32), LegalizeAction::Legal);
        assert_eq!(action(ValueType::I16), LegalizeAction::PromoteInteger);
        assert_eq!(action(ValueType::I128), LegalizeAction::ExpandInteger);
        assert_eq!(action(ValueType::F32), LegalizeAction::PromoteFloat);
        assert_eq!(action(ValueType::F64), LegalizeAction::PromoteFloat);
        assert_eq!(action(ValueType::PpcF128), LegalizeAction::ExpandFloat);
        assert_eq!(action(ValueType::V1F32), LegalizeAction::Scalarize);
        assert_eq!(action(ValueType::V2I64), LegalizeAction::Split);
    }
}
