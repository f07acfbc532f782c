//! # Target Query
//!
//! What the target machine can hold in registers. The legalizer only asks two
//! questions of a type: which coarse action applies, and which type the
//! value is transformed to.
//!
//! [`TargetInfo`] answers these questions from a set of legal register types,
//! either built in code or loaded from a JSON description:
//!
//! ```json
//! { "name": "int32", "legal_types": ["i32"], "setcc_result_type": "i32" }
//! ```

use serde::{Deserialize, Serialize};
use seldag_compiler_dag::ValueType;
use thiserror::Error;

/// Coarse per-type action reported by the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeAction {
    Legal,
    Promote,
    Expand,
}

impl TypeAction {
    pub(crate) const fn to_bits(self) -> u64 {
        match self {
            Self::Legal => 0,
            Self::Promote => 1,
            Self::Expand => 2,
        }
    }

    pub(crate) const fn from_bits(bits: u64) -> Self {
        match bits {
            0 => Self::Legal,
            1 => Self::Promote,
            _ => Self::Expand,
        }
    }
}

/// Target-specific answers consumed by the type legalizer.
///
/// Implementations must give stable answers for the duration of a run.
pub trait TargetLowering {
    fn name(&self) -> &str;

    fn type_action(&self, vt: ValueType) -> TypeAction;

    /// For `Promote`, the wider type; for `Expand`, the type of each part
    /// (or the element type of a one-lane vector). Legal types map to
    /// themselves.
    fn type_to_transform_to(&self, vt: ValueType) -> ValueType;

    /// Result type of a comparison whose operands have type `vt`.
    fn setcc_result_type(&self, vt: ValueType) -> ValueType;

    /// Type used for vector lane index constants.
    fn vector_index_type(&self) -> ValueType;
}

#[derive(Debug, Error)]
pub enum TargetConfigError {
    #[error("invalid target description: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("target `{target}` declares no legal types")]
    NoLegalTypes { target: String },

    #[error("setcc result type {vt} is not a legal integer on target `{target}`")]
    IllegalSetCcType { target: String, vt: ValueType },

    #[error("type {vt} can be neither promoted nor expanded on target `{target}`")]
    Unlegalizable { target: String, vt: ValueType },
}

/// Serializable target description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub legal_types: Vec<ValueType>,
    pub setcc_result_type: ValueType,
}

/// Data-driven [`TargetLowering`] computed from a set of legal types.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    name: String,
    transforms: [(TypeAction, ValueType); ValueType::COUNT],
    setcc_result: ValueType,
    index_type: ValueType,
}

impl TargetInfo {
    /// A machine that only has 32-bit integer registers.
    pub fn int32() -> Self {
        Self::builtin(TargetConfig {
            name: "int32".to_string(),
            legal_types: vec![ValueType::I32],
            setcc_result_type: ValueType::I32,
        })
    }

    /// A machine with 32/64-bit integer and float registers and 128-bit vectors.
    pub fn simd128() -> Self {
        Self::builtin(TargetConfig {
            name: "simd128".to_string(),
            legal_types: vec![
                ValueType::I32,
                ValueType::I64,
                ValueType::F32,
                ValueType::F64,
                ValueType::V4I32,
                ValueType::V4F32,
                ValueType::V2I64,
                ValueType::V2F64,
            ],
            setcc_result_type: ValueType::I32,
        })
    }

    fn builtin(config: TargetConfig) -> Self {
        match Self::from_config(&config) {
            Ok(info) => info,
            Err(err) => unreachable!("builtin target `{}` is invalid: {err}", config.name),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, TargetConfigError> {
        let config: TargetConfig = serde_json::from_str(json)?;
        Self::from_config(&config)
    }

    /// Derives the action and transform-to type of every simple type.
    ///
    /// - an illegal integer promotes to the next larger legal integer, or
    ///   expands to its half-width integer when none exists;
    /// - an illegal `f32`/`f64` expands to the integer of the same width;
    /// - an illegal `ppcf128` expands to `f64`;
    /// - an illegal one-lane vector expands to its element, any other
    ///   illegal vector to its half vector.
    pub fn from_config(config: &TargetConfig) -> Result<Self, TargetConfigError> {
        if config.legal_types.is_empty() {
            return Err(TargetConfigError::NoLegalTypes {
                target: config.name.clone(),
            });
        }
        let is_legal = |vt: ValueType| config.legal_types.contains(&vt);

        let setcc = config.setcc_result_type;
        if !is_legal(setcc) || !setcc.is_integer() || setcc.is_vector() {
            return Err(TargetConfigError::IllegalSetCcType {
                target: config.name.clone(),
                vt: setcc,
            });
        }

        let mut legal_ints: Vec<ValueType> = ValueType::ALL
            .into_iter()
            .filter(|vt| !vt.is_vector() && vt.is_integer() && is_legal(*vt))
            .collect();
        legal_ints.sort_by_key(|vt| vt.size_in_bits());

        let unlegalizable = |vt| TargetConfigError::Unlegalizable {
            target: config.name.clone(),
            vt,
        };

        let mut transforms = [(TypeAction::Legal, ValueType::I1); ValueType::COUNT];
        for vt in ValueType::ALL {
            transforms[vt.index()] = if is_legal(vt) {
                (TypeAction::Legal, vt)
            } else if vt.vector_num_elements() == 1 {
                (TypeAction::Expand, vt.scalar_type())
            } else if vt.is_vector() {
                (
                    TypeAction::Expand,
                    vt.half_vector().ok_or_else(|| unlegalizable(vt))?,
                )
            } else if vt.is_integer() {
                let wider = legal_ints
                    .iter()
                    .find(|legal| legal.size_in_bits() > vt.size_in_bits());
                match wider {
                    Some(wider) => (TypeAction::Promote, *wider),
                    None => (
                        TypeAction::Expand,
                        ValueType::integer_of_bits(vt.size_in_bits() / 2)
                            .ok_or_else(|| unlegalizable(vt))?,
                    ),
                }
            } else if vt == ValueType::PpcF128 {
                (TypeAction::Expand, ValueType::F64)
            } else {
                (
                    TypeAction::Expand,
                    vt.same_width_integer().ok_or_else(|| unlegalizable(vt))?,
                )
            };
        }

        let index_type = legal_ints
            .iter()
            .copied()
            .find(|vt| vt.size_in_bits() >= 32)
            .or_else(|| legal_ints.last().copied())
            .unwrap_or(setcc);

        Ok(Self {
            name: config.name.clone(),
            transforms,
            setcc_result: setcc,
            index_type,
        })
    }
}

impl TargetLowering for TargetInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_action(&self, vt: ValueType) -> TypeAction {
        self.transforms[vt.index()].0
    }

    fn type_to_transform_to(&self, vt: ValueType) -> ValueType {
        self.transforms[vt.index()].1
    }

    fn setcc_result_type(&self, _vt: ValueType) -> ValueType {
        self.setcc_result
    }

    fn vector_index_type(&self) -> ValueType {
        self.index_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int32_promotes_narrow_and_expands_wide_integers() {
        let target = TargetInfo::int32();
        assert_eq!(target.type_action(ValueType::I32), TypeAction::Legal);
        assert_eq!(target.type_action(ValueType::I8), TypeAction::Promote);
        assert_eq!(target.type_to_transform_to(ValueType::I1), ValueType::I32);
        assert_eq!(target.type_action(ValueType::I64), TypeAction::Expand);
        assert_eq!(target.type_to_transform_to(ValueType::I64), ValueType::I32);
        assert_eq!(target.type_to_transform_to(ValueType::I128), ValueType::I64);
        assert_eq!(target.type_to_transform_to(ValueType::F64), ValueType::I64);
        assert_eq!(target.type_to_transform_to(ValueType::PpcF128), ValueType::F64);
    }

    #[test]
    fn simd128_splits_and_scalarizes_vectors() {
        let target = TargetInfo::simd128();
        assert_eq!(target.type_action(ValueType::V4I32), TypeAction::Legal);
        assert_eq!(target.type_to_transform_to(ValueType::V8I32), ValueType::V4I32);
        assert_eq!(target.type_to_transform_to(ValueType::V1I64), ValueType::I64);
        assert_eq!(target.type_to_transform_to(ValueType::V2I32), ValueType::V1I32);
        assert_eq!(target.vector_index_type(), ValueType::I32);
        assert_eq!(target.type_to_transform_to(ValueType::V4I8), ValueType::V2I8);
        assert_eq!(target.type_to_transform_to(ValueType::V2I8), ValueType::V1I8);
        assert_eq!(target.type_to_transform_to(ValueType::V1I8), ValueType::I8);
    }

    #[test]
    fn config_loads_from_json() {
        let target = TargetInfo::from_json(
            r#"{ "name": "wide", "legal_types": ["i64", "f64"], "setcc_result_type": "i64" }"#,
        )
        .unwrap();
        assert_eq!(target.name(), "wide");
        assert_eq!(target.type_to_transform_to(ValueType::I32), ValueType::I64);
        assert_eq!(target.type_action(ValueType::F64), TypeAction::Legal);
        assert_eq!(target.setcc_result_type(ValueType::I64), ValueType::I64);
    }

    #[test]
    fn config_errors() {
        let err = TargetInfo::from_json(r#"{ "name": "x", "legal_types": [], "setcc_result_type": "i32" }"#)
            .unwrap_err();
        assert!(matches!(err, TargetConfigError::NoLegalTypes { .. }));

        let err = TargetInfo::from_json(
            r#"{ "name": "x", "legal_types": ["i32"], "setcc_result_type": "f32" }"#,
        )
        .unwrap_err();
        assert!(matches!(err, TargetConfigError::IllegalSetCcType { .. }));

        let err = TargetInfo::from_json(r#"{ "name": "x", "legal_types": ["i33"] }"#).unwrap_err();
        assert!(matches!(err, TargetConfigError::Parse(_)));

        // Nothing wider than i1 and nothing to expand it into.
        let err = TargetInfo::from_json(
            r#"{ "name": "x", "legal_types": ["f32", "i1"], "setcc_result_type": "i1" }"#,
        )
        .unwrap_err();
        assert!(matches!(err, TargetConfigError::Unlegalizable { .. }));
    }
}
