//! # Machine Value Types
//!
//! The closed set of simple value types a node result may carry. Targets
//! describe which of these live in registers; everything else is rewritten
//! by type legalization.

use serde::{Deserialize, Serialize};

/// A simple machine value type.
///
/// The set is deliberately small and dense: each type has a stable
/// [`ValueType::index`] so per-type tables can be stored as flat arrays or
/// packed bitvectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    I1,
    I8,
    I16,
    I32,
    I64,
    I128,
    F32,
    F64,
    /// Double-double: two `f64` halves whose sum is the value.
    PpcF128,
    V1I32,
    V2I32,
    V4I32,
    V8I32,
    V1I64,
    V2I64,
    V1F32,
    V2F32,
    V4F32,
    V8F32,
    V1F64,
    V2F64,
    V2I16,
    V4I16,
    V8I16,
    V4I8,
    V8I8,
    V16I8,
    V1I16,
    V1I8,
    V2I8,
}

impl ValueType {
    /// Every simple type, in index order.
    pub const ALL: [Self; 30] = [
        Self::I1,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::I128,
        Self::F32,
        Self::F64,
        Self::PpcF128,
        Self::V1I32,
        Self::V2I32,
        Self::V4I32,
        Self::V8I32,
        Self::V1I64,
        Self::V2I64,
        Self::V1F32,
        Self::V2F32,
        Self::V4F32,
        Self::V8F32,
        Self::V1F64,
        Self::V2F64,
        Self::V2I16,
        Self::V4I16,
        Self::V8I16,
        Self::V4I8,
        Self::V8I8,
        Self::V16I8,
        Self::V1I16,
        Self::V1I8,
        Self::V2I8,
    ];

    /// Number of simple types.
    pub const COUNT: usize = Self::ALL.len();

    /// Dense index of this type, `0..COUNT`.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn is_vector(self) -> bool {
        self.vector_num_elements() != 0
    }

    /// True for scalar integers and integer vectors.
    pub const fn is_integer(self) -> bool {
        matches!(
            self.scalar_type(),
            Self::I1 | Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::I128
        )
    }

    /// True for scalar floats and float vectors.
    pub const fn is_float(self) -> bool {
        matches!(self.scalar_type(), Self::F32 | Self::F64 | Self::PpcF128)
    }

    /// Number of lanes, or 0 for scalars.
    pub const fn vector_num_elements(self) -> u32 {
        match self {
            Self::V1I32 | Self::V1I64 | Self::V1F32 | Self::V1F64 | Self::V1I16 | Self::V1I8 => 1,
            Self::V2I32 | Self::V2I64 | Self::V2F32 | Self::V2F64 | Self::V2I16 | Self::V2I8 => 2,
            Self::V4I32 | Self::V4F32 | Self::V4I16 | Self::V4I8 => 4,
            Self::V8I32 | Self::V8F32 | Self::V8I16 | Self::V8I8 => 8,
            Self::V16I8 => 16,
            _ => 0,
        }
    }

    /// Lane type of a vector; `None` for scalars.
    pub const fn vector_element_type(self) -> Option<Self> {
        match self {
            Self::V1I32 | Self::V2I32 | Self::V4I32 | Self::V8I32 => Some(Self::I32),
            Self::V1I64 | Self::V2I64 => Some(Self::I64),
            Self::V1F32 | Self::V2F32 | Self::V4F32 | Self::V8F32 => Some(Self::F32),
            Self::V1F64 | Self::V2F64 => Some(Self::F64),
            Self::V1I16 | Self::V2I16 | Self::V4I16 | Self::V8I16 => Some(Self::I16),
            Self::V1I8 | Self::V2I8 | Self::V4I8 | Self::V8I8 | Self::V16I8 => Some(Self::I8),
            _ => None,
        }
    }

    /// The lane type for vectors, the type itself for scalars.
    pub const fn scalar_type(self) -> Self {
        match self.vector_element_type() {
            Some(elem) => elem,
            None => self,
        }
    }

    /// Width in bits of the whole value (all lanes for vectors).
    pub const fn size_in_bits(self) -> u32 {
        match self {
            Self::I1 => 1,
            Self::I8 => 8,
            Self::I16 => 16,
            Self::I32 | Self::F32 => 32,
            Self::I64 | Self::F64 => 64,
            Self::I128 | Self::PpcF128 => 128,
            vector => match vector.vector_element_type() {
                Some(elem) => elem.size_in_bits() * vector.vector_num_elements(),
                None => 0,
            },
        }
    }

    /// Width in bits of one lane (the whole value for scalars).
    pub const fn scalar_size_in_bits(self) -> u32 {
        self.scalar_type().size_in_bits()
    }

    /// The scalar integer type of exactly `bits` bits, if one exists.
    pub const fn integer_of_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(Self::I1),
            8 => Some(Self::I8),
            16 => Some(Self::I16),
            32 => Some(Self::I32),
            64 => Some(Self::I64),
            128 => Some(Self::I128),
            _ => None,
        }
    }

    /// The vector type with `count` lanes of `elem`, if one exists.
    pub fn vector_of(elem: Self, count: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|vt| {
            vt.vector_element_type() == Some(elem) && vt.vector_num_elements() == count
        })
    }

    /// The vector with the same lane type and half as many lanes.
    pub fn half_vector(self) -> Option<Self> {
        let elem = self.vector_element_type()?;
        let count = self.vector_num_elements();
        if count < 2 {
            return None;
        }
        Self::vector_of(elem, count / 2)
    }

    /// Same-width integer for a scalar float (`f32 -> i32`, `f64 -> i64`).
    pub const fn same_width_integer(self) -> Option<Self> {
        Self::integer_of_bits(self.size_in_bits())
    }

    /// Mask with the low `size_in_bits` bits set, for scalar types up to 128 bits.
    pub const fn bit_mask(self) -> u128 {
        mask_bits(self.scalar_size_in_bits())
    }

    /// The lowercase textual name (`i32`, `v4f32`, `ppcf128`).
    pub const fn name(self) -> &'static str {
        match self {
            Self::I1 => "i1",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::PpcF128 => "ppcf128",
            Self::V1I32 => "v1i32",
            Self::V2I32 => "v2i32",
            Self::V4I32 => "v4i32",
            Self::V8I32 => "v8i32",
            Self::V1I64 => "v1i64",
            Self::V2I64 => "v2i64",
            Self::V1F32 => "v1f32",
            Self::V2F32 => "v2f32",
            Self::V4F32 => "v4f32",
            Self::V8F32 => "v8f32",
            Self::V1F64 => "v1f64",
            Self::V2F64 => "v2f64",
            Self::V2I16 => "v2i16",
            Self::V4I16 => "v4i16",
            Self::V8I16 => "v8i16",
            Self::V4I8 => "v4i8",
            Self::V8I8 => "v8i8",
            Self::V16I8 => "v16i8",
            Self::V1I16 => "v1i16",
            Self::V1I8 => "v1i8",
            Self::V2I8 => "v2i8",
        }
    }
}

/// Mask with the low `bits` bits set (saturating at 128).
pub const fn mask_bits(bits: u32) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_dense() {
        for (i, vt) in ValueType::ALL.iter().enumerate() {
            assert_eq!(vt.index(), i, "{vt}");
        }
    }

    #[test]
    fn vector_shapes() {
        assert_eq!(ValueType::V8I32.size_in_bits(), 256);
        assert_eq!(ValueType::V8I32.half_vector(), Some(ValueType::V4I32));
        assert_eq!(ValueType::V2F64.half_vector(), Some(ValueType::V1F64));
        assert_eq!(ValueType::V1I32.half_vector(), None);
        assert_eq!(ValueType::V4I8.half_vector(), Some(ValueType::V2I8));
        assert_eq!(ValueType::V2I16.half_vector(), Some(ValueType::V1I16));
        assert_eq!(ValueType::V16I8.vector_element_type(), Some(ValueType::I8));
        assert!(ValueType::V4F32.is_float());
        assert!(!ValueType::V4F32.is_integer());
    }

    #[test]
    fn every_multi_lane_vector_has_a_half() {
        for vt in ValueType::ALL {
            if vt.vector_num_elements() > 1 {
                assert!(vt.half_vector().is_some(), "{vt} has no half vector");
            }
        }
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ValueType::PpcF128).unwrap();
        assert_eq!(json, "\"ppcf128\"");
        let vt: ValueType = serde_json::from_str("\"v4i32\"").unwrap();
        assert_eq!(vt, ValueType::V4I32);
        for vt in ValueType::ALL {
            assert_eq!(serde_json::to_string(&vt).unwrap(), format!("\"{}\"", vt.name()));
        }
    }
}
