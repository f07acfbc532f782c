//! # Type Legalizer
//!
//! Rewrites a [`SelectionDag`](seldag_compiler_dag::SelectionDag) so that every
//! value has a type the target supports natively, while preserving what the
//! graph computes.
//!
//! ## Pipeline
//!
//! ```text
//! TargetInfo ──► ValueTypeActions ──► classify(vt) ──► LegalizeAction
//!                                                        │
//! SelectionDag ──► TypeLegalizer::new ──► run ──► worklist
//!                                                 │  result handlers
//!                                                 │  operand handlers
//!                                                 ▼
//!                                    conversion tables + replacements
//!                                                 │
//!                                                 ▼
//!                                       extract_live ──► SelectionDag
//! ```
//!
//! Illegal values are never changed in place. A result handler records the
//! promoted, expanded, scalarized or split substitute of a value in the
//! conversion tables; users read it back when they are visited. Operand
//! handlers rebuild a node around its converted operands and the old node's
//! uses are moved to the new one.
//!
//! ## Example
//!
//! ```
//! use seldag_compiler_dag::{Opcode, SelectionDag, ValueType};
//! use seldag_compiler_legalize::{legalize_types, LegalizeConfig, TargetInfo};
//!
//! let mut dag = SelectionDag::new();
//! let a = dag.argument(0, 0, ValueType::I64);
//! let b = dag.argument(1, 0, ValueType::I64);
//! let sum = dag.binary(Opcode::Add, a, b);
//! let out = dag.output(&[sum]);
//! dag.set_root(out);
//!
//! let legal = legalize_types(&dag, &TargetInfo::int32(), LegalizeConfig::default()).unwrap();
//! assert!(legal
//!     .nodes()
//!     .all(|(_, node)| node.results.iter().all(|vt| *vt == ValueType::I32)));
//! ```

pub use action::{classify, LegalizeAction, ValueTypeActions};
pub use driver::{legalize_types, LegalizeConfig};
pub use error::{LegalizeError, LegalizeResult};
pub use handlers::{HandlerTable, OperandRewrite};
pub use legalizer::{LegalizeStats, TypeLegalizer};
pub use maps::ConversionKind;
pub use state::NodeState;
pub use target::{TargetConfig, TargetConfigError, TargetInfo, TargetLowering, TypeAction};

pub mod action;
pub mod driver;
pub mod error;
pub mod handlers;
pub mod legalizer;
pub mod maps;
pub mod remap;
pub mod state;
pub mod target;
