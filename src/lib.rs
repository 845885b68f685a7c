//! # openEHR rules
//!
//! Evaluates archetype rules against openEHR object trees, resolves archetype
//! paths with occurrence disambiguation and writes derived values back into
//! the tree.
//!
//! ## Features
//!
//! - **Path queries**: `/data[id2]/events[id3, 2]/...` paths resolve to every
//!   matching node together with a path that identifies it uniquely
//! - **Rule evaluation**: variables, assertions, quantifiers and functions over
//!   multi-row value lists with three-valued logic
//! - **Write-back**: equality assertions on absent paths construct the missing
//!   structure, and fixups fill in term labels and ordinal ranks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use openehr_rules::*;
//!
//! # fn example() -> Result<()> {
//! let archetype = Archetype::from_file("blood_pressure.json")?;
//! let model = ModelRegistry::openehr();
//! let mut tree = RmTree::from_json_str(&std::fs::read_to_string("instance.json")?, &model)?;
//!
//! let result = RuleEvaluation::new(&archetype, &model).evaluate(&mut tree)?;
//! for failed in result.failed_assertions() {
//!     println!("{:?} failed at {:?}", failed.tag, failed.paths);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aom;
pub mod core;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod path;
pub mod rules;
pub mod tree;
pub mod writeback;

pub use aom::{
    Archetype, ArchetypeTerm, ArchetypeTerminology, CAttribute, CAttributeTuple, CComplexObject,
    CObject, CPrimitiveObject, Interval,
};
pub use crate::core::EvaluationConfig;
pub use error::Result; // Our Result type takes precedence
pub use error::{EvaluationError, FunctionError, ModelError, PathError, RulesError, WriteError};
pub use evaluation::{
    AssertionResult, DiagnosticSeverity, EvaluationResult, ExistenceRequirement, FunctionRegistry,
    RuleEvaluation, RuleFunction, StatementDiagnostic, Value, ValueEntry, ValueList, VariableMap,
};
pub use model::{ModelInfoLookup, ModelRegistry, ModelRegistryBuilder, RmAttributeInfo, RmTypeInfo, ValueKind};
pub use path::{ArchetypePath, PathSegment, ResolvedMatch};
pub use rules::{
    BinaryOperator, Expression, ModelReference, QuantifierKind, RuleStatement, UnaryOperator,
};
pub use tree::{
    ConstructionRequest, DefaultObjectConstructor, NodeId, ObjectConstructor, PrimitiveValue,
    RmObject, RmTree,
};
pub use writeback::apply_set_path_values;
