//! Rule evaluation over multiplicity-aware value lists.

pub mod evaluator;
pub mod functions;
pub mod operators;
pub mod result;
pub mod value;

pub use evaluator::RuleEvaluation;
pub use functions::{FunctionRegistry, FunctionResult, RuleFunction};
pub use result::{AssertionResult, DiagnosticSeverity, EvaluationResult, StatementDiagnostic};
pub use value::{ExistenceRequirement, Value, ValueEntry, ValueList, VariableMap};
