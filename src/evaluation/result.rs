use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

use super::value::{Value, ValueList, VariableMap};

/// Outcome of a single assertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertionResult {
    pub tag: Option<String>,
    pub statement_index: usize,
    pub result: bool,
    /// Paths of the rows that decided the outcome.
    pub paths: Vec<String>,
    pub raw_result: ValueList,
    /// Matched path -> value-set code it was checked against.
    pub value_set_constraints: IndexMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => f.write_str("error"),
            DiagnosticSeverity::Warning => f.write_str("warning"),
        }
    }
}

/// A problem attached to one statement. Errors abandon that statement only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementDiagnostic {
    pub statement_index: usize,
    pub statement: String,
    pub expression: String,
    pub severity: DiagnosticSeverity,
    pub message: String,
}

impl StatementDiagnostic {
    pub fn error(
        statement_index: usize,
        statement: impl Into<String>,
        expression: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            statement_index,
            statement: statement.into(),
            expression: expression.into(),
            severity: DiagnosticSeverity::Error,
            message: message.into(),
        }
    }

    pub fn warning(
        statement_index: usize,
        statement: impl Into<String>,
        expression: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            ..Self::error(statement_index, statement, expression, message)
        }
    }
}

impl fmt::Display for StatementDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in {} at '{}': {}",
            self.severity, self.statement, self.expression, self.message
        )
    }
}

/// Everything one evaluation call produced, in statement order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub assertion_results: Vec<AssertionResult>,
    pub paths_that_must_exist: Vec<String>,
    pub paths_that_must_not_exist: Vec<String>,
    /// Concrete path -> value, in write order.
    pub set_path_values: IndexMap<String, Value>,
    pub diagnostics: Vec<StatementDiagnostic>,
    pub variables: VariableMap,
}

impl EvaluationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_assertions_passed(&self) -> bool {
        self.assertion_results.iter().all(|assertion| assertion.result)
    }

    pub fn failed_assertions(&self) -> impl Iterator<Item = &AssertionResult> {
        self.assertion_results
            .iter()
            .filter(|assertion| !assertion.result)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity == DiagnosticSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &StatementDiagnostic> {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.severity == DiagnosticSeverity::Warning)
    }

    pub fn assertion(&self, tag: &str) -> Option<&AssertionResult> {
        self.assertion_results
            .iter()
            .find(|assertion| assertion.tag.as_deref() == Some(tag))
    }

    pub(crate) fn add_must_exist(&mut self, path: String) {
        if !self.paths_that_must_exist.contains(&path) {
            self.paths_that_must_exist.push(path);
        }
    }

    pub(crate) fn add_must_not_exist(&mut self, path: String) {
        if !self.paths_that_must_not_exist.contains(&path) {
            self.paths_that_must_not_exist.push(path);
        }
    }

    /// Records a written value. A path written again moves to the end.
    pub(crate) fn record_set_value(&mut self, path: String, value: Value) {
        self.set_path_values.shift_remove(&path);
        self.set_path_values.insert(path, value);
    }
}
