//! Statement-by-statement interpretation of archetype rules over one tree.
//!
//! Statements run in declaration order. A failing statement is reported as a
//! diagnostic and evaluation carries on with the next one; values written by
//! an assertion are flushed into the tree before the next statement runs.

use indexmap::IndexMap;
use std::fmt;

use super::functions::FunctionRegistry;
use super::operators::{apply_binary, apply_matches, apply_unary, combine_rows};
use super::result::{AssertionResult, EvaluationResult, StatementDiagnostic};
use super::value::{ExistenceRequirement, Value, ValueEntry, ValueList};
use crate::aom::{Archetype, is_value_set_code};
use crate::core::EvaluationConfig;
use crate::error::{EvaluationError, Result};
use crate::model::{ModelInfoLookup, ValueKind};
use crate::path::{ArchetypePath, ResolvedMatch};
use crate::rules::{
    BinaryExpression, BinaryOperator, Expression, FunctionCall, ModelReference,
    QuantifierExpression, QuantifierKind, RuleStatement, UnaryOperator, validate_rules,
};
use crate::tree::{DefaultObjectConstructor, NodeId, ObjectConstructor, PrimitiveValue, RmTree};
use crate::writeback::{self, WriteContext};

type EvalResult<T> = std::result::Result<T, EvaluationError>;

/// Evaluates the rules of one archetype against object trees.
pub struct RuleEvaluation<'a> {
    archetype: &'a Archetype,
    model: &'a dyn ModelInfoLookup,
    constructor: &'a dyn ObjectConstructor,
    functions: FunctionRegistry,
    config: EvaluationConfig,
}

impl fmt::Debug for RuleEvaluation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEvaluation")
            .field("archetype", &self.archetype.archetype_id)
            .field("functions", &self.functions)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Whether an equality directly under this node may write into the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Fixable,
    Plain,
}

/// Binding of a quantifier variable to one matched node.
#[derive(Debug, Clone)]
struct Scope {
    variable: Option<String>,
    node: NodeId,
    path: ArchetypePath,
}

#[derive(Debug, Clone)]
struct PendingWrite {
    path: ArchetypePath,
    value: Value,
}

struct EvaluationState<'t> {
    tree: &'t mut RmTree,
    result: EvaluationResult,
    scopes: Vec<Scope>,
    pending: Vec<PendingWrite>,
    value_sets: IndexMap<String, String>,
    warnings: Vec<String>,
    /// Innermost expression that raised the current statement's error.
    failed_at: Option<String>,
}

impl<'t> EvaluationState<'t> {
    fn new(tree: &'t mut RmTree) -> Self {
        Self {
            tree,
            result: EvaluationResult::new(),
            scopes: Vec::new(),
            pending: Vec::new(),
            value_sets: IndexMap::new(),
            warnings: Vec::new(),
            failed_at: None,
        }
    }

    fn reset_statement(&mut self) {
        self.scopes.clear();
        self.pending.clear();
        self.value_sets.clear();
        self.warnings.clear();
        self.failed_at = None;
    }

    fn scope(&self, variable: &str) -> Option<&Scope> {
        self.scopes
            .iter()
            .rev()
            .find(|scope| scope.variable.as_deref() == Some(variable))
    }

    fn root_match(&self) -> ResolvedMatch {
        ResolvedMatch::new(self.tree.root(), ArchetypePath::root())
    }

    fn report_error(
        &mut self,
        index: usize,
        label: &str,
        expression: &Expression,
        error: EvaluationError,
    ) {
        let location = self
            .failed_at
            .take()
            .unwrap_or_else(|| expression.to_string());
        tracing::warn!(statement = %label, expression = %location, "{error}");
        self.result.diagnostics.push(StatementDiagnostic::error(
            index,
            label,
            location,
            error.to_string(),
        ));
    }

    fn drain_warnings(&mut self, index: usize, label: &str, expression: &Expression) {
        for warning in std::mem::take(&mut self.warnings) {
            self.result.diagnostics.push(StatementDiagnostic::warning(
                index,
                label,
                expression.to_string(),
                warning,
            ));
        }
    }
}

impl<'a> RuleEvaluation<'a> {
    pub fn new(archetype: &'a Archetype, model: &'a dyn ModelInfoLookup) -> Self {
        Self {
            archetype,
            model,
            constructor: &DefaultObjectConstructor,
            functions: FunctionRegistry::default(),
            config: EvaluationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EvaluationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_constructor(mut self, constructor: &'a dyn ObjectConstructor) -> Self {
        self.constructor = constructor;
        self
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Evaluates the archetype's own rules.
    pub fn evaluate(&self, tree: &mut RmTree) -> Result<EvaluationResult> {
        self.evaluate_rules(tree, &self.archetype.rules)
    }

    /// Evaluates `rules` in order. Malformed rules are rejected before any
    /// statement runs; every later failure is a per-statement diagnostic.
    pub fn evaluate_rules(
        &self,
        tree: &mut RmTree,
        rules: &[RuleStatement],
    ) -> Result<EvaluationResult> {
        validate_rules(rules, &self.functions)?;

        let mut state = EvaluationState::new(tree);
        for (index, statement) in rules.iter().enumerate() {
            tracing::debug!(index, statement = %statement, "evaluating statement");
            self.run_statement(&mut state, index, statement);
        }

        let result = state.result;
        tracing::info!(
            archetype = %self.archetype.archetype_id,
            statements = rules.len(),
            failed = result.failed_assertions().count(),
            writes = result.set_path_values.len(),
            diagnostics = result.diagnostics.len(),
            "rule evaluation finished"
        );
        Ok(result)
    }

    /// Re-applies the values recorded in `result`. See
    /// [`writeback::apply_set_path_values`].
    pub fn apply_set_path_values(
        &self,
        result: &EvaluationResult,
        tree: &mut RmTree,
    ) -> Result<Vec<String>> {
        writeback::apply_recorded_values(result, tree, &self.write_context())
    }

    fn write_context(&self) -> WriteContext<'_> {
        WriteContext::new(self.archetype, self.model, &self.config)
            .with_constructor(self.constructor)
    }

    fn run_statement(&self, state: &mut EvaluationState<'_>, index: usize, statement: &RuleStatement) {
        state.reset_statement();
        let label = statement.label(index);
        match statement {
            RuleStatement::VariableDeclaration(declaration) => {
                let values = match self.eval(state, &declaration.expression, Position::Plain) {
                    Ok(values) => values,
                    Err(error) => {
                        state.report_error(index, &label, &declaration.expression, error);
                        ValueList::null()
                    }
                };
                state
                    .result
                    .variables
                    .insert(declaration.name.clone(), values);
                state.drain_warnings(index, &label, &declaration.expression);
            }
            RuleStatement::Assertion(assertion) => {
                let rows = self
                    .eval(state, &assertion.expression, Position::Fixable)
                    .and_then(require_booleans);
                match rows {
                    Ok(rows) => {
                        self.record_assertion(state, index, assertion.tag.clone(), rows);
                        self.flush_writes(state, index, &label);
                    }
                    Err(error) => {
                        state.pending.clear();
                        state.report_error(index, &label, &assertion.expression, error);
                    }
                }
                state.drain_warnings(index, &label, &assertion.expression);
            }
        }
    }

    fn record_assertion(
        &self,
        state: &mut EvaluationState<'_>,
        index: usize,
        tag: Option<String>,
        rows: ValueList,
    ) {
        let failed: Vec<&ValueEntry> = rows
            .iter()
            .filter(|row| row.value == Value::Boolean(false))
            .collect();
        let passed = failed.is_empty();

        let paths = if passed {
            rows.first_paths().to_vec()
        } else {
            let mut paths: Vec<String> = Vec::new();
            for row in &failed {
                for path in &row.paths {
                    if !paths.contains(path) {
                        paths.push(path.clone());
                    }
                }
                for requirement in &row.requirements {
                    match requirement {
                        ExistenceRequirement::MustExist(path) => {
                            state.result.add_must_exist(path.clone())
                        }
                        ExistenceRequirement::MustNotExist(path) => {
                            state.result.add_must_not_exist(path.clone())
                        }
                    }
                }
            }
            paths
        };

        tracing::debug!(index, passed, rows = rows.len(), "assertion evaluated");
        state.result.assertion_results.push(AssertionResult {
            tag,
            statement_index: index,
            result: passed,
            paths,
            raw_result: rows,
            value_set_constraints: std::mem::take(&mut state.value_sets),
        });
    }

    fn flush_writes(&self, state: &mut EvaluationState<'_>, index: usize, label: &str) {
        let pending = std::mem::take(&mut state.pending);
        if pending.is_empty() {
            return;
        }
        let ctx = self.write_context();
        for write in pending {
            if !self.config.write_back {
                state
                    .result
                    .record_set_value(write.path.to_string(), write.value);
                continue;
            }
            match writeback::write_value(state.tree, &ctx, &write.path, &write.value) {
                Ok(outcome) => {
                    let path = outcome
                        .path
                        .clone()
                        .unwrap_or_else(|| write.path.to_string());
                    state.result.record_set_value(path, write.value);
                    for (path, value) in outcome.derived {
                        state.result.record_set_value(path, value);
                    }
                    state.warnings.extend(outcome.warnings);
                }
                Err(error) => {
                    tracing::warn!(statement = %label, path = %write.path, "write skipped: {error}");
                    state.result.diagnostics.push(StatementDiagnostic::error(
                        index,
                        label,
                        write.path.to_string(),
                        error.to_string(),
                    ));
                }
            }
        }
    }

    fn eval(
        &self,
        state: &mut EvaluationState<'_>,
        expression: &Expression,
        position: Position,
    ) -> EvalResult<ValueList> {
        match self.eval_node(state, expression, position) {
            Ok(values) => Ok(values),
            Err(error) => {
                if state.failed_at.is_none() {
                    state.failed_at = Some(expression.to_string());
                }
                Err(error)
            }
        }
    }

    fn eval_node(
        &self,
        state: &mut EvaluationState<'_>,
        expression: &Expression,
        position: Position,
    ) -> EvalResult<ValueList> {
        match expression {
            Expression::Literal(value) => Ok(ValueList::single(ValueEntry::new(value.clone()))),
            Expression::Constraint(constraint) => Err(EvaluationError::invalid_operation(format!(
                "constraint {constraint} outside 'matches'"
            ))),
            Expression::Variable(name) => self.variable(state, name),
            Expression::ModelReference(reference) => self.reference_values(state, reference),
            Expression::Unary(unary) => {
                let operand = self.eval(state, &unary.operand.expression, Position::Plain)?;
                let operand = if operand.is_empty() {
                    ValueList::null()
                } else {
                    operand
                };
                operand
                    .into_iter()
                    .map(|row| {
                        let mut entry =
                            ValueEntry::new(apply_unary(unary.operator, &row.value)?).with_paths(row.paths);
                        if unary.operator == UnaryOperator::Not {
                            for requirement in row.requirements {
                                entry.add_requirement(requirement);
                            }
                        }
                        Ok(entry)
                    })
                    .collect()
            }
            Expression::Binary(binary) => self.binary(state, binary, position),
            Expression::Quantifier(quantifier) => self.quantifier(state, quantifier, position),
            Expression::Function(call) => self.function(state, call),
        }
    }

    fn variable(&self, state: &EvaluationState<'_>, name: &str) -> EvalResult<ValueList> {
        if let Some(scope) = state.scope(name) {
            return Ok(ValueList::single(self.entry_for(state.tree, scope.node, &scope.path)));
        }
        state
            .result
            .variables
            .get(name)
            .cloned()
            .ok_or_else(|| EvaluationError::UndeclaredVariable {
                name: name.to_string(),
            })
    }

    /// Nodes a reference is resolved from: the bound quantifier node, the
    /// nodes behind a declared variable's rows, the innermost scope for a
    /// relative path, or the root.
    fn anchors(
        &self,
        state: &EvaluationState<'_>,
        reference: &ModelReference,
    ) -> EvalResult<Vec<ResolvedMatch>> {
        match &reference.variable {
            Some(name) => {
                if let Some(scope) = state.scope(name) {
                    return Ok(vec![ResolvedMatch::new(scope.node, scope.path.clone())]);
                }
                let values = state.result.variables.get(name).ok_or_else(|| {
                    EvaluationError::UndeclaredVariable { name: name.clone() }
                })?;
                let mut anchors = Vec::new();
                for entry in values {
                    if let Some(path) = entry.paths.first() {
                        let path: ArchetypePath = path.parse()?;
                        if let Some(found) = state.tree.find_single(&path)? {
                            anchors.push(found);
                        }
                    }
                }
                Ok(anchors)
            }
            None if !reference.path.is_absolute() => Ok(vec![
                state
                    .scopes
                    .last()
                    .map(|scope| ResolvedMatch::new(scope.node, scope.path.clone()))
                    .unwrap_or_else(|| state.root_match()),
            ]),
            None => Ok(vec![state.root_match()]),
        }
    }

    fn reference_values(
        &self,
        state: &EvaluationState<'_>,
        reference: &ModelReference,
    ) -> EvalResult<ValueList> {
        let mut rows = ValueList::new();
        for anchor in self.anchors(state, reference)? {
            for found in state
                .tree
                .find_all_from(anchor.node, &anchor.path, &reference.path)
            {
                rows.push(self.entry_for(state.tree, found.node, &found.path));
            }
        }
        Ok(rows)
    }

    fn entry_for(&self, tree: &RmTree, node: NodeId, path: &ArchetypePath) -> ValueEntry {
        ValueEntry::new(self.node_value(tree, node)).with_path(path.to_string())
    }

    /// Scalar reading of a node. Code phrases read as terminology codes.
    fn node_value(&self, tree: &RmTree, node: NodeId) -> Value {
        if let Some(primitive) = tree.primitive(node) {
            return Value::from(primitive);
        }
        let type_name = self
            .model
            .type_name_of(tree, node)
            .or_else(|| tree.type_name(node).map(str::to_string))
            .unwrap_or_default();
        if self.model.value_kind(&type_name) == ValueKind::CodePhrase {
            if let Some(code) = tree
                .primitive_attribute(node, "code_string")
                .and_then(PrimitiveValue::as_str)
            {
                let terminology = tree
                    .children(node, "terminology_id")
                    .first()
                    .and_then(|id| tree.primitive_attribute(*id, "value"))
                    .and_then(PrimitiveValue::as_str);
                return Value::code(terminology, code);
            }
        }
        Value::Object { type_name }
    }

    fn binary(
        &self,
        state: &mut EvaluationState<'_>,
        binary: &BinaryExpression,
        position: Position,
    ) -> EvalResult<ValueList> {
        let operator = binary.operator;
        if operator == BinaryOperator::Matches {
            return self.matches(state, binary);
        }
        if operator == BinaryOperator::Equal && position == Position::Fixable {
            if let Expression::ModelReference(reference) = binary.left.expression.as_ref() {
                return self.assignment(state, reference, &binary.right.expression);
            }
        }

        let (left_position, right_position) = match operator {
            BinaryOperator::And => (position, position),
            BinaryOperator::Implies => (Position::Plain, position),
            _ => (Position::Plain, Position::Plain),
        };
        let left = self.eval(state, &binary.left.expression, left_position)?;
        let mark = state.pending.len();
        let right = self.eval(state, &binary.right.expression, right_position)?;
        if operator == BinaryOperator::Implies {
            let antecedent_holds =
                !left.is_empty() && left.values().all(|value| *value == Value::Boolean(true));
            if !antecedent_holds {
                state.pending.truncate(mark);
            }
        }
        combine(operator, &left, &right)
    }

    fn matches(
        &self,
        state: &mut EvaluationState<'_>,
        binary: &BinaryExpression,
    ) -> EvalResult<ValueList> {
        let Expression::Constraint(constraint) = binary.right.expression.as_ref() else {
            return Err(EvaluationError::invalid_operation(
                "right operand of 'matches' must be a constraint",
            ));
        };
        let left = self.eval(state, &binary.left.expression, Position::Plain)?;
        let left = if left.is_empty() {
            ValueList::null()
        } else {
            left
        };
        let value_set = constraint
            .terminology_code()
            .filter(|code| is_value_set_code(code));

        left.into_iter()
            .map(|row| {
                let value = apply_matches(&row.value, constraint, &self.archetype.terminology)?;
                if let Some(code) = value_set {
                    for path in &row.paths {
                        state.value_sets.insert(path.clone(), code.to_string());
                    }
                }
                Ok(ValueEntry::new(value).with_paths(row.paths))
            })
            .collect()
    }

    /// `reference = expression` in fixable position.
    ///
    /// A literal compared with an absent target becomes a pending write and a
    /// null row. A computed right side is written to every target; its row is
    /// true only when the target already held the computed value.
    fn assignment(
        &self,
        state: &mut EvaluationState<'_>,
        reference: &ModelReference,
        right: &Expression,
    ) -> EvalResult<ValueList> {
        let values = self.eval(state, right, Position::Plain)?;
        let mut targets = ValueList::new();
        let mut missing: Vec<ArchetypePath> = Vec::new();
        for anchor in self.anchors(state, reference)? {
            let found = state
                .tree
                .find_all_from(anchor.node, &anchor.path, &reference.path);
            if found.is_empty() {
                missing.push(
                    state
                        .tree
                        .most_specific_path(anchor.node, &anchor.path, &reference.path),
                );
            }
            for found in found {
                targets.push(self.entry_for(state.tree, found.node, &found.path));
            }
        }

        let literal = matches!(right, Expression::Literal(_));
        if literal && targets.is_empty() {
            let value = values.first_value().cloned().unwrap_or_default();
            return Ok(schedule_missing(state, missing, value, Value::Null));
        }
        if literal || !self.config.record_calculated_values {
            return combine(BinaryOperator::Equal, &targets, &values);
        }

        if targets.is_empty() || (targets.len() == 1 && values.len() > 1) {
            if values.len() > 1 {
                let message = format!(
                    "{} computed rows for the single target {reference}; nothing written",
                    values.len()
                );
                tracing::warn!("{message}");
                state.warnings.push(message);
                return combine(BinaryOperator::Equal, &targets, &values);
            }
            let value = values.first_value().cloned().unwrap_or_default();
            return Ok(schedule_missing(state, missing, value, Value::Boolean(false)));
        }

        let pending = &mut state.pending;
        combine_rows(BinaryOperator::Equal.symbol(), &targets, &values, |target, computed| {
            if let Some(path) = target.paths.first() {
                pending.push(PendingWrite {
                    path: path.parse()?,
                    value: computed.value.clone(),
                });
            }
            let current = !computed.value.is_null()
                && matches!(
                    apply_binary(BinaryOperator::Equal, &target.value, &computed.value),
                    Ok(Value::Boolean(true))
                );
            Ok(ValueEntry::new(current).with_paths(target.paths.iter().chain(&computed.paths).cloned()))
        })
    }

    fn quantifier(
        &self,
        state: &mut EvaluationState<'_>,
        quantifier: &QuantifierExpression,
        position: Position,
    ) -> EvalResult<ValueList> {
        let reference = &quantifier.path;
        let anchors = self.anchors(state, reference)?;
        let mut matches: Vec<ResolvedMatch> = Vec::new();
        let mut missing: Vec<String> = Vec::new();
        for anchor in &anchors {
            let found = state
                .tree
                .find_all_from(anchor.node, &anchor.path, &reference.path);
            if found.is_empty() {
                missing.push(
                    state
                        .tree
                        .most_specific_path(anchor.node, &anchor.path, &reference.path)
                        .to_string(),
                );
            }
            matches.extend(found);
        }
        if anchors.is_empty() {
            missing.push(reference.to_string());
        }

        let condition_position = match quantifier.kind {
            QuantifierKind::ForAll => position,
            _ => Position::Plain,
        };
        let mut rows: Vec<(String, ValueEntry)> = Vec::new();
        for found in &matches {
            let match_path = found.path_string();
            let Some(condition) = &quantifier.condition else {
                rows.push((match_path.clone(), ValueEntry::new(true).with_path(match_path)));
                continue;
            };
            state.scopes.push(Scope {
                variable: quantifier.variable.clone(),
                node: found.node,
                path: found.path.clone(),
            });
            let condition_rows = self.eval(state, condition, condition_position);
            state.scopes.pop();
            let condition_rows = require_booleans(condition_rows?)?;
            if condition_rows.is_empty() {
                rows.push((match_path.clone(), ValueEntry::new(Value::Null).with_path(match_path)));
                continue;
            }
            for mut row in condition_rows {
                if row.paths.is_empty() {
                    row.add_path(match_path.clone());
                }
                rows.push((match_path.clone(), row));
            }
        }

        match quantifier.kind {
            QuantifierKind::ForAll if rows.is_empty() => Ok(ValueList::new()),
            QuantifierKind::ForAll => Ok(ValueList::single(reduce_for_all(rows))),
            QuantifierKind::Exists => Ok(ValueList::single(reduce_exists(rows, missing, false))),
            QuantifierKind::NotExists => {
                let exists = reduce_exists(rows, missing, true);
                let value = apply_unary(UnaryOperator::Not, &exists.value)?;
                let mut entry = ValueEntry::new(value).with_paths(exists.paths);
                for requirement in exists.requirements {
                    entry.add_requirement(requirement);
                }
                Ok(ValueList::single(entry))
            }
        }
    }

    fn function(&self, state: &mut EvaluationState<'_>, call: &FunctionCall) -> EvalResult<ValueList> {
        let function = self
            .functions
            .get(&call.name)
            .ok_or_else(|| EvaluationError::UnknownFunction {
                name: call.name.clone(),
            })?;
        let mut arguments = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            arguments.push(self.eval(state, argument, Position::Plain)?);
        }
        function.validate_args(&arguments)?;
        Ok(function.evaluate(&arguments)?)
    }
}

/// Queues `value` for every missing target and returns one row per target.
fn schedule_missing(
    state: &mut EvaluationState<'_>,
    missing: Vec<ArchetypePath>,
    value: Value,
    row_value: Value,
) -> ValueList {
    let mut rows = ValueList::new();
    for path in missing {
        tracing::debug!(path = %path, value = %value, "scheduling write for absent path");
        rows.push(ValueEntry::new(row_value.clone()).with_path(path.to_string()));
        state.pending.push(PendingWrite {
            path,
            value: value.clone(),
        });
    }
    if rows.is_empty() {
        ValueList::single(ValueEntry::new(row_value))
    } else {
        rows
    }
}

fn require_booleans(rows: ValueList) -> EvalResult<ValueList> {
    for value in rows.values() {
        if !matches!(value, Value::Boolean(_) | Value::Null) {
            return Err(EvaluationError::NotBoolean {
                actual: value.type_name().to_string(),
            });
        }
    }
    Ok(rows)
}

fn combine(operator: BinaryOperator, left: &ValueList, right: &ValueList) -> EvalResult<ValueList> {
    combine_rows(operator.symbol(), left, right, |a, b| {
        let value = apply_binary(operator, &a.value, &b.value)?;
        let requirements = propagated_requirements(operator, a, b, &value);
        let mut entry = ValueEntry::new(value).with_paths(a.paths.iter().chain(&b.paths).cloned());
        for requirement in requirements {
            entry.add_requirement(requirement.clone());
        }
        Ok(entry)
    })
}

/// Requirements that would flip the combined row, taken from the operands
/// that decided it.
fn propagated_requirements<'e>(
    operator: BinaryOperator,
    left: &'e ValueEntry,
    right: &'e ValueEntry,
    result: &Value,
) -> Vec<&'e ExistenceRequirement> {
    let holding = |flag: bool| {
        [left, right]
            .into_iter()
            .filter(move |entry| entry.value == Value::Boolean(flag))
            .flat_map(|entry| entry.requirements.iter())
            .collect::<Vec<_>>()
    };
    let both = || {
        left.requirements
            .iter()
            .chain(&right.requirements)
            .collect::<Vec<_>>()
    };
    match (operator, result.as_bool()) {
        (_, None) => Vec::new(),
        (BinaryOperator::And, Some(false)) => holding(false),
        (BinaryOperator::Or, Some(true)) => holding(true),
        (BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Xor, Some(_)) => both(),
        (BinaryOperator::Implies, Some(false)) => right.requirements.iter().collect(),
        (BinaryOperator::Implies, Some(true)) => {
            let mut requirements = Vec::new();
            if left.value == Value::Boolean(false) {
                requirements.extend(&left.requirements);
            }
            if right.value == Value::Boolean(true) {
                requirements.extend(&right.requirements);
            }
            requirements
        }
        _ => Vec::new(),
    }
}

/// Kleene conjunction over every condition row. A false result keeps only the
/// failing rows' paths and requirements.
fn reduce_for_all(rows: Vec<(String, ValueEntry)>) -> ValueEntry {
    let any_false = rows
        .iter()
        .any(|(_, row)| row.value == Value::Boolean(false));
    let any_null = rows.iter().any(|(_, row)| row.value.is_null());
    let value = if any_false {
        Value::Boolean(false)
    } else if any_null {
        Value::Null
    } else {
        Value::Boolean(true)
    };

    let mut entry = ValueEntry::new(value);
    for (_, row) in rows
        .into_iter()
        .filter(|(_, row)| !any_false || row.value == Value::Boolean(false))
    {
        entry = entry.with_paths(row.paths);
        for requirement in row.requirements {
            entry.add_requirement(requirement);
        }
    }
    entry
}

/// Kleene disjunction over every condition row.
///
/// True rows record the matched nodes as must-not-exist requirements; with
/// no match at all the most specific missing paths become must-exist.
fn reduce_exists(rows: Vec<(String, ValueEntry)>, missing: Vec<String>, all_found: bool) -> ValueEntry {
    let any_true = rows
        .iter()
        .any(|(_, row)| row.value == Value::Boolean(true));
    let any_null = rows.iter().any(|(_, row)| row.value.is_null());

    if any_true {
        let mut entry = ValueEntry::new(true);
        let mut recorded = false;
        for (match_path, row) in rows {
            if row.value != Value::Boolean(true) {
                continue;
            }
            if all_found || !recorded {
                entry.add_path(match_path.clone());
                recorded = true;
            }
            entry.add_requirement(ExistenceRequirement::MustNotExist(match_path));
        }
        return entry;
    }

    let mut entry = ValueEntry::new(if any_null {
        Value::Null
    } else {
        Value::Boolean(false)
    });
    if rows.is_empty() {
        for path in missing {
            entry.add_requirement(ExistenceRequirement::MustExist(path));
        }
    }
    for (_, row) in rows {
        entry = entry.with_paths(row.paths);
        for requirement in row.requirements {
            entry.add_requirement(requirement);
        }
    }
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aom::CComplexObject;
    use crate::model::ModelRegistry;
    use crate::rules::Expression as E;
    use crate::tree::RmObject;

    fn archetype(rules: Vec<RuleStatement>) -> Archetype {
        Archetype::new("openEHR-EHR-CLUSTER.test.v1", CComplexObject::new("CLUSTER")).with_rules(rules)
    }

    fn run(rules: Vec<RuleStatement>, tree: &mut RmTree) -> EvaluationResult {
        let model = ModelRegistry::openehr();
        let archetype = archetype(rules);
        RuleEvaluation::new(&archetype, &model).evaluate(tree).unwrap()
    }

    #[test]
    fn variables_are_visible_to_later_statements() {
        let mut tree = RmTree::new("CLUSTER");
        let result = run(
            vec![
                RuleStatement::variable(
                    "sum",
                    E::binary(BinaryOperator::Plus, E::literal(3), E::literal(5)),
                ),
                RuleStatement::tagged_assertion(
                    "eight",
                    E::binary(BinaryOperator::Equal, E::variable("sum"), E::literal(8)),
                ),
            ],
            &mut tree,
        );
        assert_eq!(
            result.variables.get("sum").and_then(ValueList::first_value),
            Some(&Value::Integer(8))
        );
        assert!(result.assertion("eight").unwrap().result);
    }

    #[test]
    fn statement_errors_do_not_stop_the_run() {
        let mut tree = RmTree::new("CLUSTER");
        let result = run(
            vec![
                RuleStatement::tagged_assertion(
                    "broken",
                    E::binary(BinaryOperator::Plus, E::literal("a"), E::literal(true)),
                ),
                RuleStatement::tagged_assertion(
                    "fine",
                    E::binary(BinaryOperator::Less, E::literal(1), E::literal(2)),
                ),
            ],
            &mut tree,
        );
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].statement_index, 0);
        assert_eq!(result.diagnostics[0].statement, "broken");
        assert!(result.assertion("broken").is_none());
        assert!(result.assertion("fine").unwrap().result);
    }

    #[test]
    fn non_boolean_assertions_are_reported() {
        let mut tree = RmTree::new("CLUSTER");
        let result = run(vec![RuleStatement::assertion(E::literal(3))], &mut tree);
        assert!(result.has_errors());
        assert!(result.diagnostics[0].message.contains("boolean"));
    }

    #[test]
    fn null_rows_do_not_fail_assertions() {
        let mut tree = RmTree::new("CLUSTER");
        let result = run(
            vec![RuleStatement::assertion(E::binary(
                BinaryOperator::Greater,
                E::path("/items/value/magnitude").unwrap(),
                E::literal(3),
            ))],
            &mut tree,
        );
        assert!(result.all_assertions_passed());
        assert_eq!(result.assertion_results[0].raw_result.first_value(), Some(&Value::Null));
    }

    #[test]
    fn code_phrases_read_as_codes() {
        let model = ModelRegistry::openehr();
        let archetype = archetype(Vec::new());
        let evaluation = RuleEvaluation::new(&archetype, &model);
        let mut tree = RmTree::new("CODE_PHRASE");
        let root = tree.root();
        let terminology = tree
            .add_object(root, "terminology_id", RmObject::new("TERMINOLOGY_ID"))
            .unwrap();
        tree.set_primitive(terminology, "value", PrimitiveValue::String("local".into()))
            .unwrap();
        tree.set_primitive(root, "code_string", PrimitiveValue::String("at1".into()))
            .unwrap();
        assert_eq!(evaluation.node_value(&tree, root), Value::code(Some("local"), "at1"));
    }
}
