//! Load-time checks on rule statements. A rule set that fails here is never evaluated.
//!
//! Variable references are not checked here: an unknown variable only fails
//! the statement that uses it, at evaluation time.

use std::collections::HashSet;

use super::{BinaryOperator, Expression, QuantifierKind, RuleStatement};
use crate::error::{Result, RulesError};
use crate::evaluation::FunctionRegistry;

struct RuleValidator<'a> {
    functions: &'a FunctionRegistry,
    declared: HashSet<String>,
    statement: String,
}

/// Rejects rule sets that cannot be evaluated meaningfully.
pub fn validate_rules(rules: &[RuleStatement], functions: &FunctionRegistry) -> Result<()> {
    let mut validator = RuleValidator {
        functions,
        declared: HashSet::new(),
        statement: String::new(),
    };

    for (index, statement) in rules.iter().enumerate() {
        validator.statement = statement.label(index);
        match statement {
            RuleStatement::VariableDeclaration(declaration) => {
                if declaration.name.trim().is_empty() {
                    return Err(validator.error("variable name is empty"));
                }
                validator.check(&declaration.expression)?;
                if !validator.declared.insert(declaration.name.clone()) {
                    return Err(validator.error(format!(
                        "variable '{}' is declared more than once",
                        declaration.name
                    )));
                }
            }
            RuleStatement::Assertion(assertion) => {
                if let Some(tag) = &assertion.tag {
                    if tag.trim().is_empty() {
                        return Err(validator.error("assertion tag is empty"));
                    }
                }
                validator.check(&assertion.expression)?;
            }
        }
    }
    Ok(())
}

impl RuleValidator<'_> {
    fn error(&self, message: impl Into<String>) -> RulesError {
        RulesError::malformed_in(message, self.statement.clone())
    }

    fn check(&mut self, expression: &Expression) -> Result<()> {
        match expression {
            Expression::Literal(_) | Expression::Variable(_) | Expression::ModelReference(_) => {
                Ok(())
            }
            Expression::Constraint(constraint) => Err(self.error(format!(
                "constraint {constraint} may only appear on the right of 'matches'"
            ))),
            Expression::Unary(unary) => self.check(&unary.operand.expression),
            Expression::Binary(binary) => {
                self.check(&binary.left.expression)?;
                if binary.operator == BinaryOperator::Matches {
                    match binary.right.expression.as_ref() {
                        Expression::Constraint(_) => Ok(()),
                        other => Err(self.error(format!(
                            "right side of 'matches' must be a constraint, found '{other}'"
                        ))),
                    }
                } else {
                    self.check(&binary.right.expression)
                }
            }
            Expression::Quantifier(quantifier) => {
                if quantifier.kind == QuantifierKind::ForAll {
                    if quantifier.variable.is_none() {
                        return Err(self.error("for_all requires a bound variable"));
                    }
                    if quantifier.condition.is_none() {
                        return Err(self.error("for_all requires a condition"));
                    }
                }
                let Some(condition) = &quantifier.condition else {
                    return Ok(());
                };
                match &quantifier.variable {
                    Some(variable) => {
                        if variable.trim().is_empty() {
                            return Err(self.error("quantifier variable name is empty"));
                        }
                        if self.declared.contains(variable) {
                            return Err(self.error(format!(
                                "quantifier variable '{variable}' shadows a declared variable"
                            )));
                        }
                        self.check(condition)
                    }
                    None => self.check(condition),
                }
            }
            Expression::Function(call) => {
                if !self.functions.contains(&call.name) {
                    return Err(self.error(format!("unknown function '{}'", call.name)));
                }
                for argument in &call.arguments {
                    self.check(argument)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aom::{CPrimitiveObject, Interval};
    use crate::rules::ModelReference;

    fn validate(rules: &[RuleStatement]) -> Result<()> {
        validate_rules(rules, &FunctionRegistry::default())
    }

    fn assert_malformed(rules: &[RuleStatement], fragment: &str) {
        match validate(rules) {
            Err(RulesError::MalformedRule { message, .. }) => {
                assert!(message.contains(fragment), "unexpected message: {message}")
            }
            other => panic!("expected malformed rule, got {other:?}"),
        }
    }

    #[test]
    fn accepts_well_formed_rules() {
        let rules = vec![
            RuleStatement::variable("total", Expression::literal(3)),
            RuleStatement::tagged_assertion(
                "in_range",
                Expression::binary(
                    BinaryOperator::Matches,
                    Expression::variable("total"),
                    Expression::constraint(CPrimitiveObject::Integer(vec![Interval::new(
                        Some(0),
                        Some(5),
                    )])),
                ),
            ),
            RuleStatement::assertion(Expression::for_all(
                "event",
                ModelReference::parse("/data/events").unwrap(),
                Expression::binary(
                    BinaryOperator::Greater,
                    Expression::variable_path("event", "value/magnitude").unwrap(),
                    Expression::function("abs", vec![Expression::variable("total")]),
                ),
            )),
        ];
        assert!(validate(&rules).is_ok());
    }

    #[test]
    fn rejects_for_all_without_condition() {
        let rules = vec![RuleStatement::assertion(Expression::Quantifier(
            crate::rules::QuantifierExpression {
                kind: QuantifierKind::ForAll,
                variable: Some("event".into()),
                path: ModelReference::parse("/data/events").unwrap(),
                condition: None,
            },
        ))];
        assert_malformed(&rules, "requires a condition");
    }

    #[test]
    fn rejects_duplicate_declarations_but_not_unknown_variables() {
        assert!(
            validate(&[
                RuleStatement::assertion(Expression::variable("later")),
                RuleStatement::variable("later", Expression::literal(true)),
            ])
            .is_ok()
        );
        assert_malformed(
            &[
                RuleStatement::variable("x", Expression::literal(1)),
                RuleStatement::variable("x", Expression::literal(2)),
            ],
            "declared more than once",
        );
    }

    #[test]
    fn rejects_misplaced_constraints_and_unknown_functions() {
        assert_malformed(
            &[RuleStatement::assertion(Expression::binary(
                BinaryOperator::Matches,
                Expression::literal(1),
                Expression::literal(1),
            ))],
            "must be a constraint",
        );
        assert_malformed(
            &[RuleStatement::assertion(Expression::constraint(
                CPrimitiveObject::Boolean(vec![true]),
            ))],
            "right of 'matches'",
        );
        assert_malformed(
            &[RuleStatement::assertion(Expression::function(
                "median",
                vec![],
            ))],
            "unknown function",
        );
    }

    #[test]
    fn rejects_empty_tags_and_shadowing() {
        assert_malformed(
            &[RuleStatement::tagged_assertion("  ", Expression::literal(true))],
            "tag is empty",
        );
        assert_malformed(
            &[
                RuleStatement::variable("event", Expression::literal(1)),
                RuleStatement::assertion(Expression::for_all(
                    "event",
                    ModelReference::parse("/events").unwrap(),
                    Expression::literal(true),
                )),
            ],
            "shadows",
        );
    }
}
