//! Parsed rule statements and expressions.
//!
//! Trees arrive already shaped by an upstream parser; operand grouping is
//! final and evaluation never re-associates operators.

pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::aom::CPrimitiveObject;
use crate::error::PathError;
use crate::evaluation::Value;
use crate::path::ArchetypePath;

pub use validation::validate_rules;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatement {
    VariableDeclaration(VariableDeclaration),
    Assertion(Assertion),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub name: String,
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    #[serde(default)]
    pub tag: Option<String>,
    pub expression: Expression,
}

impl RuleStatement {
    pub fn variable(name: impl Into<String>, expression: Expression) -> Self {
        RuleStatement::VariableDeclaration(VariableDeclaration {
            name: name.into(),
            expression,
        })
    }

    pub fn assertion(expression: Expression) -> Self {
        RuleStatement::Assertion(Assertion {
            tag: None,
            expression,
        })
    }

    pub fn tagged_assertion(tag: impl Into<String>, expression: Expression) -> Self {
        RuleStatement::Assertion(Assertion {
            tag: Some(tag.into()),
            expression,
        })
    }

    pub fn expression(&self) -> &Expression {
        match self {
            RuleStatement::VariableDeclaration(declaration) => &declaration.expression,
            RuleStatement::Assertion(assertion) => &assertion.expression,
        }
    }

    /// Short human label used in diagnostics.
    pub fn label(&self, index: usize) -> String {
        match self {
            RuleStatement::VariableDeclaration(declaration) => format!("${}", declaration.name),
            RuleStatement::Assertion(Assertion { tag: Some(tag), .. }) => tag.clone(),
            RuleStatement::Assertion(_) => format!("assertion {}", index + 1),
        }
    }
}

impl fmt::Display for RuleStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleStatement::VariableDeclaration(declaration) => {
                write!(f, "${} := {}", declaration.name, declaration.expression)
            }
            RuleStatement::Assertion(Assertion {
                tag: Some(tag),
                expression,
            }) => write!(f, "{tag}: {expression}"),
            RuleStatement::Assertion(Assertion {
                tag: None,
                expression,
            }) => write!(f, "{expression}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Exponent,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
    Xor,
    Implies,
    Matches,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Exponent => "^",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterOrEqual => ">=",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
            BinaryOperator::Xor => "xor",
            BinaryOperator::Implies => "implies",
            BinaryOperator::Matches => "matches",
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Plus
                | BinaryOperator::Minus
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Modulo
                | BinaryOperator::Exponent
        )
    }

    pub fn is_boolean(&self) -> bool {
        matches!(
            self,
            BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Xor | BinaryOperator::Implies
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantifierKind {
    Exists,
    NotExists,
    ForAll,
}

/// A path into the tree, optionally relative to a bound variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    pub path: ArchetypePath,
}

impl ModelReference {
    pub fn new(path: ArchetypePath) -> Self {
        Self {
            variable: None,
            path,
        }
    }

    pub fn parse(path: &str) -> Result<Self, PathError> {
        Ok(Self::new(path.parse()?))
    }

    pub fn on_variable(variable: impl Into<String>, path: &str) -> Result<Self, PathError> {
        Ok(Self {
            variable: Some(variable.into()),
            path: path.parse()?,
        })
    }
}

impl fmt::Display for ModelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variable {
            Some(variable) if self.path.is_absolute() => write!(f, "${variable}{}", self.path),
            Some(variable) => write!(f, "${variable}/{}", self.path),
            None => write!(f, "{}", self.path),
        }
    }
}

/// An operand together with whether the rule text parenthesised it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operand {
    #[serde(flatten)]
    pub expression: Box<Expression>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub precedence_overridden: bool,
}

impl From<Expression> for Operand {
    fn from(expression: Expression) -> Self {
        Self {
            expression: Box::new(expression),
            precedence_overridden: false,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.precedence_overridden {
            write!(f, "({})", self.expression)
        } else {
            write!(f, "{}", self.expression)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpression {
    pub operator: UnaryOperator,
    pub operand: Operand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpression {
    pub operator: BinaryOperator,
    pub left: Operand,
    pub right: Operand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantifierExpression {
    pub kind: QuantifierKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    pub path: ModelReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Literal(Value),
    /// Right-hand side of `matches`.
    Constraint(CPrimitiveObject),
    Variable(String),
    ModelReference(ModelReference),
    Unary(UnaryExpression),
    Binary(BinaryExpression),
    Quantifier(QuantifierExpression),
    Function(FunctionCall),
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    pub fn path(path: &str) -> Result<Self, PathError> {
        Ok(Expression::ModelReference(ModelReference::parse(path)?))
    }

    pub fn variable_path(variable: impl Into<String>, path: &str) -> Result<Self, PathError> {
        Ok(Expression::ModelReference(ModelReference::on_variable(
            variable, path,
        )?))
    }

    pub fn constraint(constraint: CPrimitiveObject) -> Self {
        Expression::Constraint(constraint)
    }

    pub fn unary(operator: UnaryOperator, operand: impl Into<Operand>) -> Self {
        Expression::Unary(UnaryExpression {
            operator,
            operand: operand.into(),
        })
    }

    pub fn not(operand: impl Into<Operand>) -> Self {
        Self::unary(UnaryOperator::Not, operand)
    }

    pub fn binary(
        operator: BinaryOperator,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
    ) -> Self {
        Expression::Binary(BinaryExpression {
            operator,
            left: left.into(),
            right: right.into(),
        })
    }

    pub fn exists(path: ModelReference) -> Self {
        Expression::Quantifier(QuantifierExpression {
            kind: QuantifierKind::Exists,
            variable: None,
            path,
            condition: None,
        })
    }

    pub fn not_exists(path: ModelReference) -> Self {
        Expression::Quantifier(QuantifierExpression {
            kind: QuantifierKind::NotExists,
            variable: None,
            path,
            condition: None,
        })
    }

    pub fn for_all(variable: impl Into<String>, path: ModelReference, condition: Expression) -> Self {
        Expression::Quantifier(QuantifierExpression {
            kind: QuantifierKind::ForAll,
            variable: Some(variable.into()),
            path,
            condition: Some(Box::new(condition)),
        })
    }

    pub fn function(name: impl Into<String>, arguments: Vec<Expression>) -> Self {
        Expression::Function(FunctionCall {
            name: name.into(),
            arguments,
        })
    }

    /// Marks this expression as parenthesised in the rule text.
    pub fn parenthesized(self) -> Operand {
        Operand {
            expression: Box::new(self),
            precedence_overridden: true,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(Value::String(text)) => write!(f, "\"{text}\""),
            Expression::Literal(value) => write!(f, "{value}"),
            Expression::Constraint(constraint) => write!(f, "{constraint}"),
            Expression::Variable(name) => write!(f, "${name}"),
            Expression::ModelReference(reference) => write!(f, "{reference}"),
            Expression::Unary(unary) => match unary.operator {
                UnaryOperator::Not => write!(f, "not {}", unary.operand),
                UnaryOperator::Negate => write!(f, "-{}", unary.operand),
            },
            Expression::Binary(binary) => {
                write!(f, "{} {} {}", binary.left, binary.operator, binary.right)
            }
            Expression::Quantifier(quantifier) => {
                match quantifier.kind {
                    QuantifierKind::Exists => write!(f, "exists ")?,
                    QuantifierKind::NotExists => write!(f, "not exists ")?,
                    QuantifierKind::ForAll => write!(f, "for_all ")?,
                }
                if let Some(variable) = &quantifier.variable {
                    write!(f, "${variable} in ")?;
                }
                write!(f, "{}", quantifier.path)?;
                if let Some(condition) = &quantifier.condition {
                    write!(f, " {{ {condition} }}")?;
                }
                Ok(())
            }
            Expression::Function(call) => {
                write!(f, "{}(", call.name)?;
                for (position, argument) in call.arguments.iter().enumerate() {
                    if position > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_renders_parenthesised_operands() {
        let expression = Expression::binary(
            BinaryOperator::Multiply,
            Expression::binary(
                BinaryOperator::Plus,
                Expression::literal(3),
                Expression::literal(2),
            )
            .parenthesized(),
            Expression::literal(5),
        );
        assert_eq!(expression.to_string(), "(3 + 2) * 5");
    }

    #[test]
    fn display_renders_quantifiers_and_references() {
        let expression = Expression::for_all(
            "event",
            ModelReference::parse("/data[id2]/events[id3]").unwrap(),
            Expression::binary(
                BinaryOperator::Greater,
                Expression::variable_path("event", "data[id4]/items[id5]/value/magnitude").unwrap(),
                Expression::literal(0),
            ),
        );
        assert_eq!(
            expression.to_string(),
            "for_all $event in /data[id2]/events[id3] { $event/data[id4]/items[id5]/value/magnitude > 0 }"
        );
    }

    #[test]
    fn statements_deserialize_from_json() {
        let statement: RuleStatement = serde_json::from_value(json!({
            "assertion": {
                "tag": "systolic_present",
                "expression": {
                    "binary": {
                        "operator": "greater",
                        "left": {"variable": "systolic"},
                        "right": {
                            "binary": {
                                "operator": "minus",
                                "left": {"variable": "diastolic"},
                                "right": {"literal": 5}
                            },
                            "precedence_overridden": true
                        }
                    }
                }
            }
        }))
        .unwrap();
        assert_eq!(
            statement.to_string(),
            "systolic_present: $systolic > ($diastolic - 5)"
        );
        assert_eq!(statement.label(0), "systolic_present");
    }
}
