//! Built-in rule functions.
//!
//! Aggregates (`sum`, `min`, `max`, `mean`, `count`) fold every row of their
//! argument into one row; `abs` and `round` work row by row;
//! `value_when_undefined(default, expr)` fills null rows of `expr`.

use std::collections::HashMap;
use std::sync::Arc;

use super::value::{Value, ValueEntry, ValueList};
use crate::error::FunctionError;

pub type FunctionResult<T> = std::result::Result<T, FunctionError>;

pub trait RuleFunction: Send + Sync {
    fn name(&self) -> &str;

    /// Inclusive bounds on the number of arguments.
    fn arity(&self) -> (usize, usize);

    fn evaluate(&self, args: &[ValueList]) -> FunctionResult<ValueList>;

    fn validate_args(&self, args: &[ValueList]) -> FunctionResult<()> {
        let (min, max) = self.arity();
        if args.len() < min || args.len() > max {
            return Err(FunctionError::InvalidArity {
                name: self.name().to_string(),
                min,
                max,
                actual: args.len(),
            });
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn RuleFunction>>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Aggregate::Sum);
        registry.register(Aggregate::Min);
        registry.register(Aggregate::Max);
        registry.register(Aggregate::Mean);
        registry.register(Aggregate::Count);
        registry.register(RowWise::Abs);
        registry.register(RowWise::Round);
        registry.register(ValueWhenUndefined);
        registry
    }
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    pub fn register(&mut self, function: impl RuleFunction + 'static) {
        self.functions
            .insert(function.name().to_string(), Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RuleFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

fn argument_error(name: &str, index: usize, expected: &str, actual: &Value) -> FunctionError {
    FunctionError::InvalidArgumentType {
        name: name.to_string(),
        index,
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

#[derive(Debug, Clone, Copy)]
enum Aggregate {
    Sum,
    Min,
    Max,
    Mean,
    Count,
}

impl RuleFunction for Aggregate {
    fn name(&self) -> &str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::Mean => "mean",
            Aggregate::Count => "count",
        }
    }

    fn arity(&self) -> (usize, usize) {
        (1, 1)
    }

    fn evaluate(&self, args: &[ValueList]) -> FunctionResult<ValueList> {
        self.validate_args(args)?;
        let mut entry = ValueEntry::new(Value::Null);
        let mut integers_only = true;
        let mut numbers = Vec::new();
        for row in args[0].iter() {
            entry = entry.with_paths(row.paths.iter().cloned());
            match &row.value {
                Value::Null => {}
                Value::Integer(integer) => numbers.push(*integer as f64),
                Value::Real(real) => {
                    integers_only = false;
                    numbers.push(*real);
                }
                other => return Err(argument_error(self.name(), 0, "number", other)),
            }
        }

        let exact = |number: f64| {
            if integers_only {
                Value::Integer(number as i64)
            } else {
                Value::Real(number)
            }
        };
        entry.value = match self {
            Aggregate::Count => Value::Integer(numbers.len() as i64),
            Aggregate::Sum => exact(numbers.iter().sum()),
            _ if numbers.is_empty() => Value::Null,
            Aggregate::Min => exact(numbers.iter().copied().fold(f64::INFINITY, f64::min)),
            Aggregate::Max => exact(numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            Aggregate::Mean => Value::Real(numbers.iter().sum::<f64>() / numbers.len() as f64),
        };
        Ok(ValueList::single(entry))
    }
}

#[derive(Debug, Clone, Copy)]
enum RowWise {
    Abs,
    Round,
}

impl RuleFunction for RowWise {
    fn name(&self) -> &str {
        match self {
            RowWise::Abs => "abs",
            RowWise::Round => "round",
        }
    }

    fn arity(&self) -> (usize, usize) {
        match self {
            RowWise::Abs => (1, 1),
            RowWise::Round => (1, 2),
        }
    }

    fn evaluate(&self, args: &[ValueList]) -> FunctionResult<ValueList> {
        self.validate_args(args)?;
        let precision = match args.get(1).and_then(ValueList::first_value) {
            None => 0,
            Some(Value::Integer(digits)) if *digits >= 0 => *digits as i32,
            Some(other) => return Err(argument_error(self.name(), 1, "non-negative Integer", other)),
        };

        args[0]
            .iter()
            .map(|row| {
                let value = match (self, &row.value) {
                    (_, Value::Null) => Value::Null,
                    (RowWise::Abs, Value::Integer(integer)) => Value::Integer(integer.saturating_abs()),
                    (RowWise::Abs, Value::Real(real)) => Value::Real(real.abs()),
                    (RowWise::Round, Value::Integer(integer)) => Value::Integer(*integer),
                    (RowWise::Round, Value::Real(real)) => {
                        let factor = 10f64.powi(precision);
                        Value::Real((real * factor).round() / factor)
                    }
                    (_, other) => return Err(argument_error(self.name(), 0, "number", other)),
                };
                Ok(ValueEntry {
                    value,
                    ..row.clone()
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct ValueWhenUndefined;

impl RuleFunction for ValueWhenUndefined {
    fn name(&self) -> &str {
        "value_when_undefined"
    }

    fn arity(&self) -> (usize, usize) {
        (2, 2)
    }

    fn evaluate(&self, args: &[ValueList]) -> FunctionResult<ValueList> {
        self.validate_args(args)?;
        let default = args[0].first_value().cloned().unwrap_or(Value::Null);
        if args[1].is_empty() {
            return Ok(ValueList::single(ValueEntry::new(default)));
        }
        Ok(args[1]
            .iter()
            .map(|row| {
                if row.value.is_null() {
                    ValueEntry {
                        value: default.clone(),
                        ..row.clone()
                    }
                } else {
                    row.clone()
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(values: Vec<Value>) -> ValueList {
        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| ValueEntry::new(value).with_path(format!("/items[{}]", i + 1)))
            .collect()
    }

    fn call(name: &str, args: &[ValueList]) -> FunctionResult<ValueList> {
        FunctionRegistry::default()
            .get(name)
            .expect("function registered")
            .evaluate(args)
    }

    #[test]
    fn sum_keeps_integers_and_collects_paths() {
        let result = call("sum", &[list(vec![Value::Integer(2), Value::Null, Value::Integer(5)])]).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.first_value(), Some(&Value::Integer(7)));
        assert_eq!(result.entries()[0].paths.len(), 3);
    }

    #[test]
    fn min_max_mean_count() {
        let values = list(vec![Value::Real(1.5), Value::Integer(4), Value::Real(-2.0)]);
        let args = [values];
        assert_eq!(call("min", &args).unwrap().first_value(), Some(&Value::Real(-2.0)));
        assert_eq!(call("max", &args).unwrap().first_value(), Some(&Value::Real(4.0)));
        assert_eq!(call("mean", &args).unwrap().first_value(), Some(&Value::Real(3.5 / 3.0)));
        assert_eq!(call("count", &args).unwrap().first_value(), Some(&Value::Integer(3)));
        assert_eq!(
            call("max", &[ValueList::new()]).unwrap().first_value(),
            Some(&Value::Null)
        );
    }

    #[test]
    fn row_wise_functions_keep_rows() {
        let result = call("abs", &[list(vec![Value::Integer(-4), Value::Real(-2.5)])]).unwrap();
        let values: Vec<&Value> = result.values().collect();
        assert_eq!(values, vec![&Value::Integer(4), &Value::Real(2.5)]);

        let rounded = call(
            "round",
            &[list(vec![Value::Real(2.345)]), ValueList::single(ValueEntry::new(1))],
        )
        .unwrap();
        assert_eq!(rounded.first_value(), Some(&Value::Real(2.3)));
    }

    #[test]
    fn value_when_undefined_fills_null_rows() {
        let result = call(
            "value_when_undefined",
            &[
                ValueList::single(ValueEntry::new(0)),
                list(vec![Value::Integer(3), Value::Null]),
            ],
        )
        .unwrap();
        let values: Vec<&Value> = result.values().collect();
        assert_eq!(values, vec![&Value::Integer(3), &Value::Integer(0)]);
    }

    #[test]
    fn arity_and_argument_types_are_checked() {
        assert!(matches!(
            call("abs", &[]),
            Err(FunctionError::InvalidArity { actual: 0, .. })
        ));
        assert!(matches!(
            call("sum", &[list(vec![Value::from("x")])]),
            Err(FunctionError::InvalidArgumentType { .. })
        ));
    }
}
