//! Multiplicity-aware values produced by expression evaluation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tree::PrimitiveValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    TerminologyCode {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        terminology_id: Option<String>,
        code_string: String,
    },
    /// A complex node that has no scalar reading.
    Object { type_name: String },
}

impl Value {
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Real(_) => "Real",
            Value::String(_) => "String",
            Value::TerminologyCode { .. } => "TerminologyCode",
            Value::Object { type_name } => type_name,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(integer) => Some(*integer as f64),
            Value::Real(real) => Some(*real),
            _ => None,
        }
    }

    /// Code string of a terminology code, or the text of a plain string.
    pub fn as_code(&self) -> Option<&str> {
        match self {
            Value::TerminologyCode { code_string, .. } => Some(code_string),
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn code(terminology_id: Option<&str>, code_string: impl Into<String>) -> Self {
        Value::TerminologyCode {
            terminology_id: terminology_id.map(str::to_string),
            code_string: code_string.into(),
        }
    }

    pub fn to_primitive(&self) -> Option<PrimitiveValue> {
        match self {
            Value::Boolean(flag) => Some(PrimitiveValue::Boolean(*flag)),
            Value::Integer(integer) => Some(PrimitiveValue::Integer(*integer)),
            Value::Real(real) => Some(PrimitiveValue::Real(*real)),
            Value::String(text) => Some(PrimitiveValue::String(text.clone())),
            _ => None,
        }
    }
}

impl From<&PrimitiveValue> for Value {
    fn from(value: &PrimitiveValue) -> Self {
        match value {
            PrimitiveValue::Boolean(flag) => Value::Boolean(*flag),
            PrimitiveValue::Integer(integer) => Value::Integer(*integer),
            PrimitiveValue::Real(real) => Value::Real(*real),
            PrimitiveValue::String(text) => Value::String(text.clone()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(flag) => write!(f, "{flag}"),
            Value::Integer(integer) => write!(f, "{integer}"),
            Value::Real(real) => write!(f, "{real:?}"),
            Value::String(text) => f.write_str(text),
            Value::TerminologyCode {
                terminology_id: Some(terminology),
                code_string,
            } => write!(f, "[{terminology}::{code_string}]"),
            Value::TerminologyCode {
                terminology_id: None,
                code_string,
            } => write!(f, "[{code_string}]"),
            Value::Object { type_name } => write!(f, "<{type_name}>"),
        }
    }
}

/// What would have to change in the tree to flip a row's truth value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ExistenceRequirement {
    MustExist(String),
    MustNotExist(String),
}

/// One row: a value and the tree paths it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueEntry {
    pub value: Value,
    pub paths: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<ExistenceRequirement>,
}

impl ValueEntry {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            paths: Vec::new(),
            requirements: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.add_path(path);
        self
    }

    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for path in paths {
            self.add_path(path);
        }
        self
    }

    pub fn with_requirement(mut self, requirement: ExistenceRequirement) -> Self {
        self.add_requirement(requirement);
        self
    }

    pub fn add_path(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn add_requirement(&mut self, requirement: ExistenceRequirement) {
        if !self.requirements.contains(&requirement) {
            self.requirements.push(requirement);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValueList {
    entries: Vec<ValueEntry>,
}

impl ValueList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(entry: ValueEntry) -> Self {
        Self {
            entries: vec![entry],
        }
    }

    /// The stand-in for an absent operand: one null row without paths.
    pub fn null() -> Self {
        Self::single(ValueEntry::new(Value::Null))
    }

    pub fn push(&mut self, entry: ValueEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ValueEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValueEntry> {
        self.entries.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|entry| &entry.value)
    }

    pub fn first_value(&self) -> Option<&Value> {
        self.entries.first().map(|entry| &entry.value)
    }

    /// Paths of the first row, which decide a passing assertion.
    pub fn first_paths(&self) -> &[String] {
        self.entries
            .first()
            .map(|entry| entry.paths.as_slice())
            .unwrap_or_default()
    }
}

impl FromIterator<ValueEntry> for ValueList {
    fn from_iter<T: IntoIterator<Item = ValueEntry>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ValueList {
    type Item = ValueEntry;
    type IntoIter = std::vec::IntoIter<ValueEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValueList {
    type Item = &'a ValueEntry;
    type IntoIter = std::slice::Iter<'a, ValueEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Variables bound during one evaluation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct VariableMap {
    variables: IndexMap<String, ValueList>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: ValueList) {
        self.variables.insert(name.into(), values);
    }

    pub fn get(&self, name: &str) -> Option<&ValueList> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueList)> {
        self.variables
            .iter()
            .map(|(name, values)| (name.as_str(), values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literals_deserialize_untagged() {
        let values: Vec<Value> =
            serde_json::from_value(json!([null, true, 3, 2.5, "text", {"code_string": "at1"}]))
                .unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Boolean(true),
                Value::Integer(3),
                Value::Real(2.5),
                Value::String("text".into()),
                Value::code(None, "at1"),
            ]
        );
    }

    #[test]
    fn entries_deduplicate_paths() {
        let entry = ValueEntry::new(1)
            .with_path("/a")
            .with_paths(["/b", "/a"]);
        assert_eq!(entry.paths, vec!["/a", "/b"]);
    }

    #[test]
    fn first_paths_come_from_the_first_row() {
        let list: ValueList = vec![
            ValueEntry::new(1).with_path("/x[id1, 2]"),
            ValueEntry::new(2).with_path("/x[id1, 1]"),
        ]
        .into_iter()
        .collect();
        assert_eq!(list.first_paths(), ["/x[id1, 2]".to_string()]);
        assert!(ValueList::new().first_paths().is_empty());
    }
}
