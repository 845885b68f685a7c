//! Flattened archetype constraint model, reduced to what rule evaluation
//! and value fixups need.

pub mod terminology;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::Result;
use crate::evaluation::FunctionRegistry;
use crate::path::ArchetypePath;
use crate::rules::{RuleStatement, validate_rules};

pub use terminology::{ArchetypeTerm, ArchetypeTerminology, is_value_code, is_value_set_code};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval<T> {
    #[serde(default)]
    pub lower: Option<T>,
    #[serde(default)]
    pub upper: Option<T>,
    #[serde(default = "included")]
    pub lower_included: bool,
    #[serde(default = "included")]
    pub upper_included: bool,
}

fn included() -> bool {
    true
}

impl<T: PartialOrd + Copy> Interval<T> {
    pub fn new(lower: Option<T>, upper: Option<T>) -> Self {
        Self {
            lower,
            upper,
            lower_included: true,
            upper_included: true,
        }
    }

    pub fn point(value: T) -> Self {
        Self::new(Some(value), Some(value))
    }

    pub fn has(&self, value: T) -> bool {
        let above_lower = match self.lower {
            Some(lower) if self.lower_included => value >= lower,
            Some(lower) => value > lower,
            None => true,
        };
        let below_upper = match self.upper {
            Some(upper) if self.upper_included => value <= upper,
            Some(upper) => value < upper,
            None => true,
        };
        above_lower && below_upper
    }

    /// The single value of a closed point interval such as `|3|`.
    pub fn singleton(&self) -> Option<T> {
        match (self.lower, self.upper) {
            (Some(lower), Some(upper))
                if lower == upper && self.lower_included && self.upper_included =>
            {
                Some(lower)
            }
            _ => None,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("|")?;
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => {
                let lower_op = if self.lower_included { "" } else { ">" };
                let upper_op = if self.upper_included { "" } else { "<" };
                write!(f, "{lower_op}{lower}..{upper_op}{upper}")?;
            }
            (Some(lower), None) => {
                write!(f, "{}{lower}", if self.lower_included { ">=" } else { ">" })?
            }
            (None, Some(upper)) => {
                write!(f, "{}{upper}", if self.upper_included { "<=" } else { "<" })?
            }
            (None, None) => f.write_str("*")?,
        }
        f.write_str("|")
    }
}

/// Constraint on a primitive value. Also the right-hand side of `matches`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CPrimitiveObject {
    /// Literal values, or regular expressions written as `/pattern/`.
    String(Vec<String>),
    Integer(Vec<Interval<i64>>),
    Real(Vec<Interval<f64>>),
    Boolean(Vec<bool>),
    /// An at-code or an ac-code (value set).
    TerminologyCode(String),
}

impl CPrimitiveObject {
    pub fn rm_type_name(&self) -> &'static str {
        match self {
            CPrimitiveObject::String(_) => "String",
            CPrimitiveObject::Integer(_) => "Integer",
            CPrimitiveObject::Real(_) => "Real",
            CPrimitiveObject::Boolean(_) => "Boolean",
            CPrimitiveObject::TerminologyCode(_) => "CODE_PHRASE",
        }
    }

    pub fn terminology_code(&self) -> Option<&str> {
        match self {
            CPrimitiveObject::TerminologyCode(code) => Some(code),
            _ => None,
        }
    }

    /// The value of a single-point integer constraint.
    pub fn single_integer(&self) -> Option<i64> {
        match self {
            CPrimitiveObject::Integer(intervals) => match intervals.as_slice() {
                [interval] => interval.singleton(),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for CPrimitiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            f.write_str("{")?;
            for (position, item) in items.iter().enumerate() {
                if position > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            f.write_str("}")
        }
        match self {
            CPrimitiveObject::String(values) => {
                let quoted: Vec<String> = values
                    .iter()
                    .map(|value| {
                        if value.len() > 1 && value.starts_with('/') && value.ends_with('/') {
                            value.clone()
                        } else {
                            format!("\"{value}\"")
                        }
                    })
                    .collect();
                list(f, &quoted)
            }
            CPrimitiveObject::Integer(intervals) => list(f, intervals),
            CPrimitiveObject::Real(intervals) => list(f, intervals),
            CPrimitiveObject::Boolean(values) => list(f, values),
            CPrimitiveObject::TerminologyCode(code) => write!(f, "{{[{code}]}}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CObject {
    Complex(CComplexObject),
    Primitive(CPrimitiveObject),
}

impl CObject {
    pub fn rm_type_name(&self) -> &str {
        match self {
            CObject::Complex(complex) => &complex.rm_type_name,
            CObject::Primitive(primitive) => primitive.rm_type_name(),
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        match self {
            CObject::Complex(complex) => complex.node_id.as_deref(),
            CObject::Primitive(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CAttribute {
    pub rm_attribute_name: String,
    #[serde(default)]
    pub children: Vec<CObject>,
}

impl CAttribute {
    pub fn new(rm_attribute_name: impl Into<String>) -> Self {
        Self {
            rm_attribute_name: rm_attribute_name.into(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: CObject) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_complex(self, child: CComplexObject) -> Self {
        self.with_child(CObject::Complex(child))
    }

    pub fn with_primitive(self, child: CPrimitiveObject) -> Self {
        self.with_child(CObject::Primitive(child))
    }
}

/// Co-varying constraints on several attributes of one object, e.g. the
/// `[value, symbol]` pairs of an ordinal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CAttributeTuple {
    pub members: Vec<String>,
    pub tuples: Vec<Vec<CPrimitiveObject>>,
}

impl CAttributeTuple {
    pub fn new(members: &[&str]) -> Self {
        Self {
            members: members.iter().map(|member| member.to_string()).collect(),
            tuples: Vec::new(),
        }
    }

    pub fn with_tuple(mut self, tuple: Vec<CPrimitiveObject>) -> Self {
        self.tuples.push(tuple);
        self
    }

    pub fn has_members(&self, names: &[&str]) -> bool {
        names
            .iter()
            .all(|name| self.members.iter().any(|member| member == name))
    }

    /// Constraint on `wanted` in the tuple whose `key` member is the terminology code `code`.
    pub fn paired_with_code(&self, key: &str, code: &str, wanted: &str) -> Option<&CPrimitiveObject> {
        let key_index = self.members.iter().position(|member| member == key)?;
        let wanted_index = self.members.iter().position(|member| member == wanted)?;
        self.tuples
            .iter()
            .find(|tuple| {
                tuple
                    .get(key_index)
                    .and_then(CPrimitiveObject::terminology_code)
                    == Some(code)
            })
            .and_then(|tuple| tuple.get(wanted_index))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CComplexObject {
    pub rm_type_name: String,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub attributes: Vec<CAttribute>,
    #[serde(default)]
    pub attribute_tuples: Vec<CAttributeTuple>,
}

/// Borrowed view of whatever constraint a path lands on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstraintRef<'a> {
    Complex(&'a CComplexObject),
    Primitive(&'a CPrimitiveObject),
}

impl<'a> ConstraintRef<'a> {
    pub fn rm_type_name(&self) -> &'a str {
        match self {
            ConstraintRef::Complex(complex) => &complex.rm_type_name,
            ConstraintRef::Primitive(primitive) => primitive.rm_type_name(),
        }
    }

    pub fn node_id(&self) -> Option<&'a str> {
        match self {
            ConstraintRef::Complex(complex) => complex.node_id.as_deref(),
            ConstraintRef::Primitive(_) => None,
        }
    }
}

impl CComplexObject {
    pub fn new(rm_type_name: impl Into<String>) -> Self {
        Self {
            rm_type_name: rm_type_name.into(),
            node_id: None,
            attributes: Vec::new(),
            attribute_tuples: Vec::new(),
        }
    }

    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_attribute(mut self, attribute: CAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_tuple(mut self, tuple: CAttributeTuple) -> Self {
        self.attribute_tuples.push(tuple);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&CAttribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.rm_attribute_name == name)
    }

    /// Constraint addressed by `path`. Occurrence indices are ignored; a
    /// segment without node id only resolves when the attribute has one child.
    pub fn object_at(&self, path: &ArchetypePath) -> Option<ConstraintRef<'_>> {
        let mut current = ConstraintRef::Complex(self);
        for segment in path.segments() {
            let ConstraintRef::Complex(complex) = current else {
                return None;
            };
            let attribute = complex.attribute(&segment.attribute)?;
            let child = match &segment.node_id {
                Some(node_id) => attribute
                    .children
                    .iter()
                    .find(|child| child.node_id() == Some(node_id.as_str()))?,
                None => match attribute.children.as_slice() {
                    [only] => only,
                    _ => return None,
                },
            };
            current = match child {
                CObject::Complex(complex) => ConstraintRef::Complex(complex),
                CObject::Primitive(primitive) => ConstraintRef::Primitive(primitive),
            };
        }
        Some(current)
    }

    /// Attribute tuple of the object at `path` that covers all `members`.
    pub fn tuple_at(&self, path: &ArchetypePath, members: &[&str]) -> Option<&CAttributeTuple> {
        match self.object_at(path)? {
            ConstraintRef::Complex(complex) => complex
                .attribute_tuples
                .iter()
                .find(|tuple| tuple.has_members(members)),
            ConstraintRef::Primitive(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archetype {
    pub archetype_id: String,
    pub definition: CComplexObject,
    #[serde(default)]
    pub terminology: ArchetypeTerminology,
    /// Terminologies of archetypes used inside this one, keyed by archetype id.
    #[serde(default)]
    pub component_terminologies: IndexMap<String, ArchetypeTerminology>,
    #[serde(default)]
    pub rules: Vec<RuleStatement>,
}

impl Archetype {
    pub fn new(archetype_id: impl Into<String>, definition: CComplexObject) -> Self {
        Self {
            archetype_id: archetype_id.into(),
            definition,
            terminology: ArchetypeTerminology::default(),
            component_terminologies: IndexMap::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_terminology(mut self, terminology: ArchetypeTerminology) -> Self {
        self.terminology = terminology;
        self
    }

    pub fn with_component_terminology(
        mut self,
        archetype_id: impl Into<String>,
        terminology: ArchetypeTerminology,
    ) -> Self {
        self.component_terminologies
            .insert(archetype_id.into(), terminology);
        self
    }

    pub fn with_rules(mut self, rules: Vec<RuleStatement>) -> Self {
        self.rules = rules;
        self
    }

    /// Parses and validates an archetype. Malformed rules are rejected here.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let archetype: Archetype = serde_json::from_str(json)?;
        archetype.validate()?;
        Ok(archetype)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        validate_rules(&self.rules, &FunctionRegistry::default())
    }

    /// Terminology to consult for nodes belonging to `archetype_id`: the
    /// component terminology when one is registered, otherwise this archetype's own.
    pub fn terminology_for(&self, archetype_id: Option<&str>) -> &ArchetypeTerminology {
        archetype_id
            .filter(|id| *id != self.archetype_id)
            .and_then(|id| self.component_terminologies.get(id))
            .unwrap_or(&self.terminology)
    }
}
