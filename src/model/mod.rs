//! Type and attribute metadata for the reference model.
//!
//! Path resolution asks the model which attributes repeat, object
//! construction asks which concrete type to build, and write-back asks
//! which [`ValueKind`] a node has so the matching fixup can run.

pub mod openehr;
pub mod registry;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::tree::{NodeId, RmTree};

pub use registry::{ModelRegistry, ModelRegistryBuilder, RegistryMetrics};

/// Value shapes that carry derived fields kept consistent by fixups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    CodedText,
    Ordinal,
    Proportion,
    CodePhrase,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    String,
    Integer,
    Real,
    Boolean,
}

impl PrimitiveType {
    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveType::String => "String",
            PrimitiveType::Integer => "Integer",
            PrimitiveType::Real => "Real",
            PrimitiveType::Boolean => "Boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RmAttributeInfo {
    pub name: String,
    /// Element type for collections, the attribute type otherwise.
    pub type_name: String,
    pub is_multiple: bool,
    pub is_nullable: bool,
    pub is_computed: bool,
}

impl RmAttributeInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            is_multiple: false,
            is_nullable: false,
            is_computed: false,
        }
    }

    pub fn multiple(mut self) -> Self {
        self.is_multiple = true;
        self.is_nullable = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.is_computed = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RmTypeInfo {
    pub rm_name: String,
    pub parent: Option<String>,
    pub is_abstract: bool,
    pub primitive: Option<PrimitiveType>,
    pub value_kind: Option<ValueKind>,
    /// Attributes declared on this type only; inherited ones live on the parents.
    pub attributes: IndexMap<String, RmAttributeInfo>,
}

impl RmTypeInfo {
    pub fn new(rm_name: impl Into<String>) -> Self {
        Self {
            rm_name: rm_name.into(),
            parent: None,
            is_abstract: false,
            primitive: None,
            value_kind: None,
            attributes: IndexMap::new(),
        }
    }

    pub fn primitive(primitive: PrimitiveType) -> Self {
        let mut info = Self::new(primitive.type_name());
        info.primitive = Some(primitive);
        info
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn with_value_kind(mut self, kind: ValueKind) -> Self {
        self.value_kind = Some(kind);
        self
    }

    pub fn with_attribute(mut self, attribute: RmAttributeInfo) -> Self {
        self.attributes.insert(attribute.name.clone(), attribute);
        self
    }
}

/// Read-only model metadata shared across evaluations.
pub trait ModelInfoLookup: Send + Sync {
    fn type_info(&self, type_name: &str) -> Option<Arc<RmTypeInfo>>;

    /// Attribute metadata, including attributes inherited from ancestors.
    fn attribute_info(&self, type_name: &str, attribute: &str) -> Option<RmAttributeInfo>;

    fn value_kind(&self, type_name: &str) -> ValueKind;

    fn is_descendant_of(&self, type_name: &str, ancestor: &str) -> bool;

    fn primitive_type(&self, type_name: &str) -> Option<PrimitiveType> {
        self.type_info(type_name).and_then(|info| info.primitive)
    }

    fn is_abstract(&self, type_name: &str) -> bool {
        self.type_info(type_name)
            .map(|info| info.is_abstract)
            .unwrap_or(false)
    }

    /// Runtime node to model type name.
    fn type_name_of(&self, tree: &RmTree, node: NodeId) -> Option<String> {
        let type_name = tree.type_name(node)?;
        self.type_info(type_name).map(|info| info.rm_name.clone())
    }
}

/// Drops generic parameters: `DV_INTERVAL<DV_QUANTITY>` becomes `DV_INTERVAL`.
pub fn strip_generics(type_name: &str) -> &str {
    match type_name.find('<') {
        Some(position) => type_name[..position].trim(),
        None => type_name.trim(),
    }
}
