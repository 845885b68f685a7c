//! Arena-backed reference model object tree.
//!
//! Nodes are addressed by [`NodeId`] handles. Handles stay valid for the
//! lifetime of the tree, but replaced or cleared nodes become unreachable,
//! so callers re-resolve by path after a mutation instead of keeping handles.

pub mod constructor;
pub mod json;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PathError;

pub use constructor::{ConstructionRequest, DefaultObjectConstructor, ObjectConstructor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimitiveValue {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
}

impl PrimitiveValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveValue::Boolean(_) => "Boolean",
            PrimitiveValue::Integer(_) => "Integer",
            PrimitiveValue::Real(_) => "Real",
            PrimitiveValue::String(_) => "String",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrimitiveValue::String(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveValue::Boolean(value) => write!(f, "{value}"),
            PrimitiveValue::Integer(value) => write!(f, "{value}"),
            PrimitiveValue::Real(value) => write!(f, "{value}"),
            PrimitiveValue::String(value) => write!(f, "\"{value}\""),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RmObject {
    pub type_name: String,
    pub archetype_node_id: Option<String>,
    attributes: IndexMap<String, Vec<NodeId>>,
}

impl RmObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            archetype_node_id: None,
            attributes: IndexMap::new(),
        }
    }

    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.archetype_node_id = Some(node_id.into());
        self
    }

    pub fn children(&self, attribute: &str) -> &[NodeId] {
        self.attributes
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RmNode {
    Object(RmObject),
    Primitive(PrimitiveValue),
}

#[derive(Debug, Clone)]
pub struct RmTree {
    nodes: Vec<RmNode>,
    root: NodeId,
}

impl RmTree {
    pub fn new(root_type: impl Into<String>) -> Self {
        Self::with_root(RmObject::new(root_type))
    }

    pub fn with_root(root: RmObject) -> Self {
        Self {
            nodes: vec![RmNode::Object(root)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of arena slots, including unreachable ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&RmNode> {
        self.nodes.get(id.0)
    }

    pub fn object(&self, id: NodeId) -> Option<&RmObject> {
        match self.nodes.get(id.0)? {
            RmNode::Object(object) => Some(object),
            RmNode::Primitive(_) => None,
        }
    }

    fn object_mut(&mut self, id: NodeId) -> Option<&mut RmObject> {
        match self.nodes.get_mut(id.0)? {
            RmNode::Object(object) => Some(object),
            RmNode::Primitive(_) => None,
        }
    }

    pub fn primitive(&self, id: NodeId) -> Option<&PrimitiveValue> {
        match self.nodes.get(id.0)? {
            RmNode::Primitive(value) => Some(value),
            RmNode::Object(_) => None,
        }
    }

    pub fn type_name(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(id.0)? {
            RmNode::Object(object) => Some(&object.type_name),
            RmNode::Primitive(value) => Some(value.type_name()),
        }
    }

    pub fn archetype_node_id(&self, id: NodeId) -> Option<&str> {
        self.object(id)?.archetype_node_id.as_deref()
    }

    pub fn children(&self, id: NodeId, attribute: &str) -> &[NodeId] {
        self.object(id)
            .map(|object| object.children(attribute))
            .unwrap_or(&[])
    }

    /// Appends an object under `attribute` and returns its handle.
    pub fn add_object(
        &mut self,
        parent: NodeId,
        attribute: &str,
        object: RmObject,
    ) -> Result<NodeId, PathError> {
        let id = NodeId(self.nodes.len());
        let parent_object = self.object_mut(parent).ok_or_else(|| {
            PathError::construct(format!("{parent}/{attribute}"), "parent is not an object")
        })?;
        parent_object
            .attributes
            .entry(attribute.to_string())
            .or_default()
            .push(id);
        self.nodes.push(RmNode::Object(object));
        Ok(id)
    }

    /// Value of a single-valued primitive attribute.
    pub fn primitive_attribute(&self, parent: NodeId, attribute: &str) -> Option<&PrimitiveValue> {
        self.children(parent, attribute)
            .first()
            .and_then(|child| self.primitive(*child))
    }

    /// Sets a single-valued primitive attribute, returning the previous value.
    pub fn set_primitive(
        &mut self,
        parent: NodeId,
        attribute: &str,
        value: PrimitiveValue,
    ) -> Result<Option<PrimitiveValue>, PathError> {
        let location = format!("{parent}/{attribute}");
        let existing = self.children(parent, attribute).to_vec();
        match existing.as_slice() {
            [] => {
                let id = NodeId(self.nodes.len());
                let parent_object = self
                    .object_mut(parent)
                    .ok_or_else(|| PathError::construct(&location, "parent is not an object"))?;
                parent_object
                    .attributes
                    .insert(attribute.to_string(), vec![id]);
                self.nodes.push(RmNode::Primitive(value));
                Ok(None)
            }
            [child] => match self.nodes.get_mut(child.0) {
                Some(RmNode::Primitive(current)) => Ok(Some(std::mem::replace(current, value))),
                _ => Err(PathError::construct(
                    location,
                    "attribute holds an object, not a primitive",
                )),
            },
            _ => Err(PathError::Multiplicity {
                path: location,
                matches: existing.iter().map(ToString::to_string).collect(),
            }),
        }
    }

    /// Removes every child of `attribute`. Returns whether anything was removed.
    pub fn clear_attribute(&mut self, parent: NodeId, attribute: &str) -> bool {
        self.object_mut(parent)
            .and_then(|object| object.attributes.shift_remove(attribute))
            .is_some_and(|children| !children.is_empty())
    }

    /// Archetype id recorded at `archetype_details/archetype_id/value`.
    pub fn archetype_details_id(&self, id: NodeId) -> Option<&str> {
        let details = *self.children(id, "archetype_details").first()?;
        let archetype_id = *self.children(details, "archetype_id").first()?;
        self.primitive_attribute(archetype_id, "value")?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_primitive_replaces_in_place() {
        let mut tree = RmTree::new("DV_QUANTITY");
        let root = tree.root();
        assert_eq!(
            tree.set_primitive(root, "magnitude", PrimitiveValue::Real(1.0))
                .unwrap(),
            None
        );
        let previous = tree
            .set_primitive(root, "magnitude", PrimitiveValue::Real(2.0))
            .unwrap();
        assert_eq!(previous, Some(PrimitiveValue::Real(1.0)));
        assert_eq!(
            tree.primitive_attribute(root, "magnitude"),
            Some(&PrimitiveValue::Real(2.0))
        );
        assert_eq!(tree.children(root, "magnitude").len(), 1);
    }

    #[test]
    fn set_primitive_refuses_object_attributes() {
        let mut tree = RmTree::new("ELEMENT");
        let root = tree.root();
        tree.add_object(root, "value", RmObject::new("DV_TEXT")).unwrap();
        let result = tree.set_primitive(root, "value", PrimitiveValue::Integer(3));
        assert!(matches!(result, Err(PathError::Construct { .. })));
    }

    #[test]
    fn clear_attribute_reports_removal() {
        let mut tree = RmTree::new("DV_TEXT");
        let root = tree.root();
        tree.set_primitive(root, "value", PrimitiveValue::String("x".into()))
            .unwrap();
        assert!(tree.clear_attribute(root, "value"));
        assert!(!tree.clear_attribute(root, "value"));
        assert!(tree.primitive_attribute(root, "value").is_none());
    }

    #[test]
    fn reads_archetype_details() {
        let mut tree = RmTree::new("CLUSTER");
        let root = tree.root();
        let details = tree
            .add_object(root, "archetype_details", RmObject::new("ARCHETYPED"))
            .unwrap();
        let id = tree
            .add_object(details, "archetype_id", RmObject::new("ARCHETYPE_ID"))
            .unwrap();
        tree.set_primitive(
            id,
            "value",
            PrimitiveValue::String("openEHR-EHR-CLUSTER.device.v1".into()),
        )
        .unwrap();
        assert_eq!(
            tree.archetype_details_id(root),
            Some("openEHR-EHR-CLUSTER.device.v1")
        );
    }
}
