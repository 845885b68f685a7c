//! Canonical-JSON adapter: `_type` names the type, arrays are repeated
//! children, scalars are primitive attributes.

use serde_json::{Map, Value as JsonValue};

use super::{NodeId, PrimitiveValue, RmNode, RmObject, RmTree};
use crate::error::{Result, RulesError};
use crate::model::ModelInfoLookup;

const TYPE_KEY: &str = "_type";
const NODE_ID_KEY: &str = "archetype_node_id";

impl RmTree {
    /// Builds a tree from canonical JSON. Objects without `_type` take the
    /// declared type of the attribute that holds them.
    pub fn from_json(json: &JsonValue, model: &dyn ModelInfoLookup) -> Result<Self> {
        let map = json
            .as_object()
            .ok_or_else(|| RulesError::load("root of an object tree must be a JSON object"))?;
        let type_name = map
            .get(TYPE_KEY)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| RulesError::load("root object has no _type"))?;

        let mut tree = RmTree::with_root(object_header(type_name, map));
        let root = tree.root();
        tree.fill_attributes(root, type_name, map, model)?;
        Ok(tree)
    }

    pub fn from_json_str(json: &str, model: &dyn ModelInfoLookup) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::from_json(&value, model)
    }

    fn fill_attributes(
        &mut self,
        node: NodeId,
        type_name: &str,
        map: &Map<String, JsonValue>,
        model: &dyn ModelInfoLookup,
    ) -> Result<()> {
        for (attribute, value) in map {
            if attribute == TYPE_KEY || attribute == NODE_ID_KEY {
                continue;
            }
            match value {
                JsonValue::Array(items) => {
                    for item in items {
                        self.add_json_child(node, type_name, attribute, item, model)?;
                    }
                }
                other => self.add_json_child(node, type_name, attribute, other, model)?,
            }
        }
        Ok(())
    }

    fn add_json_child(
        &mut self,
        parent: NodeId,
        parent_type: &str,
        attribute: &str,
        value: &JsonValue,
        model: &dyn ModelInfoLookup,
    ) -> Result<()> {
        let primitive = match value {
            JsonValue::Null => return Ok(()),
            JsonValue::Bool(flag) => PrimitiveValue::Boolean(*flag),
            JsonValue::Number(number) => match number.as_i64() {
                Some(integer) => PrimitiveValue::Integer(integer),
                None => PrimitiveValue::Real(number.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(text) => PrimitiveValue::String(text.clone()),
            JsonValue::Array(_) => {
                return Err(RulesError::load(format!(
                    "nested arrays are not supported under '{attribute}'"
                )));
            }
            JsonValue::Object(map) => {
                let type_name = match map.get(TYPE_KEY).and_then(JsonValue::as_str) {
                    Some(explicit) => explicit.to_string(),
                    None => model
                        .attribute_info(parent_type, attribute)
                        .map(|info| info.type_name)
                        .ok_or_else(|| {
                            RulesError::load(format!(
                                "cannot infer the type of {parent_type}.{attribute}; add _type"
                            ))
                        })?,
                };
                let child = self.add_object(parent, attribute, object_header(&type_name, map))?;
                return self.fill_attributes(child, &type_name, map, model);
            }
        };
        self.push_primitive(parent, attribute, primitive)
    }

    fn push_primitive(
        &mut self,
        parent: NodeId,
        attribute: &str,
        value: PrimitiveValue,
    ) -> Result<()> {
        if self.children(parent, attribute).is_empty() {
            self.set_primitive(parent, attribute, value)?;
            Ok(())
        } else {
            Err(RulesError::load(format!(
                "repeated primitive attribute '{attribute}' is not supported"
            )))
        }
    }

    /// Serialises the reachable part of the tree.
    pub fn to_json(&self) -> JsonValue {
        self.node_to_json(self.root())
    }

    fn node_to_json(&self, id: NodeId) -> JsonValue {
        match self.node(id) {
            Some(RmNode::Primitive(value)) => match value {
                PrimitiveValue::Boolean(flag) => JsonValue::Bool(*flag),
                PrimitiveValue::Integer(integer) => JsonValue::from(*integer),
                PrimitiveValue::Real(real) => JsonValue::from(*real),
                PrimitiveValue::String(text) => JsonValue::String(text.clone()),
            },
            Some(RmNode::Object(object)) => {
                let mut map = Map::new();
                map.insert(TYPE_KEY.into(), JsonValue::String(object.type_name.clone()));
                if let Some(node_id) = &object.archetype_node_id {
                    map.insert(NODE_ID_KEY.into(), JsonValue::String(node_id.clone()));
                }
                for attribute in object.attribute_names() {
                    let children = object.children(attribute);
                    let value = match children {
                        [single] => self.node_to_json(*single),
                        many => JsonValue::Array(
                            many.iter().map(|child| self.node_to_json(*child)).collect(),
                        ),
                    };
                    map.insert(attribute.to_string(), value);
                }
                JsonValue::Object(map)
            }
            None => JsonValue::Null,
        }
    }
}

fn object_header(type_name: &str, map: &Map<String, JsonValue>) -> RmObject {
    let object = RmObject::new(type_name);
    match map.get(NODE_ID_KEY).and_then(JsonValue::as_str) {
        Some(node_id) => object.with_node_id(node_id),
        None => object,
    }
}
