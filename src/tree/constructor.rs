//! Creation of missing structure when a write targets an absent path.

use super::{RmObject, RmTree};
use crate::aom::Archetype;
use crate::error::PathError;
use crate::model::ModelInfoLookup;
use crate::path::{ArchetypePath, ResolvedMatch};

/// What the constructor knows about the object it is asked to create.
#[derive(Debug, Clone, Copy)]
pub struct ConstructionRequest<'a> {
    /// Resolved path of the object to create.
    pub path: &'a ArchetypePath,
    pub parent_type: &'a str,
    pub attribute: &'a str,
    pub node_id: Option<&'a str>,
    /// Type demanded by the archetype constraint at this path, if any.
    pub constraint_type: Option<&'a str>,
}

pub trait ObjectConstructor: Send + Sync {
    fn construct(
        &self,
        request: &ConstructionRequest<'_>,
        model: &dyn ModelInfoLookup,
    ) -> Result<RmObject, PathError>;
}

/// Builds empty objects: the constrained type when it is concrete and
/// compatible, otherwise the declared attribute type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultObjectConstructor;

impl ObjectConstructor for DefaultObjectConstructor {
    fn construct(
        &self,
        request: &ConstructionRequest<'_>,
        model: &dyn ModelInfoLookup,
    ) -> Result<RmObject, PathError> {
        let fail = |message: String| PathError::construct(request.path.to_string(), message);
        let info = model
            .attribute_info(request.parent_type, request.attribute)
            .ok_or_else(|| {
                fail(format!(
                    "{} has no attribute '{}'",
                    request.parent_type, request.attribute
                ))
            })?;
        if model.primitive_type(&info.type_name).is_some() {
            return Err(fail(format!(
                "{}.{} is a primitive attribute",
                request.parent_type, request.attribute
            )));
        }

        let type_name = match request.constraint_type {
            Some(constrained)
                if model.type_info(constrained).is_some()
                    && !model.is_abstract(constrained)
                    && model.is_descendant_of(constrained, &info.type_name) =>
            {
                constrained.to_string()
            }
            _ if !model.is_abstract(&info.type_name) => info.type_name.clone(),
            _ => {
                return Err(fail(format!(
                    "{} is abstract and no constraint names a concrete type",
                    info.type_name
                )));
            }
        };

        let object = RmObject::new(type_name.as_str());
        let archetyped = model
            .attribute_info(&type_name, "archetype_node_id")
            .is_some();
        Ok(match request.node_id {
            Some(node_id) if archetyped => object.with_node_id(node_id),
            _ => object,
        })
    }
}

impl RmTree {
    /// Resolves `path` to exactly one node, creating every missing segment.
    pub fn find_or_construct(
        &mut self,
        path: &ArchetypePath,
        archetype: &Archetype,
        model: &dyn ModelInfoLookup,
        constructor: &dyn ObjectConstructor,
    ) -> Result<ResolvedMatch, PathError> {
        let mut current = ResolvedMatch::new(self.root(), ArchetypePath::root());
        for segment in path.segments() {
            let step = ArchetypePath::relative(vec![segment.clone()]);
            let mut found = self.find_all_from(current.node, &current.path, &step);
            current = match found.len() {
                1 => found.remove(0),
                0 => {
                    let parent_type = self
                        .type_name(current.node)
                        .ok_or_else(|| PathError::construct(path.to_string(), "dangling node"))?
                        .to_string();
                    let target = current.path.child(segment.without_index());
                    let constraint = archetype.definition.object_at(&target.strip_indices());
                    let node_id = segment
                        .node_id
                        .as_deref()
                        .or_else(|| constraint.and_then(|found| found.node_id()));

                    let existing = self.children(current.node, &segment.attribute);
                    if let Some(info) = model.attribute_info(&parent_type, &segment.attribute) {
                        if !info.is_multiple && !existing.is_empty() {
                            return Err(PathError::construct(
                                target.to_string(),
                                "single-valued attribute is already occupied",
                            ));
                        }
                    }
                    if let Some(index) = segment.index {
                        let same_id = existing
                            .iter()
                            .filter(|child| self.archetype_node_id(**child) == node_id)
                            .count();
                        if index != same_id + 1 {
                            return Err(PathError::construct(
                                target.to_string(),
                                format!("cannot create occurrence {index} next to {same_id} existing"),
                            ));
                        }
                    }

                    let request = ConstructionRequest {
                        path: &target,
                        parent_type: &parent_type,
                        attribute: &segment.attribute,
                        node_id,
                        constraint_type: constraint.map(|found| found.rm_type_name()),
                    };
                    let object = constructor.construct(&request, model)?;
                    let child = self.add_object(current.node, &segment.attribute, object)?;
                    let resolved = self.child_segment(current.node, &segment.attribute, child);
                    tracing::debug!(path = %current.path.child(resolved.clone()), "constructed missing node");
                    ResolvedMatch::new(child, current.path.child(resolved))
                }
                _ => {
                    return Err(PathError::Multiplicity {
                        path: path.to_string(),
                        matches: found.iter().map(ResolvedMatch::path_string).collect(),
                    });
                }
            };
        }
        Ok(current)
    }
}
