//! Writing values into the tree at archetype paths.
//!
//! A write resolves its target with [`RmTree::find_or_construct`], coerces
//! the value to the declared attribute type and then runs the fixups that
//! keep dependent attributes (labels, ordinal ranks, proportion magnitudes)
//! consistent with what was written.

pub mod fixups;

use crate::aom::Archetype;
use crate::core::EvaluationConfig;
use crate::error::{PathError, Result, WriteError};
use crate::evaluation::{EvaluationResult, Value};
use crate::model::{ModelInfoLookup, PrimitiveType, ValueKind};
use crate::path::ArchetypePath;
use crate::tree::{DefaultObjectConstructor, ObjectConstructor, PrimitiveValue, RmTree};

/// Collaborators a write needs besides the tree itself.
#[derive(Clone, Copy)]
pub struct WriteContext<'a> {
    pub archetype: &'a Archetype,
    pub model: &'a dyn ModelInfoLookup,
    pub constructor: &'a dyn ObjectConstructor,
    pub config: &'a EvaluationConfig,
}

impl<'a> WriteContext<'a> {
    pub fn new(
        archetype: &'a Archetype,
        model: &'a dyn ModelInfoLookup,
        config: &'a EvaluationConfig,
    ) -> Self {
        Self {
            archetype,
            model,
            constructor: &DefaultObjectConstructor,
            config,
        }
    }

    pub fn with_constructor(mut self, constructor: &'a dyn ObjectConstructor) -> Self {
        self.constructor = constructor;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOutcome {
    /// Resolved path of the primary write.
    pub path: Option<String>,
    /// Paths whose stored value actually changed, primary first.
    pub changed_paths: Vec<String>,
    /// Values written by fixups, in write order.
    pub derived: Vec<(String, Value)>,
    pub warnings: Vec<String>,
}

impl WriteOutcome {
    pub fn changed(&self) -> bool {
        !self.changed_paths.is_empty()
    }

    fn mark_changed(&mut self, path: String) {
        if !self.changed_paths.contains(&path) {
            self.changed_paths.push(path);
        }
    }

    fn absorb(&mut self, other: WriteOutcome) {
        for path in other.changed_paths {
            self.mark_changed(path);
        }
        self.derived.extend(other.derived);
        self.warnings.extend(other.warnings);
    }
}

/// Writes `value` at `path`, constructing missing structure, then runs fixups.
///
/// A null value clears the target attribute when its parent exists and
/// never constructs anything.
pub fn write_value(
    tree: &mut RmTree,
    ctx: &WriteContext<'_>,
    path: &ArchetypePath,
    value: &Value,
) -> std::result::Result<WriteOutcome, WriteError> {
    let mut outcome = WriteOutcome::default();
    let (parent_path, attribute) = split_target(path)?;

    if value.is_null() {
        if let Some(parent) = tree.find_single(&parent_path)? {
            let resolved = parent.path.child_attribute(attribute);
            if tree.clear_attribute(parent.node, attribute) {
                tracing::debug!(path = %resolved, "cleared attribute");
                outcome.mark_changed(resolved.to_string());
            }
            outcome.path = Some(resolved.to_string());
        }
        return Ok(outcome);
    }

    let parent = tree.find_or_construct(&parent_path, ctx.archetype, ctx.model, ctx.constructor)?;
    let parent_type = tree
        .type_name(parent.node)
        .ok_or_else(|| PathError::NotFound {
            path: parent_path.to_string(),
        })?
        .to_string();
    let info = ctx
        .model
        .attribute_info(&parent_type, attribute)
        .ok_or_else(|| {
            PathError::construct(
                path.to_string(),
                format!("{parent_type} has no attribute '{attribute}'"),
            )
        })?;

    if ctx.model.primitive_type(&info.type_name).is_some() {
        let (resolved, changed) = write_primitive(tree, ctx, path, value)?;
        outcome.path = Some(resolved.to_string());
        if changed {
            outcome.mark_changed(resolved.to_string());
        }
        if ctx.config.run_fixups {
            fixups::after_write(tree, ctx, &resolved, &mut outcome);
        }
        return Ok(outcome);
    }

    // a code written to a coded value lands in its CODE_PHRASE
    let Value::TerminologyCode {
        terminology_id,
        code_string,
    } = value
    else {
        return Err(WriteError::NotPrimitive {
            path: path.to_string(),
        });
    };
    let target = tree.find_or_construct(path, ctx.archetype, ctx.model, ctx.constructor)?;
    let target_path = target.path.to_string();
    let target_type = ctx
        .model
        .type_name_of(tree, target.node)
        .unwrap_or_else(|| info.type_name.clone());
    let code_phrase = match ctx.model.value_kind(&target_type) {
        ValueKind::CodePhrase => target.path,
        ValueKind::CodedText => target.path.child_attribute("defining_code"),
        _ => {
            return Err(WriteError::TypeMismatch {
                path: path.to_string(),
                expected: target_type,
                value: value.to_string(),
            });
        }
    };
    if let Some(terminology_id) = terminology_id {
        let terminology_path = code_phrase
            .child_attribute("terminology_id")
            .child_attribute("value");
        outcome.absorb(write_value(
            tree,
            ctx,
            &terminology_path,
            &Value::String(terminology_id.clone()),
        )?);
    }
    let code = write_value(
        tree,
        ctx,
        &code_phrase.child_attribute("code_string"),
        &Value::String(code_string.clone()),
    )?;
    outcome.absorb(code);
    outcome.path = Some(target_path);
    Ok(outcome)
}

/// Sets one primitive attribute without running fixups. Returns the resolved
/// path of the attribute and whether the stored value changed.
pub(crate) fn write_primitive(
    tree: &mut RmTree,
    ctx: &WriteContext<'_>,
    path: &ArchetypePath,
    value: &Value,
) -> std::result::Result<(ArchetypePath, bool), WriteError> {
    let (parent_path, attribute) = split_target(path)?;
    let parent = tree.find_or_construct(&parent_path, ctx.archetype, ctx.model, ctx.constructor)?;
    let parent_type = tree.type_name(parent.node).unwrap_or_default().to_string();
    let primitive_type = ctx
        .model
        .attribute_info(&parent_type, attribute)
        .and_then(|info| ctx.model.primitive_type(&info.type_name))
        .ok_or_else(|| WriteError::NotPrimitive {
            path: path.to_string(),
        })?;

    let primitive = coerce(primitive_type, value).ok_or_else(|| WriteError::TypeMismatch {
        path: path.to_string(),
        expected: primitive_type.type_name().to_string(),
        value: value.to_string(),
    })?;
    let resolved = parent.path.child_attribute(attribute);
    let previous = tree.set_primitive(parent.node, attribute, primitive.clone())?;
    let changed = previous.as_ref() != Some(&primitive);
    if changed {
        tracing::debug!(path = %resolved, value = %primitive, "wrote value");
    }
    Ok((resolved, changed))
}

fn split_target(path: &ArchetypePath) -> std::result::Result<(ArchetypePath, &str), WriteError> {
    match (path.parent(), path.last_attribute()) {
        (Some(parent), Some(attribute)) => Ok((parent, attribute)),
        _ => Err(WriteError::NotPrimitive {
            path: path.to_string(),
        }),
    }
}

/// Converts a value to the declared primitive type. Integers and reals
/// interconvert only when no precision is lost.
fn coerce(target: PrimitiveType, value: &Value) -> Option<PrimitiveValue> {
    match (target, value) {
        (PrimitiveType::Boolean, Value::Boolean(flag)) => Some(PrimitiveValue::Boolean(*flag)),
        (PrimitiveType::Integer, Value::Integer(integer)) => Some(PrimitiveValue::Integer(*integer)),
        (PrimitiveType::Integer, Value::Real(real))
            if real.fract() == 0.0 && real.abs() < i64::MAX as f64 =>
        {
            Some(PrimitiveValue::Integer(*real as i64))
        }
        (PrimitiveType::Real, Value::Real(real)) => Some(PrimitiveValue::Real(*real)),
        (PrimitiveType::Real, Value::Integer(integer)) => Some(PrimitiveValue::Real(*integer as f64)),
        (PrimitiveType::String, Value::String(text)) => Some(PrimitiveValue::String(text.clone())),
        (PrimitiveType::String, Value::TerminologyCode { code_string, .. }) => {
            Some(PrimitiveValue::String(code_string.clone()))
        }
        _ => None,
    }
}

/// Re-applies every recorded value of `result` to `tree` and runs fixups.
///
/// Returns the paths whose stored value changed. Applying the same result
/// twice returns an empty list the second time.
pub fn apply_set_path_values(
    result: &EvaluationResult,
    tree: &mut RmTree,
    archetype: &Archetype,
    model: &dyn ModelInfoLookup,
    config: &EvaluationConfig,
) -> Result<Vec<String>> {
    apply_recorded_values(result, tree, &WriteContext::new(archetype, model, config))
}

/// [`apply_set_path_values`] with an explicit write context.
pub fn apply_recorded_values(
    result: &EvaluationResult,
    tree: &mut RmTree,
    ctx: &WriteContext<'_>,
) -> Result<Vec<String>> {
    let mut changed: Vec<String> = Vec::new();
    for (path, value) in &result.set_path_values {
        let target: ArchetypePath = path.parse()?;
        let outcome = write_value(tree, ctx, &target, value)?;
        for warning in &outcome.warnings {
            tracing::warn!(path = %path, "{warning}");
        }
        for path in outcome.changed_paths {
            if !changed.contains(&path) {
                changed.push(path);
            }
        }
    }
    tracing::info!(
        recorded = result.set_path_values.len(),
        changed = changed.len(),
        "applied recorded values"
    );
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aom::{CAttribute, CComplexObject};
    use crate::model::ModelRegistry;
    use crate::tree::RmObject;

    fn element_archetype() -> Archetype {
        Archetype::new(
            "openEHR-EHR-CLUSTER.test.v1",
            CComplexObject::new("CLUSTER").with_node_id("id1").with_attribute(
                CAttribute::new("items").with_complex(
                    CComplexObject::new("ELEMENT")
                        .with_node_id("id2")
                        .with_attribute(
                            CAttribute::new("value")
                                .with_complex(CComplexObject::new("DV_COUNT")),
                        ),
                ),
            ),
        )
    }

    fn cluster() -> RmTree {
        RmTree::with_root(RmObject::new("CLUSTER").with_node_id("id1"))
    }

    #[test]
    fn coerces_exact_reals_to_integers() {
        let model = ModelRegistry::openehr();
        let config = EvaluationConfig::default();
        let archetype = element_archetype();
        let ctx = WriteContext::new(&archetype, &model, &config);
        let mut tree = cluster();
        let path: ArchetypePath = "/items[id2]/value/magnitude".parse().unwrap();

        let outcome = write_value(&mut tree, &ctx, &path, &Value::Real(4.0)).unwrap();
        assert_eq!(outcome.changed_paths, vec!["/items[id2]/value/magnitude"]);
        let found = tree.find_single(&path).unwrap().unwrap();
        assert_eq!(tree.primitive(found.node), Some(&PrimitiveValue::Integer(4)));

        let error = write_value(&mut tree, &ctx, &path, &Value::Real(4.5)).unwrap_err();
        assert!(matches!(error, WriteError::TypeMismatch { .. }));
    }

    #[test]
    fn rewriting_the_same_value_changes_nothing() {
        let model = ModelRegistry::openehr();
        let config = EvaluationConfig::default();
        let archetype = element_archetype();
        let ctx = WriteContext::new(&archetype, &model, &config);
        let mut tree = cluster();
        let path: ArchetypePath = "/items[id2]/value/magnitude".parse().unwrap();

        assert!(write_value(&mut tree, &ctx, &path, &Value::Integer(3)).unwrap().changed());
        assert!(!write_value(&mut tree, &ctx, &path, &Value::Integer(3)).unwrap().changed());
    }

    #[test]
    fn null_clears_without_constructing() {
        let model = ModelRegistry::openehr();
        let config = EvaluationConfig::default();
        let archetype = element_archetype();
        let ctx = WriteContext::new(&archetype, &model, &config);
        let mut tree = cluster();
        let path: ArchetypePath = "/items[id2]/value/magnitude".parse().unwrap();

        let outcome = write_value(&mut tree, &ctx, &path, &Value::Null).unwrap();
        assert!(!outcome.changed());
        assert_eq!(tree.len(), 1);

        write_value(&mut tree, &ctx, &path, &Value::Integer(3)).unwrap();
        let outcome = write_value(&mut tree, &ctx, &path, &Value::Null).unwrap();
        assert!(outcome.changed());
        assert!(tree.find_single(&path).unwrap().is_none());
    }

    #[test]
    fn objects_cannot_take_scalars() {
        let model = ModelRegistry::openehr();
        let config = EvaluationConfig::default();
        let archetype = element_archetype();
        let ctx = WriteContext::new(&archetype, &model, &config);
        let mut tree = cluster();
        let path: ArchetypePath = "/items[id2]/value".parse().unwrap();

        let error = write_value(&mut tree, &ctx, &path, &Value::Integer(3)).unwrap_err();
        assert!(matches!(error, WriteError::NotPrimitive { .. }));
    }
}
