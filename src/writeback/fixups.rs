//! Post-write fixups keyed on the [`ValueKind`] of the written value's parent.

use super::{WriteContext, WriteOutcome, write_primitive};
use crate::aom::{CPrimitiveObject, is_value_code};
use crate::evaluation::Value;
use crate::model::ValueKind;
use crate::path::ArchetypePath;
use crate::tree::{PrimitiveValue, RmTree};

/// Runs whatever fixups a write to `written` calls for.
pub(crate) fn after_write(
    tree: &mut RmTree,
    ctx: &WriteContext<'_>,
    written: &ArchetypePath,
    outcome: &mut WriteOutcome,
) {
    let (Some(parent_path), Some(attribute)) = (written.parent(), written.last_attribute()) else {
        return;
    };
    let Some(parent_kind) = kind_at(tree, ctx, &parent_path) else {
        return;
    };

    match (parent_kind, attribute) {
        (ValueKind::CodePhrase, "code_string") => {
            let Some(code) = string_at(tree, written) else {
                return;
            };
            if parent_path.last_attribute() != Some("defining_code") {
                return;
            }
            let Some(holder) = parent_path.parent() else {
                return;
            };
            if kind_at(tree, ctx, &holder) == Some(ValueKind::CodedText) {
                fix_coded_value(tree, ctx, &holder, &code, outcome);
            }
        }
        (ValueKind::Proportion, "numerator" | "denominator") => {
            fix_proportion(tree, ctx, &parent_path, outcome);
        }
        _ => {}
    }
}

/// A coded text that is an ordinal's `symbol` also fixes the ordinal rank.
fn fix_coded_value(
    tree: &mut RmTree,
    ctx: &WriteContext<'_>,
    coded_text: &ArchetypePath,
    code: &str,
    outcome: &mut WriteOutcome,
) {
    if coded_text.last_attribute() == Some("symbol") {
        if let Some(ordinal) = coded_text.parent() {
            if kind_at(tree, ctx, &ordinal) == Some(ValueKind::Ordinal) {
                fix_ordinal(tree, ctx, &ordinal, code, outcome);
            }
        }
    }
    fix_coded_text(tree, ctx, coded_text, code, outcome);
}

fn fix_ordinal(
    tree: &mut RmTree,
    ctx: &WriteContext<'_>,
    ordinal: &ArchetypePath,
    code: &str,
    outcome: &mut WriteOutcome,
) {
    let rank = ctx
        .archetype
        .definition
        .tuple_at(&ordinal.strip_indices(), &["symbol", "value"])
        .and_then(|tuple| tuple.paired_with_code("symbol", code, "value"))
        .and_then(CPrimitiveObject::single_integer);
    match rank {
        Some(rank) => derive(tree, ctx, ordinal.child_attribute("value"), Value::Integer(rank), outcome),
        None => warn(
            outcome,
            format!("no ordinal value is paired with symbol '{code}' at {ordinal}"),
        ),
    }
}

/// Writes the term text as the label and defaults the terminology of local codes.
fn fix_coded_text(
    tree: &mut RmTree,
    ctx: &WriteContext<'_>,
    coded_text: &ArchetypePath,
    code: &str,
    outcome: &mut WriteOutcome,
) {
    let language = ctx.config.language.as_str();
    let archetype_id = nearest_archetype_id(tree, coded_text);
    let term = ctx
        .archetype
        .terminology_for(archetype_id.as_deref())
        .term_for(language, code)
        .or_else(|| ctx.archetype.terminology.term_for(language, code));
    match term {
        Some(term) => derive(
            tree,
            ctx,
            coded_text.child_attribute("value"),
            Value::String(term.text.clone()),
            outcome,
        ),
        None => warn(
            outcome,
            format!("no term definition for '{code}' in language '{language}'"),
        ),
    }

    let terminology_path = coded_text
        .child_attribute("defining_code")
        .child_attribute("terminology_id")
        .child_attribute("value");
    let missing = string_at(tree, &terminology_path).is_none_or(|current| current.is_empty());
    if missing && is_value_code(code) {
        derive(
            tree,
            ctx,
            terminology_path,
            Value::String(ctx.config.local_terminology_id.clone()),
            outcome,
        );
    }
}

fn fix_proportion(
    tree: &mut RmTree,
    ctx: &WriteContext<'_>,
    proportion: &ArchetypePath,
    outcome: &mut WriteOutcome,
) {
    let number = |attribute: &str| match tree
        .find_single(&proportion.child_attribute(attribute))
        .ok()
        .flatten()
        .and_then(|found| tree.primitive(found.node))
    {
        Some(PrimitiveValue::Real(real)) => Some(*real),
        Some(PrimitiveValue::Integer(integer)) => Some(*integer as f64),
        _ => None,
    };
    let (Some(numerator), Some(denominator)) = (number("numerator"), number("denominator")) else {
        return;
    };
    let magnitude = if denominator == 0.0 {
        f64::MAX
    } else {
        numerator / denominator
    };
    derive(tree, ctx, proportion.child_attribute("magnitude"), Value::Real(magnitude), outcome);
}

/// Archetype id from the `archetype_details` of the closest node on `path`.
fn nearest_archetype_id(tree: &RmTree, path: &ArchetypePath) -> Option<String> {
    (0..=path.len()).rev().find_map(|len| {
        let found = tree.find_single(&path.prefix(len)).ok().flatten()?;
        tree.archetype_details_id(found.node).map(str::to_string)
    })
}

fn kind_at(tree: &RmTree, ctx: &WriteContext<'_>, path: &ArchetypePath) -> Option<ValueKind> {
    let found = tree.find_single(path).ok().flatten()?;
    let type_name = ctx.model.type_name_of(tree, found.node)?;
    Some(ctx.model.value_kind(&type_name))
}

fn string_at(tree: &RmTree, path: &ArchetypePath) -> Option<String> {
    let found = tree.find_single(path).ok().flatten()?;
    tree.primitive(found.node)?.as_str().map(str::to_string)
}

fn derive(
    tree: &mut RmTree,
    ctx: &WriteContext<'_>,
    path: ArchetypePath,
    value: Value,
    outcome: &mut WriteOutcome,
) {
    match write_primitive(tree, ctx, &path, &value) {
        Ok((resolved, changed)) => {
            if changed {
                outcome.mark_changed(resolved.to_string());
            }
            outcome.derived.push((resolved.to_string(), value));
        }
        Err(error) => warn(outcome, format!("could not write {path}: {error}")),
    }
}

fn warn(outcome: &mut WriteOutcome, message: String) {
    tracing::warn!("{message}");
    outcome.warnings.push(message);
}
