use openehr_rules::aom::{
    Archetype, ArchetypeTerminology, CAttribute, CAttributeTuple, CComplexObject, CPrimitiveObject,
    Interval,
};
use openehr_rules::*;
use serde_json::{Value as JsonValue, json};

pub const ARCHETYPE_ID: &str = "openEHR-EHR-OBSERVATION.blood_pressure.v2";

/// Systolic, diastolic, position, severity, comment and pulse pressure.
#[allow(dead_code)]
pub fn blood_pressure_archetype() -> Archetype {
    let quantity = |node_id: &str| {
        CComplexObject::new("ELEMENT").with_node_id(node_id).with_attribute(
            CAttribute::new("value").with_complex(CComplexObject::new("DV_QUANTITY")),
        )
    };
    let position = CComplexObject::new("ELEMENT").with_node_id("id7").with_attribute(
        CAttribute::new("value").with_complex(
            CComplexObject::new("DV_CODED_TEXT").with_attribute(
                CAttribute::new("defining_code")
                    .with_primitive(CPrimitiveObject::TerminologyCode("ac3".into())),
            ),
        ),
    );
    let severity = CComplexObject::new("ELEMENT").with_node_id("id8").with_attribute(
        CAttribute::new("value").with_complex(
            CComplexObject::new("DV_ORDINAL").with_tuple(
                CAttributeTuple::new(&["value", "symbol"])
                    .with_tuple(vec![
                        CPrimitiveObject::Integer(vec![Interval::point(0)]),
                        CPrimitiveObject::TerminologyCode("at6".into()),
                    ])
                    .with_tuple(vec![
                        CPrimitiveObject::Integer(vec![Interval::point(1)]),
                        CPrimitiveObject::TerminologyCode("at7".into()),
                    ])
                    .with_tuple(vec![
                        CPrimitiveObject::Integer(vec![Interval::point(2)]),
                        CPrimitiveObject::TerminologyCode("at8".into()),
                    ]),
            ),
        ),
    );
    let comment = CComplexObject::new("ELEMENT").with_node_id("id9").with_attribute(
        CAttribute::new("value").with_complex(CComplexObject::new("DV_TEXT")),
    );

    let items = CAttribute::new("items")
        .with_complex(quantity("id5"))
        .with_complex(quantity("id6"))
        .with_complex(position)
        .with_complex(severity)
        .with_complex(comment)
        .with_complex(quantity("id10"));
    let event = CComplexObject::new("POINT_EVENT").with_node_id("id3").with_attribute(
        CAttribute::new("data")
            .with_complex(CComplexObject::new("ITEM_TREE").with_node_id("id4").with_attribute(items)),
    );
    let definition = CComplexObject::new("OBSERVATION")
        .with_node_id("id1")
        .with_attribute(
            CAttribute::new("data").with_complex(
                CComplexObject::new("HISTORY")
                    .with_node_id("id2")
                    .with_attribute(CAttribute::new("events").with_complex(event)),
            ),
        );

    Archetype::new(ARCHETYPE_ID, definition).with_terminology(
        ArchetypeTerminology::new()
            .with_term("en", "at1", "Option 1", "Standing")
            .with_term("en", "at2", "Option 2", "Sitting")
            .with_term("en", "at5", "Option 5", "Not in the value set")
            .with_term("en", "at6", "None", "")
            .with_term("en", "at7", "Mild", "")
            .with_term("en", "at8", "Severe", "")
            .with_value_set("ac3", &["at1", "at2"]),
    )
}

#[allow(dead_code)]
pub fn model() -> ModelRegistry {
    ModelRegistry::openehr()
}

/// Absolute path of an item inside the only event.
#[allow(dead_code)]
pub fn item_path(rest: &str) -> String {
    format!("/data[id2]/events[id3]/data[id4]/{rest}")
}

#[allow(dead_code)]
pub fn quantity(node_id: &str, magnitude: f64) -> JsonValue {
    json!({
        "_type": "ELEMENT",
        "archetype_node_id": node_id,
        "value": { "_type": "DV_QUANTITY", "magnitude": magnitude, "units": "mm[Hg]" }
    })
}

#[allow(dead_code)]
pub fn coded(node_id: &str, code: &str) -> JsonValue {
    json!({
        "_type": "ELEMENT",
        "archetype_node_id": node_id,
        "value": {
            "_type": "DV_CODED_TEXT",
            "value": "",
            "defining_code": {
                "terminology_id": { "value": "local" },
                "code_string": code
            }
        }
    })
}

#[allow(dead_code)]
pub fn event(items: Vec<JsonValue>) -> JsonValue {
    json!({
        "_type": "POINT_EVENT",
        "archetype_node_id": "id3",
        "data": { "_type": "ITEM_TREE", "archetype_node_id": "id4", "items": items }
    })
}

#[allow(dead_code)]
pub fn reading(systolic: f64, diastolic: f64) -> JsonValue {
    event(vec![quantity("id5", systolic), quantity("id6", diastolic)])
}

#[allow(dead_code)]
pub fn observation(events: Vec<JsonValue>) -> JsonValue {
    json!({
        "_type": "OBSERVATION",
        "archetype_node_id": "id1",
        "data": { "_type": "HISTORY", "archetype_node_id": "id2", "events": events }
    })
}

#[allow(dead_code)]
pub fn tree(json: JsonValue) -> RmTree {
    RmTree::from_json(&json, &model()).unwrap()
}

#[allow(dead_code)]
pub fn readings(values: &[(f64, f64)]) -> RmTree {
    tree(observation(
        values
            .iter()
            .map(|(systolic, diastolic)| reading(*systolic, *diastolic))
            .collect(),
    ))
}

#[allow(dead_code)]
pub fn primitive_at(tree: &RmTree, path: &str) -> Option<PrimitiveValue> {
    let found = tree.find_single(&path.parse().unwrap()).unwrap()?;
    tree.primitive(found.node).cloned()
}

#[allow(dead_code)]
pub fn string_at(tree: &RmTree, path: &str) -> Option<String> {
    match primitive_at(tree, path)? {
        PrimitiveValue::String(text) => Some(text),
        _ => None,
    }
}

#[allow(dead_code)]
pub fn evaluate(rules: Vec<RuleStatement>, tree: &mut RmTree) -> EvaluationResult {
    evaluate_with(rules, tree, EvaluationConfig::default())
}

#[allow(dead_code)]
pub fn evaluate_with(
    rules: Vec<RuleStatement>,
    tree: &mut RmTree,
    config: EvaluationConfig,
) -> EvaluationResult {
    let archetype = blood_pressure_archetype().with_rules(rules);
    let model = model();
    RuleEvaluation::new(&archetype, &model)
        .with_config(config)
        .evaluate(tree)
        .unwrap()
}

#[allow(dead_code)]
pub fn reference(path: &str) -> Expression {
    Expression::path(path).unwrap()
}

#[allow(dead_code)]
pub fn on_event(rest: &str) -> Expression {
    Expression::variable_path("event", rest).unwrap()
}

#[allow(dead_code)]
pub fn model_reference(path: &str) -> ModelReference {
    ModelReference::parse(path).unwrap()
}

#[allow(dead_code)]
pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::binary(operator, left, right)
}
