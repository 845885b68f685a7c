//! The subset of the openEHR reference model used by observation archetypes.

use super::{
    ModelRegistry, ModelRegistryBuilder, PrimitiveType, RmAttributeInfo, RmTypeInfo, ValueKind,
};

fn attr(name: &str, type_name: &str) -> RmAttributeInfo {
    RmAttributeInfo::new(name, type_name)
}

pub fn openehr_builder() -> ModelRegistryBuilder {
    ModelRegistry::builder()
        .add_type(RmTypeInfo::primitive(PrimitiveType::String))
        .add_type(RmTypeInfo::primitive(PrimitiveType::Integer))
        .add_type(RmTypeInfo::primitive(PrimitiveType::Real))
        .add_type(RmTypeInfo::primitive(PrimitiveType::Boolean))
        .alias("Double", "Real")
        .alias("Integer64", "Integer")
        // identification
        .add_type(RmTypeInfo::new("OBJECT_ID").abstract_type().with_attribute(attr("value", "String")))
        .add_type(RmTypeInfo::new("ARCHETYPE_ID").with_parent("OBJECT_ID"))
        .add_type(RmTypeInfo::new("TERMINOLOGY_ID").with_parent("OBJECT_ID"))
        .add_type(
            RmTypeInfo::new("ARCHETYPED")
                .with_attribute(attr("archetype_id", "ARCHETYPE_ID"))
                .with_attribute(attr("rm_version", "String").nullable()),
        )
        .add_type(
            RmTypeInfo::new("CODE_PHRASE")
                .with_value_kind(ValueKind::CodePhrase)
                .with_attribute(attr("terminology_id", "TERMINOLOGY_ID"))
                .with_attribute(attr("code_string", "String")),
        )
        // data values
        .add_type(RmTypeInfo::new("DATA_VALUE").abstract_type())
        .add_type(
            RmTypeInfo::new("DV_BOOLEAN")
                .with_parent("DATA_VALUE")
                .with_attribute(attr("value", "Boolean")),
        )
        .add_type(
            RmTypeInfo::new("DV_TEXT")
                .with_parent("DATA_VALUE")
                .with_attribute(attr("value", "String")),
        )
        .add_type(
            RmTypeInfo::new("DV_CODED_TEXT")
                .with_parent("DV_TEXT")
                .with_value_kind(ValueKind::CodedText)
                .with_attribute(attr("defining_code", "CODE_PHRASE")),
        )
        .add_type(RmTypeInfo::new("DV_ORDERED").abstract_type().with_parent("DATA_VALUE"))
        .add_type(RmTypeInfo::new("DV_QUANTIFIED").abstract_type().with_parent("DV_ORDERED"))
        .add_type(
            RmTypeInfo::new("DV_AMOUNT")
                .abstract_type()
                .with_parent("DV_QUANTIFIED"),
        )
        .add_type(
            RmTypeInfo::new("DV_QUANTITY")
                .with_parent("DV_AMOUNT")
                .with_attribute(attr("magnitude", "Real"))
                .with_attribute(attr("units", "String"))
                .with_attribute(attr("precision", "Integer").nullable()),
        )
        .add_type(
            RmTypeInfo::new("DV_COUNT")
                .with_parent("DV_AMOUNT")
                .with_attribute(attr("magnitude", "Integer")),
        )
        .add_type(
            RmTypeInfo::new("DV_PROPORTION")
                .with_parent("DV_AMOUNT")
                .with_value_kind(ValueKind::Proportion)
                .with_attribute(attr("numerator", "Real"))
                .with_attribute(attr("denominator", "Real"))
                .with_attribute(attr("type", "Integer"))
                .with_attribute(attr("precision", "Integer").nullable())
                .with_attribute(attr("magnitude", "Real").computed()),
        )
        .add_type(
            RmTypeInfo::new("DV_ORDINAL")
                .with_parent("DV_ORDERED")
                .with_value_kind(ValueKind::Ordinal)
                .with_attribute(attr("value", "Integer"))
                .with_attribute(attr("symbol", "DV_CODED_TEXT")),
        )
        // structure
        .add_type(
            RmTypeInfo::new("LOCATABLE")
                .abstract_type()
                .with_attribute(attr("archetype_node_id", "String"))
                .with_attribute(attr("name", "DV_TEXT").nullable())
                .with_attribute(attr("archetype_details", "ARCHETYPED").nullable()),
        )
        .add_type(RmTypeInfo::new("CONTENT_ITEM").abstract_type().with_parent("LOCATABLE"))
        .add_type(
            RmTypeInfo::new("ENTRY")
                .abstract_type()
                .with_parent("CONTENT_ITEM")
                .with_attribute(attr("language", "CODE_PHRASE").nullable()),
        )
        .add_type(RmTypeInfo::new("CARE_ENTRY").abstract_type().with_parent("ENTRY"))
        .add_type(
            RmTypeInfo::new("OBSERVATION")
                .with_parent("CARE_ENTRY")
                .with_attribute(attr("data", "HISTORY")),
        )
        .add_type(RmTypeInfo::new("DATA_STRUCTURE").abstract_type().with_parent("LOCATABLE"))
        .add_type(
            RmTypeInfo::new("HISTORY")
                .with_parent("DATA_STRUCTURE")
                .with_attribute(attr("events", "EVENT").multiple()),
        )
        .add_type(
            RmTypeInfo::new("EVENT")
                .abstract_type()
                .with_parent("LOCATABLE")
                .with_attribute(attr("data", "ITEM_STRUCTURE"))
                .with_attribute(attr("state", "ITEM_STRUCTURE").nullable()),
        )
        .add_type(RmTypeInfo::new("POINT_EVENT").with_parent("EVENT"))
        .add_type(
            RmTypeInfo::new("INTERVAL_EVENT")
                .with_parent("EVENT")
                .with_attribute(attr("width", "String").nullable()),
        )
        .add_type(
            RmTypeInfo::new("ITEM_STRUCTURE")
                .abstract_type()
                .with_parent("DATA_STRUCTURE"),
        )
        .add_type(
            RmTypeInfo::new("ITEM_TREE")
                .with_parent("ITEM_STRUCTURE")
                .with_attribute(attr("items", "ITEM").multiple()),
        )
        .add_type(RmTypeInfo::new("ITEM").abstract_type().with_parent("LOCATABLE"))
        .add_type(
            RmTypeInfo::new("CLUSTER")
                .with_parent("ITEM")
                .with_attribute(attr("items", "ITEM").multiple()),
        )
        .add_type(
            RmTypeInfo::new("ELEMENT")
                .with_parent("ITEM")
                .with_attribute(attr("value", "DATA_VALUE").nullable())
                .with_attribute(attr("null_flavour", "DV_CODED_TEXT").nullable()),
        )
}

impl ModelRegistry {
    /// Registry preloaded with the openEHR types known to this crate.
    pub fn openehr() -> Self {
        openehr_builder().build_unchecked()
    }
}
