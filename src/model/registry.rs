use indexmap::IndexMap;
use papaya::HashMap as PapayaMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{ModelInfoLookup, RmAttributeInfo, RmTypeInfo, ValueKind, strip_generics};
use crate::error::ModelError;

/// Hand-maintained type registry.
///
/// Type definitions are immutable once built. Attribute lookups that walk the
/// inheritance chain are memoised in a concurrent map, so one registry can
/// serve evaluations running on many threads.
#[derive(Debug)]
pub struct ModelRegistry {
    types: HashMap<String, Arc<RmTypeInfo>>,
    aliases: HashMap<String, String>,
    attribute_cache: PapayaMap<String, Option<RmAttributeInfo>>,
    metrics: RegistryMetrics,
}

#[derive(Debug, Default, Clone)]
pub struct RegistryMetrics {
    pub total_types: usize,
    pub abstract_count: usize,
    pub primitive_count: usize,
    pub attribute_count: usize,
    pub alias_count: usize,
}

#[derive(Debug, Default, Clone)]
pub struct ModelRegistryBuilder {
    types: IndexMap<String, RmTypeInfo>,
    aliases: HashMap<String, String>,
}

impl ModelRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(mut self, info: RmTypeInfo) -> Self {
        self.types.insert(info.rm_name.clone(), info);
        self
    }

    /// Registers an alternative name, e.g. a legacy spelling of a type.
    pub fn alias(mut self, alternative: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.insert(alternative.into(), canonical.into());
        self
    }

    /// Checks parents, attribute types and inheritance cycles before building.
    pub fn build(self) -> Result<ModelRegistry, ModelError> {
        self.check()?;
        Ok(self.build_unchecked())
    }

    pub(crate) fn build_unchecked(self) -> ModelRegistry {
        let mut metrics = RegistryMetrics {
            total_types: self.types.len(),
            alias_count: self.aliases.len(),
            ..Default::default()
        };
        for info in self.types.values() {
            if info.is_abstract {
                metrics.abstract_count += 1;
            }
            if info.primitive.is_some() {
                metrics.primitive_count += 1;
            }
            metrics.attribute_count += info.attributes.len();
        }

        ModelRegistry {
            types: self
                .types
                .into_iter()
                .map(|(name, info)| (name, Arc::new(info)))
                .collect(),
            aliases: self.aliases,
            attribute_cache: PapayaMap::new(),
            metrics,
        }
    }

    fn canonical<'a>(&'a self, type_name: &'a str) -> &'a str {
        let stripped = strip_generics(type_name);
        self.aliases
            .get(stripped)
            .map(String::as_str)
            .unwrap_or(stripped)
    }

    fn check(&self) -> Result<(), ModelError> {
        for info in self.types.values() {
            if let Some(parent) = &info.parent {
                if !self.types.contains_key(self.canonical(parent)) {
                    return Err(ModelError::UnknownParent {
                        type_name: info.rm_name.clone(),
                        parent: parent.clone(),
                    });
                }
            }
            for attribute in info.attributes.values() {
                if !self.types.contains_key(self.canonical(&attribute.type_name)) {
                    return Err(ModelError::UnknownAttributeType {
                        type_name: info.rm_name.clone(),
                        attribute: attribute.name.clone(),
                        attribute_type: attribute.type_name.clone(),
                    });
                }
            }
        }

        for name in self.types.keys() {
            let mut seen = HashSet::new();
            let mut current = Some(name.as_str());
            while let Some(type_name) = current {
                if !seen.insert(type_name) {
                    return Err(ModelError::InheritanceCycle {
                        type_name: name.clone(),
                    });
                }
                current = self
                    .types
                    .get(type_name)
                    .and_then(|info| info.parent.as_deref())
                    .map(|parent| self.canonical(parent));
            }
        }
        Ok(())
    }
}

impl ModelRegistry {
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::new()
    }

    /// Canonical registered name for a possibly generic or aliased type name.
    pub fn canonical_name<'a>(&'a self, type_name: &'a str) -> &'a str {
        let stripped = strip_generics(type_name);
        self.aliases
            .get(stripped)
            .map(String::as_str)
            .unwrap_or(stripped)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(self.canonical_name(type_name))
    }

    pub fn get_base_type(&self, type_name: &str) -> Option<String> {
        self.types
            .get(self.canonical_name(type_name))?
            .parent
            .as_deref()
            .map(|parent| self.canonical_name(parent).to_string())
    }

    /// Every concrete type that is `type_name` or one of its descendants.
    pub fn concrete_descendants(&self, type_name: &str) -> Vec<String> {
        let mut found: Vec<String> = self
            .types
            .values()
            .filter(|info| !info.is_abstract && self.is_descendant_of(&info.rm_name, type_name))
            .map(|info| info.rm_name.clone())
            .collect();
        found.sort();
        found
    }

    pub fn get_metrics(&self) -> &RegistryMetrics {
        &self.metrics
    }

    fn lookup_attribute(&self, type_name: &str, attribute: &str) -> Option<RmAttributeInfo> {
        let mut current = Some(self.canonical_name(type_name).to_string());
        while let Some(name) = current {
            let info = self.types.get(&name)?;
            if let Some(found) = info.attributes.get(attribute) {
                return Some(found.clone());
            }
            current = info
                .parent
                .as_deref()
                .map(|parent| self.canonical_name(parent).to_string());
        }
        None
    }
}

impl ModelInfoLookup for ModelRegistry {
    fn type_info(&self, type_name: &str) -> Option<Arc<RmTypeInfo>> {
        self.types.get(self.canonical_name(type_name)).cloned()
    }

    fn attribute_info(&self, type_name: &str, attribute: &str) -> Option<RmAttributeInfo> {
        let key = format!("{}.{}", self.canonical_name(type_name), attribute);
        let guard = self.attribute_cache.pin();
        if let Some(cached) = guard.get(&key) {
            return cached.clone();
        }
        let resolved = self.lookup_attribute(type_name, attribute);
        guard.insert(key, resolved.clone());
        resolved
    }

    fn value_kind(&self, type_name: &str) -> ValueKind {
        let mut current = Some(self.canonical_name(type_name).to_string());
        while let Some(name) = current {
            let Some(info) = self.types.get(&name) else {
                break;
            };
            if let Some(kind) = info.value_kind {
                return kind;
            }
            current = info
                .parent
                .as_deref()
                .map(|parent| self.canonical_name(parent).to_string());
        }
        ValueKind::Other
    }

    fn is_descendant_of(&self, type_name: &str, ancestor: &str) -> bool {
        let ancestor = self.canonical_name(ancestor);
        let mut current = self.canonical_name(type_name).to_string();
        // Bounded by the number of types so a cycle in an unchecked registry terminates.
        for _ in 0..=self.types.len() {
            if current == ancestor {
                return true;
            }
            match self.get_base_type(&current) {
                Some(base) => current = base,
                None => return false,
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PrimitiveType, RmAttributeInfo};

    fn small_builder() -> ModelRegistryBuilder {
        ModelRegistry::builder()
            .add_type(RmTypeInfo::primitive(PrimitiveType::String))
            .add_type(
                RmTypeInfo::new("LOCATABLE")
                    .abstract_type()
                    .with_attribute(RmAttributeInfo::new("archetype_node_id", "String")),
            )
            .add_type(
                RmTypeInfo::new("CLUSTER")
                    .with_parent("LOCATABLE")
                    .with_attribute(RmAttributeInfo::new("items", "LOCATABLE").multiple()),
            )
            .alias("CLUSTER_V1", "CLUSTER")
    }

    #[test]
    fn inherited_attributes_are_resolved_and_cached() {
        let registry = small_builder().build().unwrap();

        let info = registry.attribute_info("CLUSTER", "archetype_node_id").unwrap();
        assert_eq!(info.type_name, "String");
        assert!(!info.is_multiple);

        // second lookup is served from the cache
        let again = registry.attribute_info("CLUSTER", "archetype_node_id");
        assert_eq!(again, Some(info));
        assert!(registry.attribute_info("CLUSTER", "missing").is_none());
    }

    #[test]
    fn aliases_and_generics_map_to_canonical_names() {
        let registry = small_builder().build().unwrap();
        assert!(registry.contains("CLUSTER_V1"));
        assert!(registry.contains("CLUSTER<LOCATABLE>"));
        assert!(registry.is_descendant_of("CLUSTER_V1", "LOCATABLE"));
        assert!(!registry.is_descendant_of("LOCATABLE", "CLUSTER"));
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let result = small_builder()
            .add_type(RmTypeInfo::new("ELEMENT").with_parent("ITEM"))
            .build();
        assert!(matches!(result, Err(ModelError::UnknownParent { .. })));
    }

    #[test]
    fn unknown_attribute_type_is_rejected() {
        let result = small_builder()
            .add_type(
                RmTypeInfo::new("ELEMENT")
                    .with_parent("LOCATABLE")
                    .with_attribute(RmAttributeInfo::new("value", "DATA_VALUE")),
            )
            .build();
        assert!(matches!(
            result,
            Err(ModelError::UnknownAttributeType { .. })
        ));
    }

    #[test]
    fn inheritance_cycles_are_rejected() {
        let result = ModelRegistry::builder()
            .add_type(RmTypeInfo::new("A").with_parent("B"))
            .add_type(RmTypeInfo::new("B").with_parent("A"))
            .build();
        assert!(matches!(result, Err(ModelError::InheritanceCycle { .. })));
    }

    #[test]
    fn metrics_count_registered_types() {
        let registry = small_builder().build().unwrap();
        let metrics = registry.get_metrics();
        assert_eq!(metrics.total_types, 3);
        assert_eq!(metrics.abstract_count, 1);
        assert_eq!(metrics.primitive_count, 1);
        assert_eq!(metrics.alias_count, 1);
    }
}
