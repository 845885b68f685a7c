use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static VALUE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^at\d+(\.\d+)*$").expect("BUG: invalid VALUE_CODE regex literal")
});

static VALUE_SET_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ac\d+(\.\d+)*$").expect("BUG: invalid VALUE_SET_CODE regex literal")
});

/// Local value code such as `at1` or `at0.1`.
pub fn is_value_code(code: &str) -> bool {
    VALUE_CODE.is_match(code)
}

/// Local value-set code such as `ac3`.
pub fn is_value_set_code(code: &str) -> bool {
    VALUE_SET_CODE.is_match(code)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeTerm {
    pub text: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeTerminology {
    /// language -> code -> term
    #[serde(default)]
    pub term_definitions: IndexMap<String, IndexMap<String, ArchetypeTerm>>,
    /// value-set code -> member value codes
    #[serde(default)]
    pub value_sets: IndexMap<String, Vec<String>>,
}

impl ArchetypeTerminology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_term(
        mut self,
        language: impl Into<String>,
        code: impl Into<String>,
        text: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.term_definitions
            .entry(language.into())
            .or_default()
            .insert(
                code.into(),
                ArchetypeTerm {
                    text: text.into(),
                    description: description.into(),
                },
            );
        self
    }

    pub fn with_value_set(mut self, code: impl Into<String>, members: &[&str]) -> Self {
        self.value_sets.insert(
            code.into(),
            members.iter().map(|member| member.to_string()).collect(),
        );
        self
    }

    pub fn term_for(&self, language: &str, code: &str) -> Option<&ArchetypeTerm> {
        self.term_definitions.get(language)?.get(code)
    }

    pub fn value_set(&self, code: &str) -> Option<&[String]> {
        self.value_sets.get(code).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_local_codes() {
        assert!(is_value_code("at1"));
        assert!(is_value_code("at0.1.2"));
        assert!(!is_value_code("ac3"));
        assert!(!is_value_code("27113001"));
        assert!(is_value_set_code("ac3"));
        assert!(!is_value_set_code("at3"));
    }

    #[test]
    fn terms_are_scoped_by_language() {
        let terminology = ArchetypeTerminology::new()
            .with_term("en", "at1", "Option 1", "First option")
            .with_term("nl", "at1", "Optie 1", "Eerste optie");
        assert_eq!(terminology.term_for("nl", "at1").unwrap().text, "Optie 1");
        assert!(terminology.term_for("de", "at1").is_none());
        assert!(terminology.term_for("en", "at2").is_none());
    }
}
