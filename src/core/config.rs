use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Settings that shape one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Language used to pick term definitions during fixups.
    pub language: String,
    /// Terminology id assigned to local at-codes that have none.
    pub local_terminology_id: String,
    /// Mutate the tree while evaluating. When off, values are only recorded.
    pub write_back: bool,
    pub run_fixups: bool,
    /// Record computed (non-literal) equalities in the set-path-value map.
    pub record_calculated_values: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            local_terminology_id: "local".to_string(),
            write_back: true,
            run_fixups: true,
            record_calculated_values: true,
        }
    }
}

impl EvaluationConfig {
    /// Only record what would be written; leave the tree untouched.
    pub fn dry_run() -> Self {
        Self {
            write_back: false,
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_local_terminology_id(mut self, terminology_id: impl Into<String>) -> Self {
        self.local_terminology_id = terminology_id.into();
        self
    }

    pub fn with_write_back(mut self, enabled: bool) -> Self {
        self.write_back = enabled;
        self
    }

    pub fn with_fixups(mut self, enabled: bool) -> Self {
        self.run_fixups = enabled;
        self
    }

    pub fn with_calculated_values(mut self, enabled: bool) -> Self {
        self.record_calculated_values = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EvaluationConfig::from_json_str(r#"{"language": "nl"}"#).unwrap();
        assert_eq!(config.language, "nl");
        assert_eq!(config.local_terminology_id, "local");
        assert!(config.write_back);
    }

    #[test]
    fn dry_run_disables_write_back_only() {
        let config = EvaluationConfig::dry_run();
        assert!(!config.write_back);
        assert!(config.run_fixups);
    }
}
