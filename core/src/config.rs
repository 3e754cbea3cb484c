use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{HqlError, HqlResult};
use crate::hql::is_keyword;
use crate::semantic::Compliance;

/// Options for a single compilation.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct CompileOptions {
    /// Strict JPQL compliance (default: false)
    pub jpa_compliance: bool,
    /// Extra words treated as reserved when used as an alias
    pub reserved_words: Vec<String>,
}

impl CompileOptions {
    pub fn strict() -> Self {
        Self {
            jpa_compliance: true,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> HqlResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> HqlResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| HqlError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn compliance(&self) -> Compliance {
        Compliance::new(self.jpa_compliance)
    }

    /// Whether `word` counts as a reserved word when used as an alias.
    pub fn is_reserved_word(&self, word: &str) -> bool {
        is_keyword(word)
            || self
                .reserved_words
                .iter()
                .any(|reserved| reserved.eq_ignore_ascii_case(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_fields_take_defaults() {
        let options = CompileOptions::from_json("{}").unwrap();
        assert_eq!(options, CompileOptions::default());

        let options = CompileOptions::from_json(r#"{ "jpa_compliance": true }"#).unwrap();
        assert!(options.compliance().is_strict());
    }

    #[test]
    fn reserved_words_extend_keywords() {
        let options =
            CompileOptions::from_json(r#"{ "reserved_words": ["Window"] }"#).unwrap();
        assert!(options.is_reserved_word("order"));
        assert!(options.is_reserved_word("window"));
        assert!(!options.is_reserved_word("animal"));
    }

    #[test]
    fn malformed_options_are_config_errors() {
        let err = CompileOptions::from_json(r#"{ "jpa_compliance": "yes" }"#).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }
}
