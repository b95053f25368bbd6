//! Startup configuration for the lifecycle advice.
//!
//! Resolved once when the service context is assembled and handed to the
//! built-in handler table; it is never modified afterwards.

use crate::advice::registry::DEFAULT_HANDLER_ORDER;
use crate::handlers::void::VOIDED_SAVE_REASON_ORDER;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const DEFAULT_CONCEPT_CODE_PREFIX: &str = "CPT-";

fn default_void_reason_required_types() -> Vec<String> {
    ["Patient", "Encounter", "Obs", "Order", "Visit"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdviceConfig {
    /// Types whose void calls must carry a non-blank reason. Subtypes of a
    /// listed type are covered too.
    pub void_reason_required_types: Vec<String>,
    /// Order given to handlers that do not opt into running early.
    pub default_handler_order: i32,
    pub concept_code_prefix: String,
    /// Directory for file-backed complex observation payloads. Complex
    /// storage is disabled when unset.
    pub complex_obs_dir: Option<PathBuf>,
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            void_reason_required_types: default_void_reason_required_types(),
            default_handler_order: DEFAULT_HANDLER_ORDER,
            concept_code_prefix: DEFAULT_CONCEPT_CODE_PREFIX.to_string(),
            complex_obs_dir: None,
        }
    }
}

impl AdviceConfig {
    /// Parses and validates a JSON document; missing keys take defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_handler_order <= VOIDED_SAVE_REASON_ORDER {
            return Err(ConfigError::Invalid(format!(
                "default_handler_order must be greater than {VOIDED_SAVE_REASON_ORDER}"
            )));
        }
        if self.concept_code_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "concept_code_prefix cannot be empty".to_string(),
            ));
        }
        if self
            .void_reason_required_types
            .iter()
            .any(|type_name| type_name.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "void_reason_required_types cannot contain blank names".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether voiding an object with this type lineage needs a reason.
    /// A configured supertype covers all of its subtypes.
    pub fn requires_void_reason(&self, lineage: &[&str]) -> bool {
        lineage.iter().any(|type_name| {
            self.void_reason_required_types
                .iter()
                .any(|configured| configured == type_name)
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid advice config: {err}"),
            Self::Invalid(message) => write!(f, "invalid advice config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AdviceConfig, ConfigError};

    #[test]
    fn empty_document_yields_defaults() {
        let config = AdviceConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AdviceConfig::default());
        assert_eq!(config.default_handler_order, 1000);
        assert!(config.requires_void_reason(&["Obs"]));
        assert!(!config.requires_void_reason(&["ConceptName"]));
    }

    #[test]
    fn overrides_are_applied() {
        let config = AdviceConfig::from_json_str(
            r#"{"void_reason_required_types":["Patient"],"concept_code_prefix":"C"}"#,
        )
        .unwrap();
        assert_eq!(config.void_reason_required_types, vec!["Patient"]);
        assert_eq!(config.concept_code_prefix, "C");
        assert!(config.complex_obs_dir.is_none());
    }

    #[test]
    fn configured_supertype_covers_subtypes() {
        let config = AdviceConfig {
            void_reason_required_types: vec!["Person".to_string()],
            ..AdviceConfig::default()
        };
        assert!(config.requires_void_reason(&["Patient", "Person"]));
        assert!(!config.requires_void_reason(&["Encounter"]));
    }

    #[test]
    fn unknown_keys_and_blank_values_are_rejected() {
        assert!(matches!(
            AdviceConfig::from_json_str(r#"{"order":1}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            AdviceConfig::from_json_str(r#"{"concept_code_prefix":"  "}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AdviceConfig::from_json_str(r#"{"void_reason_required_types":[""]}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AdviceConfig::from_json_str(r#"{"default_handler_order":5}"#),
            Err(ConfigError::Invalid(_))
        ));
    }
}
