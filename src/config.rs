//! Engine configuration
//!
//! Loaded from a TOML file; every field has a default so an empty file (or
//! no file at all) is valid.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`LSDOM_ATTRIBUTE_PREFIX`, `LSDOM_GUARD_REENTRY`)
//! 2. Config file
//! 3. Defaults

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LsdomError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Attributes mounted as event handlers instead of interpolated values
    pub event_attributes: Vec<String>,

    /// Prefix stripped from bound attribute names (`ls-checked` -> `checked`)
    pub attribute_prefix: Option<String>,

    /// Comment labels around rendered list fragments
    pub anchors: Anchors,

    /// Skip triggers of an event that is already being dispatched
    pub guard_reentrant_triggers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Anchors {
    pub start: String,
    pub end: String,
}

impl Default for Anchors {
    fn default() -> Self {
        Self {
            start: "for".to_string(),
            end: "end".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_attributes: ["click", "dblclick", "keypress", "keydown", "keyup", "change", "submit"]
                .into_iter()
                .map(String::from)
                .collect(),
            attribute_prefix: Some("ls-".to_string()),
            anchors: Anchors::default(),
            guard_reentrant_triggers: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| LsdomError::Config {
            reason: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| LsdomError::Config {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| LsdomError::Config {
            reason: format!("Failed to serialize config: {}", e),
        })
    }

    /// Merge with environment variables
    ///
    /// An empty `LSDOM_ATTRIBUTE_PREFIX` disables prefix stripping.
    /// `LSDOM_GUARD_REENTRY` accepts `0`/`1`/`true`/`false`.
    pub fn with_env(mut self) -> Self {
        if let Ok(prefix) = std::env::var("LSDOM_ATTRIBUTE_PREFIX") {
            self.attribute_prefix = (!prefix.is_empty()).then_some(prefix);
        }

        if let Ok(flag) = std::env::var("LSDOM_GUARD_REENTRY") {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.guard_reentrant_triggers = true,
                "0" | "false" | "no" | "off" => self.guard_reentrant_triggers = false,
                other => tracing::warn!(value = other, "ignoring invalid LSDOM_GUARD_REENTRY"),
            }
        }

        self
    }

    pub fn is_event_attribute(&self, name: &str) -> bool {
        self.event_attributes.iter().any(|e| e == name)
    }

    /// Attribute name to write for a bound attribute
    pub fn target_attribute<'a>(&self, name: &'a str) -> &'a str {
        self.attribute_prefix
            .as_deref()
            .and_then(|prefix| name.strip_prefix(prefix))
            .filter(|stripped| !stripped.is_empty())
            .unwrap_or(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert!(config.is_event_attribute("click"));
        assert!(config.is_event_attribute("keypress"));
        assert!(!config.is_event_attribute("title"));
        assert_eq!(config.anchors.start, "for");
        assert!(config.guard_reentrant_triggers);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            attribute_prefix = "data-"

            [anchors]
            start = "list"
            "#,
        )
        .unwrap();
        assert_eq!(config.attribute_prefix.as_deref(), Some("data-"));
        assert_eq!(config.anchors.start, "list");
        assert_eq!(config.anchors.end, "end");
        assert!(config.is_event_attribute("click"));
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("event_attributes = 3").unwrap_err();
        assert!(matches!(err, LsdomError::Config { .. }));
    }

    #[test]
    fn load_from_file_and_back() {
        let config = EngineConfig {
            guard_reentrant_triggers: false,
            ..EngineConfig::default()
        };
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();

        assert_eq!(EngineConfig::load(file.path()).unwrap(), config);
    }

    #[test]
    fn load_missing_file_fails() {
        let err = EngineConfig::load(Path::new("/nonexistent/lsdom.toml")).unwrap_err();
        assert!(err.to_string().contains("LSD-040"));
    }

    #[test]
    fn target_attribute_strips_prefix() {
        let config = EngineConfig::default();
        assert_eq!(config.target_attribute("ls-checked"), "checked");
        assert_eq!(config.target_attribute("title"), "title");
        assert_eq!(config.target_attribute("ls-"), "ls-");

        let bare = EngineConfig {
            attribute_prefix: None,
            ..EngineConfig::default()
        };
        assert_eq!(bare.target_attribute("ls-checked"), "ls-checked");
    }
}
