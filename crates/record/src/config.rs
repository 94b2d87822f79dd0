use crate::filter::BlockPolicy;
use core_types::MirrorId;
use dom::{Selector, SelectorError};
use mirror::NodeMirror;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Recorder settings supplied by the host at construction time.
///
/// ```toml
/// block_selector = ".rr-block, [data-private]"
/// block_class = "^rr-"
/// check_ancestors = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecorderConfig {
    pub block_selector: Option<String>,
    /// Regular expression matched against each class token.
    pub block_class: Option<String>,
    pub check_ancestors: bool,
    pub node_id_base: MirrorId,
    pub record_canvas: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            block_selector: None,
            block_class: None,
            check_ancestors: false,
            node_id_base: 1,
            record_canvas: true,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Selector(SelectorError),
    Pattern(regex::Error),
    InvalidIdBase(MirrorId),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "cannot read config: {err}"),
            ConfigError::Toml(err) => write!(f, "invalid config: {err}"),
            ConfigError::Selector(err) => write!(f, "invalid block_selector: {err}"),
            ConfigError::Pattern(err) => write!(f, "invalid block_class: {err}"),
            ConfigError::InvalidIdBase(base) => {
                write!(f, "node_id_base must be positive, got {base}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Toml(err) => Some(err),
            ConfigError::Selector(err) => Some(err),
            ConfigError::Pattern(err) => Some(err),
            ConfigError::InvalidIdBase(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Toml(err)
    }
}

impl RecorderConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RecorderConfig = toml::from_str(text)?;
        if config.node_id_base < 1 {
            return Err(ConfigError::InvalidIdBase(config.node_id_base));
        }
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Compile the blocking rules.
    pub fn policy(&self) -> Result<BlockPolicy, ConfigError> {
        let selector = match self.block_selector.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(source) => Some(Selector::parse(source).map_err(ConfigError::Selector)?),
        };
        let class_pattern = match self.block_class.as_deref() {
            Some("") | None => None,
            Some(pattern) => Some(Regex::new(pattern).map_err(ConfigError::Pattern)?),
        };
        Ok(BlockPolicy {
            selector,
            class_pattern,
            check_ancestors: self.check_ancestors,
        })
    }

    pub fn node_mirror(&self) -> NodeMirror {
        NodeMirror::with_base(self.node_id_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = RecorderConfig::from_toml_str("").unwrap();
        assert_eq!(config, RecorderConfig::default());
        assert!(config.policy().unwrap().is_empty());
        let doc = dom::Document::new();
        assert_eq!(config.node_mirror().add(doc.root()), 1);
    }

    #[test]
    fn full_config_compiles() {
        let config = RecorderConfig::from_toml_str(
            r#"
            block_selector = ".rr-block"
            block_class = "^private-"
            check_ancestors = true
            node_id_base = 100
            record_canvas = false
            "#,
        )
        .unwrap();
        let policy = config.policy().unwrap();
        assert_eq!(policy.selector.as_ref().map(Selector::as_str), Some(".rr-block"));
        assert!(policy.class_pattern.is_some());
        assert!(policy.check_ancestors);
        assert!(!config.record_canvas);
        let doc = dom::Document::new();
        assert_eq!(config.node_mirror().add(doc.root()), 100);
    }

    #[test]
    fn bad_values_are_reported() {
        assert!(matches!(
            RecorderConfig::from_toml_str("unknown = 1"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            RecorderConfig::from_toml_str("node_id_base = 0"),
            Err(ConfigError::InvalidIdBase(0))
        ));
        let bad_selector = RecorderConfig {
            block_selector: Some("div >".into()),
            ..RecorderConfig::default()
        };
        assert!(matches!(bad_selector.policy(), Err(ConfigError::Selector(_))));
        let bad_pattern = RecorderConfig {
            block_class: Some("(".into()),
            ..RecorderConfig::default()
        };
        let err = bad_pattern.policy().unwrap_err();
        assert!(err.to_string().starts_with("invalid block_class"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RecorderConfig::from_path("/nonexistent/retrace.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
