//! Runtime configuration

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid runtime configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("max_call_depth must be at least 1")]
    ZeroDepth,
}

/// Knobs for one interpreter instance
///
/// Every field has a default, so a TOML document only names what it changes:
///
/// ```toml
/// max_call_depth = 64
/// print_prefix = "[plugin]"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Nested interpreted calls allowed before a stack overflow error
    pub max_call_depth: usize,
    /// Prepended to every line written by `print`
    pub print_prefix: String,
    /// Source name shown in diagnostics for top-level code
    pub chunk_name: String,
    /// Whether the default `print` sink also writes to stdout
    pub echo_stdout: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_call_depth: 200,
            print_prefix: "[Lua]".to_string(),
            chunk_name: "(main)".to_string(),
            echo_stdout: true,
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = toml::from_str(text)?;
        if config.max_call_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(RuntimeConfig::from_toml_str("").ok(), Some(RuntimeConfig::default()));
    }

    #[test]
    fn test_partial_override() {
        let config = RuntimeConfig::from_toml_str("max_call_depth = 64\necho_stdout = false\n").unwrap();
        assert_eq!(config.max_call_depth, 64);
        assert!(!config.echo_stdout);
        assert_eq!(config.print_prefix, "[Lua]");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = RuntimeConfig::from_toml_str("max_depth = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = RuntimeConfig::from_toml_str("max_call_depth = 0").unwrap_err();
        assert_eq!(err.to_string(), "max_call_depth must be at least 1");
    }

    #[test]
    fn test_missing_file() {
        let err = RuntimeConfig::load(Path::new("/nonexistent/lunet.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
