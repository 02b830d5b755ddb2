use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Largest accepted value for the configured indent and tab width.
pub(crate) const MAX_WIDTH: usize = 32;

/// Configuration for the helper functions.
///
/// Deserialized from TOML. Every section is optional and unknown keys are
/// ignored, so an empty document yields the defaults.
///
/// # Example
///
/// ```toml
/// [codeblock]
/// indent = 4
/// tab_width = 8
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Defaults used by the `codeblock` helper
    pub codeblock: CodeBlockConfig,
}

/// Defaults applied by the code-block formatter when a call passes `0`.
///
/// A configured `indent` of 0 disables indentation and a configured
/// `tab_width` of 0 keeps literal tab characters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CodeBlockConfig {
    /// Spaces prepended to every content line
    pub indent: usize,

    /// Column multiple that tab characters expand to
    pub tab_width: usize,
}

impl Default for CodeBlockConfig {
    fn default() -> Self {
        Self {
            indent: 4,
            tab_width: 4,
        }
    }
}

impl CodeBlockConfig {
    /// Validate the configured widths
    pub fn validate(&self) -> Result<()> {
        if self.indent > MAX_WIDTH {
            anyhow::bail!(
                "codeblock indent must be at most {}, got {}",
                MAX_WIDTH,
                self.indent
            );
        }

        if self.tab_width > MAX_WIDTH {
            anyhow::bail!(
                "codeblock tab_width must be at most {}, got {}",
                MAX_WIDTH,
                self.tab_width
            );
        }

        Ok(())
    }
}

impl Config {
    /// Parse configuration from a TOML document and validate it
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("Failed to parse configuration")?;

        config
            .codeblock
            .validate()
            .context("Invalid [codeblock] configuration")?;

        log::debug!(
            "Loaded configuration: codeblock indent={} tab_width={}",
            config.codeblock.indent,
            config.codeblock.tab_width
        );

        Ok(config)
    }

    /// Read and parse a TOML configuration file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.codeblock.indent, 4);
        assert_eq!(config.codeblock.tab_width, 4);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::from_toml_str("[codeblock]\ntab_width = 8\n").unwrap();
        assert_eq!(config.codeblock.indent, 4);
        assert_eq!(config.codeblock.tab_width, 8);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config = Config::from_toml_str("[other]\nkey = 1\n").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_rejects_oversized_widths() {
        let err = Config::from_toml_str("[codeblock]\nindent = 100\n").unwrap_err();
        assert!(format!("{:#}", err).contains("indent must be at most"));

        let err = Config::from_toml_str("[codeblock]\ntab_width = 33\n").unwrap_err();
        assert!(format!("{:#}", err).contains("tab_width must be at most"));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(Config::from_toml_str("[codeblock\n").is_err());
        assert!(Config::from_toml_str("[codeblock]\nindent = -1\n").is_err());
    }

    #[test]
    fn test_from_path_reports_missing_file() {
        let err = Config::from_path("/nonexistent/tmplfn.toml").unwrap_err();
        assert!(format!("{}", err).contains("/nonexistent/tmplfn.toml"));
    }
}
