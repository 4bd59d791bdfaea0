//! Configuration file support for confmd CLI
//!
//! Loads settings from `_confmd.toml` configuration file.

use anyhow::{Context, Result};
use confmd_core::mdast::DEFAULT_ATTACHMENTS_DIR;
use confmd_core::{FallbackPolicy, PullOptions, PushOptions, ReconcileOptions};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "_confmd.toml";

/// Schema URL for the configuration file
pub const SCHEMA_URL: &str =
    "https://raw.githubusercontent.com/confmd/confmd/main/crates/confmd-cli/schema/confmd.schema.json";

/// Root configuration structure
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Markdown output configuration
    #[serde(skip_serializing_if = "MarkdownConfig::is_empty")]
    pub markdown: MarkdownConfig,
    /// Attachment reconciliation configuration
    #[serde(skip_serializing_if = "AttachmentsConfig::is_empty")]
    pub attachments: AttachmentsConfig,
    /// Storage markup output configuration
    #[serde(skip_serializing_if = "StorageConfig::is_empty")]
    pub storage: StorageConfig,
}

/// Markdown output configuration
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct MarkdownConfig {
    /// Add YAML frontmatter with title and page id (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontmatter: Option<bool>,
    /// Write the page title as a leading `# Title`, and read it back from
    /// there on push (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_heading: Option<bool>,
    /// Emit `<!-- language: lang-xxx -->` before fenced code (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_hints: Option<bool>,
}

impl MarkdownConfig {
    fn is_empty(&self) -> bool {
        self.frontmatter.is_none() && self.title_heading.is_none() && self.language_hints.is_none()
    }
}

/// Attachment reconciliation configuration
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct AttachmentsConfig {
    /// Attachments directory, relative to the Markdown file (default: "_attachments")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    /// Unmatched references: "first" takes the page's first attachment,
    /// "keep" leaves them unresolved (default: "first")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackPolicy>,
}

impl AttachmentsConfig {
    fn is_empty(&self) -> bool {
        self.dir.is_none() && self.fallback.is_none()
    }
}

/// Storage markup output configuration
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct StorageConfig {
    /// Number tasks with `ac:task-id` elements (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_ids: Option<bool>,
}

impl StorageConfig {
    fn is_empty(&self) -> bool {
        self.task_ids.is_none()
    }
}

/// Fully resolved settings, config values and defaults merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub frontmatter: bool,
    pub title_heading: bool,
    pub language_hints: bool,
    pub attachments_dir: String,
    pub fallback: FallbackPolicy,
    pub task_ids: bool,
}

impl Settings {
    pub fn pull_options(&self, page_id: Option<String>) -> PullOptions {
        PullOptions {
            frontmatter: self.frontmatter,
            title_heading: self.title_heading,
            language_hints: self.language_hints,
            reconcile: ReconcileOptions {
                attachments_dir: self.attachments_dir.clone(),
                fallback: self.fallback,
            },
            page_id,
        }
    }

    pub fn push_options(&self) -> PushOptions {
        PushOptions {
            title_heading: self.title_heading,
            task_ids: self.task_ids,
            strict_frontmatter: false,
        }
    }
}

impl Config {
    /// Load configuration from a specific file path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Try to load configuration from a directory (looks for `_confmd.toml`)
    ///
    /// Returns `Ok(None)` if the config file doesn't exist.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            tracing::debug!(path = %config_path.display(), "Loading config");
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge with built-in defaults
    pub fn settings(&self) -> Settings {
        Settings {
            frontmatter: self.markdown.frontmatter.unwrap_or(true),
            title_heading: self.markdown.title_heading.unwrap_or(false),
            language_hints: self.markdown.language_hints.unwrap_or(true),
            attachments_dir: self
                .attachments
                .dir
                .clone()
                .unwrap_or_else(|| DEFAULT_ATTACHMENTS_DIR.to_string()),
            fallback: self.attachments.fallback.unwrap_or_default(),
            task_ids: self.storage.task_ids.unwrap_or(true),
        }
    }

    /// Generate JSON schema for the configuration
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Config)
    }

    /// Generate JSON schema as a string
    pub fn json_schema_string() -> Result<String> {
        let schema = Self::json_schema();
        serde_json::to_string_pretty(&schema).context("Failed to serialize JSON schema")
    }

    /// Serialize configuration to TOML string with schema directive
    pub fn to_toml_with_schema(&self) -> Result<String> {
        let toml_content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        Ok(format!("#:schema {}\n\n{}", SCHEMA_URL, toml_content))
    }

    /// Create a sample configuration with the defaults spelled out for init command
    pub fn sample() -> Self {
        Config {
            markdown: MarkdownConfig {
                frontmatter: Some(true),
                title_heading: Some(false),
                language_hints: Some(true),
            },
            attachments: AttachmentsConfig {
                dir: Some(DEFAULT_ATTACHMENTS_DIR.to_string()),
                fallback: Some(FallbackPolicy::FirstRecord),
            },
            storage: StorageConfig {
                task_ids: Some(true),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.markdown.frontmatter.is_none());
        assert!(config.attachments.dir.is_none());
    }

    #[test]
    fn test_parse_markdown_section() {
        let config: Config = toml::from_str(
            r#"
            [markdown]
            frontmatter = false
            title_heading = true
            language_hints = false
            "#,
        )
        .unwrap();

        assert_eq!(config.markdown.frontmatter, Some(false));
        assert_eq!(config.markdown.title_heading, Some(true));
        assert_eq!(config.markdown.language_hints, Some(false));
    }

    #[test]
    fn test_parse_attachments_section() {
        let config: Config = toml::from_str(
            r#"
            [attachments]
            dir = "assets"
            fallback = "keep"
            "#,
        )
        .unwrap();

        assert_eq!(config.attachments.dir, Some("assets".to_string()));
        assert_eq!(config.attachments.fallback, Some(FallbackPolicy::KeepOriginal));
    }

    #[test]
    fn test_parse_invalid_fallback() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [attachments]
            fallback = "random"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_default_settings() {
        let settings = Config::default().settings();
        assert_eq!(
            settings,
            Settings {
                frontmatter: true,
                title_heading: false,
                language_hints: true,
                attachments_dir: "_attachments".to_string(),
                fallback: FallbackPolicy::FirstRecord,
                task_ids: true,
            }
        );
    }

    #[test]
    fn test_settings_to_options() {
        let config: Config = toml::from_str(
            r#"
            [markdown]
            title_heading = true

            [attachments]
            dir = "assets"

            [storage]
            task_ids = false
            "#,
        )
        .unwrap();
        let settings = config.settings();

        let pull = settings.pull_options(Some("42".to_string()));
        assert!(pull.title_heading);
        assert_eq!(pull.reconcile.attachments_dir, "assets");
        assert_eq!(pull.page_id.as_deref(), Some("42"));

        let push = settings.push_options();
        assert!(push.title_heading);
        assert!(!push.task_ids);
    }

    #[test]
    fn test_serialize_empty_config() {
        let config = Config::default();
        let toml = config.to_toml_with_schema().unwrap();
        assert!(toml.starts_with("#:schema"));
        assert!(!toml.contains("[markdown]"));
    }

    #[test]
    fn test_serialize_sample_config() {
        let config = Config::sample();
        let toml = config.to_toml_with_schema().unwrap();
        assert!(toml.starts_with("#:schema"));
        assert!(toml.contains("[attachments]"));
        assert!(toml.contains("fallback = \"first\""));
    }

    #[test]
    fn test_json_schema_generation() {
        let schema = Config::json_schema_string().unwrap();
        assert!(schema.contains("\"title\""));
        assert!(schema.contains("MarkdownConfig"));
        assert!(schema.contains("\"keep\""));
    }

    #[test]
    fn test_roundtrip() {
        let config = Config::sample();
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.settings(), parsed.settings());
    }
}
