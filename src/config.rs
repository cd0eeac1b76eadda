// file: src/config.rs
// description: application configuration management with toml and environment layering
// reference: https://docs.rs/config

use crate::error::{PipelineError, Result};
use crate::models::{HyperlinkReplacementRule, ReplacementRule, TextReplacementRule};
use crate::utils::validation::Validator;
use dotenvy::dotenv;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LOOKUP_ID_PATTERN: &str = r"(?i)\b(?:TSRC|CMS)-[^-]+-\d{6}\b";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub processing: ProcessingConfig,
    pub backup: BackupConfig,
    pub api: ApiConfig,
    pub extraction: ExtractionConfig,
    pub features: FeatureFlags,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    pub max_concurrent_documents: usize,
    pub document_timeout_secs: u64,
    pub max_file_size_mb: usize,
    #[serde(default)]
    pub changelog_dir: Option<PathBuf>,
}

impl ProcessingConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        (self.max_file_size_mb as u64) * 1_048_576
    }

    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupConfig {
    pub directory: PathBuf,
    pub retention_days: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    pub max_concurrent_requests: usize,
    #[serde(default)]
    pub cache_ttl_secs: u64,
    /// Target URL for a document id; `{document_id}` is substituted.
    pub url_template: String,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    pub lookup_id_pattern: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureFlags {
    pub enable_hyperlink_replacement: bool,
    pub enable_text_replacement: bool,
    pub auto_replace_titles: bool,
    pub check_expired_content: bool,
    #[serde(default)]
    pub optimize_text: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub hyperlink: Vec<HyperlinkReplacementRule>,
    #[serde(default)]
    pub text: Vec<TextReplacementRule>,
}

impl RulesConfig {
    pub fn enabled(&self) -> impl Iterator<Item = ReplacementRule> + '_ {
        let hyperlink = self.hyperlink.iter().cloned().map(ReplacementRule::Hyperlink);
        let text = self.text.iter().cloned().map(ReplacementRule::Text);
        hyperlink.chain(text).filter(ReplacementRule::is_enabled)
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DOCX_RELINK")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            processing: ProcessingConfig {
                max_concurrent_documents: 5,
                document_timeout_secs: 300,
                max_file_size_mb: 100,
                changelog_dir: None,
            },
            backup: BackupConfig {
                directory: PathBuf::from("./backups"),
                retention_days: 30,
            },
            api: ApiConfig {
                endpoint: "https://metadata.example.com/api/lookup".to_string(),
                api_key: None,
                timeout_secs: 30,
                retry_count: 3,
                retry_delay_ms: 1000,
                max_concurrent_requests: 10,
                cache_ttl_secs: 300,
                url_template: "https://docs.example.com/library/#!/view?docid={document_id}"
                    .to_string(),
            },
            extraction: ExtractionConfig {
                lookup_id_pattern: DEFAULT_LOOKUP_ID_PATTERN.to_string(),
            },
            features: FeatureFlags {
                enable_hyperlink_replacement: false,
                enable_text_replacement: false,
                auto_replace_titles: false,
                check_expired_content: true,
                optimize_text: false,
            },
            rules: RulesConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.processing.max_concurrent_documents == 0 {
            return Err(PipelineError::Config(
                "max_concurrent_documents must be greater than 0".to_string(),
            ));
        }

        if self.processing.document_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "document_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.api.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "api timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.api.max_concurrent_requests == 0 {
            return Err(PipelineError::Config(
                "max_concurrent_requests must be greater than 0".to_string(),
            ));
        }

        if !self.api.url_template.contains("{document_id}") {
            return Err(PipelineError::Config(
                "url_template must contain {document_id}".to_string(),
            ));
        }

        Regex::new(&self.extraction.lookup_id_pattern).map_err(|e| {
            PipelineError::Config(format!("invalid lookup_id_pattern: {}", e))
        })?;

        Validator::validate_url(&self.api.endpoint)
            .map_err(|e| PipelineError::Config(format!("api endpoint: {}", e)))?;
        let template_base = self
            .api
            .url_template
            .split('#')
            .next()
            .unwrap_or_default()
            .replace("{document_id}", "id");
        Validator::validate_url(&template_base)
            .map_err(|e| PipelineError::Config(format!("url_template: {}", e)))?;

        for rule in self.rules.enabled() {
            rule.validate()
                .map_err(|e| PipelineError::Config(e.to_string()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.processing.max_concurrent_documents, 5);
        assert_eq!(config.api.max_concurrent_requests, 10);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let mut config = Config::default_config();
        config.processing.max_concurrent_documents = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_pattern_and_template() {
        let mut config = Config::default_config();
        config.extraction.lookup_id_pattern = "(unclosed".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default_config();
        config.api.url_template = "https://docs.example.com/".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_http_endpoint_and_template() {
        let mut config = Config::default_config();
        config.api.endpoint = "ftp://metadata.example.com/lookup".to_string();
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));

        let mut config = Config::default_config();
        config.api.url_template = "docs.example.com/{document_id}".to_string();
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_disabled_rules_are_not_validated() {
        let mut config = Config::default_config();
        let mut rule = TextReplacementRule::new("same", "same");
        rule.enabled = false;
        config.rules.text.push(rule);
        assert!(config.validate().is_ok());
        assert_eq!(config.rules.enabled().count(), 0);
    }

    #[test]
    fn test_rejects_cyclic_text_rule() {
        let mut config = Config::default_config();
        config.rules.text.push(TextReplacementRule::new("same", "same"));
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_load_from_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("relink.toml");
        fs::write(
            &path,
            r#"
[processing]
max_concurrent_documents = 3
document_timeout_secs = 60
max_file_size_mb = 20

[backup]
directory = "/tmp/relink-backups"
retention_days = 7

[api]
endpoint = "https://metadata.example.com/lookup"
timeout_secs = 10
retry_count = 2
retry_delay_ms = 250
max_concurrent_requests = 4
url_template = "https://docs.example.com/#!/view?docid={document_id}"

[extraction]
lookup_id_pattern = '(?i)\b(?:TSRC|CMS)-[^-]+-\d{6}\b'

[features]
enable_hyperlink_replacement = true
enable_text_replacement = true
auto_replace_titles = false
check_expired_content = true

[[rules.text]]
source = "colour"
replacement = "color"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.processing.max_concurrent_documents, 3);
        assert_eq!(config.backup.retention_days, 7);
        assert_eq!(config.api.retry_count, 2);
        assert_eq!(config.rules.text.len(), 1);
        assert!(config.rules.text[0].enabled);
        assert!(!config.features.optimize_text);
    }
}
