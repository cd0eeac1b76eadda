// file: src/models/rules.rs
// description: user-defined hyperlink and text replacement rules
// reference: internal data structures

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    Exact,
    Contains,
    StartsWith,
    EndsWith,
}

impl MatchMode {
    /// Case-insensitive comparison of `text` against `pattern`.
    pub fn matches(&self, text: &str, pattern: &str) -> bool {
        let text = text.trim().to_lowercase();
        let pattern = pattern.trim().to_lowercase();
        if pattern.is_empty() {
            return false;
        }
        match self {
            MatchMode::Exact => text == pattern,
            MatchMode::Contains => text.contains(&pattern),
            MatchMode::StartsWith => text.starts_with(&pattern),
            MatchMode::EndsWith => text.ends_with(&pattern),
        }
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperlinkReplacementRule {
    pub title_pattern: String,
    #[serde(default)]
    pub match_mode: MatchMode,
    /// Replacement title; the current title is kept when absent.
    #[serde(default)]
    pub new_title: Option<String>,
    pub content_id: String,
    /// Document identifier used to rebuild the target URL.
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl HyperlinkReplacementRule {
    pub fn validate(&self) -> Result<()> {
        if self.title_pattern.trim().is_empty() {
            return Err(PipelineError::Validation(
                "hyperlink rule title pattern must not be empty".to_string(),
            ));
        }
        let content_id = self.content_id.trim();
        if content_id.is_empty() || !content_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(PipelineError::Validation(format!(
                "hyperlink rule content id must be numeric: {:?}",
                self.content_id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextReplacementRule {
    pub source: String,
    pub replacement: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl TextReplacementRule {
    pub fn new(source: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            replacement: replacement.into(),
            enabled: true,
        }
    }

    /// Rejects empty sources and rules that would rewrite text into itself.
    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(PipelineError::Validation(
                "text rule source must not be empty".to_string(),
            ));
        }
        // Case is carried over from the match, so a case-only difference is a no-op.
        if self.source.trim().to_lowercase() == self.replacement.trim().to_lowercase() {
            return Err(PipelineError::Validation(format!(
                "text rule replaces {:?} with itself",
                self.source
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplacementRule {
    Hyperlink(HyperlinkReplacementRule),
    Text(TextReplacementRule),
}

impl ReplacementRule {
    pub fn is_enabled(&self) -> bool {
        match self {
            ReplacementRule::Hyperlink(rule) => rule.enabled,
            ReplacementRule::Text(rule) => rule.enabled,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ReplacementRule::Hyperlink(rule) => rule.validate(),
            ReplacementRule::Text(rule) => rule.validate(),
        }
    }
}
