// file: src/models/changelog.rs
// description: append-only per-document change records with summary and json export
// reference: internal data structures

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    HyperlinkUpdated,
    ContentIdAdded,
    HyperlinkStatusAdded,
    TitleChanged,
    TitleReplaced,
    PossibleTitleChange,
    TextReplaced,
    TextOptimized,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeType::HyperlinkUpdated => "Hyperlink updated",
            ChangeType::ContentIdAdded => "Content ID added",
            ChangeType::HyperlinkStatusAdded => "Status marker added",
            ChangeType::TitleChanged => "Title changed",
            ChangeType::TitleReplaced => "Title replaced",
            ChangeType::PossibleTitleChange => "Possible title change",
            ChangeType::TextReplaced => "Text replaced",
            ChangeType::TextOptimized => "Text optimized",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub change_type: ChangeType,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub element: String,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

impl ChangeEntry {
    pub fn new(change_type: ChangeType, element: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            change_type,
            old_value: None,
            new_value: None,
            element: element.into(),
            description: description.into(),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_values(mut self, old_value: impl Into<String>, new_value: impl Into<String>) -> Self {
        self.old_value = Some(old_value.into());
        self.new_value = Some(new_value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLog {
    entries: Vec<ChangeEntry>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: ChangeEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = ChangeEntry>) {
        self.entries.extend(entries);
    }

    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn counts_by_type(&self) -> BTreeMap<ChangeType, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.change_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn summary(&self) -> String {
        if self.entries.is_empty() {
            return "No changes".to_string();
        }

        let parts: Vec<String> = self
            .counts_by_type()
            .into_iter()
            .map(|(change_type, count)| format!("{}: {}", change_type, count))
            .collect();

        format!("{} changes ({})", self.entries.len(), parts.join(", "))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }
}
