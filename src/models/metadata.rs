// file: src/models/metadata.rs
// description: metadata service results bucketed into found, expired and missing
// reference: internal data structures

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MetadataStatus {
    Released,
    Expired,
    #[default]
    Unknown,
}

impl MetadataStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "released" => MetadataStatus::Released,
            "expired" => MetadataStatus::Expired,
            _ => MetadataStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// The requested identifier this record answered.
    pub lookup_id: String,
    pub document_id: String,
    pub content_id: String,
    pub title: String,
    pub status: MetadataStatus,
    pub author: Option<String>,
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    pub found: Vec<DocumentMetadata>,
    pub expired: Vec<DocumentMetadata>,
    pub missing: Vec<String>,
}

impl LookupResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty() && self.expired.is_empty() && self.missing.is_empty()
    }

    pub fn total(&self) -> usize {
        self.found.len() + self.expired.len() + self.missing.len()
    }

    pub fn find_found(&self, lookup_id: &str) -> Option<&DocumentMetadata> {
        self.found
            .iter()
            .find(|m| m.lookup_id.eq_ignore_ascii_case(lookup_id))
    }

    pub fn find_expired(&self, lookup_id: &str) -> Option<&DocumentMetadata> {
        self.expired
            .iter()
            .find(|m| m.lookup_id.eq_ignore_ascii_case(lookup_id))
    }

    pub fn is_missing(&self, lookup_id: &str) -> bool {
        self.missing
            .iter()
            .any(|id| id.eq_ignore_ascii_case(lookup_id))
    }

    pub fn merge(&mut self, other: LookupResult) {
        self.found.extend(other.found);
        self.expired.extend(other.expired);
        self.missing.extend(other.missing);
    }
}
