// file: src/models/document.rs
// description: batch document model with lifecycle status and processing history
// reference: internal data structures

use crate::backup::BackupInfo;
use crate::error::{ErrorKind, PipelineError};
use crate::models::changelog::ChangeLog;
use crate::models::hyperlink::Hyperlink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DocumentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Recovered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingError {
    pub kind: ErrorKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl From<&PipelineError> for ProcessingError {
    fn from(err: &PipelineError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub file_path: PathBuf,
    pub file_name: String,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub hyperlinks: Vec<Hyperlink>,
    pub changelog: ChangeLog,
    pub errors: Vec<ProcessingError>,
    pub backup: Option<BackupInfo>,
}

impl Document {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        let file_path = file_path.into();
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.display().to_string());

        Self {
            file_path,
            file_name,
            status: DocumentStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
            hyperlinks: Vec::new(),
            changelog: ChangeLog::new(),
            errors: Vec::new(),
            backup: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Clears per-pass state so the document can be processed again.
    pub fn begin_pass(&mut self) {
        self.status = DocumentStatus::Processing;
        self.hyperlinks.clear();
        self.changelog = ChangeLog::new();
        self.errors.clear();
        self.backup = None;
    }

    pub fn record_error(&mut self, err: &PipelineError) {
        self.errors.push(ProcessingError::from(err));
    }

    pub fn finish(&mut self, status: DocumentStatus) {
        self.status = status;
        self.processed_at = Some(Utc::now());
    }
}
