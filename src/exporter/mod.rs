// file: src/exporter/mod.rs
// description: batch result exporters behind a single interface
// reference: https://docs.rs/serde

pub mod csv;
pub mod json;

use crate::error::{PipelineError, Result};
use crate::models::{Document, HyperlinkStatus};
use crate::pipeline::{ProcessingOutcome, ProcessingResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use self::csv::CsvExporter;
pub use self::json::JsonExporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Csv,
    Excel,
    Xml,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "excel",
            ExportFormat::Xml => "xml",
        };
        f.write_str(name)
    }
}

impl FromStr for ExportFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "xml" => Ok(ExportFormat::Xml),
            other => Err(PipelineError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// One row per processed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedDocument {
    pub file_path: String,
    pub outcome: ProcessingOutcome,
    pub hyperlinks: usize,
    pub invalid: usize,
    pub updated: usize,
    pub expired: usize,
    pub not_found: usize,
    pub changes: usize,
    pub rolled_back: bool,
    pub backup_path: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ExportedDocument {
    pub fn new(document: &Document, result: &ProcessingResult) -> Self {
        let update = result.update.as_ref();
        Self {
            file_path: document.file_path.display().to_string(),
            outcome: result.outcome,
            hyperlinks: document.hyperlinks.len(),
            invalid: document
                .hyperlinks
                .iter()
                .filter(|h| h.status == HyperlinkStatus::Invalid)
                .count(),
            updated: update.map(|u| u.updated).unwrap_or(0),
            expired: update.map(|u| u.expired).unwrap_or(0),
            not_found: update.map(|u| u.not_found).unwrap_or(0),
            changes: result.changes,
            rolled_back: result.rolled_back,
            backup_path: result
                .backup
                .as_ref()
                .map(|b| b.backup_path.display().to_string()),
            error: result.error.clone(),
            duration_ms: result.duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub format: ExportFormat,
    pub exported_at: String,
    pub total_documents: usize,
    pub succeeded: usize,
    pub output: PathBuf,
}

impl ExportManifest {
    fn new(format: ExportFormat, rows: &[ExportedDocument], output: &Path) -> Self {
        Self {
            format,
            exported_at: Utc::now().to_rfc3339(),
            total_documents: rows.len(),
            succeeded: rows.iter().filter(|r| r.outcome.is_success()).count(),
            output: output.to_path_buf(),
        }
    }
}

pub trait ResultExporter {
    fn format(&self) -> ExportFormat;

    fn write(&self, rows: &[ExportedDocument], output: &Path) -> Result<()>;

    /// Pairs documents with their results in order and writes them to `output`.
    fn export(
        &self,
        documents: &[Document],
        results: &[ProcessingResult],
        output: &Path,
    ) -> Result<ExportManifest> {
        if documents.len() != results.len() {
            return Err(PipelineError::Validation(format!(
                "{} documents but {} results",
                documents.len(),
                results.len()
            )));
        }
        let rows: Vec<ExportedDocument> = documents
            .iter()
            .zip(results)
            .map(|(document, result)| ExportedDocument::new(document, result))
            .collect();

        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::file_operation(parent, e))?;
        }
        self.write(&rows, output)?;
        Ok(ExportManifest::new(self.format(), &rows, output))
    }
}

pub fn exporter_for(format: ExportFormat) -> Result<Box<dyn ResultExporter>> {
    match format {
        ExportFormat::Json => Ok(Box::new(JsonExporter::new(true))),
        ExportFormat::Csv => Ok(Box::new(CsvExporter::new())),
        ExportFormat::Excel | ExportFormat::Xml => {
            Err(PipelineError::UnsupportedFormat(format.to_string()))
        }
    }
}
