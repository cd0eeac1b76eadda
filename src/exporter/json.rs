// file: src/exporter/json.rs
// description: json export of batch results with an embedded manifest

use crate::error::{PipelineError, Result};
use crate::exporter::{ExportFormat, ExportedDocument, ResultExporter};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct JsonExporter {
    pretty: bool,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    exported_at: String,
    total_documents: usize,
    documents: &'a [ExportedDocument],
}

impl JsonExporter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl ResultExporter for JsonExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }

    fn write(&self, rows: &[ExportedDocument], output: &Path) -> Result<()> {
        info!("Exporting {} documents to {}", rows.len(), output.display());

        let report = JsonReport {
            exported_at: Utc::now().to_rfc3339(),
            total_documents: rows.len(),
            documents: rows,
        };
        let json = if self.pretty {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };

        fs::write(output, json).map_err(|e| PipelineError::file_operation(output, e))
    }
}
