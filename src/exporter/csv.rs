// file: src/exporter/csv.rs
// description: csv export of batch results, one row per document
// reference: https://docs.rs/csv

use crate::error::{PipelineError, Result};
use crate::exporter::{ExportFormat, ExportedDocument, ResultExporter};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct CsvExporter;

impl CsvExporter {
    pub fn new() -> Self {
        Self
    }
}

fn csv_error(err: csv::Error) -> PipelineError {
    PipelineError::Serialization(format!("CSV export failed: {}", err))
}

impl ResultExporter for CsvExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }

    fn write(&self, rows: &[ExportedDocument], output: &Path) -> Result<()> {
        info!("Exporting {} documents to {}", rows.len(), output.display());

        let mut writer = csv::Writer::from_path(output).map_err(csv_error)?;
        for row in rows {
            writer.serialize(row).map_err(csv_error)?;
        }
        writer
            .flush()
            .map_err(|e| PipelineError::file_operation(output, e))
    }
}
