// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns

//! Batch validation and rewriting of hyperlinks in `.docx`/`.docm` documents.
//!
//! Every document is backed up and verified before it is touched, its
//! hyperlinks are resolved against a metadata service, and the rewritten
//! package is saved atomically. Any failure after the backup restores the
//! original file.

pub mod api;
pub mod backup;
pub mod config;
pub mod docx;
pub mod error;
pub mod exporter;
pub mod extractor;
pub mod models;
pub mod pipeline;
pub mod rewrite;
pub mod scanner;
pub mod utils;

pub use api::{MetadataClient, MetadataSource};
pub use backup::{BackupInfo, BackupManager, UndoSession};
pub use config::Config;
pub use docx::DocxPackage;
pub use error::{ErrorKind, PipelineError, Result};
pub use exporter::{CsvExporter, ExportFormat, JsonExporter, ResultExporter, exporter_for};
pub use extractor::{ExtractionResult, HyperlinkExtractor};
pub use models::{ChangeLog, Document, DocumentStatus, Hyperlink, LookupResult};
pub use pipeline::{
    BatchResult, BatchScheduler, BatchStats, CancellationFlag, ProcessingContext,
    ProcessingOrchestrator, ProcessingOutcome, ProcessingResult, ProgressTracker,
};
pub use rewrite::{DocumentRewriter, ReplacementEngine};
pub use scanner::DocumentScanner;
pub use utils::Validator;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
        let _extractor = HyperlinkExtractor::new();
        let _scanner = DocumentScanner::new();
    }
}
