// file: src/pipeline/orchestrator.rs
// description: per-document state machine from validation through backup, rewrite and changelog
// reference: orchestrates asynchronous document processing with restore-on-failure

use crate::api::MetadataSource;
use crate::backup::{BackupInfo, BackupManager};
use crate::config::Config;
use crate::docx::DocxPackage;
use crate::error::{ErrorKind, PipelineError, Result};
use crate::extractor::{ExtractionResult, ExtractionStats, HyperlinkExtractor};
use crate::models::{ChangeEntry, ChangeLog, Document, DocumentStatus, LookupResult};
use crate::pipeline::cancellation::CancellationFlag;
use crate::pipeline::progress::ProgressEvent;
use crate::rewrite::{DocumentRewriter, ReplacementEngine, UpdateResult};
use crate::utils::validation::{DocumentValidation, Validator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingStage {
    Validating,
    BackingUp,
    Extracting,
    LookingUp,
    Rewriting,
    LoggingChanges,
    Completed,
    Failed,
    RolledBack,
}

impl ProcessingStage {
    pub fn percent(&self) -> u8 {
        match self {
            ProcessingStage::Validating => 5,
            ProcessingStage::BackingUp => 15,
            ProcessingStage::Extracting => 30,
            ProcessingStage::LookingUp => 50,
            ProcessingStage::Rewriting => 70,
            ProcessingStage::LoggingChanges => 90,
            ProcessingStage::Completed
            | ProcessingStage::Failed
            | ProcessingStage::RolledBack => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingOutcome {
    Completed,
    CompletedWithErrors,
    Failed,
    Cancelled,
    Recovered,
}

impl ProcessingOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ProcessingOutcome::Completed | ProcessingOutcome::CompletedWithErrors
        )
    }

    pub fn document_status(&self) -> DocumentStatus {
        match self {
            ProcessingOutcome::Completed | ProcessingOutcome::CompletedWithErrors => {
                DocumentStatus::Completed
            }
            ProcessingOutcome::Failed => DocumentStatus::Failed,
            ProcessingOutcome::Cancelled => DocumentStatus::Cancelled,
            ProcessingOutcome::Recovered => DocumentStatus::Recovered,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub file_path: PathBuf,
    pub outcome: ProcessingOutcome,
    pub stages: Vec<ProcessingStage>,
    pub validation: Option<DocumentValidation>,
    pub backup: Option<BackupInfo>,
    pub extraction: Option<ExtractionStats>,
    pub lookup: Option<LookupResult>,
    pub update: Option<UpdateResult>,
    pub changes: usize,
    pub changelog_path: Option<PathBuf>,
    pub rolled_back: bool,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

impl ProcessingResult {
    pub fn new(file_path: &Path) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
            outcome: ProcessingOutcome::Failed,
            stages: Vec::new(),
            validation: None,
            backup: None,
            extraction: None,
            lookup: None,
            update: None,
            changes: 0,
            changelog_path: None,
            rolled_back: false,
            error_kind: None,
            error: None,
            warnings: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Result for a unit that never produced one of its own.
    pub fn failed(file_path: &Path, err: &PipelineError) -> Self {
        let mut result = Self::new(file_path);
        result.stages.push(ProcessingStage::Failed);
        result.error_kind = Some(err.kind());
        result.error = Some(err.to_string());
        result
    }

    pub fn success(&self) -> bool {
        self.outcome.is_success()
    }

    fn set_error(&mut self, err: &PipelineError) {
        self.error_kind = Some(err.kind());
        self.error = Some(err.to_string());
    }
}

/// Collaborators shared by every document in a run.
pub struct ProcessingContext {
    pub config: Arc<Config>,
    pub metadata: Arc<dyn MetadataSource>,
    pub backups: BackupManager,
    pub extractor: Arc<HyperlinkExtractor>,
    pub cancel: CancellationFlag,
    pub progress: Option<UnboundedSender<ProgressEvent>>,
}

impl ProcessingContext {
    pub fn new(config: Config, metadata: Arc<dyn MetadataSource>) -> Result<Self> {
        let extractor = HyperlinkExtractor::with_pattern(&config.extraction.lookup_id_pattern)?;
        Ok(Self {
            backups: BackupManager::new(config.backup.directory.clone()),
            extractor: Arc::new(extractor),
            config: Arc::new(config),
            metadata,
            cancel: CancellationFlag::new(),
            progress: None,
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.progress {
            let _ = sender.send(event);
        }
    }
}

/// Backup of the unit in flight, readable after the unit's task has died.
#[derive(Debug, Clone, Default)]
pub struct BackupSlot(Arc<tokio::sync::Mutex<Option<BackupInfo>>>);

impl BackupSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, backup: BackupInfo) {
        *self.0.lock().await = Some(backup);
    }

    pub async fn take(&self) -> Option<BackupInfo> {
        self.0.lock().await.take()
    }
}

struct Rewritten {
    package: DocxPackage,
    extraction: ExtractionResult,
    update: UpdateResult,
    changes: Vec<ChangeEntry>,
}

fn join_error(stage: &str, err: tokio::task::JoinError) -> PipelineError {
    PipelineError::Content(format!("{} task failed: {}", stage, err))
}

/// Metadata rewrite, then hyperlink rules, text rules and text optimisation.
fn rewrite_package(
    config: &Config,
    mut package: DocxPackage,
    mut extraction: ExtractionResult,
    lookup: &LookupResult,
) -> Result<Rewritten> {
    let rewriter = DocumentRewriter::new(&config.api.url_template, &config.features);
    let update = rewriter.rewrite(&mut package, &mut extraction, lookup)?;
    let mut changes = update.changes.clone();

    let engine = ReplacementEngine::new(&config.api.url_template);
    if config.features.enable_hyperlink_replacement {
        changes.extend(engine.apply_hyperlink_rules(
            &mut package,
            &mut extraction,
            &config.rules.hyperlink,
        )?);
    }
    if config.features.enable_text_replacement {
        changes.extend(engine.apply_text_rules(&mut package, &config.rules.text)?);
    }
    if config.features.optimize_text {
        changes.extend(engine.optimize_text(&mut package));
    }

    Ok(Rewritten {
        package,
        extraction,
        update,
        changes,
    })
}

pub struct ProcessingOrchestrator {
    context: Arc<ProcessingContext>,
}

impl ProcessingOrchestrator {
    pub fn new(context: ProcessingContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    pub fn context(&self) -> &ProcessingContext {
        &self.context
    }

    pub async fn process(&self, document: &mut Document) -> ProcessingResult {
        self.process_with_slot(document, &BackupSlot::new()).await
    }

    /// Like `process`, publishing the backup to `slot` before anything is mutated.
    pub async fn process_with_slot(&self, document: &mut Document, slot: &BackupSlot) -> ProcessingResult {
        let started = Instant::now();
        document.begin_pass();
        let mut result = ProcessingResult::new(document.path());
        info!("Processing {}", document.file_name);

        let prepared = self.prepare(document, &mut result, slot).await;
        let mut result = match prepared {
            Err(err) => self.abandon(document, result, err),
            Ok(backup) => {
                let transformed = self.transform_and_save(document, &mut result).await;
                match transformed {
                    Ok(changelog) => self.log_changes(document, result, changelog).await,
                    Err(err) => self.recover(document, result, &backup, err).await,
                }
            }
        };

        result.duration_ms = started.elapsed().as_millis() as u64;
        document.finish(result.outcome.document_status());
        info!(
            "{} finished as {:?} in {} ms",
            document.file_name, result.outcome, result.duration_ms
        );
        result
    }

    fn enter(&self, path: &Path, result: &mut ProcessingResult, stage: ProcessingStage) -> Result<()> {
        self.context.cancel.check()?;
        debug!("{}: {:?}", path.display(), stage);
        result.stages.push(stage);
        self.context.emit(ProgressEvent::Document {
            path: path.to_path_buf(),
            stage,
            percent: stage.percent(),
        });
        Ok(())
    }

    /// Validating and BackingUp. Nothing is mutated before a verified backup exists.
    async fn prepare(
        &self,
        document: &mut Document,
        result: &mut ProcessingResult,
        slot: &BackupSlot,
    ) -> Result<BackupInfo> {
        let path = document.file_path.clone();

        self.enter(&path, result, ProcessingStage::Validating)?;
        let max_bytes = self.context.config.processing.max_file_size_bytes();
        let validation = tokio::task::spawn_blocking({
            let path = path.clone();
            move || Validator::validate_document(&path, max_bytes)
        })
        .await
        .map_err(|e| join_error("validation", e))??;
        result.validation = Some(validation);

        self.enter(&path, result, ProcessingStage::BackingUp)?;
        let backup = tokio::task::spawn_blocking({
            let manager = self.context.backups.clone();
            let path = path.clone();
            move || manager.create_backup(&path)
        })
        .await
        .map_err(|e| join_error("backup", e))??;

        slot.set(backup.clone()).await;
        document.backup = Some(backup.clone());
        result.backup = Some(backup.clone());
        Ok(backup)
    }

    /// Extracting, LookingUp and Rewriting under the document deadline,
    /// then an atomic save.
    async fn transform_and_save(
        &self,
        document: &mut Document,
        result: &mut ProcessingResult,
    ) -> Result<ChangeLog> {
        let path = document.file_path.clone();
        let timeout = self.context.config.processing.document_timeout();

        let rewritten = tokio::time::timeout(timeout, self.transform(&path, result))
            .await
            .map_err(|_| {
                PipelineError::DocumentTimeout(self.context.config.processing.document_timeout_secs)
            })??;

        self.context.cancel.check()?;
        if rewritten.package.is_modified() {
            let package = rewritten.package;
            let target = path.clone();
            tokio::task::spawn_blocking(move || package.save(&target))
                .await
                .map_err(|e| join_error("save", e))??;
            debug!("Saved {}", path.display());
        } else {
            debug!("{} needed no changes", path.display());
        }

        let mut hyperlinks = rewritten.extraction.hyperlinks;
        hyperlinks.extend(rewritten.extraction.invisible_hyperlinks);
        document.hyperlinks = hyperlinks;
        result.update = Some(rewritten.update);

        let mut changelog = ChangeLog::new();
        changelog.extend(rewritten.changes);
        Ok(changelog)
    }

    async fn transform(&self, path: &Path, result: &mut ProcessingResult) -> Result<Rewritten> {
        self.enter(path, result, ProcessingStage::Extracting)?;
        let (package, extraction) = tokio::task::spawn_blocking({
            let extractor = self.context.extractor.clone();
            let path = path.to_path_buf();
            move || -> Result<(DocxPackage, ExtractionResult)> {
                let package = DocxPackage::open(&path)?;
                let extraction = extractor.extract(&package);
                Ok((package, extraction))
            }
        })
        .await
        .map_err(|e| join_error("extraction", e))??;
        result.extraction = Some(extraction.stats.clone());

        self.enter(path, result, ProcessingStage::LookingUp)?;
        let lookup = if extraction.unique_lookup_ids.is_empty() {
            debug!("{} has no lookup ids", path.display());
            LookupResult::empty()
        } else {
            self.context
                .metadata
                .lookup(&extraction.unique_lookup_ids, &self.context.cancel)
                .await?
        };
        result.lookup = Some(lookup.clone());

        self.enter(path, result, ProcessingStage::Rewriting)?;
        let config = self.context.config.clone();
        tokio::task::spawn_blocking(move || rewrite_package(&config, package, extraction, &lookup))
            .await
            .map_err(|e| join_error("rewrite", e))?
    }

    /// Best-effort: a failed changelog write never reverts a saved document.
    async fn log_changes(
        &self,
        document: &mut Document,
        mut result: ProcessingResult,
        changelog: ChangeLog,
    ) -> ProcessingResult {
        let path = document.file_path.clone();
        result.stages.push(ProcessingStage::LoggingChanges);
        self.context.emit(ProgressEvent::Document {
            path: path.clone(),
            stage: ProcessingStage::LoggingChanges,
            percent: ProcessingStage::LoggingChanges.percent(),
        });

        result.changes = changelog.len();
        info!("{}: {}", document.file_name, changelog.summary());
        result.outcome = ProcessingOutcome::Completed;

        if let Some(directory) = &self.context.config.processing.changelog_dir {
            match write_changelog(directory, &path, &changelog).await {
                Ok(written) => result.changelog_path = Some(written),
                Err(err) => {
                    warn!("Failed to write changelog for {}: {}", path.display(), err);
                    result.warnings.push(format!("changelog not written: {}", err));
                    result.outcome = ProcessingOutcome::CompletedWithErrors;
                }
            }
        }

        document.changelog = changelog;
        result.stages.push(ProcessingStage::Completed);
        self.context.emit(ProgressEvent::Document {
            path,
            stage: ProcessingStage::Completed,
            percent: 100,
        });
        result
    }

    /// Result for a unit whose task died, restoring the backup it left behind.
    pub async fn salvage(
        &self,
        mut document: Document,
        backup: Option<BackupInfo>,
        err: PipelineError,
    ) -> (Document, ProcessingResult) {
        let mut result = ProcessingResult::new(document.path());
        let result = match backup {
            None => self.abandon(&mut document, result, err),
            Some(backup) => {
                document.backup = Some(backup.clone());
                result.backup = Some(backup.clone());
                self.recover(&mut document, result, &backup, err).await
            }
        };
        document.finish(result.outcome.document_status());
        (document, result)
    }

    /// Failure before a backup exists: nothing to restore.
    fn abandon(&self, document: &mut Document, mut result: ProcessingResult, err: PipelineError) -> ProcessingResult {
        document.record_error(&err);
        result.set_error(&err);

        if matches!(err, PipelineError::Cancelled) {
            info!("{} cancelled before processing began", document.file_name);
            result.outcome = ProcessingOutcome::Cancelled;
        } else {
            warn!("{} failed: {}", document.file_name, err);
            result.stages.push(ProcessingStage::Failed);
            result.outcome = ProcessingOutcome::Failed;
        }
        result
    }

    /// Failure after the backup: restore the original, keep the first error.
    async fn recover(
        &self,
        document: &mut Document,
        mut result: ProcessingResult,
        backup: &BackupInfo,
        err: PipelineError,
    ) -> ProcessingResult {
        let cancelled = matches!(err, PipelineError::Cancelled);
        document.record_error(&err);
        result.set_error(&err);
        if cancelled {
            info!("{} cancelled, restoring original", document.file_name);
        } else {
            warn!("{} failed: {}", document.file_name, err);
            result.stages.push(ProcessingStage::Failed);
        }

        let restored = tokio::task::spawn_blocking({
            let manager = self.context.backups.clone();
            let backup = backup.clone();
            move || manager.restore(&backup, None)
        })
        .await
        .map_err(|e| join_error("restore", e))
        .and_then(|restored| restored);

        match restored {
            Ok(_) => {
                result.rolled_back = true;
                result.stages.push(ProcessingStage::RolledBack);
                result.outcome = if cancelled {
                    ProcessingOutcome::Cancelled
                } else {
                    ProcessingOutcome::Recovered
                };
            }
            Err(restore_err) => {
                error!(
                    "Failed to restore {} from {}: {}",
                    document.file_name,
                    backup.backup_path.display(),
                    restore_err
                );
                result.warnings.push(format!("restore failed: {}", restore_err));
                result.outcome = if cancelled {
                    ProcessingOutcome::Cancelled
                } else {
                    ProcessingOutcome::Failed
                };
            }
        }

        self.context.emit(ProgressEvent::Document {
            path: document.file_path.clone(),
            stage: *result.stages.last().unwrap_or(&ProcessingStage::Failed),
            percent: 100,
        });
        result
    }
}

async fn write_changelog(directory: &Path, document: &Path, changelog: &ChangeLog) -> Result<PathBuf> {
    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|e| PipelineError::file_operation(directory, e))?;

    let stem = document
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let path = directory.join(format!("{}.changelog.json", stem));

    tokio::fs::write(&path, changelog.to_json()?)
        .await
        .map_err(|e| PipelineError::file_operation(&path, e))?;
    Ok(path)
}
