// file: src/pipeline/scheduler.rs
// description: bounded-concurrency batch runner over the document orchestrator
// reference: semaphore plus buffer_unordered fan-out with per-task panic isolation

use crate::backup::UndoSession;
use crate::error::PipelineError;
use crate::models::Document;
use crate::pipeline::orchestrator::{BackupSlot, ProcessingOrchestrator, ProcessingResult};
use crate::pipeline::progress::{BatchStats, ProgressEvent, ProgressTracker};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

#[derive(Debug)]
pub struct BatchResult {
    /// Documents in submission order.
    pub documents: Vec<Document>,
    /// Results in submission order.
    pub results: Vec<ProcessingResult>,
    pub stats: BatchStats,
    /// Every backup taken in this batch.
    pub session: UndoSession,
}

pub struct BatchScheduler {
    orchestrator: Arc<ProcessingOrchestrator>,
    tracker: Option<Arc<ProgressTracker>>,
}

impl BatchScheduler {
    pub fn new(orchestrator: ProcessingOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            tracker: None,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<ProgressTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn orchestrator(&self) -> &ProcessingOrchestrator {
        &self.orchestrator
    }

    pub async fn process_batch(&self, documents: Vec<Document>, max_concurrency: usize) -> BatchResult {
        let started = Instant::now();
        let total = documents.len();
        let max_concurrency = max_concurrency.max(1);
        info!(
            "Processing {} documents with {} concurrent tasks",
            total, max_concurrency
        );

        let semaphore = Arc::new(Semaphore::new(max_concurrency));
        let completed = Arc::new(AtomicUsize::new(0));

        let tasks = documents.into_iter().enumerate().map(|(index, document)| {
            let semaphore = semaphore.clone();
            let orchestrator = self.orchestrator.clone();
            let tracker = self.tracker.clone();
            let completed = completed.clone();

            async move {
                let fallback = document.clone();
                let slot = BackupSlot::new();
                let permit = semaphore.acquire_owned().await.ok();

                let handle = tokio::spawn({
                    let slot = slot.clone();
                    async move {
                        let mut document = document;
                        let result = orchestrator.process_with_slot(&mut document, &slot).await;
                        (document, result)
                    }
                });
                let joined = handle.await;

                let (document, result) = match joined {
                    Ok(finished) => finished,
                    Err(e) => {
                        error!("Processing task for {} panicked: {}", fallback.file_name, e);
                        let err = PipelineError::Content(format!("processing task aborted: {}", e));
                        self.orchestrator
                            .salvage(fallback, slot.take().await, err)
                            .await
                    }
                };
                drop(permit);

                let done = match &tracker {
                    Some(tracker) => {
                        tracker.set_message(format!("Finished {}", document.file_name));
                        tracker.record(result.outcome)
                    }
                    None => completed.fetch_add(1, Ordering::SeqCst) + 1,
                };
                self.orchestrator
                    .context()
                    .emit(ProgressEvent::batch(done, total));

                (index, document, result)
            }
        });

        let mut finished: Vec<(usize, Document, ProcessingResult)> = stream::iter(tasks)
            .buffer_unordered(max_concurrency)
            .collect()
            .await;
        finished.sort_by_key(|(index, _, _)| *index);

        let mut session = UndoSession::new();
        let mut documents = Vec::with_capacity(total);
        let mut results = Vec::with_capacity(total);
        for (_, document, result) in finished {
            if let Some(backup) = &result.backup {
                session.record(backup.clone());
            }
            documents.push(document);
            results.push(result);
        }

        let stats = BatchStats::from_results(&results, started.elapsed().as_secs());
        log_batch_summary(&stats);

        BatchResult {
            documents,
            results,
            stats,
            session,
        }
    }
}

fn log_batch_summary(stats: &BatchStats) {
    info!("=== Batch Summary ===");
    info!("Documents: {}", stats.total);
    info!("Succeeded: {}", stats.succeeded);
    info!("Failed: {} ({} restored)", stats.failed, stats.recovered);
    if stats.cancelled > 0 {
        warn!("Cancelled: {}", stats.cancelled);
    }
    info!("Success rate: {:.1}%", stats.success_rate());
    info!(
        "Duration: {} seconds ({:.2} documents/sec)",
        stats.duration_secs,
        stats.documents_per_second()
    );
}
