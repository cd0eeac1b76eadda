// file: src/pipeline/progress.rs
// description: batch progress tracking, outcome counters and progress events
// reference: uses indicatif for progress bars and tracks processing metrics

use crate::pipeline::orchestrator::{ProcessingOutcome, ProcessingResult, ProcessingStage};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Emitted per document stage and per finished batch unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProgressEvent {
    Document {
        path: PathBuf,
        stage: ProcessingStage,
        percent: u8,
    },
    Batch {
        completed: usize,
        total: usize,
        percent: u8,
    },
}

impl ProgressEvent {
    pub fn batch(completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100
        } else {
            ((completed * 100) / total).min(100) as u8
        };
        ProgressEvent::Batch {
            completed,
            total,
            percent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Failed documents whose original file was restored from backup.
    pub recovered: usize,
    pub duration_secs: u64,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_results(results: &[ProcessingResult], duration_secs: u64) -> Self {
        let mut stats = BatchStats {
            total: results.len(),
            duration_secs,
            ..Self::default()
        };
        for result in results {
            stats.count(result.outcome);
        }
        stats
    }

    fn count(&mut self, outcome: ProcessingOutcome) {
        match outcome {
            ProcessingOutcome::Completed | ProcessingOutcome::CompletedWithErrors => {
                self.succeeded += 1
            }
            ProcessingOutcome::Failed => self.failed += 1,
            ProcessingOutcome::Recovered => {
                self.failed += 1;
                self.recovered += 1;
            }
            ProcessingOutcome::Cancelled => self.cancelled += 1,
        }
    }

    pub fn documents_per_second(&self) -> f64 {
        if self.duration_secs == 0 {
            return 0.0;
        }
        self.total as f64 / self.duration_secs as f64
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / self.total as f64) * 100.0
    }
}

pub struct ProgressTracker {
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
    total: usize,
    succeeded: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
    recovered: Arc<AtomicUsize>,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total_documents: usize) -> Self {
        Self::with_color(total_documents, true)
    }

    pub fn with_color(total_documents: usize, colored: bool) -> Self {
        let multi_progress = MultiProgress::new();

        let main_bar = create_progress_bar(&multi_progress, total_documents as u64, colored);
        let detail_bar = create_detail_bar(&multi_progress);

        Self::from_bars(main_bar, detail_bar, total_documents)
    }

    /// Counts outcomes without drawing anything.
    pub fn hidden(total_documents: usize) -> Self {
        let multi_progress = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let main_bar = multi_progress.add(ProgressBar::new(total_documents as u64));
        let detail_bar = multi_progress.add(ProgressBar::new(0));
        Self::from_bars(main_bar, detail_bar, total_documents)
    }

    fn from_bars(main_bar: ProgressBar, detail_bar: ProgressBar, total: usize) -> Self {
        Self {
            main_bar,
            detail_bar,
            total,
            succeeded: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicUsize::new(0)),
            recovered: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Records one finished unit and returns the number completed so far.
    pub fn record(&self, outcome: ProcessingOutcome) -> usize {
        match outcome {
            ProcessingOutcome::Completed | ProcessingOutcome::CompletedWithErrors => {
                self.succeeded.fetch_add(1, Ordering::SeqCst);
            }
            ProcessingOutcome::Failed => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
            ProcessingOutcome::Recovered => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                self.recovered.fetch_add(1, Ordering::SeqCst);
            }
            ProcessingOutcome::Cancelled => {
                self.cancelled.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.main_bar.inc(1);
        self.update_detail_bar();
        self.completed()
    }

    pub fn completed(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
            + self.failed.load(Ordering::SeqCst)
            + self.cancelled.load(Ordering::SeqCst)
    }

    pub fn set_message(&self, message: String) {
        self.detail_bar.set_message(message);
    }

    pub fn finish(&self) {
        self.main_bar.finish_with_message("Processing complete");
        self.detail_bar.finish_and_clear();
    }

    pub fn get_stats(&self) -> BatchStats {
        BatchStats {
            total: self.total,
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            cancelled: self.cancelled.load(Ordering::SeqCst),
            recovered: self.recovered.load(Ordering::SeqCst),
            duration_secs: self.start_time.elapsed().as_secs(),
        }
    }

    fn update_detail_bar(&self) {
        let message = format!(
            "Succeeded: {} | Failed: {} | Recovered: {} | Cancelled: {}",
            self.succeeded.load(Ordering::SeqCst),
            self.failed.load(Ordering::SeqCst),
            self.recovered.load(Ordering::SeqCst),
            self.cancelled.load(Ordering::SeqCst)
        );
        self.detail_bar.set_message(message);
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}

fn create_progress_bar(multi_progress: &MultiProgress, total: u64, colored: bool) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(total));
    if colored {
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
                )
                .expect("Failed to create progress bar template")
                .progress_chars("█▓▒░"),
        );
    } else {
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({eta}) {msg}")
                .expect("Failed to create progress bar template")
                .progress_chars("=>-"),
        );
    }
    bar
}

fn create_detail_bar(multi_progress: &MultiProgress) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(0));
    let style = ProgressStyle::default_bar()
        .template("{msg}")
        .expect("Failed to create detail bar template");
    bar.set_style(style);
    bar
}
