// file: src/pipeline/mod.rs
// description: pipeline module exports and public api
// reference: pipeline orchestration

pub mod cancellation;
pub mod orchestrator;
mod progress;
mod scheduler;

pub use cancellation::CancellationFlag;
pub use orchestrator::{
    BackupSlot, ProcessingContext, ProcessingOrchestrator, ProcessingOutcome, ProcessingResult,
    ProcessingStage,
};
pub use progress::{BatchStats, ProgressEvent, ProgressTracker};
pub use scheduler::{BatchResult, BatchScheduler};
