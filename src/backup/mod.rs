// file: src/backup/mod.rs
// description: backup, restore and undo session module exports
// reference: internal module structure

pub mod manager;
pub mod session;

pub use manager::{BackupInfo, BackupManager, CleanupResult, RestoreResult, compute_file_hash};
pub use session::{RevertReport, UndoSession};
