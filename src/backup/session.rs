// file: src/backup/session.rs
// description: persistent undo session recording every backup taken during one batch run
// reference: https://docs.rs/tokio/latest/tokio/fs

use crate::backup::manager::{BackupInfo, BackupManager, RestoreResult};
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub entries: Vec<BackupInfo>,
}

#[derive(Debug, Default)]
pub struct RevertReport {
    pub restored: Vec<RestoreResult>,
    pub failed: Vec<(PathBuf, String)>,
}

impl RevertReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

impl Default for UndoSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, backup: BackupInfo) {
        self.entries.push(backup);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::file_operation(parent, e))?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)
            .await
            .map_err(|e| PipelineError::file_operation(path, e))?;

        debug!("Saved undo session {} with {} entries", self.id, self.entries.len());
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::file_operation(path, e))?;
        let session: UndoSession = serde_json::from_str(&contents)?;

        info!(
            "Loaded undo session {} ({} entries) from {}",
            session.id,
            session.entries.len(),
            path.display()
        );
        Ok(session)
    }

    /// Restores every recorded file, continuing past individual failures.
    pub fn revert(&self, manager: &BackupManager) -> RevertReport {
        let mut report = RevertReport::default();
        for backup in &self.entries {
            match manager.restore(backup, None) {
                Ok(result) => report.restored.push(result),
                Err(e) => {
                    warn!("Failed to revert {}: {}", backup.original_path.display(), e);
                    report
                        .failed
                        .push((backup.original_path.clone(), e.to_string()));
                }
            }
        }

        info!(
            "Reverted session {}: {} restored, {} failed",
            self.id,
            report.restored.len(),
            report.failed.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_session_persistence() {
        let dir = tempdir().unwrap();
        let session_path = dir.path().join("sessions").join("run.json");

        let mut session = UndoSession::new();
        session.record(BackupInfo {
            original_path: PathBuf::from("/docs/a.docx"),
            backup_path: PathBuf::from("/backups/a_1.docx"),
            created_at: Utc::now(),
            content_hash: "abc".to_string(),
            verified: true,
        });
        session.save(&session_path).await.unwrap();

        let loaded = UndoSession::load(&session_path).await.unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_session_fails() {
        let dir = tempdir().unwrap();
        let result = UndoSession::load(&dir.path().join("none.json")).await;
        assert!(matches!(result, Err(PipelineError::FileOperation { .. })));
    }

    #[test]
    fn test_revert_restores_all_and_collects_failures() {
        let dir = tempdir().unwrap();
        let manager = BackupManager::new(dir.path().join("backups"));

        let first = dir.path().join("first.docx");
        let second = dir.path().join("second.docx");
        std::fs::write(&first, b"first original").unwrap();
        std::fs::write(&second, b"second original").unwrap();

        let mut session = UndoSession::new();
        session.record(manager.create_backup(&first).unwrap());
        let second_backup = manager.create_backup(&second).unwrap();
        std::fs::remove_file(&second_backup.backup_path).unwrap();
        session.record(second_backup);

        std::fs::write(&first, b"first edited").unwrap();
        std::fs::write(&second, b"second edited").unwrap();

        let report = session.revert(&manager);

        assert_eq!(report.restored.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_complete());
        assert_eq!(std::fs::read(&first).unwrap(), b"first original");
        assert_eq!(std::fs::read(&second).unwrap(), b"second edited");
    }
}
