// file: src/backup/manager.rs
// description: hash-verified document backups, verified restores and retention cleanup
// reference: https://docs.rs/sha2

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const HASH_BUFFER_SIZE: usize = 64 * 1024;
const RESTORE_POINT_DIR: &str = "restore_points";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub content_hash: String,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResult {
    pub target_path: PathBuf,
    /// Copy of whatever occupied the target before the restore.
    pub restore_point: Option<PathBuf>,
    pub restored_hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupResult {
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub bytes_freed: u64,
}

/// Streams a file through SHA-256 and returns the lowercase hex digest.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).map_err(|e| PipelineError::file_operation(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| PipelineError::file_operation(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    directory: PathBuf,
}

impl BackupManager {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn timestamped_name(path: &Path, created_at: DateTime<Utc>) -> String {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let name = format!(
            "{}_{}_{}",
            stem,
            created_at.format("%Y%m%d_%H%M%S_%6f"),
            &suffix[..8]
        );
        match path.extension() {
            Some(ext) => format!("{}.{}", name, ext.to_string_lossy()),
            None => name,
        }
    }

    pub fn create_backup(&self, path: &Path) -> Result<BackupInfo> {
        fs::create_dir_all(&self.directory)
            .map_err(|e| PipelineError::file_operation(&self.directory, e))?;

        let created_at = Utc::now();
        let backup_path = self.directory.join(Self::timestamped_name(path, created_at));

        copy_durably(path, &backup_path)?;

        let source_hash = compute_file_hash(path)?;
        let backup_hash = match compute_file_hash(&backup_path) {
            Ok(hash) => hash,
            Err(e) => {
                let _ = fs::remove_file(&backup_path);
                return Err(e);
            }
        };

        if source_hash != backup_hash {
            warn!(
                "Backup of {} does not match its source, discarding {}",
                path.display(),
                backup_path.display()
            );
            let _ = fs::remove_file(&backup_path);
            return Err(PipelineError::StorageIntegrity {
                path: backup_path,
                expected: source_hash,
                actual: backup_hash,
            });
        }

        debug!("Backed up {} to {}", path.display(), backup_path.display());
        Ok(BackupInfo {
            original_path: path.to_path_buf(),
            backup_path,
            created_at,
            content_hash: source_hash,
            verified: true,
        })
    }

    /// Copies the backup over `target` (default: the original path). The
    /// backup is verified first; on mismatch the target is not touched.
    pub fn restore(&self, info: &BackupInfo, target: Option<&Path>) -> Result<RestoreResult> {
        let target = target.unwrap_or(&info.original_path);

        let actual = compute_file_hash(&info.backup_path)?;
        if actual != info.content_hash {
            return Err(PipelineError::StorageIntegrity {
                path: info.backup_path.clone(),
                expected: info.content_hash.clone(),
                actual,
            });
        }

        let restore_point = if target.exists() {
            Some(self.capture_restore_point(target)?)
        } else {
            None
        };

        let outcome = copy_durably(&info.backup_path, target)
            .and_then(|_| compute_file_hash(target))
            .and_then(|restored| {
                if restored == info.content_hash {
                    Ok(restored)
                } else {
                    Err(PipelineError::StorageIntegrity {
                        path: target.to_path_buf(),
                        expected: info.content_hash.clone(),
                        actual: restored,
                    })
                }
            });

        match outcome {
            Ok(restored_hash) => {
                info!("Restored {} from {}", target.display(), info.backup_path.display());
                Ok(RestoreResult {
                    target_path: target.to_path_buf(),
                    restore_point,
                    restored_hash,
                })
            }
            Err(err) => {
                if let Some(point) = &restore_point
                    && let Err(rollback) = copy_durably(point, target)
                {
                    warn!(
                        "Failed to roll back {} from restore point {}: {}",
                        target.display(),
                        point.display(),
                        rollback
                    );
                }
                Err(err)
            }
        }
    }

    fn capture_restore_point(&self, target: &Path) -> Result<PathBuf> {
        let directory = self.directory.join(RESTORE_POINT_DIR);
        fs::create_dir_all(&directory).map_err(|e| PipelineError::file_operation(&directory, e))?;
        let point = directory.join(Self::timestamped_name(target, Utc::now()));
        fs::copy(target, &point).map_err(|e| PipelineError::file_operation(&point, e))?;
        Ok(point)
    }

    /// Deletes backups older than `retention_days`. Per-file failures are
    /// collected rather than aborting the sweep.
    pub fn cleanup(&self, retention_days: u32) -> CleanupResult {
        let mut result = CleanupResult::default();
        if !self.directory.exists() {
            return result;
        }

        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(u64::from(retention_days) * 86_400))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        for entry in WalkDir::new(&self.directory)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let modified = metadata.modified().unwrap_or(SystemTime::now());
            if modified >= cutoff {
                continue;
            }

            match fs::remove_file(path) {
                Ok(()) => {
                    result.bytes_freed += metadata.len();
                    result.deleted.push(path.to_path_buf());
                }
                Err(e) => {
                    warn!("Failed to delete backup {}: {}", path.display(), e);
                    result.failed.push((path.to_path_buf(), e.to_string()));
                }
            }
        }

        info!(
            "Backup cleanup: {} deleted, {} failed, {} bytes freed",
            result.deleted.len(),
            result.failed.len(),
            result.bytes_freed
        );
        result
    }
}

/// Streams `source` into a sibling temp file of `destination`, syncs it and
/// renames it into place.
fn copy_durably(source: &Path, destination: &Path) -> Result<()> {
    let file_name = destination
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "backup".to_string());
    let temp_path =
        destination.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

    let copied = (|| -> io::Result<()> {
        let mut reader = fs::File::open(source)?;
        let mut writer = fs::File::create(&temp_path)?;
        io::copy(&mut reader, &mut writer)?;
        writer.flush()?;
        writer.sync_all()?;
        Ok(())
    })();

    if let Err(e) = copied {
        let _ = fs::remove_file(&temp_path);
        return Err(PipelineError::file_operation(source, e));
    }

    fs::rename(&temp_path, destination).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        PipelineError::file_operation(destination, e)
    })
}
