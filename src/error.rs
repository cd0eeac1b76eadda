// file: src/error.rs
// description: pipeline error taxonomy and result type alias
// reference: https://docs.rs/thiserror

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage integrity error for {path}: expected hash {expected}, found {actual}")]
    StorageIntegrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Communication error with {endpoint} (status {}): {message}", format_status(.status))]
    Communication {
        endpoint: String,
        status: Option<u16>,
        body: Option<String>,
        message: String,
    },

    #[error("Content error: {0}")]
    Content(String),

    #[error("Processing cancelled")]
    Cancelled,

    #[error("Document processing exceeded {0} seconds")]
    DocumentTimeout(u64),

    #[error("File operation failed for {path}: {source}")]
    FileOperation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Export format not supported: {0}")]
    UnsupportedFormat(String),
}

fn format_status(status: &Option<u16>) -> String {
    status
        .map(|code| code.to_string())
        .unwrap_or_else(|| "none".to_string())
}

/// Coarse classification used by the orchestrator to pick a recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    StorageIntegrity,
    Communication,
    Content,
    Cancellation,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation(_) | PipelineError::Config(_) => ErrorKind::Validation,
            PipelineError::StorageIntegrity { .. }
            | PipelineError::FileOperation { .. }
            | PipelineError::Io(_) => ErrorKind::StorageIntegrity,
            PipelineError::Communication { .. } => ErrorKind::Communication,
            PipelineError::Cancelled => ErrorKind::Cancellation,
            PipelineError::Content(_)
            | PipelineError::DocumentTimeout(_)
            | PipelineError::Serialization(_)
            | PipelineError::UnsupportedFormat(_) => ErrorKind::Content,
        }
    }

    /// Only transport failures, throttling and server errors are retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Communication { status, .. } => match status {
                None => true,
                Some(code) => *code == 429 || *code >= 500,
            },
            _ => false,
        }
    }

    pub fn communication(endpoint: &str, message: impl Into<String>) -> Self {
        PipelineError::Communication {
            endpoint: endpoint.to_string(),
            status: None,
            body: None,
            message: message.into(),
        }
    }

    pub fn file_operation(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::FileOperation {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}
