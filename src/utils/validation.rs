// file: src/utils/validation.rs
// description: pre-processing validation of document files and packages
// reference: input validation patterns

use crate::docx::MAIN_PART;
use crate::error::{PipelineError, Result};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, Read};
use std::path::Path;

const SUPPORTED_EXTENSIONS: [&str; 2] = ["docx", "docm"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentValidation {
    pub file_size: u64,
    pub entry_count: usize,
}

pub struct Validator;

impl Validator {
    pub fn validate_document_extension(path: &Path) -> Result<()> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext) => Ok(()),
            _ => Err(PipelineError::Validation(format!(
                "File is not a supported document (.docx/.docm): {}",
                path.display()
            ))),
        }
    }

    pub fn is_lock_file(path: &Path) -> bool {
        path.file_name()
            .map(|name| name.to_string_lossy().starts_with("~$"))
            .unwrap_or(false)
    }

    /// Checks path, extension, size and package structure without loading the whole document.
    pub fn validate_document(path: &Path, max_size_bytes: u64) -> Result<DocumentValidation> {
        if !path.exists() {
            return Err(PipelineError::Validation(format!(
                "File does not exist: {}",
                path.display()
            )));
        }

        if !path.is_file() {
            return Err(PipelineError::Validation(format!(
                "Path is not a file: {}",
                path.display()
            )));
        }

        if Self::is_lock_file(path) {
            return Err(PipelineError::Validation(format!(
                "File is an editor lock file: {}",
                path.display()
            )));
        }

        Self::validate_document_extension(path)?;

        let file_size = fs::metadata(path)
            .map_err(|e| PipelineError::file_operation(path, e))?
            .len();

        if file_size == 0 {
            return Err(PipelineError::Validation(format!(
                "File is empty: {}",
                path.display()
            )));
        }

        if max_size_bytes > 0 && file_size > max_size_bytes {
            return Err(PipelineError::Validation(format!(
                "File too large ({} bytes, limit {}): {}",
                file_size,
                max_size_bytes,
                path.display()
            )));
        }

        let file = fs::File::open(path).map_err(|e| PipelineError::file_operation(path, e))?;
        let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| {
            PipelineError::Validation(format!("Corrupt document package {}: {}", path.display(), e))
        })?;
        let entry_count = archive.len();

        let main = archive.by_name(MAIN_PART).map_err(|_| {
            PipelineError::Validation(format!(
                "Document package has no main part: {}",
                path.display()
            ))
        })?;

        if !Self::contains_body(main)? {
            return Err(PipelineError::Validation(format!(
                "Document has no body: {}",
                path.display()
            )));
        }

        Ok(DocumentValidation {
            file_size,
            entry_count,
        })
    }

    fn contains_body<R: Read>(main_part: R) -> Result<bool> {
        let mut reader = Reader::from_reader(BufReader::new(main_part));
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"w:body" => {
                    return Ok(true);
                }
                Ok(Event::Eof) => return Ok(false),
                Err(e) => {
                    return Err(PipelineError::Validation(format!(
                        "Main document part is not well-formed XML: {}",
                        e
                    )));
                }
                _ => {}
            }
            buf.clear();
        }
    }

    /// Absolute http(s) URL with a non-empty host.
    pub fn validate_url(url: &str) -> Result<()> {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"));
        let host = rest.and_then(|rest| rest.split(['/', '?', '#']).next());

        match host {
            Some(host) if !host.is_empty() && !host.contains(char::is_whitespace) => Ok(()),
            _ => Err(PipelineError::Validation(format!(
                "Invalid URL format: {}",
                url
            ))),
        }
    }
}
