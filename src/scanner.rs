// file: src/scanner.rs
// description: discovers word-processing documents under files and directories
// reference: https://docs.rs/walkdir

use crate::error::{PipelineError, Result};
use crate::utils::validation::Validator;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default)]
pub struct DocumentScanner {
    skip_patterns: Vec<String>,
}

impl DocumentScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// `*.ext` matches a suffix, anything else matches a path substring.
    pub fn with_skip_patterns(mut self, patterns: Vec<String>) -> Self {
        self.skip_patterns = patterns;
        self
    }

    /// Expands `inputs` into a sorted, de-duplicated list of documents.
    /// Explicit files are kept so validation can report on them; directories
    /// are walked recursively for `.docx`/`.docm` files, skipping lock files.
    pub fn scan(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut found = BTreeSet::new();

        for input in inputs {
            if input.is_dir() {
                self.scan_directory(input, &mut found);
            } else if input.exists() {
                found.insert(input.clone());
            } else {
                return Err(PipelineError::Validation(format!(
                    "Input does not exist: {}",
                    input.display()
                )));
            }
        }

        info!("Found {} documents", found.len());
        Ok(found.into_iter().collect())
    }

    fn scan_directory(&self, root: &Path, found: &mut BTreeSet<PathBuf>) {
        info!("Scanning directory: {}", root.display());

        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if Validator::is_lock_file(path) || self.should_skip(path) {
                debug!("Skipping file: {}", path.display());
                continue;
            }

            if Validator::validate_document_extension(path).is_ok() {
                found.insert(path.to_path_buf());
            }
        }
    }

    fn should_skip(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();

        self.skip_patterns.iter().any(|pattern| match pattern.strip_prefix('*') {
            Some(suffix) => path_str.ends_with(suffix),
            None => path_str.contains(pattern.as_str()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_directory_finds_documents() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("a.docx"), b"x").unwrap();
        fs::write(temp.path().join("nested").join("b.DOCM"), b"x").unwrap();
        fs::write(temp.path().join("~$a.docx"), b"x").unwrap();
        fs::write(temp.path().join("notes.txt"), b"x").unwrap();

        let files = DocumentScanner::new()
            .scan(&[temp.path().to_path_buf()])
            .unwrap();

        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.docx"));
        assert!(files[1].ends_with("nested/b.DOCM"));
    }

    #[test]
    fn test_explicit_files_are_kept_and_deduplicated() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("report.pdf");
        fs::write(&file, b"x").unwrap();

        let files = DocumentScanner::new()
            .scan(&[file.clone(), file.clone()])
            .unwrap();
        assert_eq!(files, vec![file]);

        assert!(
            DocumentScanner::new()
                .scan(&[temp.path().join("missing.docx")])
                .is_err()
        );
    }

    #[test]
    fn test_skip_patterns() {
        let scanner =
            DocumentScanner::new().with_skip_patterns(vec!["*.docm".to_string(), "archive/".to_string()]);

        assert!(scanner.should_skip(Path::new("macro.docm")));
        assert!(scanner.should_skip(Path::new("archive/old.docx")));
        assert!(!scanner.should_skip(Path::new("current.docx")));
    }
}
