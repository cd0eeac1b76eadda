// file: src/docx/package.rs
// description: zip package loading and atomic saving for word-processing documents
// reference: https://docs.rs/zip

use crate::docx::relationships::{Relationship, Relationships, rels_entry_name};
use crate::docx::xml::XmlPart;
use crate::error::{PipelineError, Result};
use crate::models::PartKind;
use std::fs;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MAIN_PART: &str = "word/document.xml";

/// An XML part that can carry hyperlinks, with its relationships.
#[derive(Debug, Clone)]
pub struct ContentPart {
    pub kind: PartKind,
    pub xml: XmlPart,
    pub rels: Option<Relationships>,
}

impl ContentPart {
    pub fn name(&self) -> &str {
        self.xml.name()
    }

    pub fn relationship(&self, id: &str) -> Option<Relationship> {
        self.rels.as_ref().and_then(|rels| rels.get(id))
    }

    pub fn is_dirty(&self) -> bool {
        self.xml.is_dirty() || self.rels.as_ref().is_some_and(|rels| rels.xml().is_dirty())
    }
}

#[derive(Debug, Clone)]
pub struct DocxPackage {
    source: PathBuf,
    entries: Vec<(String, Vec<u8>)>,
    parts: Vec<ContentPart>,
}

impl DocxPackage {
    pub fn open(path: &Path) -> Result<Self> {
        let file = fs::File::open(path).map_err(|e| PipelineError::file_operation(path, e))?;
        Self::from_reader(file, path)
    }

    pub fn from_bytes(bytes: &[u8], source: &Path) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes), source)
    }

    fn from_reader<R: Read + Seek>(reader: R, source: &Path) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader).map_err(|e| {
            PipelineError::Validation(format!(
                "{} is not a valid document package: {}",
                source.display(),
                e
            ))
        })?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(|e| {
                PipelineError::Validation(format!("corrupt package entry {}: {}", index, e))
            })?;
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| PipelineError::Validation(format!("corrupt package entry {}: {}", name, e)))?;
            entries.push((name, data));
        }

        let mut package = Self {
            source: source.to_path_buf(),
            entries,
            parts: Vec::new(),
        };
        package.load_parts()?;
        Ok(package)
    }

    fn load_parts(&mut self) -> Result<()> {
        if !self.entries.iter().any(|(name, _)| name == MAIN_PART) {
            return Err(PipelineError::Validation(format!(
                "{} has no main document part",
                self.source.display()
            )));
        }

        let mut parts = Vec::new();
        for (name, data) in &self.entries {
            let Some(kind) = PartKind::from_entry_name(name) else {
                continue;
            };
            let xml = XmlPart::parse(name, data)?;
            let rels_name = rels_entry_name(name);
            let rels = match self.entry(&rels_name) {
                Some(bytes) => Some(Relationships::parse(&rels_name, bytes)?),
                None => None,
            };
            parts.push(ContentPart { kind, xml, rels });
        }

        // Body first, then headers, footers and notes in package order.
        parts.sort_by_key(|part| part.kind != PartKind::Body);

        let main = &parts[0];
        if !main.xml.layout().has_body {
            return Err(PipelineError::Validation(format!(
                "{} has no document body",
                self.source.display()
            )));
        }

        debug!(
            "Loaded {} content parts from {}",
            parts.len(),
            self.source.display()
        );
        self.parts = parts;
        Ok(())
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, data)| data.as_slice())
    }

    pub fn parts(&self) -> &[ContentPart] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [ContentPart] {
        &mut self.parts
    }

    pub fn part_mut(&mut self, name: &str) -> Option<&mut ContentPart> {
        self.parts.iter_mut().find(|part| part.name() == name)
    }

    pub fn is_modified(&self) -> bool {
        self.parts.iter().any(ContentPart::is_dirty)
    }

    /// Serialises the package with edited parts substituted for their originals.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut replaced: Vec<(String, Vec<u8>)> = Vec::new();
        for part in &self.parts {
            if part.xml.is_dirty() {
                replaced.push((part.name().to_string(), part.xml.to_bytes()?));
            }
            if let Some(rels) = &part.rels
                && rels.xml().is_dirty()
            {
                replaced.push((rels.xml().name().to_string(), rels.xml().to_bytes()?));
            }
        }

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        let stored = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);

        for (name, data) in &self.entries {
            let data = replaced
                .iter()
                .find(|(replaced_name, _)| replaced_name == name)
                .map(|(_, bytes)| bytes.as_slice())
                .unwrap_or(data.as_slice());
            let options = if name.starts_with("word/media/") {
                stored
            } else {
                deflated
            };
            zip.start_file(name.as_str(), options)
                .map_err(|e| PipelineError::Content(format!("failed to write entry {}: {}", name, e)))?;
            zip.write_all(data)?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| PipelineError::Content(format!("failed to finish package: {}", e)))?;
        Ok(cursor.into_inner())
    }

    /// Writes to a sibling temp file and renames it over `path`, so readers
    /// never observe a half-written package.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

        let write_result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            Ok(())
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&temp_path);
            return Err(PipelineError::file_operation(&temp_path, e));
        }

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            PipelineError::file_operation(path, e)
        })?;

        debug!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}
