// file: src/extractor/mod.rs
// description: hyperlink and identifier extraction module exports
// reference: internal module structure

pub mod hyperlinks;
pub mod patterns;

pub use hyperlinks::{ExtractionResult, ExtractionStats, HyperlinkExtractor};
pub use patterns::{extract_content_id, extract_lookup_id, format_content_id};
