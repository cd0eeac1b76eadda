// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod changelog;
pub mod document;
pub mod hyperlink;
pub mod metadata;
pub mod rules;

pub use changelog::{ChangeEntry, ChangeLog, ChangeType};
pub use document::{Document, DocumentStatus, ProcessingError};
pub use hyperlink::{Hyperlink, HyperlinkAction, HyperlinkLocation, HyperlinkStatus, PartKind};
pub use metadata::{DocumentMetadata, LookupResult, MetadataStatus};
pub use rules::{HyperlinkReplacementRule, MatchMode, ReplacementRule, TextReplacementRule};
