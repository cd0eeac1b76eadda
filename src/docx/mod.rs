// file: src/docx/mod.rs
// description: word-processing package access module exports
// reference: internal module structure

pub mod package;
pub mod relationships;
pub mod xml;

#[cfg(test)]
pub(crate) mod test_support;

pub use package::{ContentPart, DocxPackage, MAIN_PART};
pub use relationships::{Relationship, Relationships};
pub use xml::{HyperlinkSpan, PartLayout, TextEdit, TextSlot, XmlPart};
