// file: src/extractor/hyperlinks.rs
// description: hyperlink extraction across body, headers, footers, notes and text boxes
// reference: ooxml hyperlink relationships

use crate::docx::{ContentPart, DocxPackage, HyperlinkSpan};
use crate::error::{PipelineError, Result};
use crate::extractor::patterns::{
    self, StatusMarker, extract_content_id, extract_lookup_id_with, status_marker,
};
use crate::models::{Hyperlink, HyperlinkAction, HyperlinkLocation, HyperlinkStatus};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total: usize,
    pub visible: usize,
    pub invisible: usize,
    pub in_text_boxes: usize,
    pub with_lookup_id: usize,
    pub unique_lookup_ids: usize,
    pub with_content_id: usize,
    pub with_status_marker: usize,
    pub by_part: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub hyperlinks: Vec<Hyperlink>,
    pub invisible_hyperlinks: Vec<Hyperlink>,
    pub unique_lookup_ids: BTreeSet<String>,
    pub stats: ExtractionStats,
}

impl ExtractionResult {
    pub fn with_lookup_id<'a>(&'a self, lookup_id: &'a str) -> impl Iterator<Item = &'a Hyperlink> + 'a {
        self.hyperlinks.iter().filter(move |link| {
            link.lookup_id
                .as_deref()
                .is_some_and(|id| id.eq_ignore_ascii_case(lookup_id))
        })
    }

    pub fn all_hyperlinks(&self) -> impl Iterator<Item = &Hyperlink> {
        self.hyperlinks.iter().chain(self.invisible_hyperlinks.iter())
    }
}

pub struct HyperlinkExtractor {
    lookup_pattern: Regex,
}

impl Default for HyperlinkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperlinkExtractor {
    pub fn new() -> Self {
        Self {
            lookup_pattern: patterns::LOOKUP_ID.clone(),
        }
    }

    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let lookup_pattern = Regex::new(pattern)
            .map_err(|e| PipelineError::Config(format!("invalid lookup id pattern: {}", e)))?;
        Ok(Self { lookup_pattern })
    }

    pub fn extract_lookup_id(&self, target: &str) -> Option<String> {
        extract_lookup_id_with(&self.lookup_pattern, target)
    }

    /// Read-only walk over every content part of the package.
    pub fn extract(&self, package: &DocxPackage) -> ExtractionResult {
        let mut result = ExtractionResult::default();

        for part in package.parts() {
            let layout = part.xml.layout();
            *result
                .stats
                .by_part
                .entry(part.kind.to_string())
                .or_insert(0) += layout.hyperlinks.len();

            for (ordinal, span) in layout.hyperlinks.iter().enumerate() {
                let hyperlink = self.build_hyperlink(part, span, ordinal);
                result.stats.total += 1;
                if hyperlink.location.in_text_box {
                    result.stats.in_text_boxes += 1;
                }

                if hyperlink.is_invisible() {
                    result.stats.invisible += 1;
                    result.invisible_hyperlinks.push(hyperlink);
                    continue;
                }

                result.stats.visible += 1;
                if hyperlink.content_id.is_some() {
                    result.stats.with_content_id += 1;
                }
                if hyperlink.has_status_marker() {
                    result.stats.with_status_marker += 1;
                }
                if let Some(id) = &hyperlink.lookup_id {
                    result.stats.with_lookup_id += 1;
                    result.unique_lookup_ids.insert(id.clone());
                }
                result.hyperlinks.push(hyperlink);
            }
        }

        result.stats.unique_lookup_ids = result.unique_lookup_ids.len();

        debug!(
            "Extracted {} hyperlinks ({} invisible, {} unique lookup ids) from {}",
            result.stats.total,
            result.stats.invisible,
            result.stats.unique_lookup_ids,
            package.source().display()
        );

        result
    }

    fn build_hyperlink(&self, part: &ContentPart, span: &HyperlinkSpan, ordinal: usize) -> Hyperlink {
        let relationship = span
            .relationship_id
            .as_deref()
            .and_then(|id| part.relationship(id))
            .filter(|rel| rel.is_hyperlink());

        let (address, fragment) = match &relationship {
            Some(rel) => match rel.target.split_once('#') {
                Some((address, fragment)) => (address.to_string(), Some(fragment.to_string())),
                None => (rel.target.clone(), None),
            },
            None => (String::new(), None),
        };

        let sub_address = fragment
            .or_else(|| span.anchor.clone())
            .or_else(|| span.doc_location.clone())
            .filter(|s| !s.is_empty());

        let status = match (&span.relationship_id, &relationship) {
            (Some(_), None) => HyperlinkStatus::Invalid,
            (None, _) if sub_address.is_none() => HyperlinkStatus::Invalid,
            _ => HyperlinkStatus::Valid,
        };

        let display_text = part.xml.joined_text(&span.slots);
        let marker = status_marker(&display_text);

        let mut hyperlink = Hyperlink {
            relationship_id: span.relationship_id.clone(),
            display_text,
            address,
            sub_address,
            lookup_id: None,
            content_id: None,
            has_expired_marker: marker == Some(StatusMarker::Expired),
            has_not_found_marker: marker == Some(StatusMarker::NotFound),
            status,
            action: HyperlinkAction::None,
            location: HyperlinkLocation {
                part_name: part.name().to_string(),
                part_kind: part.kind,
                ordinal,
                in_text_box: span.in_text_box,
            },
        };

        hyperlink.lookup_id = self.extract_lookup_id(&hyperlink.full_target());
        hyperlink.content_id = extract_content_id(&hyperlink.display_text);
        hyperlink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::test_support::{
        DocxBuilder, paragraph, paragraph_with_invisible_link, paragraph_with_link,
    };
    use crate::models::PartKind;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn package(builder: DocxBuilder) -> DocxPackage {
        DocxPackage::from_bytes(&builder.to_bytes(), Path::new("test.docx")).unwrap()
    }

    #[test]
    fn test_extracts_from_all_parts() {
        let builder = DocxBuilder::new()
            .body(&paragraph("Intro"))
            .body(&paragraph_with_link("rId5", "Travel Policy"))
            .link("rId5", "https://example.com/TSRC-PROD-123456/page")
            .header(
                &paragraph_with_link("rId1", "Header Policy (654321)"),
                &[("rId1", "https://example.com/view?docid=doc-411364-329")],
            )
            .footer(
                &paragraph_with_link("rId1", "Footer Policy - Expired"),
                &[("rId1", "https://example.com/cms-hr-000123")],
            );

        let result = HyperlinkExtractor::new().extract(&package(builder));

        assert_eq!(result.hyperlinks.len(), 3);
        let ids: Vec<&str> = result.unique_lookup_ids.iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["CMS-HR-000123", "TSRC-PROD-123456", "doc-411364-329"]);

        let header = &result.hyperlinks[1];
        assert_eq!(header.location.part_kind, PartKind::Header);
        assert_eq!(header.content_id.as_deref(), Some("654321"));

        let footer = &result.hyperlinks[2];
        assert!(footer.has_expired_marker);
        assert_eq!(result.stats.with_status_marker, 1);
        assert_eq!(result.stats.with_content_id, 1);
        assert_eq!(result.stats.by_part["header"], 1);
    }

    #[test]
    fn test_invisible_links_are_excluded_from_lookup() {
        let builder = DocxBuilder::new()
            .body(&paragraph_with_invisible_link("rId7"))
            .body(&paragraph_with_link("rId8", "Visible"))
            .link("rId7", "https://example.com/TSRC-HIDDEN-111111")
            .link("rId8", "https://example.com/TSRC-SHOWN-222222");

        let result = HyperlinkExtractor::new().extract(&package(builder));

        assert_eq!(result.invisible_hyperlinks.len(), 1);
        assert_eq!(result.stats.invisible, 1);
        assert_eq!(result.stats.visible, 1);
        assert!(result.unique_lookup_ids.contains("TSRC-SHOWN-222222"));
        assert!(!result.unique_lookup_ids.contains("TSRC-HIDDEN-111111"));
        assert_eq!(result.all_hyperlinks().count(), 2);
    }

    #[test]
    fn test_fragment_becomes_sub_address() {
        let builder = DocxBuilder::new()
            .body(&paragraph_with_link("rId5", "Anchor link"))
            .link("rId5", "https://docs.example.com/library/#!/view?docid=TSRC-LIB-445566");

        let result = HyperlinkExtractor::new().extract(&package(builder));
        let link = &result.hyperlinks[0];

        assert_eq!(link.address, "https://docs.example.com/library/");
        assert_eq!(link.sub_address.as_deref(), Some("!/view?docid=TSRC-LIB-445566"));
        assert_eq!(link.lookup_id.as_deref(), Some("TSRC-LIB-445566"));
    }

    #[test]
    fn test_unresolved_relationship_is_invalid() {
        let builder = DocxBuilder::new().body(&paragraph_with_link("rId404", "Dangling"));

        let result = HyperlinkExtractor::new().extract(&package(builder));
        assert_eq!(result.hyperlinks[0].status, HyperlinkStatus::Invalid);
        assert!(result.hyperlinks[0].lookup_id.is_none());
    }

    #[test]
    fn test_image_relationship_is_invalid() {
        let builder = DocxBuilder::new()
            .body(&paragraph_with_link("rId7", "Org chart TSRC-PROD-123456"))
            .relationship(
                "rId7",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image",
                "media/TSRC-PROD-123456.png",
            );

        let result = HyperlinkExtractor::new().extract(&package(builder));
        let link = &result.hyperlinks[0];
        assert_eq!(link.status, HyperlinkStatus::Invalid);
        assert!(link.address.is_empty());
        assert!(link.lookup_id.is_none());
        assert!(result.unique_lookup_ids.is_empty());
    }

    #[test]
    fn test_custom_pattern() {
        let extractor = HyperlinkExtractor::with_pattern(r"(?i)\bKB-\d{4}\b").unwrap();
        assert_eq!(extractor.extract_lookup_id("https://x/kb-1234").as_deref(), Some("KB-1234"));
        assert!(HyperlinkExtractor::with_pattern("(").is_err());
    }

    #[test]
    fn test_extraction_does_not_mutate() {
        let builder = DocxBuilder::new()
            .body(&paragraph_with_link("rId5", "Travel Policy"))
            .link("rId5", "https://example.com/TSRC-PROD-123456");
        let package = package(builder);

        HyperlinkExtractor::new().extract(&package);
        assert!(!package.is_modified());
    }
}
