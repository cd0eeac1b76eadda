// file: src/rewrite/rewriter.rs
// description: applies metadata lookup results to hyperlink targets and display text
// reference: ooxml hyperlink relationships

use crate::config::FeatureFlags;
use crate::docx::{ContentPart, DocxPackage, HyperlinkSpan};
use crate::error::Result;
use crate::extractor::ExtractionResult;
use crate::extractor::patterns::{
    EXPIRED_MARKER, NOT_FOUND_MARKER, base_title, extract_content_id, format_content_id,
    status_marker, strip_status_marker,
};
use crate::models::{
    ChangeEntry, ChangeType, DocumentMetadata, Hyperlink, HyperlinkAction, HyperlinkStatus,
    LookupResult,
};
use crate::rewrite::url::build_target_url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateResult {
    pub updated: usize,
    pub expired: usize,
    pub not_found: usize,
    pub changes: Vec<ChangeEntry>,
}

impl UpdateResult {
    /// Advisory entries do not count as modifications.
    pub fn is_modified(&self) -> bool {
        self.changes
            .iter()
            .any(|change| change.change_type != ChangeType::PossibleTitleChange)
    }
}

pub struct DocumentRewriter {
    url_template: String,
    auto_replace_titles: bool,
    check_expired_content: bool,
}

impl DocumentRewriter {
    pub fn new(url_template: impl Into<String>, features: &FeatureFlags) -> Self {
        Self {
            url_template: url_template.into(),
            auto_replace_titles: features.auto_replace_titles,
            check_expired_content: features.check_expired_content,
        }
    }

    /// Mutates the in-memory package only; saving is left to the caller.
    pub fn rewrite(
        &self,
        package: &mut DocxPackage,
        extraction: &mut ExtractionResult,
        metadata: &LookupResult,
    ) -> Result<UpdateResult> {
        let mut result = UpdateResult::default();

        for part in package.parts_mut() {
            let part_name = part.name().to_string();
            let layout = part.xml.layout();

            for (ordinal, span) in layout.hyperlinks.iter().enumerate() {
                let Some(link) = extraction.hyperlinks.iter_mut().find(|link| {
                    link.location.part_name == part_name && link.location.ordinal == ordinal
                }) else {
                    continue;
                };
                let Some(lookup_id) = link.lookup_id.clone() else {
                    continue;
                };

                if let Some(found) = metadata.find_found(&lookup_id) {
                    self.apply_found(part, span, link, found, &mut result)?;
                } else if metadata.find_expired(&lookup_id).is_some() {
                    link.status = HyperlinkStatus::Expired;
                    result.expired += 1;
                    if self.check_expired_content && !link.has_expired_marker {
                        self.mark(part, span, link, EXPIRED_MARKER, &mut result);
                        link.has_expired_marker = true;
                        link.has_not_found_marker = false;
                    }
                } else if metadata.is_missing(&lookup_id) {
                    link.status = HyperlinkStatus::NotFound;
                    result.not_found += 1;
                    if !link.has_not_found_marker {
                        self.mark(part, span, link, NOT_FOUND_MARKER, &mut result);
                        link.has_not_found_marker = true;
                        link.has_expired_marker = false;
                    }
                }
            }
        }

        if result.is_modified() {
            info!(
                "Rewrote {} hyperlinks ({} expired, {} not found, {} changes)",
                result.updated,
                result.expired,
                result.not_found,
                result.changes.len()
            );
        } else {
            debug!(
                "No hyperlink rewrites needed ({} advisory entries)",
                result.changes.len()
            );
        }
        Ok(result)
    }

    fn apply_found(
        &self,
        part: &mut ContentPart,
        span: &HyperlinkSpan,
        link: &mut Hyperlink,
        found: &DocumentMetadata,
        result: &mut UpdateResult,
    ) -> Result<()> {
        let element = link.location.to_string();
        let mut changed = false;

        if !found.document_id.is_empty()
            && let Some(rel_id) = &span.relationship_id
            && let Some(rels) = part.rels.as_mut()
            && rels.get(rel_id).is_some_and(|rel| rel.is_hyperlink())
        {
            let target = build_target_url(&self.url_template, &found.document_id)?;
            let old_target = link.full_target();
            if old_target != target {
                rels.set_target(rel_id, &target)?;
                result.changes.push(
                    ChangeEntry::new(
                        ChangeType::HyperlinkUpdated,
                        &element,
                        format!("Target updated for {}", found.lookup_id),
                    )
                    .with_values(&old_target, &target),
                );
                match target.split_once('#') {
                    Some((address, fragment)) => {
                        link.address = address.to_string();
                        link.sub_address = Some(fragment.to_string());
                    }
                    None => {
                        link.address = target.clone();
                        link.sub_address = None;
                    }
                }
                changed = true;
            }
        }

        let display = part.xml.joined_text(&span.slots);
        let current_title = base_title(&display);
        let mut title = current_title.clone();

        if !found.title.is_empty() && !found.title.eq_ignore_ascii_case(&current_title) {
            if self.auto_replace_titles {
                result.changes.push(
                    ChangeEntry::new(ChangeType::TitleChanged, &element, "Title replaced with current title")
                        .with_values(&current_title, &found.title),
                );
                title = found.title.clone();
            } else {
                result.changes.push(
                    ChangeEntry::new(
                        ChangeType::PossibleTitleChange,
                        &element,
                        "Display title differs from current title",
                    )
                    .with_values(&current_title, &found.title),
                );
            }
        }

        let existing_id = extract_content_id(&display);
        let content_id = if found.content_id.is_empty() {
            existing_id.clone()
        } else {
            Some(format_content_id(&found.content_id))
        };
        if content_id.is_some() && content_id != existing_id {
            result.changes.push(
                ChangeEntry::new(
                    ChangeType::ContentIdAdded,
                    &element,
                    format!("Content ID added for {}", found.lookup_id),
                )
                .with_values(
                    existing_id.clone().unwrap_or_default(),
                    content_id.clone().unwrap_or_default(),
                ),
            );
        }

        if status_marker(&display).is_some() {
            result.changes.push(
                ChangeEntry::new(
                    ChangeType::HyperlinkUpdated,
                    &element,
                    "Stale status marker removed",
                )
                .with_values(&display, strip_status_marker(&display)),
            );
        }

        let new_display = match &content_id {
            Some(id) => format!("{} ({})", title, id),
            None => title,
        };
        if new_display != display {
            part.xml.set_joined_text(&span.slots, &new_display);
            link.display_text = new_display;
            changed = true;
        }

        link.content_id = content_id;
        link.has_expired_marker = false;
        link.has_not_found_marker = false;
        link.status = HyperlinkStatus::Valid;
        if changed {
            link.action = HyperlinkAction::Updated;
            result.updated += 1;
        }
        Ok(())
    }

    fn mark(
        &self,
        part: &mut ContentPart,
        span: &HyperlinkSpan,
        link: &mut Hyperlink,
        marker: &str,
        result: &mut UpdateResult,
    ) {
        let display = part.xml.joined_text(&span.slots);
        let new_display = format!("{}{}", strip_status_marker(&display).trim_end(), marker);
        part.xml.set_joined_text(&span.slots, &new_display);
        debug!("Marked {} as{}", link.location, marker);

        result.changes.push(
            ChangeEntry::new(
                ChangeType::HyperlinkStatusAdded,
                link.location.to_string(),
                format!("Status marker{} added", marker),
            )
            .with_values(&display, &new_display),
        );
        link.display_text = new_display;
        link.action = HyperlinkAction::Updated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::docx::test_support::{DocxBuilder, paragraph_with_link};
    use crate::extractor::HyperlinkExtractor;
    use crate::models::MetadataStatus;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    const TEMPLATE: &str = "https://docs.example.com/library/#!/view?docid={document_id}";

    fn meta(lookup_id: &str, title: &str, content_id: &str, status: MetadataStatus) -> DocumentMetadata {
        DocumentMetadata {
            lookup_id: lookup_id.to_string(),
            document_id: format!("DOC-{}", &lookup_id[lookup_id.len() - 6..]),
            content_id: content_id.to_string(),
            title: title.to_string(),
            status,
            author: None,
            last_modified: None,
        }
    }

    fn fixture() -> (DocxPackage, ExtractionResult) {
        let builder = DocxBuilder::new()
            .body(&paragraph_with_link("rId1", "Travel Policy"))
            .body(&paragraph_with_link("rId2", "Old Guide (654321)"))
            .body(&paragraph_with_link("rId3", "Gone Manual - Expired"))
            .link("rId1", "https://example.com/TSRC-PROD-123456")
            .link("rId2", "https://example.com/CMS-HR-654321")
            .link("rId3", "https://example.com/TSRC-GONE-000001");
        let package = DocxPackage::from_bytes(&builder.to_bytes(), Path::new("test.docx")).unwrap();
        let extraction = HyperlinkExtractor::new().extract(&package);
        (package, extraction)
    }

    fn displays(package: &DocxPackage) -> Vec<String> {
        let part = &package.parts()[0];
        part.xml
            .layout()
            .hyperlinks
            .iter()
            .map(|span| part.xml.joined_text(&span.slots))
            .collect()
    }

    fn rewriter(auto_replace_titles: bool) -> DocumentRewriter {
        let mut features = Config::default_config().features;
        features.auto_replace_titles = auto_replace_titles;
        DocumentRewriter::new(TEMPLATE, &features)
    }

    fn lookup() -> LookupResult {
        LookupResult {
            found: vec![meta("TSRC-PROD-123456", "Travel Policy", "12345", MetadataStatus::Released)],
            expired: vec![meta("CMS-HR-654321", "Old Guide", "654321", MetadataStatus::Expired)],
            missing: vec!["TSRC-GONE-000001".to_string()],
        }
    }

    #[test]
    fn test_rewrite_found_expired_and_missing() {
        let (mut package, mut extraction) = fixture();

        let result = rewriter(false).rewrite(&mut package, &mut extraction, &lookup()).unwrap();

        assert_eq!(
            displays(&package),
            vec![
                "Travel Policy (012345)",
                "Old Guide (654321) - Expired",
                "Gone Manual - Not Found",
            ]
        );
        assert_eq!(
            package.parts()[0].relationship("rId1").unwrap().target,
            "https://docs.example.com/library/#%21/view?docid=DOC-123456"
        );
        assert_eq!(result.updated, 1);
        assert_eq!(result.expired, 1);
        assert_eq!(result.not_found, 1);

        let types: Vec<ChangeType> = result.changes.iter().map(|c| c.change_type).collect();
        assert_eq!(
            types,
            vec![
                ChangeType::HyperlinkUpdated,
                ChangeType::ContentIdAdded,
                ChangeType::HyperlinkStatusAdded,
                ChangeType::HyperlinkStatusAdded,
            ]
        );
        assert_eq!(extraction.hyperlinks[0].action, HyperlinkAction::Updated);
        assert_eq!(extraction.hyperlinks[1].status, HyperlinkStatus::Expired);
        assert_eq!(extraction.hyperlinks[2].status, HyperlinkStatus::NotFound);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let (mut package, mut extraction) = fixture();
        let rewriter = rewriter(false);
        rewriter.rewrite(&mut package, &mut extraction, &lookup()).unwrap();
        let first = displays(&package);

        // The retargeted link now carries the document id as its lookup id.
        let mut second_pass = HyperlinkExtractor::new().extract(&package);
        assert_eq!(second_pass.hyperlinks[0].lookup_id.as_deref(), Some("DOC-123456"));
        let mut again = lookup();
        again
            .found
            .push(meta("DOC-123456", "Travel Policy", "12345", MetadataStatus::Released));

        let result = rewriter.rewrite(&mut package, &mut second_pass, &again).unwrap();

        assert_eq!(displays(&package), first);
        assert!(!result.is_modified());
    }

    #[test]
    fn test_title_change_requires_opt_in() {
        let mut renamed = lookup();
        renamed.found[0].title = "Travel and Expense Policy".to_string();

        let (mut package, mut extraction) = fixture();
        let result = rewriter(false).rewrite(&mut package, &mut extraction, &renamed).unwrap();
        assert!(result.changes.iter().any(|c| c.change_type == ChangeType::PossibleTitleChange));
        assert_eq!(displays(&package)[0], "Travel Policy (012345)");

        let (mut package, mut extraction) = fixture();
        let result = rewriter(true).rewrite(&mut package, &mut extraction, &renamed).unwrap();
        assert!(result.changes.iter().any(|c| c.change_type == ChangeType::TitleChanged));
        assert_eq!(displays(&package)[0], "Travel and Expense Policy (012345)");
    }

    #[test]
    fn test_possible_title_change_alone_is_not_a_modification() {
        let mut result = UpdateResult::default();
        result.changes.push(ChangeEntry::new(
            ChangeType::PossibleTitleChange,
            "word/document.xml#0",
            "Title differs from metadata",
        ));
        assert!(!result.is_modified());

        result.changes.push(ChangeEntry::new(
            ChangeType::ContentIdAdded,
            "word/document.xml#0",
            "Content ID added",
        ));
        assert!(result.is_modified());
    }

    #[test]
    fn test_found_link_drops_stale_marker() {
        let mut revived = lookup();
        revived.missing.clear();
        revived
            .found
            .push(meta("TSRC-GONE-000001", "Gone Manual", "000001", MetadataStatus::Released));

        let (mut package, mut extraction) = fixture();
        rewriter(false).rewrite(&mut package, &mut extraction, &revived).unwrap();

        assert_eq!(displays(&package)[2], "Gone Manual (000001)");
        assert!(!extraction.hyperlinks[2].has_status_marker());
    }

    #[test]
    fn test_expired_marker_respects_feature_flag() {
        let mut features = Config::default_config().features;
        features.check_expired_content = false;
        let rewriter = DocumentRewriter::new(TEMPLATE, &features);

        let (mut package, mut extraction) = fixture();
        rewriter.rewrite(&mut package, &mut extraction, &lookup()).unwrap();

        assert_eq!(displays(&package)[1], "Old Guide (654321)");
        assert_eq!(extraction.hyperlinks[1].status, HyperlinkStatus::Expired);
    }
}
