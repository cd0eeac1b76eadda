// file: src/rewrite/replacement.rs
// description: user-defined hyperlink and text substitution rules applied to document parts
// reference: https://docs.rs/regex

use crate::docx::{DocxPackage, TextEdit};
use crate::error::{PipelineError, Result};
use crate::extractor::ExtractionResult;
use crate::extractor::patterns::{base_title, format_content_id};
use crate::models::{
    ChangeEntry, ChangeType, HyperlinkAction, HyperlinkReplacementRule, TextReplacementRule,
};
use crate::rewrite::url::build_target_url;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref REPEATED_SPACES: Regex = Regex::new(r" {2,}").expect("REPEATED_SPACES regex is valid");
}

/// Replacement text shaped like the matched text: all caps, all lower or title case.
pub fn match_case(matched: &str, replacement: &str) -> String {
    let letters: Vec<char> = matched.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return replacement.to_string();
    }

    if letters.iter().all(|c| c.is_uppercase()) && letters.len() > 1 {
        return replacement.to_uppercase();
    }
    if letters.iter().all(|c| c.is_lowercase()) {
        return replacement.to_lowercase();
    }
    if letters[0].is_uppercase() {
        return title_case(replacement);
    }
    replacement.to_string()
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if at_word_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.push(c);
            if c.is_whitespace() {
                at_word_start = true;
            }
        }
    }
    out
}

/// Case-preserving replacement of one match, keeping the match's trailing whitespace.
pub fn replace_preserving(matched: &str, replacement: &str) -> String {
    let core = matched.trim_end();
    let trailing = &matched[core.len()..];
    format!("{}{}", match_case(core, replacement.trim_end()), trailing)
}

fn source_pattern(rule: &TextReplacementRule) -> Result<Regex> {
    Regex::new(&format!("(?i){}", regex::escape(&rule.source)))
        .map_err(|e| PipelineError::Config(format!("invalid text rule {:?}: {}", rule.source, e)))
}

pub struct ReplacementEngine {
    url_template: String,
}

impl ReplacementEngine {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
        }
    }

    /// Rewrites the display text, and the target when the rule names a
    /// document, of every visible hyperlink whose title matches a rule.
    pub fn apply_hyperlink_rules(
        &self,
        package: &mut DocxPackage,
        extraction: &mut ExtractionResult,
        rules: &[HyperlinkReplacementRule],
    ) -> Result<Vec<ChangeEntry>> {
        let rules: Vec<&HyperlinkReplacementRule> = rules.iter().filter(|r| r.enabled).collect();
        let mut changes = Vec::new();
        if rules.is_empty() {
            return Ok(changes);
        }

        for part in package.parts_mut() {
            let part_name = part.name().to_string();
            let layout = part.xml.layout();

            for (ordinal, span) in layout.hyperlinks.iter().enumerate() {
                let display = part.xml.joined_text(&span.slots);
                if display.trim().is_empty() {
                    continue;
                }
                let title = base_title(&display);
                let Some(rule) = rules
                    .iter()
                    .find(|rule| rule.match_mode.matches(&title, &rule.title_pattern))
                else {
                    continue;
                };

                let element = format!("{}#{}", part_name, ordinal);
                let new_title = rule.new_title.as_deref().unwrap_or(&title).trim();
                let new_display = format!("{} ({})", new_title, format_content_id(&rule.content_id));
                let mut new_target = None;

                if new_display != display {
                    part.xml.set_joined_text(&span.slots, &new_display);
                    changes.push(
                        ChangeEntry::new(
                            ChangeType::TitleReplaced,
                            &element,
                            format!("Rule {:?} replaced hyperlink title", rule.title_pattern),
                        )
                        .with_values(&display, &new_display),
                    );
                }

                if let Some(document_id) = &rule.document_id
                    && let Some(rel_id) = &span.relationship_id
                    && let Some(rels) = part.rels.as_mut()
                    && rels.get(rel_id).is_some_and(|rel| rel.is_hyperlink())
                {
                    let target = build_target_url(&self.url_template, document_id)?;
                    let old_target = rels.get(rel_id).map(|rel| rel.target).unwrap_or_default();
                    if old_target != target {
                        rels.set_target(rel_id, &target)?;
                        changes.push(
                            ChangeEntry::new(
                                ChangeType::HyperlinkUpdated,
                                &element,
                                format!("Rule {:?} retargeted hyperlink", rule.title_pattern),
                            )
                            .with_values(&old_target, &target),
                        );
                        new_target = Some(target);
                    }
                }

                if let Some(link) = extraction.hyperlinks.iter_mut().find(|link| {
                    link.location.part_name == part_name && link.location.ordinal == ordinal
                }) {
                    link.display_text = new_display.clone();
                    link.content_id = Some(format_content_id(&rule.content_id));
                    link.has_expired_marker = false;
                    link.has_not_found_marker = false;
                    link.action = HyperlinkAction::Replaced;
                    if let Some(target) = new_target {
                        match target.split_once('#') {
                            Some((address, fragment)) => {
                                link.address = address.to_string();
                                link.sub_address = Some(fragment.to_string());
                            }
                            None => {
                                link.address = target;
                                link.sub_address = None;
                            }
                        }
                    }
                }
            }
        }

        debug!("Hyperlink rules produced {} changes", changes.len());
        Ok(changes)
    }

    /// Case-preserving substitution inside every paragraph of every part.
    pub fn apply_text_rules(
        &self,
        package: &mut DocxPackage,
        rules: &[TextReplacementRule],
    ) -> Result<Vec<ChangeEntry>> {
        let mut changes = Vec::new();

        for rule in rules.iter().filter(|r| r.enabled) {
            rule.validate()?;
            let pattern = source_pattern(rule)?;

            for part in package.parts_mut() {
                let part_name = part.name().to_string();
                let layout = part.xml.layout();

                for (index, slots) in layout.paragraphs.iter().enumerate() {
                    let text = part.xml.joined_text(slots);
                    let edits: Vec<TextEdit> = pattern
                        .find_iter(&text)
                        .map(|found| TextEdit {
                            range: found.range(),
                            replacement: replace_preserving(found.as_str(), &rule.replacement),
                        })
                        .collect();
                    if edits.is_empty() {
                        continue;
                    }

                    let applied = part.xml.apply_edits(slots, &edits);
                    changes.push(
                        ChangeEntry::new(
                            ChangeType::TextReplaced,
                            format!("{} paragraph {}", part_name, index),
                            format!(
                                "Replaced {} occurrence(s) of {:?} with {:?}",
                                applied, rule.source, rule.replacement
                            ),
                        )
                        .with_values(&text, part.xml.joined_text(slots)),
                    );
                }
            }
        }

        debug!("Text rules produced {} changes", changes.len());
        Ok(changes)
    }

    /// Collapses runs of two or more spaces inside paragraphs to one.
    pub fn optimize_text(&self, package: &mut DocxPackage) -> Vec<ChangeEntry> {
        let mut changes = Vec::new();

        for part in package.parts_mut() {
            let part_name = part.name().to_string();
            let layout = part.xml.layout();

            for (index, slots) in layout.paragraphs.iter().enumerate() {
                let text = part.xml.joined_text(slots);
                let edits: Vec<TextEdit> = REPEATED_SPACES
                    .find_iter(&text)
                    .map(|found| TextEdit {
                        range: found.range(),
                        replacement: " ".to_string(),
                    })
                    .collect();
                if edits.is_empty() {
                    continue;
                }

                let applied = part.xml.apply_edits(slots, &edits);
                changes.push(
                    ChangeEntry::new(
                        ChangeType::TextOptimized,
                        format!("{} paragraph {}", part_name, index),
                        format!("Collapsed {} run(s) of repeated spaces", applied),
                    )
                    .with_values(&text, part.xml.joined_text(slots)),
                );
            }
        }

        changes
    }
}
