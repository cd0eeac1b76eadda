// file: src/docx/xml.rs
// description: owned xml event lists with run-level text layout and editing
// reference: https://docs.rs/quick-xml

use crate::error::{PipelineError, Result};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::ops::Range;

/// A `<w:t>` text node: the index of its start tag and of its text event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSlot {
    pub element_index: usize,
    pub text_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperlinkSpan {
    pub start: usize,
    pub end: usize,
    pub relationship_id: Option<String>,
    pub anchor: Option<String>,
    pub doc_location: Option<String>,
    pub in_text_box: bool,
    pub slots: Vec<TextSlot>,
}

/// Text nodes grouped by paragraph, and hyperlinks in document order.
#[derive(Debug, Clone, Default)]
pub struct PartLayout {
    pub paragraphs: Vec<Vec<TextSlot>>,
    pub hyperlinks: Vec<HyperlinkSpan>,
    pub has_body: bool,
}

/// One replacement inside a paragraph's concatenated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Range<usize>,
    pub replacement: String,
}

#[derive(Debug, Clone)]
pub struct XmlPart {
    name: String,
    events: Vec<Event<'static>>,
    dirty: bool,
}

impl XmlPart {
    pub fn parse(name: &str, bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| PipelineError::Content(format!("{} is not valid UTF-8: {}", name, e)))?;
        let text = text.trim_start_matches('\u{feff}');

        let mut reader = Reader::from_str(text);
        let mut events = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(event) => events.push(event.into_owned()),
                Err(e) => {
                    return Err(PipelineError::Content(format!(
                        "malformed XML in {} at byte {}: {}",
                        name,
                        reader.buffer_position(),
                        e
                    )));
                }
            }
        }

        Ok(Self {
            name: name.to_string(),
            events,
            dirty: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &[Event<'static>] {
        &self.events
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        for event in &self.events {
            writer
                .write_event(event.borrow())
                .map_err(|e| PipelineError::Content(format!("failed to write {}: {}", self.name, e)))?;
        }
        Ok(writer.into_inner())
    }

    pub(crate) fn replace_event(&mut self, index: usize, event: Event<'static>) {
        self.events[index] = event;
        self.dirty = true;
    }

    pub fn layout(&self) -> PartLayout {
        let mut layout = PartLayout::default();
        let mut paragraph_stack: Vec<Vec<TextSlot>> = Vec::new();
        let mut open_links: Vec<HyperlinkSpan> = Vec::new();
        let mut text_box_depth = 0usize;
        let mut open_text: Option<usize> = None;

        for (index, event) in self.events.iter().enumerate() {
            match event {
                Event::Start(e) => match e.name().as_ref() {
                    b"w:body" => layout.has_body = true,
                    b"w:p" => paragraph_stack.push(Vec::new()),
                    b"w:t" => open_text = Some(index),
                    b"w:txbxContent" => text_box_depth += 1,
                    b"w:hyperlink" => {
                        open_links.push(hyperlink_span(e, index, text_box_depth > 0));
                    }
                    _ => {}
                },
                Event::Empty(e) => match e.name().as_ref() {
                    b"w:body" => layout.has_body = true,
                    b"w:hyperlink" => {
                        layout
                            .hyperlinks
                            .push(hyperlink_span(e, index, text_box_depth > 0));
                    }
                    _ => {}
                },
                Event::Text(_) => {
                    if let Some(element_index) = open_text {
                        let slot = TextSlot {
                            element_index,
                            text_index: index,
                        };
                        if let Some(paragraph) = paragraph_stack.last_mut() {
                            paragraph.push(slot);
                        }
                        if let Some(link) = open_links.last_mut() {
                            link.slots.push(slot);
                        }
                    }
                }
                Event::End(e) => match e.name().as_ref() {
                    b"w:p" => {
                        if let Some(paragraph) = paragraph_stack.pop()
                            && !paragraph.is_empty()
                        {
                            layout.paragraphs.push(paragraph);
                        }
                    }
                    b"w:t" => open_text = None,
                    b"w:txbxContent" => text_box_depth = text_box_depth.saturating_sub(1),
                    b"w:hyperlink" => {
                        if let Some(mut link) = open_links.pop() {
                            link.end = index;
                            layout.hyperlinks.push(link);
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        layout.hyperlinks.sort_by_key(|link| link.start);
        layout
    }

    pub fn slot_text(&self, slot: &TextSlot) -> String {
        match &self.events[slot.text_index] {
            Event::Text(text) => text
                .unescape()
                .map(|t| t.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(text).into_owned()),
            _ => String::new(),
        }
    }

    pub fn set_slot_text(&mut self, slot: &TextSlot, text: &str) {
        self.replace_event(slot.text_index, Event::Text(BytesText::new(text).into_owned()));
        self.preserve_space(slot.element_index);
    }

    pub fn joined_text(&self, slots: &[TextSlot]) -> String {
        slots.iter().map(|slot| self.slot_text(slot)).collect()
    }

    /// Writes `text` into the first slot and empties the rest.
    pub fn set_joined_text(&mut self, slots: &[TextSlot], text: &str) {
        for (position, slot) in slots.iter().enumerate() {
            if position == 0 {
                self.set_slot_text(slot, text);
            } else if !self.slot_text(slot).is_empty() {
                self.set_slot_text(slot, "");
            }
        }
    }

    /// Applies sorted, non-overlapping edits to the concatenated text of `slots`.
    /// Unchanged characters stay in their original run; a replacement lands in
    /// the run where its match starts.
    pub fn apply_edits(&mut self, slots: &[TextSlot], edits: &[TextEdit]) -> usize {
        if slots.is_empty() || edits.is_empty() {
            return 0;
        }

        let texts: Vec<String> = slots.iter().map(|slot| self.slot_text(slot)).collect();
        let mut bounds = Vec::with_capacity(texts.len());
        let mut offset = 0usize;
        for text in &texts {
            bounds.push(offset..offset + text.len());
            offset += text.len();
        }
        let joined: String = texts.concat();

        let owner_of = |position: usize| -> usize {
            bounds
                .iter()
                .position(|range| !range.is_empty() && range.contains(&position))
                .or_else(|| bounds.iter().rposition(|range| !range.is_empty()))
                .unwrap_or(0)
        };

        let copy_range = |from: usize, to: usize, out: &mut Vec<String>| {
            for (index, range) in bounds.iter().enumerate() {
                let start = range.start.max(from);
                let end = range.end.min(to);
                if start < end {
                    out[index].push_str(&joined[start..end]);
                }
            }
        };

        let mut rebuilt = vec![String::new(); texts.len()];
        let mut cursor = 0usize;
        let mut applied = 0usize;
        for edit in edits {
            if edit.range.start < cursor || edit.range.end > joined.len() {
                continue;
            }
            copy_range(cursor, edit.range.start, &mut rebuilt);
            rebuilt[owner_of(edit.range.start)].push_str(&edit.replacement);
            cursor = edit.range.end;
            applied += 1;
        }
        copy_range(cursor, joined.len(), &mut rebuilt);

        for (index, slot) in slots.iter().enumerate() {
            if rebuilt[index] != texts[index] {
                self.set_slot_text(slot, &rebuilt[index]);
            }
        }

        applied
    }

    fn preserve_space(&mut self, element_index: usize) {
        let updated = match &self.events[element_index] {
            Event::Start(start) if attribute(start, b"xml:space").is_none() => {
                let mut owned = start.clone().into_owned();
                owned.push_attribute(("xml:space", "preserve"));
                Some(owned)
            }
            _ => None,
        };
        if let Some(start) = updated {
            self.replace_event(element_index, Event::Start(start));
        }
    }
}

/// Reads an attribute by its qualified name.
pub fn attribute(element: &BytesStart, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .filter_map(|attr| attr.ok())
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| {
            attr.unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned())
        })
}

fn hyperlink_span(element: &BytesStart, index: usize, in_text_box: bool) -> HyperlinkSpan {
    HyperlinkSpan {
        start: index,
        end: index,
        relationship_id: attribute(element, b"r:id"),
        anchor: attribute(element, b"w:anchor"),
        doc_location: attribute(element, b"w:docLocation"),
        in_text_box,
        slots: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAGRAPHS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body><w:p><w:r><w:t>Read the </w:t></w:r><w:hyperlink r:id="rId5"><w:r><w:t>Travel</w:t></w:r><w:r><w:t xml:space="preserve"> Policy</w:t></w:r></w:hyperlink><w:r><w:t> now &amp; later.</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t></w:r></w:p></w:body></w:document>"#;

    fn part() -> XmlPart {
        XmlPart::parse("word/document.xml", PARAGRAPHS.as_bytes()).unwrap()
    }

    #[test]
    fn test_layout_groups_paragraphs_and_links() {
        let part = part();
        let layout = part.layout();

        assert!(layout.has_body);
        assert_eq!(layout.paragraphs.len(), 2);
        assert_eq!(layout.hyperlinks.len(), 1);

        let link = &layout.hyperlinks[0];
        assert_eq!(link.relationship_id.as_deref(), Some("rId5"));
        assert_eq!(part.joined_text(&link.slots), "Travel Policy");
        assert_eq!(
            part.joined_text(&layout.paragraphs[0]),
            "Read the Travel Policy now & later."
        );
    }

    #[test]
    fn test_round_trip_preserves_markup() {
        let part = part();
        let bytes = part.to_bytes().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), PARAGRAPHS);
        assert!(!part.is_dirty());
    }

    #[test]
    fn test_set_joined_text_uses_first_run() {
        let mut part = part();
        let layout = part.layout();
        let slots = layout.hyperlinks[0].slots.clone();

        part.set_joined_text(&slots, "Travel Policy (123456)");
        assert!(part.is_dirty());
        assert_eq!(part.joined_text(&slots), "Travel Policy (123456)");
        assert_eq!(part.slot_text(&slots[1]), "");

        let xml = String::from_utf8(part.to_bytes().unwrap()).unwrap();
        assert!(xml.contains(r#"<w:t xml:space="preserve">Travel Policy (123456)</w:t>"#));
    }

    #[test]
    fn test_apply_edits_across_runs() {
        let mut part = part();
        let layout = part.layout();
        let slots = layout.paragraphs[0].clone();
        let joined = part.joined_text(&slots);
        let start = joined.find("the Travel").unwrap();

        let applied = part.apply_edits(
            &slots,
            &[TextEdit {
                range: start..start + "the Travel".len(),
                replacement: "our Expense".to_string(),
            }],
        );

        assert_eq!(applied, 1);
        assert_eq!(
            part.joined_text(&slots),
            "Read our Expense Policy now & later."
        );
        // The match started in the first run, so the second run only loses its matched text.
        assert_eq!(part.slot_text(&slots[1]), "");
        assert_eq!(part.slot_text(&slots[2]), " Policy");
    }

    #[test]
    fn test_text_box_hyperlinks_are_flagged() {
        let xml = r#"<w:document xmlns:w="w" xmlns:r="r"><w:body><w:p><w:r><w:txbxContent><w:p><w:hyperlink r:id="rId9"><w:r><w:t>Boxed</w:t></w:r></w:hyperlink></w:p></w:txbxContent></w:r></w:p></w:body></w:document>"#;
        let part = XmlPart::parse("word/document.xml", xml.as_bytes()).unwrap();
        let layout = part.layout();

        assert_eq!(layout.hyperlinks.len(), 1);
        assert!(layout.hyperlinks[0].in_text_box);
        assert_eq!(layout.paragraphs.len(), 1);
    }

    #[test]
    fn test_malformed_xml_is_content_error() {
        let result = XmlPart::parse("word/document.xml", b"<w:document><w:body></w:document>");
        assert!(matches!(result, Err(PipelineError::Content(_))));
    }
}
