// file: src/docx/relationships.rs
// description: package relationship parts resolving and rewriting hyperlink targets
// reference: https://docs.rs/quick-xml

use crate::docx::xml::{XmlPart, attribute};
use crate::error::{PipelineError, Result};
use quick_xml::events::{BytesStart, Event};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    pub fn is_hyperlink(&self) -> bool {
        self.rel_type.ends_with("/hyperlink")
    }
}

#[derive(Debug, Clone)]
pub struct Relationships {
    xml: XmlPart,
}

/// `word/document.xml` -> `word/_rels/document.xml.rels`
pub fn rels_entry_name(part_name: &str) -> String {
    match part_name.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part_name),
    }
}

impl Relationships {
    pub fn parse(name: &str, bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            xml: XmlPart::parse(name, bytes)?,
        })
    }

    pub fn xml(&self) -> &XmlPart {
        &self.xml
    }

    pub fn get(&self, id: &str) -> Option<Relationship> {
        self.xml
            .events()
            .iter()
            .find_map(|event| relationship_element(event).filter(|rel| rel.id == id))
    }

    /// Rewrites the `Target` of relationship `id` and marks it external.
    pub fn set_target(&mut self, id: &str, target: &str) -> Result<()> {
        let position = self
            .xml
            .events()
            .iter()
            .position(|event| relationship_element(event).is_some_and(|rel| rel.id == id))
            .ok_or_else(|| {
                PipelineError::Content(format!(
                    "relationship {} not found in {}",
                    id,
                    self.xml.name()
                ))
            })?;

        let (start, empty) = match &self.xml.events()[position] {
            Event::Empty(e) => (e, true),
            Event::Start(e) => (e, false),
            _ => {
                return Err(PipelineError::Content(format!(
                    "relationship {} in {} is not an element",
                    id,
                    self.xml.name()
                )));
            }
        };

        let mut rebuilt = BytesStart::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
        let mut has_mode = false;
        for attr in start.attributes().filter_map(|a| a.ok()) {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = match key.as_str() {
                "Target" => target.to_string(),
                "TargetMode" => {
                    has_mode = true;
                    "External".to_string()
                }
                _ => attr
                    .unescape_value()
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned()),
            };
            rebuilt.push_attribute((key.as_str(), value.as_str()));
        }
        if !has_mode {
            rebuilt.push_attribute(("TargetMode", "External"));
        }

        let event = if empty {
            Event::Empty(rebuilt)
        } else {
            Event::Start(rebuilt)
        };
        self.xml.replace_event(position, event);
        Ok(())
    }
}

fn relationship_element(event: &Event<'static>) -> Option<Relationship> {
    let element = match event {
        Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => e,
        _ => return None,
    };

    Some(Relationship {
        id: attribute(element, b"Id")?,
        rel_type: attribute(element, b"Type").unwrap_or_default(),
        target: attribute(element, b"Target").unwrap_or_default(),
        external: attribute(element, b"TargetMode").is_some_and(|mode| mode == "External"),
    })
}
