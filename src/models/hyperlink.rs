// file: src/models/hyperlink.rs
// description: hyperlink model extracted from document parts
// reference: internal data structures

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartKind {
    Body,
    Header,
    Footer,
    Footnotes,
    Endnotes,
}

impl PartKind {
    /// Classifies a package entry name, returning `None` for parts that never hold hyperlinks we edit.
    pub fn from_entry_name(name: &str) -> Option<Self> {
        let file = name.strip_prefix("word/")?;
        if file.contains('/') || !file.ends_with(".xml") {
            return None;
        }
        if file == "document.xml" {
            Some(PartKind::Body)
        } else if file.starts_with("header") {
            Some(PartKind::Header)
        } else if file.starts_with("footer") {
            Some(PartKind::Footer)
        } else if file == "footnotes.xml" {
            Some(PartKind::Footnotes)
        } else if file == "endnotes.xml" {
            Some(PartKind::Endnotes)
        } else {
            None
        }
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PartKind::Body => "body",
            PartKind::Header => "header",
            PartKind::Footer => "footer",
            PartKind::Footnotes => "footnotes",
            PartKind::Endnotes => "endnotes",
        };
        f.write_str(label)
    }
}

/// Where a hyperlink lives: the part entry plus its ordinal among that part's hyperlinks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HyperlinkLocation {
    pub part_name: String,
    pub part_kind: PartKind,
    pub ordinal: usize,
    pub in_text_box: bool,
}

impl fmt::Display for HyperlinkLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.part_name, self.ordinal)?;
        if self.in_text_box {
            write!(f, " (text box)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HyperlinkStatus {
    #[default]
    Valid,
    Invalid,
    Expired,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HyperlinkAction {
    #[default]
    None,
    Updated,
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hyperlink {
    pub relationship_id: Option<String>,
    pub display_text: String,
    pub address: String,
    pub sub_address: Option<String>,
    pub lookup_id: Option<String>,
    pub content_id: Option<String>,
    pub has_expired_marker: bool,
    pub has_not_found_marker: bool,
    pub status: HyperlinkStatus,
    pub action: HyperlinkAction,
    pub location: HyperlinkLocation,
}

impl Hyperlink {
    /// Address and anchor joined the way they appear in a browser.
    pub fn full_target(&self) -> String {
        match &self.sub_address {
            Some(fragment) if !fragment.is_empty() => format!("{}#{}", self.address, fragment),
            _ => self.address.clone(),
        }
    }

    pub fn is_invisible(&self) -> bool {
        self.display_text.trim().is_empty() && !self.full_target().trim().is_empty()
    }

    pub fn has_status_marker(&self) -> bool {
        self.has_expired_marker || self.has_not_found_marker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(display: &str, address: &str, anchor: Option<&str>) -> Hyperlink {
        Hyperlink {
            relationship_id: Some("rId4".to_string()),
            display_text: display.to_string(),
            address: address.to_string(),
            sub_address: anchor.map(str::to_string),
            lookup_id: None,
            content_id: None,
            has_expired_marker: false,
            has_not_found_marker: false,
            status: HyperlinkStatus::Valid,
            action: HyperlinkAction::None,
            location: HyperlinkLocation {
                part_name: "word/document.xml".to_string(),
                part_kind: PartKind::Body,
                ordinal: 0,
                in_text_box: false,
            },
        }
    }

    #[test]
    fn test_part_kind_classification() {
        assert_eq!(PartKind::from_entry_name("word/document.xml"), Some(PartKind::Body));
        assert_eq!(PartKind::from_entry_name("word/header2.xml"), Some(PartKind::Header));
        assert_eq!(PartKind::from_entry_name("word/footer1.xml"), Some(PartKind::Footer));
        assert_eq!(PartKind::from_entry_name("word/endnotes.xml"), Some(PartKind::Endnotes));
        assert_eq!(PartKind::from_entry_name("word/styles.xml"), None);
        assert_eq!(PartKind::from_entry_name("word/_rels/document.xml.rels"), None);
    }

    #[test]
    fn test_full_target_joins_fragment() {
        let with_anchor = link("Policy", "https://docs.example.com/", Some("!/view?docid=42"));
        assert_eq!(with_anchor.full_target(), "https://docs.example.com/#!/view?docid=42");

        let plain = link("Policy", "https://docs.example.com/a", None);
        assert_eq!(plain.full_target(), "https://docs.example.com/a");
    }

    #[test]
    fn test_invisible_detection() {
        assert!(link("  ", "https://docs.example.com/", None).is_invisible());
        assert!(!link("Visible", "https://docs.example.com/", None).is_invisible());
        assert!(!link("", "", None).is_invisible());
    }
}
