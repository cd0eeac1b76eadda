// file: src/docx/test_support.rs
// description: minimal document package builder for unit tests
// reference: https://docs.rs/zip

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const HYPERLINK_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

pub fn paragraph(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, escape(text))
}

pub fn paragraph_with_link(rel_id: &str, text: &str) -> String {
    format!(
        r#"<w:p><w:r><w:t xml:space="preserve">See </w:t></w:r><w:hyperlink r:id="{}"><w:r><w:rPr><w:rStyle w:val="Hyperlink"/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r></w:hyperlink></w:p>"#,
        rel_id,
        escape(text)
    )
}

pub fn paragraph_with_invisible_link(rel_id: &str) -> String {
    format!(r#"<w:p><w:hyperlink r:id="{}"><w:r><w:t></w:t></w:r></w:hyperlink></w:p>"#, rel_id)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn rels_xml(links: &[(String, String)], others: &[(String, String, String)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (id, target) in links {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}" TargetMode="External"/>"#,
            id,
            HYPERLINK_TYPE,
            target.replace('&', "&amp;")
        ));
    }
    for (id, rel_type, target) in others {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            id, rel_type, target
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

fn wrap(root: &str, inner: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:{root} xmlns:w="{W_NS}" xmlns:r="{R_NS}">{inner}</w:{root}>"#
    )
}

#[derive(Default)]
pub struct DocxBuilder {
    document: Option<String>,
    body: String,
    links: Vec<(String, String)>,
    others: Vec<(String, String, String)>,
    headers: Vec<(String, Vec<(String, String)>)>,
    footers: Vec<(String, Vec<(String, String)>)>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(mut self, paragraphs: &str) -> Self {
        self.body.push_str(paragraphs);
        self
    }

    pub fn raw_document(mut self, xml: &str) -> Self {
        self.document = Some(xml.to_string());
        self
    }

    pub fn link(mut self, rel_id: &str, target: &str) -> Self {
        self.links.push((rel_id.to_string(), target.to_string()));
        self
    }

    /// Non-hyperlink relationship on the main document part.
    pub fn relationship(mut self, rel_id: &str, rel_type: &str, target: &str) -> Self {
        self.others
            .push((rel_id.to_string(), rel_type.to_string(), target.to_string()));
        self
    }

    pub fn header(mut self, paragraphs: &str, links: &[(&str, &str)]) -> Self {
        self.headers.push((paragraphs.to_string(), owned(links)));
        self
    }

    pub fn footer(mut self, paragraphs: &str, links: &[(&str, &str)]) -> Self {
        self.footers.push((paragraphs.to_string(), owned(links)));
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        let mut add = |name: &str, content: &str| {
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        };

        add(
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#,
        );
        let document = self
            .document
            .clone()
            .unwrap_or_else(|| wrap("document", &format!("<w:body>{}</w:body>", self.body)));
        add("word/document.xml", &document);
        add("word/_rels/document.xml.rels", &rels_xml(&self.links, &self.others));

        for (index, (content, links)) in self.headers.iter().enumerate() {
            add(&format!("word/header{}.xml", index + 1), &wrap("hdr", content));
            add(&format!("word/_rels/header{}.xml.rels", index + 1), &rels_xml(links, &[]));
        }
        for (index, (content, links)) in self.footers.iter().enumerate() {
            add(&format!("word/footer{}.xml", index + 1), &wrap("ftr", content));
            add(&format!("word/_rels/footer{}.xml.rels", index + 1), &rels_xml(links, &[]));
        }

        zip.finish().unwrap().into_inner()
    }

    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.to_bytes()).unwrap();
        path
    }
}

fn owned(links: &[(&str, &str)]) -> Vec<(String, String)> {
    links
        .iter()
        .map(|(id, target)| (id.to_string(), target.to_string()))
        .collect()
}
