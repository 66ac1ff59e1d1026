//! Test fixtures: minimal DOCX packages built in memory.

use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Character formatting for a fixture run.
#[derive(Debug, Clone, Default)]
pub struct RunFixture {
    text: String,
    bold: bool,
    italic: bool,
    font: Option<String>,
    size: Option<f32>,
}

impl RunFixture {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn font(mut self, name: &str) -> Self {
        self.font = Some(name.to_string());
        self
    }

    pub fn size(mut self, points: f32) -> Self {
        self.size = Some(points);
        self
    }
}

pub fn run(fixture: RunFixture) -> String {
    let mut props = String::new();
    if let Some(font) = &fixture.font {
        props.push_str(&format!(r#"<w:rFonts w:ascii="{font}" w:hAnsi="{font}"/>"#));
    }
    if fixture.bold {
        props.push_str("<w:b/>");
    }
    if fixture.italic {
        props.push_str("<w:i/>");
    }
    if let Some(size) = fixture.size {
        props.push_str(&format!(r#"<w:sz w:val="{}"/>"#, (size * 2.0) as u32));
    }
    let props = if props.is_empty() {
        props
    } else {
        format!("<w:rPr>{props}</w:rPr>")
    };
    format!(
        r#"<w:r>{props}<w:t xml:space="preserve">{}</w:t></w:r>"#,
        fixture.text
    )
}

/// `properties` is inserted verbatim (pass a `<w:pPr>` element or "").
pub fn paragraph(properties: &str, runs: &[String]) -> String {
    format!("<w:p>{properties}{}</w:p>", runs.concat())
}

pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{WORD_NS}"><w:body>{body}<w:sectPr/></w:body></w:document>"#
    )
}

/// A complete package whose body is `body`.
pub fn docx(body: &str) -> Vec<u8> {
    docx_with_document_xml(Some(&document_xml(body)))
}

/// A package with an arbitrary (or missing) main document part.
pub fn docx_with_document_xml(xml: Option<&str>) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(CONTENT_TYPES.as_bytes()).unwrap();
    writer.start_file("_rels/.rels", options).unwrap();
    writer.write_all(ROOT_RELS.as_bytes()).unwrap();
    if let Some(xml) = xml {
        writer.start_file("word/document.xml", options).unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

/// A résumé with a contact block followed by the four standard sections.
pub fn sample_resume() -> Vec<u8> {
    let heading = |text: &str| paragraph("", &[run(RunFixture::text(text).bold().size(14.0))]);
    let body_line = |text: &str| {
        paragraph(
            "",
            &[run(RunFixture::text(text).font("Calibri").size(11.0))],
        )
    };

    let body = [
        body_line("Jane Doe"),
        body_line("jane@example.com | 555-123-4567"),
        heading("Summary"),
        body_line("Backend engineer with eight years of experience."),
        heading("Experience"),
        body_line("Led a team of 5 engineers."),
        body_line("Cut deploy time by 40%."),
        heading("Education"),
        body_line("BSc Computer Science, 2015"),
        heading("Skills"),
        body_line("Go, Rust, PostgreSQL"),
    ]
    .concat();

    docx(&body)
}
