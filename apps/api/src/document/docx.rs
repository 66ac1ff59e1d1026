//! DOCX codec: reads the body paragraphs of `word/document.xml` and writes the
//! package back with only that part replaced.
//!
//! Every paragraph keeps the byte span it was parsed from, so paragraphs that
//! are not rewritten are copied verbatim into the output.

use std::io::{Cursor, Read, Write};
use std::ops::Range;
use std::sync::Arc;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use thiserror::Error;
use uuid::Uuid;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::document::style_map::{LineSpacing, ParagraphStyle, RunStyle};

/// Path of the main document part inside the package.
pub const DOCUMENT_PART: &str = "word/document.xml";

/// Decompressed size cap for `word/document.xml`.
pub const MAX_DOCUMENT_PART_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum DocumentFormatError {
    #[error("not a DOCX package: {0}")]
    NotAPackage(#[source] ZipError),

    #[error("package has no word/document.xml part")]
    MissingDocumentPart,

    #[error("word/document.xml expands to more than {limit} bytes")]
    PartTooLarge { limit: u64 },

    #[error("word/document.xml is not valid UTF-8")]
    Encoding,

    #[error("malformed document XML near byte {position}: {message}")]
    Xml { position: usize, message: String },

    #[error("document XML has no w:body element")]
    MissingBody,

    #[error("I/O error while reading the package: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ZipError> for DocumentFormatError {
    fn from(err: ZipError) -> Self {
        match err {
            ZipError::FileNotFound => DocumentFormatError::MissingDocumentPart,
            ZipError::Io(e) => DocumentFormatError::Io(e),
            other => DocumentFormatError::NotAPackage(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildKind {
    /// `w:pPr`
    Properties,
    /// `w:r`
    Run,
    /// Elements that hold runs of their own: hyperlinks, tracked insertions,
    /// smart tags, content controls, simple fields.
    Wrapper,
    /// Anything else: bookmarks, proofing marks, deletions.
    Other,
}

#[derive(Debug, Clone)]
pub(crate) struct ParagraphChild {
    pub kind: ChildKind,
    pub span: Range<usize>,
    /// Whether any visible text was read from inside this child.
    pub has_text: bool,
}

/// A body-level `w:p` element.
#[derive(Debug, Clone)]
pub struct Paragraph {
    span: Range<usize>,
    open_tag: Range<usize>,
    self_closing: bool,
    children: Vec<ParagraphChild>,
    style: ParagraphStyle,
    text: String,
}

impl Paragraph {
    pub fn style(&self) -> &ParagraphStyle {
        &self.style
    }

    #[cfg(test)]
    pub fn runs(&self) -> &[RunStyle] {
        &self.style.runs
    }

    /// Visible text in document order, including runs nested in wrappers.
    pub fn text(&self) -> String {
        self.text.clone()
    }

    pub(crate) fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    pub(crate) fn open_tag(&self) -> Range<usize> {
        self.open_tag.clone()
    }

    pub(crate) fn is_self_closing(&self) -> bool {
        self.self_closing
    }

    pub(crate) fn children(&self) -> &[ParagraphChild] {
        &self.children
    }
}

/// A loaded word-processing document.
///
/// Each load (and each rewrite) gets a fresh id so style maps can be tied to
/// the exact instance they were captured from.
#[derive(Debug, Clone)]
pub struct DocxDocument {
    id: Uuid,
    package: Arc<Vec<u8>>,
    xml: Arc<str>,
    paragraphs: Vec<Paragraph>,
}

impl DocxDocument {
    /// Parses a DOCX package. Fails on anything that is not a readable
    /// OOXML package with a body.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DocumentFormatError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))?;
        let xml = read_part(&mut archive, DOCUMENT_PART, MAX_DOCUMENT_PART_BYTES)?;
        drop(archive);

        let paragraphs = parse_body(&xml)?;

        Ok(Self {
            id: Uuid::new_v4(),
            package: Arc::new(bytes),
            xml: xml.into(),
            paragraphs,
        })
    }

    /// A new instance sharing this package, with `word/document.xml` replaced.
    pub fn with_document_xml(&self, xml: String) -> Result<Self, DocumentFormatError> {
        let paragraphs = parse_body(&xml)?;

        Ok(Self {
            id: Uuid::new_v4(),
            package: Arc::clone(&self.package),
            xml: xml.into(),
            paragraphs,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn paragraph_texts(&self) -> Vec<String> {
        self.paragraphs.iter().map(Paragraph::text).collect()
    }

    /// Plain text of the body, one paragraph per line.
    pub fn text(&self) -> String {
        self.paragraph_texts().join("\n")
    }

    pub(crate) fn xml(&self) -> &str {
        &self.xml
    }

    /// Raw XML of one paragraph, exactly as it appears in the part.
    #[cfg(test)]
    pub fn paragraph_xml(&self, index: usize) -> Option<&str> {
        self.paragraphs
            .get(index)
            .map(|p| &self.xml[p.span.clone()])
    }

    /// Serializes the package. Every part other than `word/document.xml` is
    /// copied without recompression.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentFormatError> {
        let mut archive = ZipArchive::new(Cursor::new(self.package.as_slice()))?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            let file = archive.by_index_raw(i)?;
            if file.name() == DOCUMENT_PART {
                drop(file);
                writer.start_file(DOCUMENT_PART, options)?;
                writer.write_all(self.xml.as_bytes())?;
            } else {
                writer.raw_copy_file(file)?;
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}

/// Reads one part as UTF-8, refusing to inflate it past `limit` bytes.
fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
    limit: u64,
) -> Result<String, DocumentFormatError> {
    let mut raw = Vec::new();
    archive
        .by_name(name)?
        .take(limit.saturating_add(1))
        .read_to_end(&mut raw)?;
    if raw.len() as u64 > limit {
        return Err(DocumentFormatError::PartTooLarge { limit });
    }
    String::from_utf8(raw).map_err(|_| DocumentFormatError::Encoding)
}

// ────────────────────────────────────────────────────────────────────────────
// Body parser
// ────────────────────────────────────────────────────────────────────────────

fn parse_body(xml: &str) -> Result<Vec<Paragraph>, DocumentFormatError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut body_depth: Option<usize> = None;
    let mut current: Option<ParagraphBuilder> = None;
    let mut paragraphs = Vec::new();

    loop {
        let before = reader.buffer_position();
        let event = reader.read_event().map_err(|e| DocumentFormatError::Xml {
            position: reader.buffer_position(),
            message: e.to_string(),
        })?;
        let after = reader.buffer_position();

        match event {
            Event::Start(e) => {
                let depth = stack.len();
                let name = e.name().as_ref().to_vec();
                match body_depth {
                    None if name == b"w:body" => body_depth = Some(depth),
                    Some(body) if depth == body + 1 && name == b"w:p" => {
                        current = Some(ParagraphBuilder::new(before, after));
                    }
                    Some(body) if depth > body + 1 => {
                        if let Some(paragraph) = current.as_mut() {
                            paragraph.start(&e, depth - body - 1, before);
                        }
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let depth = stack.len();
                match body_depth {
                    Some(body) if depth == body + 1 && e.name().as_ref() == b"w:p" => {
                        paragraphs.push(ParagraphBuilder::self_closing(before..after));
                    }
                    Some(body) if depth > body + 1 => {
                        if let Some(paragraph) = current.as_mut() {
                            paragraph.empty(&e, depth - body - 1, before..after);
                        }
                    }
                    _ => {}
                }
            }
            Event::End(_) => {
                let name = stack.pop().unwrap_or_default();
                let depth = stack.len();
                if let Some(body) = body_depth {
                    if depth == body + 1 && name == b"w:p" {
                        if let Some(paragraph) = current.take() {
                            paragraphs.push(paragraph.finish(after));
                        }
                    } else if depth > body + 1 {
                        if let Some(paragraph) = current.as_mut() {
                            paragraph.end(&name, depth - body - 1, after);
                        }
                    }
                }
            }
            Event::Text(t) => {
                if let Some(paragraph) = current.as_mut() {
                    paragraph.text(&t).map_err(|message| DocumentFormatError::Xml {
                        position: after,
                        message,
                    })?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DocumentFormatError::Xml {
            position: xml.len(),
            message: "unexpected end of document".to_string(),
        });
    }
    if body_depth.is_none() {
        return Err(DocumentFormatError::MissingBody);
    }

    Ok(paragraphs)
}

/// Accumulates one paragraph while its events stream by.
///
/// Depths are relative to the `w:p` element: its direct children are at 1.
struct ParagraphBuilder {
    start: usize,
    open_tag: Range<usize>,
    children: Vec<ParagraphChild>,
    open_child: Option<(ChildKind, usize)>,
    child_has_text: bool,
    style: ParagraphStyle,
    text: String,
    run: Option<RunStyle>,
    in_run_properties: bool,
    in_text: bool,
}

impl ParagraphBuilder {
    fn new(start: usize, open_tag_end: usize) -> Self {
        Self {
            start,
            open_tag: start..open_tag_end,
            children: Vec::new(),
            open_child: None,
            child_has_text: false,
            style: ParagraphStyle::default(),
            text: String::new(),
            run: None,
            in_run_properties: false,
            in_text: false,
        }
    }

    fn self_closing(span: Range<usize>) -> Paragraph {
        Paragraph {
            open_tag: span.clone(),
            span,
            self_closing: true,
            children: Vec::new(),
            style: ParagraphStyle::default(),
            text: String::new(),
        }
    }

    fn child_kind(name: &[u8]) -> ChildKind {
        match name {
            b"w:pPr" => ChildKind::Properties,
            b"w:r" => ChildKind::Run,
            b"w:hyperlink" | b"w:ins" | b"w:moveTo" | b"w:smartTag" | b"w:sdt"
            | b"w:customXml" | b"w:fldSimple" => ChildKind::Wrapper,
            _ => ChildKind::Other,
        }
    }

    fn open_kind(&self) -> Option<ChildKind> {
        self.open_child.map(|(kind, _)| kind)
    }

    fn start(&mut self, e: &BytesStart, depth: usize, before: usize) {
        let name = e.name();
        if depth == 1 {
            let kind = Self::child_kind(name.as_ref());
            if kind == ChildKind::Run {
                self.run = Some(RunStyle::default());
            }
            self.open_child = Some((kind, before));
            self.child_has_text = false;
            return;
        }
        self.element(e, depth, true);
    }

    fn empty(&mut self, e: &BytesStart, depth: usize, span: Range<usize>) {
        if depth == 1 {
            let kind = Self::child_kind(e.name().as_ref());
            if kind == ChildKind::Run {
                self.style.runs.push(RunStyle::default());
            }
            self.children.push(ParagraphChild {
                kind,
                span,
                has_text: false,
            });
            return;
        }
        self.element(e, depth, false);
    }

    /// Handles a descendant element, opening (`has_content`) or self-closing.
    fn element(&mut self, e: &BytesStart, depth: usize, has_content: bool) {
        let name = e.name();
        match (self.open_kind(), depth, name.as_ref()) {
            (Some(ChildKind::Properties), 2, tag) => apply_paragraph_property(&mut self.style, tag, e),
            (Some(ChildKind::Run), 2, b"w:rPr") => self.in_run_properties = has_content,
            (Some(ChildKind::Run), 2, b"w:t") => self.in_text = has_content,
            (Some(ChildKind::Run), 2, b"w:tab") => self.push_text("\t"),
            (Some(ChildKind::Run), 2, b"w:br" | b"w:cr") => self.push_text("\n"),
            // Runs nested in a wrapper contribute text only; their formatting
            // is not part of the paragraph's run list.
            (Some(ChildKind::Wrapper), _, b"w:t") => self.in_text = has_content,
            (Some(ChildKind::Wrapper), _, b"w:tab") => self.push_text("\t"),
            (Some(ChildKind::Wrapper), _, b"w:br" | b"w:cr") => self.push_text("\n"),
            (Some(ChildKind::Run), 3, tag) if self.in_run_properties => {
                if let Some(run) = self.run.as_mut() {
                    apply_run_property(run, tag, e);
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8], depth: usize, after: usize) {
        match depth {
            1 => {
                if let Some((kind, start)) = self.open_child.take() {
                    if kind == ChildKind::Run {
                        if let Some(run) = self.run.take() {
                            self.style.runs.push(run);
                        }
                    }
                    self.children.push(ParagraphChild {
                        kind,
                        span: start..after,
                        has_text: self.child_has_text,
                    });
                }
            }
            2 if name == b"w:rPr" => self.in_run_properties = false,
            _ if name == b"w:t" => self.in_text = false,
            _ => {}
        }
    }

    fn text(&mut self, t: &BytesText) -> Result<(), String> {
        if self.in_text && matches!(self.open_kind(), Some(ChildKind::Run | ChildKind::Wrapper)) {
            let text = t.unescape().map_err(|e| e.to_string())?;
            self.push_text(&text);
        }
        Ok(())
    }

    fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
        self.child_has_text = true;
        if let Some(run) = self.run.as_mut() {
            run.text.push_str(text);
        }
    }

    fn finish(self, end: usize) -> Paragraph {
        Paragraph {
            span: self.start..end,
            open_tag: self.open_tag,
            self_closing: false,
            children: self.children,
            style: self.style,
            text: self.text,
        }
    }
}

fn attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn attr_number(e: &BytesStart, key: &[u8]) -> Option<f32> {
    attr(e, key).and_then(|v| v.trim().parse::<f32>().ok())
}

/// OOXML on/off property: bare element means on.
fn toggle(e: &BytesStart) -> bool {
    !matches!(
        attr(e, b"w:val").as_deref(),
        Some("0") | Some("false") | Some("off")
    )
}

fn apply_paragraph_property(style: &mut ParagraphStyle, tag: &[u8], e: &BytesStart) {
    match tag {
        b"w:jc" => style.alignment = attr(e, b"w:val"),
        b"w:spacing" => {
            style.spacing_before = attr_number(e, b"w:before").map(|twips| twips / 20.0);
            style.spacing_after = attr_number(e, b"w:after").map(|twips| twips / 20.0);
            style.line_spacing = attr_number(e, b"w:line").map(|line| {
                match attr(e, b"w:lineRule").as_deref() {
                    Some("exact") | Some("atLeast") => LineSpacing::Points(line / 20.0),
                    _ => LineSpacing::Multiple(line / 240.0),
                }
            });
        }
        _ => {}
    }
}

fn apply_run_property(run: &mut RunStyle, tag: &[u8], e: &BytesStart) {
    match tag {
        b"w:b" => run.bold = Some(toggle(e)),
        b"w:i" => run.italic = Some(toggle(e)),
        b"w:rFonts" => run.font_name = attr(e, b"w:ascii").or_else(|| attr(e, b"w:hAnsi")),
        b"w:sz" => run.font_size = attr_number(e, b"w:val").map(|half_points| half_points / 2.0),
        _ => {}
    }
}
