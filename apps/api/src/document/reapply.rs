//! Style Reapplicator: writes rewritten text back into the paragraphs it came
//! from, reusing the captured formatting.
//!
//! Known limitation, kept for output compatibility: only the FIRST run's
//! character formatting survives a rewrite. Every replacement line becomes one
//! run carrying that style; per-run variation inside a rewritten paragraph is
//! lost. Paragraphs with no runs have no style to copy, so their new runs get
//! unset formatting.
//!
//! Wrappers that carry visible text (hyperlinks, tracked insertions, content
//! controls) are replaced along with the runs: their text was part of what was
//! rewritten. Text-free children such as bookmarks stay where they were.

use std::collections::BTreeMap;

use quick_xml::escape::escape;
use thiserror::Error;
use uuid::Uuid;

use crate::document::docx::{ChildKind, DocumentFormatError, DocxDocument, Paragraph};
use crate::document::style_map::{RunStyle, StyleMap};

#[derive(Debug, Error)]
pub enum StyleMismatchError {
    #[error("paragraph {index} has no captured style")]
    UnknownParagraph { index: usize },

    #[error("style map was captured from document {captured}, not from document {target}")]
    ForeignStyleMap { captured: Uuid, target: Uuid },
}

#[derive(Debug, Error)]
pub enum ReapplyError {
    #[error(transparent)]
    StyleMismatch(#[from] StyleMismatchError),

    #[error(transparent)]
    Document(#[from] DocumentFormatError),
}

/// Returns a new document in which every paragraph named in `replacements`
/// holds the replacement text, one run per line. All other paragraphs are
/// copied byte-for-byte.
///
/// Every index is validated before anything is written: one bad index fails
/// the whole call and no document is produced.
pub fn reapply_styles(
    doc: &DocxDocument,
    styles: &StyleMap,
    replacements: &BTreeMap<usize, String>,
) -> Result<DocxDocument, ReapplyError> {
    if styles.source() != doc.id() {
        return Err(StyleMismatchError::ForeignStyleMap {
            captured: styles.source(),
            target: doc.id(),
        }
        .into());
    }
    if let Some(&index) = replacements
        .keys()
        .find(|&&index| !styles.contains(index) || index >= doc.paragraphs().len())
    {
        return Err(StyleMismatchError::UnknownParagraph { index }.into());
    }

    let xml = doc.xml();
    let mut out = String::with_capacity(xml.len());
    let mut cursor = 0;

    // BTreeMap iteration is ascending, so spans are visited in document order.
    for (&index, text) in replacements {
        let paragraph = &doc.paragraphs()[index];
        let template = styles
            .get(index)
            .and_then(|style| style.first_run())
            .cloned()
            .unwrap_or_default();

        let span = paragraph.span();
        out.push_str(&xml[cursor..span.start]);
        out.push_str(&rebuild_paragraph(xml, paragraph, &template, text));
        cursor = span.end;
    }
    out.push_str(&xml[cursor..]);

    Ok(doc.with_document_xml(out)?)
}

fn rebuild_paragraph(xml: &str, paragraph: &Paragraph, template: &RunStyle, text: &str) -> String {
    let runs = replacement_runs(template, text);

    if paragraph.is_self_closing() {
        let tag = xml[paragraph.span()].trim_end_matches("/>").trim_end();
        return format!("{tag}>{runs}</w:p>");
    }

    let mut out = String::from(&xml[paragraph.open_tag()]);
    let mut placed = false;
    for child in paragraph.children() {
        let replaced = match child.kind {
            ChildKind::Run => true,
            ChildKind::Wrapper => child.has_text,
            ChildKind::Properties | ChildKind::Other => false,
        };
        if !replaced {
            out.push_str(&xml[child.span.clone()]);
        } else if !placed {
            out.push_str(&runs);
            placed = true;
        }
    }
    if !placed {
        out.push_str(&runs);
    }
    out.push_str("</w:p>");
    out
}

/// One run per line; every run after the first opens with a line break so the
/// paragraph reads back as the lines joined by `\n`.
fn replacement_runs(template: &RunStyle, text: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| run_xml(template, line, i > 0))
        .collect()
}

fn run_xml(style: &RunStyle, line: &str, leading_break: bool) -> String {
    let mut props = String::new();
    if let Some(font) = &style.font_name {
        let font = escape(font.as_str());
        props.push_str(&format!(
            r#"<w:rFonts w:ascii="{font}" w:hAnsi="{font}" w:cs="{font}"/>"#
        ));
    }
    match style.bold {
        Some(true) => props.push_str("<w:b/>"),
        Some(false) => props.push_str(r#"<w:b w:val="0"/>"#),
        None => {}
    }
    match style.italic {
        Some(true) => props.push_str("<w:i/>"),
        Some(false) => props.push_str(r#"<w:i w:val="0"/>"#),
        None => {}
    }
    if let Some(size) = style.font_size {
        let half_points = (size * 2.0).round() as u32;
        props.push_str(&format!(
            r#"<w:sz w:val="{half_points}"/><w:szCs w:val="{half_points}"/>"#
        ));
    }

    let mut run = String::from("<w:r>");
    if !props.is_empty() {
        run.push_str("<w:rPr>");
        run.push_str(&props);
        run.push_str("</w:rPr>");
    }
    if leading_break {
        run.push_str("<w:br/>");
    }
    run.push_str(r#"<w:t xml:space="preserve">"#);
    run.push_str(&escape(line));
    run.push_str("</w:t></w:r>");
    run
}
