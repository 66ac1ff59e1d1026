//! Style extraction: captures paragraph and run formatting before any rewrite.
//!
//! Capture is lossless with respect to what the codec exposes: adjacent runs
//! with identical formatting are NOT merged and nothing is normalized.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::docx::DocxDocument;

/// Paragraph line spacing as stored in `w:pPr/w:spacing`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule", content = "value")]
pub enum LineSpacing {
    /// `w:lineRule="auto"` (or absent): multiple of single spacing.
    Multiple(f32),
    /// `w:lineRule="exact"` / `"atLeast"`: fixed height in points.
    Points(f32),
}

/// One contiguous formatted span within a paragraph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStyle {
    pub text: String,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub font_name: Option<String>,
    /// Points (OOXML stores half-points).
    pub font_size: Option<f32>,
}

impl RunStyle {
    /// True when two runs carry the same character formatting, ignoring text.
    #[cfg(test)]
    pub fn same_formatting(&self, other: &RunStyle) -> bool {
        self.bold == other.bold
            && self.italic == other.italic
            && self.font_name == other.font_name
            && self.font_size == other.font_size
    }
}

/// Paragraph-level formatting plus the ordered runs of the paragraph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParagraphStyle {
    /// Raw `w:jc` value (`left`, `center`, `right`, `both`, ...).
    pub alignment: Option<String>,
    /// Points.
    pub spacing_before: Option<f32>,
    /// Points.
    pub spacing_after: Option<f32>,
    pub line_spacing: Option<LineSpacing>,
    pub runs: Vec<RunStyle>,
}

impl ParagraphStyle {
    /// The style every replacement line inherits. `None` for run-less paragraphs.
    pub fn first_run(&self) -> Option<&RunStyle> {
        self.runs.first()
    }

    #[cfg(test)]
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Per-paragraph, per-run formatting captured from one document instance.
///
/// Keys are paragraph positions in that instance and are never renumbered.
#[derive(Debug, Clone, Serialize)]
pub struct StyleMap {
    source: Uuid,
    paragraphs: BTreeMap<usize, ParagraphStyle>,
}

impl StyleMap {
    pub fn extract(doc: &DocxDocument) -> Self {
        let paragraphs = doc
            .paragraphs()
            .iter()
            .enumerate()
            .map(|(index, paragraph)| (index, paragraph.style().clone()))
            .collect();

        Self {
            source: doc.id(),
            paragraphs,
        }
    }

    /// Id of the document instance this map was captured from.
    pub fn source(&self) -> Uuid {
        self.source
    }

    pub fn get(&self, index: usize) -> Option<&ParagraphStyle> {
        self.paragraphs.get(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.paragraphs.contains_key(&index)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::{docx, paragraph, run, RunFixture};

    fn sample_document() -> DocxDocument {
        // Mirrors a paragraph with three differently styled runs.
        let body = [paragraph(
            r#"<w:pPr><w:jc w:val="center"/><w:spacing w:before="240" w:after="120" w:line="360" w:lineRule="auto"/></w:pPr>"#,
            &[
                run(RunFixture::text("Test content with ").size(12.0)),
                run(RunFixture::text("different ").size(14.0).bold()),
                run(RunFixture::text("styles").size(12.0).italic()),
            ],
        )]
        .concat();
        DocxDocument::from_bytes(docx(&body)).unwrap()
    }

    #[test]
    fn test_extract_captures_every_run() {
        let styles = StyleMap::extract(&sample_document());
        let paragraph = styles.get(0).unwrap();

        assert_eq!(paragraph.runs.len(), 3);
        assert_eq!(paragraph.runs[1].bold, Some(true));
        assert_eq!(paragraph.runs[1].font_size, Some(14.0));
        assert_eq!(paragraph.runs[2].italic, Some(true));
        assert_eq!(paragraph.runs[0].bold, None);
        assert_eq!(paragraph.text(), "Test content with different styles");
    }

    #[test]
    fn test_extract_captures_paragraph_formatting() {
        let styles = StyleMap::extract(&sample_document());
        let paragraph = styles.get(0).unwrap();

        assert_eq!(paragraph.alignment.as_deref(), Some("center"));
        assert_eq!(paragraph.spacing_before, Some(12.0));
        assert_eq!(paragraph.spacing_after, Some(6.0));
        assert_eq!(paragraph.line_spacing, Some(LineSpacing::Multiple(1.5)));
    }

    #[test]
    fn test_extract_does_not_merge_identical_runs() {
        let body = paragraph(
            "",
            &[
                run(RunFixture::text("Led ").bold()),
                run(RunFixture::text("teams").bold()),
            ],
        );
        let doc = DocxDocument::from_bytes(docx(&body)).unwrap();
        let styles = StyleMap::extract(&doc);

        let runs = &styles.get(0).unwrap().runs;
        assert_eq!(runs.len(), 2);
        assert!(runs[0].same_formatting(&runs[1]));
    }

    #[test]
    fn test_style_map_is_keyed_by_paragraph_position() {
        let body = [
            paragraph("", &[run(RunFixture::text("one"))]),
            paragraph("", &[]),
            paragraph("", &[run(RunFixture::text("three"))]),
        ]
        .concat();
        let doc = DocxDocument::from_bytes(docx(&body)).unwrap();
        let styles = StyleMap::extract(&doc);

        assert_eq!(styles.len(), 3);
        assert_eq!(styles.source(), doc.id());
        assert!(styles.get(1).unwrap().first_run().is_none());
        assert_eq!(styles.get(2).unwrap().text(), "three");
        assert!(!styles.contains(3));
    }
}
