//! Section detection: classifies body paragraphs into the logical résumé
//! sections by matching heading text against a fixed synonym table.
//!
//! A heading opens its section; the section runs until the next recognised
//! heading or the end of the document. Leading text before the first heading
//! (the contact block) belongs to no section.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Labels
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionLabel {
    Summary,
    Experience,
    Education,
    Skills,
}

impl SectionLabel {
    /// Tie-break order when more than one pattern matches the same heading.
    pub const PRIORITY: [SectionLabel; 4] = [
        SectionLabel::Summary,
        SectionLabel::Experience,
        SectionLabel::Education,
        SectionLabel::Skills,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionLabel::Summary => "summary",
            SectionLabel::Experience => "experience",
            SectionLabel::Education => "education",
            SectionLabel::Skills => "skills",
        }
    }

    /// Heading texts recognised for this label, case-insensitively.
    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            SectionLabel::Summary => &["summary", "professional summary", "profile", "objective"],
            SectionLabel::Experience => &[
                "experience",
                "work experience",
                "employment history",
                "work history",
            ],
            SectionLabel::Education => &["education", "academic background", "qualifications"],
            SectionLabel::Skills => &["skills", "technical skills", "core competencies", "expertise"],
        }
    }
}

impl fmt::Display for SectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown section label '{0}' (expected summary, experience, education or skills)")]
pub struct UnknownSectionLabel(pub String);

impl FromStr for SectionLabel {
    type Err = UnknownSectionLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        SectionLabel::PRIORITY
            .into_iter()
            .find(|label| label.as_str() == wanted)
            .ok_or_else(|| UnknownSectionLabel(s.to_string()))
    }
}

/// A requested section had no heading or no content in the document.
#[derive(Debug, Clone, Error)]
#[error("section '{label}' was not found in the document")]
pub struct SectionNotFoundError {
    pub label: SectionLabel,
}

// ────────────────────────────────────────────────────────────────────────────
// Section map
// ────────────────────────────────────────────────────────────────────────────

/// One detected section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub label: SectionLabel,
    /// Paragraph index of the heading.
    pub heading_index: usize,
    /// Paragraph indices of the section body (heading excluded).
    pub content: Range<usize>,
    /// Byte offset of the heading in the newline-joined document text.
    pub start_offset: usize,
    /// Raw document text from the heading up to the next heading.
    pub text: String,
    /// Body text only, one paragraph per line.
    pub content_text: String,
}

impl Section {
    pub fn is_empty(&self) -> bool {
        self.content_text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SectionMap {
    sections: BTreeMap<SectionLabel, Section>,
}

impl SectionMap {
    pub fn get(&self, label: SectionLabel) -> Option<&Section> {
        self.sections.get(&label)
    }

    /// The section's content, or `SectionNotFoundError` when it is absent or empty.
    pub fn require(&self, label: SectionLabel) -> Result<&Section, SectionNotFoundError> {
        self.get(label)
            .filter(|section| !section.is_empty())
            .ok_or(SectionNotFoundError { label })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn labels(&self) -> impl Iterator<Item = SectionLabel> + '_ {
        self.sections.keys().copied()
    }

    pub fn in_document_order(&self) -> Vec<&Section> {
        let mut sections: Vec<&Section> = self.sections.values().collect();
        sections.sort_by_key(|section| section.heading_index);
        sections
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Detector
// ────────────────────────────────────────────────────────────────────────────

/// Compiled heading patterns. Build once and share.
#[derive(Debug)]
pub struct SectionDetector {
    patterns: Vec<(SectionLabel, Regex)>,
}

impl Default for SectionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionDetector {
    pub fn new() -> Self {
        let patterns = SectionLabel::PRIORITY
            .into_iter()
            .map(|label| (label, heading_pattern(label.synonyms())))
            .collect();
        Self { patterns }
    }

    /// Label of the heading `text` represents, if any.
    pub fn classify(&self, text: &str) -> Option<SectionLabel> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.patterns
            .iter()
            .find(|(_, pattern)| pattern.is_match(text))
            .map(|(label, _)| *label)
    }

    /// Builds the section map for a document given as its paragraph texts.
    ///
    /// The first heading of each label opens that section. A later heading
    /// with an already-seen label still ends the current section, but the
    /// text under it is left unassigned.
    pub fn detect<S: AsRef<str>>(&self, paragraphs: &[S]) -> SectionMap {
        let mut offsets = Vec::with_capacity(paragraphs.len());
        let mut offset = 0;
        for paragraph in paragraphs {
            offsets.push(offset);
            offset += paragraph.as_ref().len() + 1;
        }
        let full_text = paragraphs
            .iter()
            .map(|p| p.as_ref())
            .collect::<Vec<_>>()
            .join("\n");

        let headings: Vec<(usize, SectionLabel)> = paragraphs
            .iter()
            .enumerate()
            .filter_map(|(index, p)| self.classify(p.as_ref()).map(|label| (index, label)))
            .collect();

        let mut sections = BTreeMap::new();
        for (position, &(heading_index, label)) in headings.iter().enumerate() {
            if sections.contains_key(&label) {
                continue;
            }
            let end = headings
                .get(position + 1)
                .map(|&(next, _)| next)
                .unwrap_or(paragraphs.len());

            let start_offset = offsets[heading_index];
            let end_offset = offsets.get(end).copied().unwrap_or(full_text.len());
            let content = heading_index + 1..end;
            let content_text = paragraphs[content.clone()]
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<_>>()
                .join("\n");

            sections.insert(
                label,
                Section {
                    label,
                    heading_index,
                    content,
                    start_offset,
                    text: full_text[start_offset..end_offset].to_string(),
                    content_text,
                },
            );
        }

        SectionMap { sections }
    }
}

/// `^(#* )?(syn1|syn2|...)( :)?$`, where whitespace inside a synonym matches
/// any whitespace run.
fn heading_pattern(synonyms: &[&str]) -> Regex {
    let alternatives = synonyms
        .iter()
        .map(|synonym| {
            synonym
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)^(?:#+\s*)?(?:{alternatives})\s*:?$"))
        .expect("section synonyms are plain words")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resume_lines() -> Vec<&'static str> {
        vec![
            "Jane Doe",
            "jane@example.com | 555-123-4567",
            "Summary",
            "Backend engineer with eight years of experience.",
            "Experience",
            "Led a team of 5 engineers.",
            "Cut deploy time by 40%.",
            "Education",
            "BSc Computer Science, 2015",
            "Skills",
            "Go, Rust, PostgreSQL",
        ]
    }

    #[test]
    fn test_four_headings_yield_four_ordered_spans() {
        let lines = resume_lines();
        let map = SectionDetector::new().detect(&lines);

        let sections = map.in_document_order();
        let labels: Vec<SectionLabel> = sections.iter().map(|s| s.label).collect();
        assert_eq!(labels, SectionLabel::PRIORITY.to_vec());

        // Spans tile the text after the contact block with no overlap.
        let full = lines.join("\n");
        let contact_end = sections[0].start_offset;
        assert_eq!(&full[..contact_end], "Jane Doe\njane@example.com | 555-123-4567\n");
        let rebuilt: String = sections.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(rebuilt, full[contact_end..]);
        for pair in sections.windows(2) {
            assert_eq!(pair[0].start_offset + pair[0].text.len(), pair[1].start_offset);
        }
    }

    #[test]
    fn test_section_content_excludes_heading() {
        let map = SectionDetector::new().detect(&resume_lines());
        let experience = map.get(SectionLabel::Experience).unwrap();

        assert_eq!(experience.heading_index, 4);
        assert_eq!(experience.content, 5..7);
        assert_eq!(
            experience.content_text,
            "Led a team of 5 engineers.\nCut deploy time by 40%."
        );
    }

    #[test]
    fn test_synonyms_and_heading_decorations() {
        let detector = SectionDetector::new();

        assert_eq!(detector.classify("Professional Summary"), Some(SectionLabel::Summary));
        assert_eq!(detector.classify("## Work  History:"), Some(SectionLabel::Experience));
        assert_eq!(detector.classify("  ACADEMIC BACKGROUND  "), Some(SectionLabel::Education));
        assert_eq!(detector.classify("Core Competencies"), Some(SectionLabel::Skills));
        assert_eq!(detector.classify("Objective :"), Some(SectionLabel::Summary));
    }

    #[test]
    fn test_body_text_mentioning_a_section_is_not_a_heading() {
        let detector = SectionDetector::new();

        assert_eq!(detector.classify("Eight years of experience in backend work"), None);
        assert_eq!(detector.classify("Skills: Rust, Go"), None);
        assert_eq!(detector.classify(""), None);
    }

    #[test]
    fn test_missing_section_is_not_found() {
        let lines = vec!["Jane Doe", "Experience", "Led a team."];
        let map = SectionDetector::new().detect(&lines);

        assert_eq!(map.len(), 1);
        let err = map.require(SectionLabel::Skills).unwrap_err();
        assert_eq!(err.label, SectionLabel::Skills);
    }

    #[test]
    fn test_heading_without_content_is_not_found() {
        let lines = vec!["Summary", "", "Skills", "Rust"];
        let map = SectionDetector::new().detect(&lines);

        assert!(map.get(SectionLabel::Summary).is_some());
        assert!(map.require(SectionLabel::Summary).is_err());
        assert_eq!(map.require(SectionLabel::Skills).unwrap().content_text, "Rust");
    }

    #[test]
    fn test_repeated_heading_ends_section_without_reopening() {
        let lines = vec![
            "Experience",
            "Acme Corp",
            "Skills",
            "Rust",
            "Experience",
            "Side projects",
        ];
        let map = SectionDetector::new().detect(&lines);

        assert_eq!(map.get(SectionLabel::Experience).unwrap().content, 1..2);
        assert_eq!(map.get(SectionLabel::Skills).unwrap().content, 3..4);
        assert_eq!(map.get(SectionLabel::Skills).unwrap().text, "Skills\nRust\n");
    }

    #[test]
    fn test_no_headings_leaves_everything_unassigned() {
        let map = SectionDetector::new().detect(&["Jane Doe", "Rust developer"]);
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!("Skills".parse::<SectionLabel>().unwrap(), SectionLabel::Skills);
        assert_eq!(" experience ".parse::<SectionLabel>().unwrap(), SectionLabel::Experience);
        assert!("hobbies".parse::<SectionLabel>().is_err());
        assert_eq!(SectionLabel::Education.to_string(), "education");
    }
}
