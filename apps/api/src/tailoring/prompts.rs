use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, PLAIN_TEXT_INSTRUCTION};
use crate::sections::SectionLabel;

/// Section rewrite template. Placeholders: {section}, {focus}, {content},
/// {job_description}, {grounding}, {output}, {importance}.
pub const SECTION_REWRITE_TEMPLATE: &str = "\
As an expert resume tailoring system, analyze and enhance the following {section} section considering:
1. Industry-specific terminology and best practices
2. Quantifiable achievements and metrics
3. Technical depth and expertise level
4. Format consistency and structure

Section focus: {focus}

Original Content:
{content}

Job Description:
{job_description}

{grounding}

{output}

Maintain the original format while optimizing content.{importance}";

// ────────────────────────────────────────────────────────────────────────────
// Importance
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
#[error("importance must be a whole number from 1 to 5, got '{0}'")]
pub struct InvalidImportance(pub String);

/// How strongly a section should be pulled toward the job description, 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Importance(u8);

impl Importance {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(level: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&level).then_some(Self(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Importance {
    type Error = InvalidImportance;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::new(level).ok_or_else(|| InvalidImportance(level.to_string()))
    }
}

impl From<Importance> for u8 {
    fn from(importance: Importance) -> Self {
        importance.0
    }
}

impl FromStr for Importance {
    type Err = InvalidImportance;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| InvalidImportance(s.trim().to_string()))
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, Self::MAX)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Prompt assembly
// ────────────────────────────────────────────────────────────────────────────

fn section_focus(label: SectionLabel) -> &'static str {
    match label {
        SectionLabel::Summary => {
            "A short professional summary. Lead with the target role and the candidate's \
             strongest matching strengths."
        }
        SectionLabel::Experience => {
            "Role entries and achievement bullets. Keep one line per original line, \
             start bullets with strong verbs, and surface job-description keywords the \
             experience genuinely supports."
        }
        SectionLabel::Education => {
            "Degrees and certifications. Keep institutions, degrees and dates unchanged; \
             only adjust wording and ordering."
        }
        SectionLabel::Skills => {
            "A skills list. Put skills the job description asks for first; do not add \
             skills the original does not list."
        }
    }
}

pub fn build_section_prompt(
    label: SectionLabel,
    content: &str,
    job_description: &str,
    importance: Option<Importance>,
) -> String {
    let importance = importance
        .map(|level| {
            format!(
                "\nImportance Level: {level} - Adjust content alignment with job requirements accordingly."
            )
        })
        .unwrap_or_default();

    render(
        SECTION_REWRITE_TEMPLATE,
        &[
            ("section", label.as_str()),
            ("focus", section_focus(label)),
            ("grounding", GROUNDING_INSTRUCTION),
            ("output", PLAIN_TEXT_INSTRUCTION),
            ("job_description", job_description.trim()),
            ("content", content.trim()),
            ("importance", importance.as_str()),
        ],
    )
}

/// Fills `{name}` placeholders in one left-to-right pass over the template.
/// Inserted values are never scanned, so braces in résumé or job text stay
/// literal. Unknown `{...}` sequences are kept as written.
fn render(template: &str, fields: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let field = tail.find('}').and_then(|close| {
            let name = &tail[1..close];
            fields
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match field {
            Some((close, value)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
