//! Sanity checks on a rewritten section, reported next to the rewrite.
//!
//! The checks never block a rewrite. They flag output that drifted too far
//! from the original or from the job description so a reviewer can look.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::scoring::ats::word_pattern;
use crate::sections::SectionLabel;

/// Rewrite length as a multiple of the original, in words.
const MIN_LENGTH_RATIO: f64 = 0.5;
const MAX_LENGTH_RATIO: f64 = 2.0;
/// Share of the original's words the rewrite must keep.
const MIN_KEYWORD_RETENTION: f64 = 0.7;
/// Share of the job description's words the rewrite must contain.
const MIN_JOB_ALIGNMENT: f64 = 0.3;
/// Quantified achievements expected in a rewritten experience section.
const MIN_METRICS_MENTIONED: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionValidation {
    /// True when `issues` is empty.
    pub valid: bool,
    pub issues: Vec<String>,
    /// Rewritten word count over original word count. Zero for an empty original.
    pub length_ratio: f64,
    /// Fraction of the original's distinct words still present, 0 to 1.
    pub keyword_retention: f64,
    /// Fraction of the job description's distinct words present, 0 to 1.
    pub job_alignment: f64,
    /// Numbers, percentages and amounts in the rewrite. Experience only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_mentioned: Option<usize>,
}

impl SectionValidation {
    pub fn check(label: SectionLabel, original: &str, rewritten: &str, job_description: &str) -> Self {
        let original_words = words(original);
        let rewritten_words = words(rewritten);
        let original_vocab: BTreeSet<&str> = original_words.iter().map(String::as_str).collect();
        let rewritten_vocab: BTreeSet<&str> = rewritten_words.iter().map(String::as_str).collect();
        let job_words = words(job_description);
        let job_vocab: BTreeSet<&str> = job_words.iter().map(String::as_str).collect();

        let length_ratio = ratio(rewritten_words.len(), original_words.len());
        let keyword_retention = ratio(
            original_vocab.intersection(&rewritten_vocab).count(),
            original_vocab.len(),
        );
        let job_alignment = ratio(
            job_vocab.intersection(&rewritten_vocab).count(),
            job_vocab.len(),
        );
        let metrics_mentioned =
            (label == SectionLabel::Experience).then(|| count_metrics(rewritten));

        let mut issues = Vec::new();
        if !(MIN_LENGTH_RATIO..=MAX_LENGTH_RATIO).contains(&length_ratio) {
            issues.push("Generated text length significantly differs from original".to_string());
        }
        if keyword_retention < MIN_KEYWORD_RETENTION {
            issues.push("Important keywords from original text are missing".to_string());
        }
        if job_alignment < MIN_JOB_ALIGNMENT {
            issues.push("Low alignment with job description keywords".to_string());
        }
        if metrics_mentioned.is_some_and(|count| count < MIN_METRICS_MENTIONED) {
            issues.push(
                "Experience section should include more quantifiable achievements".to_string(),
            );
        }

        Self {
            valid: issues.is_empty(),
            issues,
            length_ratio,
            keyword_retention,
            job_alignment,
            metrics_mentioned,
        }
    }
}

fn words(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    word_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn metric_pattern() -> &'static Regex {
    static METRIC: OnceLock<Regex> = OnceLock::new();
    METRIC.get_or_init(|| {
        Regex::new(
            r"\$\d+(?:,\d{3})*(?:\.\d{2})?|\d+(?:,\d{3})*(?:\.\d+)?(?:\s*(?:million|billion|k|M|B)\b)?%?",
        )
        .expect("metric pattern is valid")
    })
}

/// Counts amounts, percentages and plain numbers. Each mention counts once.
fn count_metrics(text: &str) -> usize {
    metric_pattern().find_iter(text).count()
}
