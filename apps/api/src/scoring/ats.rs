//! ATS keyword scorer: coarse overlap between a candidate text and the
//! keywords of a job description.
//!
//! No stemming and no synonym expansion. A keyword counts as present when it
//! occurs anywhere in the lowercased candidate text, so "team" is matched by
//! "teams" and "python" by "pythonic".

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Keywords must be longer than this many characters.
pub const MIN_KEYWORD_CHARS: usize = 2;

const STOPWORDS: &[&str] = &[
    "the", "and", "or", "a", "an", "in", "on", "at", "to", "for", "of", "with", "by", "from", "up",
    "about", "into", "over", "after",
];

pub(crate) fn word_pattern() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\b\w+\b").expect("word pattern is valid"))
}

/// Distinct qualifying keywords of a job description, lowercased.
pub fn extract_keywords(job_description: &str) -> BTreeSet<String> {
    let lowered = job_description.to_lowercase();
    word_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|word| word.chars().count() > MIN_KEYWORD_CHARS)
        .filter(|word| !STOPWORDS.contains(word))
        .filter(|word| !word.chars().all(|c| c.is_numeric()))
        .map(str::to_string)
        .collect()
}

/// Percentage of job-description keywords present in `candidate`, in
/// `[0, 100]`. Zero when the job description has no qualifying keywords.
pub fn ats_score(candidate: &str, job_description: &str) -> f64 {
    AtsReport::build(candidate, job_description).score
}

/// Score plus the keyword breakdown behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtsReport {
    pub score: f64,
    pub keyword_count: usize,
    pub matched: Vec<String>,
    pub missing: Vec<String>,
    pub recommendation: String,
}

impl AtsReport {
    pub fn build(candidate: &str, job_description: &str) -> Self {
        let keywords = extract_keywords(job_description);
        let haystack = candidate.to_lowercase();

        let (matched, missing): (Vec<String>, Vec<String>) = keywords
            .into_iter()
            .partition(|keyword| haystack.contains(keyword.as_str()));

        let keyword_count = matched.len() + missing.len();
        let score = if keyword_count == 0 {
            0.0
        } else {
            matched.len() as f64 / keyword_count as f64 * 100.0
        };

        Self {
            recommendation: build_recommendation(score, keyword_count, &missing),
            score,
            keyword_count,
            matched,
            missing,
        }
    }
}

fn build_recommendation(score: f64, keyword_count: usize, missing: &[String]) -> String {
    let top_missing: Vec<&str> = missing.iter().take(5).map(String::as_str).collect();
    let rounded = score.round();

    if keyword_count == 0 {
        "The job description has no scoreable keywords.".to_string()
    } else if score >= 80.0 {
        format!("Strong keyword match ({rounded}/100).")
    } else if score >= 50.0 {
        format!(
            "Moderate keyword match ({rounded}/100). Consider working in: {}.",
            top_missing.join(", ")
        )
    } else {
        format!(
            "Low keyword match ({rounded}/100). Missing: {}.",
            top_missing.join(", ")
        )
    }
}
