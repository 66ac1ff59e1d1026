//! The tailoring pass: load → capture styles → detect sections → rewrite the
//! selected sections → reapply styles → score.
//!
//! One request owns its document, style map and section map. Sections are
//! rewritten one after another. Parsing and reapplication are CPU-bound and
//! run on the blocking pool.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::document::{reapply_styles, DocxDocument, StyleMap};
use crate::errors::AppError;
use crate::llm_client::ProviderKind;
use crate::scoring::{ats_score, AtsReport};
use crate::sections::{SectionDetector, SectionLabel};
use crate::tailoring::client::TailoringClient;
use crate::tailoring::prompts::Importance;
use crate::tailoring::telemetry::{TrainingRecord, TrainingSink};
use crate::tailoring::validation::SectionValidation;

// ────────────────────────────────────────────────────────────────────────────
// Request / result models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TailoringRequest {
    /// Name of the uploaded file; the output is named after it.
    pub filename: String,
    pub resume: Vec<u8>,
    pub job_description: String,
    pub sections: BTreeSet<SectionLabel>,
    /// Optional per-section importance. Sections without one get no
    /// importance line in their prompt.
    pub importance: BTreeMap<SectionLabel, Importance>,
    /// Per-request provider order. `None` uses the configured order.
    pub providers: Option<Vec<ProviderKind>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TailoredSection {
    /// Rewritten text, one line per output line.
    pub text: String,
    pub provider: ProviderKind,
    /// Paragraph indices that received the rewrite.
    pub paragraphs: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<Importance>,
    /// ATS score of the rewritten section text alone, 0–100.
    pub ats_score: f64,
    pub validation: SectionValidation,
}

/// A requested section that was left untouched, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSection {
    pub label: SectionLabel,
    pub stage: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TailoringResult {
    pub document_id: Uuid,
    pub filename: String,
    pub sections: BTreeMap<SectionLabel, TailoredSection>,
    pub skipped_sections: Vec<SkippedSection>,
    /// ATS score of the whole tailored document, 0–100.
    pub ats_score: f64,
    /// ATS score of the document as uploaded, for comparison.
    pub original_ats_score: f64,
    pub matched_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub recommendation: String,
}

/// Result plus the serialized output package.
#[derive(Debug)]
pub struct TailoredDocument {
    pub result: TailoringResult,
    pub document: Vec<u8>,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Runs one tailoring pass.
///
/// Document and style errors abort the request and no output is produced.
/// Provider errors abort too, after the chain has exhausted its fallbacks.
/// A requested section that is missing or empty is skipped and reported.
pub async fn tailor_document(
    client: &TailoringClient,
    detector: &SectionDetector,
    telemetry: Option<&TrainingSink>,
    request: TailoringRequest,
) -> Result<TailoredDocument, AppError> {
    let TailoringRequest {
        filename,
        resume,
        job_description,
        sections: requested,
        importance,
        providers,
    } = request;

    let doc = load_document(resume).await?;
    let styles = StyleMap::extract(&doc);
    let texts = doc.paragraph_texts();
    let section_map = detector.detect(&texts);
    let original_ats_score = ats_score(&doc.text(), &job_description);

    info!(
        "Tailoring {}: {} paragraphs, detected sections {:?}, requested {:?}",
        filename,
        texts.len(),
        section_map.labels().collect::<Vec<_>>(),
        requested
    );

    let mut replacements = BTreeMap::new();
    let mut tailored = BTreeMap::new();
    let mut skipped = Vec::new();

    for &label in &requested {
        let section = match section_map.require(label) {
            Ok(section) => section,
            Err(e) => {
                info!("Skipping {}: {}", label, e);
                skipped.push(SkippedSection {
                    label,
                    stage: "sections",
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let targets: Vec<usize> = section
            .content
            .clone()
            .filter(|&index| !texts[index].trim().is_empty())
            .collect();

        let level = importance.get(&label).copied();
        let rewrite = client
            .rewrite_section(
                label,
                &section.content_text,
                &job_description,
                level,
                providers.as_deref(),
            )
            .await?;

        if rewrite.lines.is_empty() {
            warn!("{} returned no usable lines for {}", rewrite.provider, label);
            skipped.push(SkippedSection {
                label,
                stage: "provider",
                reason: format!("{} returned no usable text", rewrite.provider),
            });
            continue;
        }

        let text = rewrite.lines.join("\n");
        let section_score = ats_score(&text, &job_description);
        let validation =
            SectionValidation::check(label, &section.content_text, &text, &job_description);
        if !validation.valid {
            warn!("{} rewrite flagged: {}", label, validation.issues.join("; "));
        }

        if let Some(sink) = telemetry {
            let record = TrainingRecord::anonymized(
                &rewrite.prompt,
                &rewrite.raw,
                rewrite.provider,
                label,
                section_score,
            );
            sink.record(&record).await;
        }

        replacements.extend(distribute_lines(&rewrite.lines, &targets));
        tailored.insert(
            label,
            TailoredSection {
                text,
                provider: rewrite.provider,
                paragraphs: targets,
                importance: level,
                ats_score: section_score,
                validation,
            },
        );
    }

    let (tailored_text, document) = tokio::task::spawn_blocking(move || {
        let output = reapply_styles(&doc, &styles, &replacements)?;
        let bytes = output.to_bytes()?;
        Ok::<_, AppError>((output.text(), bytes))
    })
    .await
    .context("style reapplication task failed")??;

    let report = AtsReport::build(&tailored_text, &job_description);
    let result = TailoringResult {
        document_id: Uuid::new_v4(),
        filename: output_filename(&filename),
        sections: tailored,
        skipped_sections: skipped,
        ats_score: report.score,
        original_ats_score,
        matched_keywords: report.matched,
        missing_keywords: report.missing,
        recommendation: report.recommendation,
    };

    info!(
        "Tailored {} section(s), skipped {}, ATS {:.0} -> {:.0}",
        result.sections.len(),
        result.skipped_sections.len(),
        result.original_ats_score,
        result.ats_score
    );

    Ok(TailoredDocument { result, document })
}

/// Parses an uploaded package on the blocking pool.
pub async fn load_document(bytes: Vec<u8>) -> Result<DocxDocument, AppError> {
    let doc = tokio::task::spawn_blocking(move || DocxDocument::from_bytes(bytes))
        .await
        .context("document parsing task failed")??;
    Ok(doc)
}

/// Assigns rewritten lines to a section's content paragraphs in order.
///
/// Each paragraph but the last takes one line. The last takes every remaining
/// line, joined with line breaks. Paragraphs left without a line are emptied.
pub fn distribute_lines(lines: &[String], targets: &[usize]) -> BTreeMap<usize, String> {
    let mut out = BTreeMap::new();
    let Some((&last, head)) = targets.split_last() else {
        return out;
    };

    for (position, &index) in head.iter().enumerate() {
        out.insert(index, lines.get(position).cloned().unwrap_or_default());
    }
    let rest = lines.get(head.len()..).unwrap_or_default().join("\n");
    out.insert(last, rest);
    out
}

/// `resume.docx` → `resume_tailored.docx`.
pub fn output_filename(uploaded: &str) -> String {
    let stem = Path::new(uploaded)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("resume");
    format!("{stem}_tailored.docx")
}
