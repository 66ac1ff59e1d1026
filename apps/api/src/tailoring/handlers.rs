use std::collections::{BTreeMap, BTreeSet};

use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::{parse_provider_order, ProviderKind};
use crate::scoring::AtsReport;
use crate::sections::{Section, SectionLabel};
use crate::state::AppState;
use crate::storage::DOCX_CONTENT_TYPE;
use crate::tailoring::pipeline::{load_document, tailor_document, TailoringRequest, TailoringResult};
use crate::tailoring::prompts::Importance;

// ────────────────────────────────────────────────────────────────────────────
// Multipart form
// ────────────────────────────────────────────────────────────────────────────

/// Fields of the upload form. Unknown fields are ignored.
#[derive(Debug, Default)]
struct UploadForm {
    filename: Option<String>,
    resume: Option<Bytes>,
    job_description: Option<String>,
    sections: Option<String>,
    importance: Option<String>,
    providers: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let bad_field =
                |e: axum::extract::multipart::MultipartError| {
                    AppError::Validation(format!("Could not read field '{name}': {e}"))
                };
            match name.as_str() {
                "resume" => {
                    form.filename = field.file_name().map(str::to_string);
                    form.resume = Some(field.bytes().await.map_err(bad_field)?);
                }
                "job_description" => form.job_description = Some(field.text().await.map_err(bad_field)?),
                "sections" => form.sections = Some(field.text().await.map_err(bad_field)?),
                "importance" => form.importance = Some(field.text().await.map_err(bad_field)?),
                "providers" => form.providers = Some(field.text().await.map_err(bad_field)?),
                _ => {}
            }
        }
        Ok(form)
    }

    /// The uploaded résumé and its file name. Only `.docx` uploads are accepted.
    fn resume(&mut self) -> Result<(String, Vec<u8>), AppError> {
        let bytes = self
            .resume
            .take()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| AppError::Validation("Field 'resume' must contain a file".to_string()))?;
        let filename = self.filename.take().unwrap_or_else(|| "resume.docx".to_string());
        if !filename.to_lowercase().ends_with(".docx") {
            return Err(AppError::Validation(format!(
                "'{filename}' is not a .docx file"
            )));
        }
        Ok((filename, bytes.to_vec()))
    }

    fn job_description(&mut self) -> Result<String, AppError> {
        self.job_description
            .take()
            .filter(|jd| !jd.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Field 'job_description' is required".to_string()))
    }

    fn sections(&mut self) -> Result<BTreeSet<SectionLabel>, AppError> {
        let raw = self.sections.take().unwrap_or_default();
        let sections = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<SectionLabel>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        if sections.is_empty() {
            return Err(AppError::Validation(
                "Field 'sections' must name at least one of summary, experience, education, skills"
                    .to_string(),
            ));
        }
        Ok(sections)
    }

    /// `label:level` pairs, comma separated, e.g. `summary:5,skills:3`.
    fn importance(&mut self) -> Result<BTreeMap<SectionLabel, Importance>, AppError> {
        let raw = self.importance.take().unwrap_or_default();
        raw.split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| -> Result<(SectionLabel, Importance), AppError> {
                let (label, level) = pair.split_once(':').ok_or_else(|| {
                    AppError::Validation(format!(
                        "Importance entry '{pair}' must look like 'section:level'"
                    ))
                })?;
                let label = label
                    .parse::<SectionLabel>()
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                let level = level
                    .parse::<Importance>()
                    .map_err(|e| AppError::Validation(format!("{label}: {e}")))?;
                Ok((label, level))
            })
            .collect()
    }

    fn providers(&mut self) -> Result<Option<Vec<ProviderKind>>, AppError> {
        match self.providers.take() {
            None => Ok(None),
            Some(raw) => {
                let order =
                    parse_provider_order(&raw).map_err(|e| AppError::Validation(e.to_string()))?;
                Ok(Some(order).filter(|o| !o.is_empty()))
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SectionsResponse {
    pub paragraph_count: usize,
    pub sections: Vec<Section>,
}

/// POST /api/v1/sections
/// Multipart: `resume`. Lists the sections that can be tailored.
pub async fn handle_sections(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SectionsResponse>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let (_, resume) = form.resume()?;

    let doc = load_document(resume).await?;
    let texts = doc.paragraph_texts();
    let map = state.detector.detect(&texts);

    Ok(Json(SectionsResponse {
        paragraph_count: texts.len(),
        sections: map.in_document_order().into_iter().cloned().collect(),
    }))
}

#[derive(Serialize)]
pub struct TailorResponse {
    #[serde(flatten)]
    pub result: TailoringResult,
    pub download_url: String,
}

/// POST /api/v1/tailor
/// Multipart: `resume`, `job_description`, `sections` (comma list),
/// optional `importance` (`label:level` list, levels 1 to 5),
/// optional `providers` (comma list, in fallback order).
pub async fn handle_tailor(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TailorResponse>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let (filename, resume) = form.resume()?;
    let request = TailoringRequest {
        filename,
        resume,
        job_description: form.job_description()?,
        sections: form.sections()?,
        importance: form.importance()?,
        providers: form.providers()?,
    };

    let tailored = tailor_document(
        &state.client,
        &state.detector,
        state.telemetry.as_deref(),
        request,
    )
    .await?;

    let id = tailored.result.document_id;
    state
        .store
        .put(id, &tailored.result.filename, Bytes::from(tailored.document))
        .await
        .map_err(|e| AppError::Storage(format!("{e:#}")))?;

    Ok(Json(TailorResponse {
        result: tailored.result,
        download_url: format!("/api/v1/documents/{id}"),
    }))
}

/// GET /api/v1/documents/:id
pub async fn handle_download(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let document = state
        .store
        .get(id)
        .await
        .map_err(|e| AppError::Storage(format!("{e:#}")))?
        .ok_or_else(|| AppError::NotFound(format!("Document {id} not found")))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        document.filename.replace(['"', '\\'], "_")
    );
    Ok((
        [
            (header::CONTENT_TYPE, DOCX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct ScoreRequest {
    pub text: String,
    pub job_description: String,
}

/// POST /api/v1/score
pub async fn handle_score(Json(req): Json<ScoreRequest>) -> Json<AtsReport> {
    Json(AtsReport::build(&req.text, &req.job_description))
}
