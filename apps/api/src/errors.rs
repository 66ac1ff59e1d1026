use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::document::{DocumentFormatError, ReapplyError, StyleMismatchError};
use crate::llm_client::ProviderError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Every response names the pipeline stage that failed, because the fix
/// (re-upload, switch provider, retry later) depends on it.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Document error: {0}")]
    DocumentFormat(#[from] DocumentFormatError),

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("Style error: {0}")]
    StyleMismatch(#[from] StyleMismatchError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ReapplyError> for AppError {
    fn from(err: ReapplyError) -> Self {
        match err {
            ReapplyError::StyleMismatch(e) => AppError::StyleMismatch(e),
            ReapplyError::Document(e) => AppError::DocumentFormat(e),
        }
    }
}

impl AppError {
    /// Pipeline stage reported to the client.
    pub fn stage(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::NotFound(_) => "request",
            AppError::DocumentFormat(_) => "document",
            AppError::Provider(_) => "provider",
            AppError::StyleMismatch(_) => "reapply",
            AppError::Storage(_) => "storage",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let stage = self.stage();
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::DocumentFormat(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "DOCUMENT_FORMAT_ERROR",
                format!("The uploaded file could not be read as a DOCX document: {e}"),
            ),
            AppError::Provider(e) => {
                tracing::error!("Provider error: {e}");
                let body = Json(json!({
                    "error": {
                        "code": "PROVIDER_ERROR",
                        "stage": stage,
                        "message": e.to_string(),
                        "provider": e.provider,
                        "retryable": e.retryable,
                    }
                }));
                return (StatusCode::BAD_GATEWAY, body).into_response();
            }
            AppError::StyleMismatch(e) => {
                tracing::error!("Style reapplication failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STYLE_MISMATCH",
                    e.to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "The tailored document could not be stored".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "stage": stage,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
