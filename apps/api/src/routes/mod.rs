pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::tailoring::handlers;

pub fn build_router(state: AppState) -> Router {
    // Multipart framing adds a little on top of the file itself.
    let body_limit = state.config.max_upload_bytes + 64 * 1024;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/sections", post(handlers::handle_sections))
        .route("/api/v1/tailor", post(handlers::handle_tailor))
        .route("/api/v1/documents/:id", get(handlers::handle_download))
        .route("/api/v1/score", post(handlers::handle_score))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::document::fixtures::sample_resume;
    use crate::document::DocxDocument;
    use crate::llm_client::testing::{FakeProvider, PARAMS};
    use crate::llm_client::{CompletionProvider, ProviderChain, ProviderKind};
    use crate::sections::SectionDetector;
    use crate::storage::MemoryDocumentStore;
    use crate::tailoring::client::TailoringClient;

    const BOUNDARY: &str = "tailor-test-boundary";

    fn test_config() -> Config {
        Config::from_lookup(|key| {
            match key {
                "S3_BUCKET" => Some("tailored"),
                "S3_ENDPOINT" => Some("http://localhost:9000"),
                "AWS_ACCESS_KEY_ID" => Some("minio"),
                "AWS_SECRET_ACCESS_KEY" => Some("minio-secret"),
                "ANTHROPIC_API_KEY" => Some("sk-test"),
                _ => None,
            }
            .map(str::to_string)
        })
        .unwrap()
    }

    fn app(provider: Arc<FakeProvider>) -> Router {
        let chain =
            ProviderChain::new(vec![provider as Arc<dyn CompletionProvider>]).unwrap();
        build_router(AppState {
            config: test_config(),
            client: TailoringClient::new(chain, None, PARAMS),
            detector: Arc::new(SectionDetector::new()),
            store: Arc::new(MemoryDocumentStore::default()),
            telemetry: None,
        })
    }

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn multipart(parts: &[Part]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                            .as_bytes(),
                    );
                }
                Part::File(name, filename, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/v1/tailor")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(Arc::new(FakeProvider::new(ProviderKind::Anthropic)));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["providers"][0], "anthropic");
    }

    #[tokio::test]
    async fn test_tailor_then_download() {
        let provider = Arc::new(
            FakeProvider::new(ProviderKind::Anthropic).replying("Rust, Go, PostgreSQL, Python"),
        );
        let app = app(provider.clone());
        let resume = sample_resume();

        let response = app
            .clone()
            .oneshot(multipart(&[
                Part::File("resume", "jane.docx", &resume),
                Part::Text("job_description", "Python and Rust engineer"),
                Part::Text("sections", "skills"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["filename"], "jane_tailored.docx");
        assert_eq!(body["sections"]["skills"]["text"], "Rust, Go, PostgreSQL, Python");
        assert_eq!(body["ats_score"], 100.0);
        let url = body["download_url"].as_str().unwrap().to_string();

        let response = app
            .oneshot(Request::get(url.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"jane_tailored.docx\""
        );

        let doc = DocxDocument::from_bytes(body_bytes(response).await).unwrap();
        assert_eq!(doc.paragraphs()[10].text(), "Rust, Go, PostgreSQL, Python");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_plain_text_upload_reports_document_stage() {
        let provider = Arc::new(FakeProvider::new(ProviderKind::Anthropic).replying("unused"));
        let response = app(provider.clone())
            .oneshot(multipart(&[
                Part::File("resume", "resume.docx", b"Jane Doe\nExperience"),
                Part::Text("job_description", "Python"),
                Part::Text("sections", "experience"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["error"]["stage"], "document");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_section_is_rejected() {
        let response = app(Arc::new(FakeProvider::new(ProviderKind::Anthropic)))
            .oneshot(multipart(&[
                Part::File("resume", "resume.docx", &sample_resume()),
                Part::Text("job_description", "Python"),
                Part::Text("sections", "hobbies"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["error"]["stage"], "request");
    }

    #[tokio::test]
    async fn test_importance_field_reaches_result() {
        let provider = Arc::new(
            FakeProvider::new(ProviderKind::Anthropic).replying("Rust, Go, PostgreSQL, Python"),
        );
        let response = app(provider.clone())
            .oneshot(multipart(&[
                Part::File("resume", "jane.docx", &sample_resume()),
                Part::Text("job_description", "Python and Rust engineer"),
                Part::Text("sections", "skills"),
                Part::Text("importance", "skills:3, summary:5"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["sections"]["skills"]["importance"], 3);
        assert_eq!(body["sections"]["skills"]["validation"]["valid"], true);
        assert!(provider.prompts()[0].contains("Importance Level: 3/5"));
    }

    #[tokio::test]
    async fn test_out_of_range_importance_is_rejected() {
        let provider = Arc::new(FakeProvider::new(ProviderKind::Anthropic).replying("unused"));
        let response = app(provider.clone())
            .oneshot(multipart(&[
                Part::File("resume", "jane.docx", &sample_resume()),
                Part::Text("job_description", "Python"),
                Part::Text("sections", "skills"),
                Part::Text("importance", "skills:9"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["error"]["stage"], "request");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_document_is_not_found() {
        let response = app(Arc::new(FakeProvider::new(ProviderKind::Anthropic)))
            .oneshot(
                Request::get(format!("/api/v1/documents/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_score_endpoint() {
        let request = Request::post("/api/v1/score")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"text":"Led a team of 5 engineers using Python.","job_description":"Looking for a team leader with Python skills"}"#,
            ))
            .unwrap();

        let response = app(Arc::new(FakeProvider::new(ProviderKind::Anthropic)))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["score"], 40.0);
        assert_eq!(body["keyword_count"], 5);
    }
}
