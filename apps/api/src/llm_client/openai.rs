//! OpenAI Chat Completions provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    send_with_retry, CompletionParams, CompletionProvider, ProviderError, ProviderErrorKind,
    ProviderKind,
};
use crate::config::ProviderSettings;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiProvider {
    http: Client,
    settings: ProviderSettings,
    max_retries: u32,
}

impl OpenAiProvider {
    pub fn new(http: Client, settings: ProviderSettings, max_retries: u32) -> Self {
        Self {
            http,
            settings,
            max_retries,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, ProviderError> {
        let fail = |kind| ProviderError::new(ProviderKind::OpenAi, kind);
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| fail(ProviderErrorKind::MissingCredential))?;

        let request_body = ChatRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let body = send_with_retry(ProviderKind::OpenAi, self.max_retries, || {
            self.http
                .post(&self.settings.endpoint)
                .bearer_auth(api_key)
                .json(&request_body)
        })
        .await?;

        let response: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| fail(ProviderErrorKind::Malformed(e.to_string())))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content);

        match content.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(fail(ProviderErrorKind::EmptyContent)),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::llm_client::testing::{serve, PARAMS};

    fn provider(endpoint: String) -> OpenAiProvider {
        OpenAiProvider::new(
            Client::new(),
            ProviderSettings {
                api_key: Some("sk-openai".to_string()),
                model: "gpt-test".to_string(),
                endpoint,
            },
            0,
        )
    }

    #[tokio::test]
    async fn test_returns_first_choice_content() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-openai");
                assert_eq!(body["model"], "gpt-test");
                assert_eq!(body["max_tokens"], 256);
                Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": "Shipped Python services."}}]
                }))
            }),
        );
        let base = serve(router).await;

        let text = provider(format!("{base}/v1/chat/completions"))
            .complete("prompt", &PARAMS)
            .await
            .unwrap();

        assert_eq!(text, "Shipped Python services.");
    }

    #[tokio::test]
    async fn test_null_content_is_empty() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": [{"message": {"content": null}}]})) }),
        );
        let base = serve(router).await;

        let err = provider(format!("{base}/v1/chat/completions"))
            .complete("prompt", &PARAMS)
            .await
            .unwrap_err();

        assert!(matches!(err.kind, ProviderErrorKind::EmptyContent));
        assert_eq!(err.provider, ProviderKind::OpenAi);
    }

    #[tokio::test]
    async fn test_unauthorized_is_retryable_for_fallback() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    Json(json!({"error": {"message": "Incorrect API key provided"}})),
                )
            }),
        );
        let base = serve(router).await;

        let err = provider(format!("{base}/v1/chat/completions"))
            .complete("prompt", &PARAMS)
            .await
            .unwrap_err();

        assert!(err.retryable);
        assert!(matches!(err.kind, ProviderErrorKind::Api { status: 401, .. }));
    }
}
