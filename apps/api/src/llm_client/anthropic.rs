//! Anthropic Messages API provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    send_with_retry, CompletionParams, CompletionProvider, ProviderError, ProviderErrorKind,
    ProviderKind,
};
use crate::config::ProviderSettings;

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

impl MessagesResponse {
    /// Text of the first text block.
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Clone)]
pub struct AnthropicProvider {
    http: Client,
    settings: ProviderSettings,
    max_retries: u32,
}

impl AnthropicProvider {
    pub fn new(http: Client, settings: ProviderSettings, max_retries: u32) -> Self {
        Self {
            http,
            settings,
            max_retries,
        }
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, ProviderError> {
        let fail = |kind| ProviderError::new(ProviderKind::Anthropic, kind);
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| fail(ProviderErrorKind::MissingCredential))?;

        let request_body = MessagesRequest {
            model: &self.settings.model,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let body = send_with_retry(ProviderKind::Anthropic, self.max_retries, || {
            self.http
                .post(&self.settings.endpoint)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&request_body)
        })
        .await?;

        let response: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| fail(ProviderErrorKind::Malformed(e.to_string())))?;

        match response.text().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(fail(ProviderErrorKind::EmptyContent)),
        }
    }
}
