//! LLM client: the single way this service talks to hosted language models.
//!
//! Every vendor sits behind [`CompletionProvider`], a prompt-in, text-out
//! capability. A [`ProviderChain`] tries providers in a configured order and
//! moves on to the next one only when the failure is marked retryable.
//!
//! Retry policy (per provider, configuration rather than a guarantee): 429 and
//! 5xx responses and transport errors are retried up to `LLM_MAX_RETRIES`
//! times with exponential backoff. Timeouts are surfaced immediately.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod anthropic;
pub mod cache;
pub mod openai;
pub mod prompts;

pub use anthropic::AnthropicProvider;
pub use cache::PromptCache;
pub use openai::OpenAiProvider;

const BACKOFF_BASE_MS: u64 = 500;

// ────────────────────────────────────────────────────────────────────────────
// Provider identity and call parameters
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown provider '{0}' (expected anthropic or openai)")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "openai" | "gpt" => Ok(ProviderKind::OpenAi),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

/// Parses a comma-separated provider list such as `"openai, anthropic"`.
pub fn parse_provider_order(raw: &str) -> Result<Vec<ProviderKind>, UnknownProvider> {
    let mut order = Vec::new();
    for kind in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind = kind.parse()?;
        if !order.contains(&kind) {
            order.push(kind);
        }
    }
    Ok(order)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompletionParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderErrorKind {
    #[error("HTTP error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("provider returned empty content")]
    EmptyContent,

    #[error("no API key configured")]
    MissingCredential,
}

/// A failed completion call.
///
/// `retryable` tells the caller whether another provider is worth trying; it
/// is false only for requests the provider rejected as invalid.
#[derive(Debug, Error)]
#[error("{provider} provider failed: {kind}")]
pub struct ProviderError {
    pub provider: ProviderKind,
    #[source]
    pub kind: ProviderErrorKind,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(provider: ProviderKind, kind: ProviderErrorKind) -> Self {
        let retryable = match &kind {
            ProviderErrorKind::Api { status, .. } => is_retryable_status(*status),
            _ => true,
        };
        Self {
            provider,
            kind,
            retryable,
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 401 | 403 | 408 | 429) || status >= 500
}

// ────────────────────────────────────────────────────────────────────────────
// Provider trait
// ────────────────────────────────────────────────────────────────────────────

/// One hosted model behind the `complete(prompt, params) -> text` shape.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, ProviderError>;
}

/// Sends the request built by `build`, retrying rate limits, server errors
/// and transport failures. Returns the raw success body.
pub(crate) async fn send_with_retry<F>(
    provider: ProviderKind,
    max_retries: u32,
    build: F,
) -> Result<String, ProviderError>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_error: Option<ProviderErrorKind> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_millis(BACKOFF_BASE_MS * (1 << (attempt - 1)));
            warn!(
                "{} call attempt {} failed, retrying after {}ms...",
                provider,
                attempt,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let response = match build().send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(ProviderError::new(provider, ProviderErrorKind::Timeout));
            }
            Err(e) => {
                last_error = Some(ProviderErrorKind::Transport(e));
                continue;
            }
        };

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
        {
            let body = response.text().await.unwrap_or_default();
            warn!("{} API returned {}: {}", provider, status, body);
            last_error = Some(ProviderErrorKind::Api {
                status: status.as_u16(),
                message: api_error_message(body),
            });
            continue;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(
                provider,
                ProviderErrorKind::Api {
                    status: status.as_u16(),
                    message: api_error_message(body),
                },
            ));
        }

        return match response.text().await {
            Ok(body) => {
                debug!("{} call succeeded ({} bytes)", provider, body.len());
                Ok(body)
            }
            Err(e) if e.is_timeout() => Err(ProviderError::new(provider, ProviderErrorKind::Timeout)),
            Err(e) => Err(ProviderError::new(provider, ProviderErrorKind::Transport(e))),
        };
    }

    Err(ProviderError::new(
        provider,
        last_error.unwrap_or(ProviderErrorKind::EmptyContent),
    ))
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Both vendors wrap failures as `{"error": {"message": ...}}`.
fn api_error_message(body: String) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

// ────────────────────────────────────────────────────────────────────────────
// Fallback chain
// ────────────────────────────────────────────────────────────────────────────

/// A successful completion and the provider that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub provider: ProviderKind,
}

/// Ordered providers: the primary first, then fallbacks in sequence.
#[derive(Clone)]
pub struct ProviderChain {
    primary: Arc<dyn CompletionProvider>,
    fallbacks: Vec<Arc<dyn CompletionProvider>>,
}

impl ProviderChain {
    /// `None` when `providers` is empty.
    pub fn new(providers: Vec<Arc<dyn CompletionProvider>>) -> Option<Self> {
        let mut providers = providers.into_iter();
        let primary = providers.next()?;
        Some(Self {
            primary,
            fallbacks: providers.collect(),
        })
    }

    /// The providers of this chain restricted to, and ordered by, `order`.
    /// `None` when none of them are available.
    pub fn reordered(&self, order: &[ProviderKind]) -> Option<Self> {
        let selected = order
            .iter()
            .filter_map(|kind| self.providers().find(|p| p.kind() == *kind).cloned())
            .collect();
        Self::new(selected)
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.providers().map(|p| p.kind()).collect()
    }

    fn providers(&self) -> impl Iterator<Item = &Arc<dyn CompletionProvider>> {
        std::iter::once(&self.primary).chain(self.fallbacks.iter())
    }

    /// Tries each provider in order. A non-retryable failure stops the chain;
    /// otherwise the last failure is returned once every provider has failed.
    pub async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<Completion, ProviderError> {
        let mut error = match self.primary.complete(prompt, params).await {
            Ok(text) => {
                return Ok(Completion {
                    text,
                    provider: self.primary.kind(),
                })
            }
            Err(e) => e,
        };

        for fallback in &self.fallbacks {
            if !error.retryable {
                break;
            }
            warn!(
                "{}; falling back to {}",
                error,
                fallback.kind()
            );
            match fallback.complete(prompt, params).await {
                Ok(text) => {
                    return Ok(Completion {
                        text,
                        provider: fallback.kind(),
                    })
                }
                Err(e) => error = e,
            }
        }

        Err(error)
    }
}

/// Strips a surrounding ``` fence (with or without a language tag).
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag, if any, on the opening line.
    let rest = match rest.find('\n') {
        Some(newline) if !rest[..newline].trim().contains(' ') => &rest[newline + 1..],
        _ => rest,
    };
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

// ────────────────────────────────────────────────────────────────────────────
// Test support
// ────────────────────────────────────────────────────────────────────────────
