//! AI tailoring client: turns one section plus a job description into
//! rewritten lines, through the provider chain and the optional cache.

use tracing::info;

use crate::llm_client::{
    strip_code_fences, Completion, CompletionParams, PromptCache, ProviderChain, ProviderError,
    ProviderKind,
};
use crate::sections::SectionLabel;
use crate::tailoring::prompts::{build_section_prompt, Importance};

/// A rewritten section, ready to be distributed over paragraphs.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionRewrite {
    pub prompt: String,
    pub raw: String,
    /// Cleaned, non-empty output lines.
    pub lines: Vec<String>,
    pub provider: ProviderKind,
}

#[derive(Clone)]
pub struct TailoringClient {
    chain: ProviderChain,
    cache: Option<PromptCache>,
    params: CompletionParams,
}

impl TailoringClient {
    pub fn new(chain: ProviderChain, cache: Option<PromptCache>, params: CompletionParams) -> Self {
        Self {
            chain,
            cache,
            params,
        }
    }

    pub fn providers(&self) -> Vec<ProviderKind> {
        self.chain.kinds()
    }

    /// Rewrites one section.
    ///
    /// `importance` is passed through to the prompt. `order`, when given, restricts and reorders the configured providers
    /// for this call. Unknown or unconfigured providers are ignored; if none
    /// remain the configured order is used.
    pub async fn rewrite_section(
        &self,
        label: SectionLabel,
        content: &str,
        job_description: &str,
        importance: Option<Importance>,
        order: Option<&[ProviderKind]>,
    ) -> Result<SectionRewrite, ProviderError> {
        let chain = order
            .and_then(|order| self.chain.reordered(order))
            .unwrap_or_else(|| self.chain.clone());
        let prompt = build_section_prompt(label, content, job_description, importance);

        let completion = self.complete(&chain, &prompt).await?;
        info!(
            "Rewrote {} section via {} ({} chars)",
            label,
            completion.provider,
            completion.text.len()
        );

        Ok(SectionRewrite {
            lines: clean_lines(&completion.text),
            raw: completion.text,
            provider: completion.provider,
            prompt,
        })
    }

    async fn complete(
        &self,
        chain: &ProviderChain,
        prompt: &str,
    ) -> Result<Completion, ProviderError> {
        let Some(cache) = &self.cache else {
            return chain.complete(prompt, &self.params).await;
        };

        let key = PromptCache::key(prompt, &self.params, &chain.kinds());
        if let Some(hit) = cache.get(&key).await {
            return Ok(hit);
        }
        let completion = chain.complete(prompt, &self.params).await?;
        cache.put(&key, &completion).await;
        Ok(completion)
    }
}

/// Output lines with fences, bullet markers and blank lines removed.
pub fn clean_lines(text: &str) -> Vec<String> {
    strip_code_fences(text)
        .lines()
        .map(|line| {
            let line = line.trim();
            ["- ", "• ", "* "]
                .iter()
                .find_map(|marker| line.strip_prefix(marker))
                .unwrap_or(line)
                .trim()
        })
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
