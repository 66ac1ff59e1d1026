use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::llm_client::{self, parse_provider_order, CompletionParams, ProviderKind};

/// Credentials and endpoint for one hosted model.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,

    pub anthropic: ProviderSettings,
    pub openai: ProviderSettings,
    /// Fallback order; only providers with an API key are used.
    pub provider_order: Vec<ProviderKind>,
    pub llm_timeout_secs: u64,
    pub llm_max_retries: u32,
    pub completion: CompletionParams,

    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,

    /// Prompt cache is disabled when unset.
    pub redis_url: Option<String>,
    pub prompt_cache_ttl_secs: u64,
    /// Training-data capture is disabled when unset.
    pub training_data_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let config = Config {
            port: env.parse_or("PORT", 8080)?,
            rust_log: env.or("RUST_LOG", "info"),

            anthropic: ProviderSettings {
                api_key: env.optional("ANTHROPIC_API_KEY"),
                model: env.or("ANTHROPIC_MODEL", "claude-sonnet-4-5"),
                endpoint: env.or("ANTHROPIC_ENDPOINT", llm_client::anthropic::DEFAULT_ENDPOINT),
            },
            openai: ProviderSettings {
                api_key: env.optional("OPENAI_API_KEY"),
                model: env.or("OPENAI_MODEL", "gpt-4o-mini"),
                endpoint: env.or("OPENAI_ENDPOINT", llm_client::openai::DEFAULT_ENDPOINT),
            },
            provider_order: parse_provider_order(&env.or("PROVIDER_ORDER", "anthropic,openai"))
                .context("PROVIDER_ORDER must list anthropic and/or openai")?,
            llm_timeout_secs: env.parse_or("LLM_TIMEOUT_SECS", 60)?,
            llm_max_retries: env.parse_or("LLM_MAX_RETRIES", 2)?,
            completion: CompletionParams {
                max_tokens: env.parse_or("LLM_MAX_TOKENS", 2048)?,
                temperature: env.parse_or("LLM_TEMPERATURE", 0.7)?,
            },

            s3_bucket: env.require("S3_BUCKET")?,
            s3_endpoint: env.require("S3_ENDPOINT")?,
            aws_access_key_id: env.require("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: env.require("AWS_SECRET_ACCESS_KEY")?,

            redis_url: env.optional("REDIS_URL"),
            prompt_cache_ttl_secs: env.parse_or("PROMPT_CACHE_TTL_SECS", 86_400)?,
            training_data_dir: env.optional("TRAINING_DATA_DIR").map(PathBuf::from),
            max_upload_bytes: env.parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        };

        if config.enabled_providers().is_empty() {
            bail!(
                "No usable LLM provider: set ANTHROPIC_API_KEY or OPENAI_API_KEY for a provider listed in PROVIDER_ORDER"
            );
        }
        if !(0.0..=2.0).contains(&config.completion.temperature) {
            bail!("LLM_TEMPERATURE must be between 0.0 and 2.0");
        }

        Ok(config)
    }

    pub fn provider(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::OpenAi => &self.openai,
        }
    }

    /// `provider_order` restricted to providers that have an API key.
    pub fn enabled_providers(&self) -> Vec<ProviderKind> {
        self.provider_order
            .iter()
            .copied()
            .filter(|kind| self.provider(*kind).api_key.is_some())
            .collect()
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Present and non-blank.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn require(&self, key: &str) -> Result<String> {
        self.optional(key)
            .with_context(|| format!("Required environment variable '{key}' is not set"))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.optional(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("{key} has an invalid value '{raw}'")),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("S3_BUCKET", "tailored"),
            ("S3_ENDPOINT", "http://localhost:9000"),
            ("AWS_ACCESS_KEY_ID", "minio"),
            ("AWS_SECRET_ACCESS_KEY", "minio-secret"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config> {
        Config::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults_apply() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.provider_order, vec![ProviderKind::Anthropic, ProviderKind::OpenAi]);
        assert_eq!(config.enabled_providers(), vec![ProviderKind::Anthropic]);
        assert_eq!(config.anthropic.model, "claude-sonnet-4-5");
        assert_eq!(config.completion.max_tokens, 2048);
        assert_eq!(config.llm_max_retries, 2);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert!(config.redis_url.is_none());
        assert!(config.training_data_dir.is_none());
    }

    #[test]
    fn test_missing_required_variable_is_named() {
        let mut env = base_env();
        env.remove("S3_BUCKET");

        let err = load(&env).unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET"));
    }

    #[test]
    fn test_no_keyed_provider_is_rejected() {
        let mut env = base_env();
        env.remove("ANTHROPIC_API_KEY");
        env.insert("OPENAI_API_KEY", "sk-oa");
        env.insert("PROVIDER_ORDER", "anthropic");

        assert!(load(&env).is_err());
    }

    #[test]
    fn test_provider_order_and_overrides() {
        let mut env = base_env();
        env.insert("OPENAI_API_KEY", "sk-oa");
        env.insert("PROVIDER_ORDER", "openai,anthropic");
        env.insert("LLM_TEMPERATURE", "0.3");
        env.insert("REDIS_URL", "redis://localhost:6379");

        let config = load(&env).unwrap();
        assert_eq!(
            config.enabled_providers(),
            vec![ProviderKind::OpenAi, ProviderKind::Anthropic]
        );
        assert_eq!(config.completion.temperature, 0.3);
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379"));
    }

    #[test]
    fn test_malformed_number_is_rejected() {
        let mut env = base_env();
        env.insert("PORT", "eighty");

        let err = load(&env).unwrap_err();
        assert!(format!("{err:#}").contains("PORT"));
    }
}
