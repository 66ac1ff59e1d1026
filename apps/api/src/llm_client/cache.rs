//! Optional Redis-backed cache of completions, keyed by prompt.
//!
//! The cache never fails a request: connection and decode errors are logged
//! and treated as a miss.

use redis::Client;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Completion, CompletionParams, ProviderKind};

const KEY_PREFIX: &str = "tailor:completion:";

#[derive(Clone)]
pub struct PromptCache {
    client: Client,
    ttl_secs: u64,
}

impl PromptCache {
    pub fn new(client: Client, ttl_secs: u64) -> Self {
        Self { client, ttl_secs }
    }

    /// Deterministic key over everything that shapes the completion.
    pub fn key(prompt: &str, params: &CompletionParams, providers: &[ProviderKind]) -> String {
        let providers: Vec<&str> = providers.iter().map(|p| p.as_str()).collect();
        let material = format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}",
            providers.join(","),
            params.max_tokens,
            params.temperature,
            prompt
        );
        let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, material.as_bytes());
        format!("{KEY_PREFIX}{digest}")
    }

    pub async fn get(&self, key: &str) -> Option<Completion> {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("prompt cache unavailable: {}", e);
                return None;
            }
        };

        let cached = match redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await
        {
            Ok(cached) => cached?,
            Err(e) => {
                warn!("prompt cache read failed: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&cached) {
            Ok(completion) => {
                debug!("prompt cache hit: {}", key);
                Some(completion)
            }
            Err(e) => {
                warn!("discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    pub async fn put(&self, key: &str, completion: &Completion) {
        let value = match serde_json::to_string(completion) {
            Ok(value) => value,
            Err(e) => {
                warn!("prompt cache encode failed: {}", e);
                return;
            }
        };

        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("prompt cache unavailable: {}", e);
                return;
            }
        };

        if let Err(e) = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await
        {
            warn!("prompt cache write failed: {}", e);
        }
    }
}
