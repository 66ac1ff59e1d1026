//! Optional training-data sink: anonymized prompt/completion pairs appended
//! as JSON Lines, one file per UTC day.
//!
//! Writing is a side effect. A failed write is logged and never fails the
//! tailoring request.

use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::llm_client::ProviderKind;
use crate::sections::SectionLabel;

/// Stored prompt and completion text is cut to this many characters.
pub const MAX_RECORD_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub prompt: String,
    pub completion: String,
    pub provider: ProviderKind,
    pub section: SectionLabel,
    pub ats_score: f64,
    pub timestamp: DateTime<Utc>,
}

impl TrainingRecord {
    /// Builds a record with contact details redacted and text truncated.
    pub fn anonymized(
        prompt: &str,
        completion: &str,
        provider: ProviderKind,
        section: SectionLabel,
        ats_score: f64,
    ) -> Self {
        Self {
            prompt: truncate(&redact(prompt)),
            completion: truncate(&redact(completion)),
            provider,
            section,
            ats_score,
            timestamp: Utc::now(),
        }
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("email pattern is valid")
    })
}

fn phone_pattern() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b").expect("phone pattern is valid"))
}

/// Replaces e-mail addresses and ten-digit phone numbers with placeholders.
pub fn redact(text: &str) -> String {
    let text = email_pattern().replace_all(text, "[EMAIL]");
    phone_pattern().replace_all(&text, "[PHONE]").into_owned()
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_RECORD_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub struct TrainingSink {
    dir: PathBuf,
    // Serializes appends so concurrent requests never interleave lines.
    write_lock: Mutex<()>,
}

impl TrainingSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn file_for(&self, at: DateTime<Utc>) -> PathBuf {
        self.dir
            .join(format!("training_data_{}.jsonl", at.format("%Y%m%d")))
    }

    /// Appends one record. Errors are logged, not returned.
    pub async fn record(&self, record: &TrainingRecord) {
        if let Err(e) = self.append(record).await {
            warn!("Failed to write training record: {e:#}");
        }
    }

    async fn append(&self, record: &TrainingRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let path = self.file_for(record.timestamp);

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("Appended training record to {}", path.display());
        Ok(())
    }
}
