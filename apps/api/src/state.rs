use std::sync::Arc;

use crate::config::Config;
use crate::sections::SectionDetector;
use crate::storage::DocumentStore;
use crate::tailoring::client::TailoringClient;
use crate::tailoring::telemetry::TrainingSink;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub client: TailoringClient,
    /// Compiled heading patterns, built once at startup.
    pub detector: Arc<SectionDetector>,
    /// Output documents. S3 in production, in-memory in tests.
    pub store: Arc<dyn DocumentStore>,
    /// Training-data capture; `None` when TRAINING_DATA_DIR is unset.
    pub telemetry: Option<Arc<TrainingSink>>,
}
