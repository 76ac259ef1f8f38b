use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::AggregateOptions;

#[derive(Clone)]
pub struct AppState {
    /// Options every request starts from before its own overrides
    pub defaults: Arc<AggregateOptions>,
    pub max_body_bytes: usize,
    pub batch_concurrency: usize,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(defaults: AggregateOptions, max_body_bytes: usize) -> Self {
        Self {
            defaults: Arc::new(defaults),
            max_body_bytes,
            batch_concurrency: crate::batch::default_concurrency(),
            started_at: Utc::now(),
        }
    }
}
