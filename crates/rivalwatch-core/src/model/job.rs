// ── Live analysis-job tracking ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    Pending,
    #[default]
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Derived per-job view, keyed by job id.
///
/// Created on the first `analysis_update` (or `analysis_complete`) for
/// a job and updated in place on every subsequent event for the same id.
#[derive(Debug, Clone, Serialize)]
pub struct LiveJobStatus {
    pub job_id: String,
    pub status: JobState,
    pub progress: u8,
    pub estimated_seconds_remaining: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LiveJobStatus {
    pub(crate) fn new(job_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            status: JobState::default(),
            progress: 0,
            estimated_seconds_remaining: None,
            started_at,
            completed_at: None,
        }
    }
}
