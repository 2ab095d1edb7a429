// ── Domain model ──

mod event;
mod job;

pub use event::{
    AlertPayload, AlertSeverity, AnalysisOutcome, AnalysisProgress, ConnectionNotice, Event,
    EventKind, EventPayload, MetricsSnapshot,
};
pub use job::{JobState, LiveJobStatus};
