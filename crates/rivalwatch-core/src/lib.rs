// rivalwatch-core: the real-time update client between a push channel
// and consumers (CLI, dashboards).

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{ConnectOutcome, ConnectionInfo, ConnectionState, Handlers, RealtimeClient};
pub use config::{BackoffPolicy, RealtimeConfig};
pub use error::CoreError;
pub use store::EventStore;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Events
    AlertPayload, AlertSeverity, AnalysisOutcome, AnalysisProgress, ConnectionNotice, Event,
    EventKind, EventPayload, MetricsSnapshot,
    // Live jobs
    JobState, LiveJobStatus,
};

// Consumers frequently need the scope type alongside the client.
pub use rivalwatch_channel::ScopeId;
