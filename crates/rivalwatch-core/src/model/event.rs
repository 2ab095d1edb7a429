// ── Normalized event model ──
//
// The server pushes heterogeneous JSON messages discriminated by a
// `kind` field. The closed set of kinds below is validated at the
// ingestion boundary: unknown kinds fail deserialization and are
// dropped, so a server deploying a new event type cannot crash an
// older client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use super::job::JobState;

// ── Kinds ────────────────────────────────────────────────────────────

/// Discriminant tag for pushed messages.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    Alert,
    AnalysisUpdate,
    AnalysisComplete,
    MetricsUpdate,
    ConnectionState,
}

// ── Payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    High,
    Critical,
}

/// A competitor alert (rank drop, pricing change, new campaign, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPayload {
    pub severity: AlertSeverity,
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub competitor_id: Option<String>,

    /// Server-side timestamp. May be skewed or missing -- ordering and
    /// recency windows use the client-assigned `received_at` instead.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Progress report for a running analysis job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisProgress {
    pub job_id: String,

    /// Percentage, 0-100. Out-of-range values are clamped on ingestion.
    pub progress: u8,

    #[serde(default)]
    pub status: JobState,

    #[serde(default)]
    pub estimated_seconds_remaining: Option<u64>,
}

/// Terminal report for an analysis job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub job_id: String,

    #[serde(default = "default_true")]
    pub success: bool,

    #[serde(default)]
    pub summary: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A metrics refresh for one competitor (or the whole project).
///
/// The metric set is open-ended -- everything beyond `competitor_id`
/// is captured as-is so nothing the server sends is silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default)]
    pub competitor_id: Option<String>,

    #[serde(flatten)]
    pub metrics: serde_json::Value,
}

/// Server-announced connection status changes. Also used for the
/// client's own synthetic gap marker after a reconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionNotice {
    pub status: String,

    #[serde(default)]
    pub message: Option<String>,
}

/// Tagged union of all recognized message payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Alert(AlertPayload),
    AnalysisUpdate(AnalysisProgress),
    AnalysisComplete(AnalysisOutcome),
    MetricsUpdate(MetricsSnapshot),
    ConnectionState(ConnectionNotice),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Alert(_) => EventKind::Alert,
            Self::AnalysisUpdate(_) => EventKind::AnalysisUpdate,
            Self::AnalysisComplete(_) => EventKind::AnalysisComplete,
            Self::MetricsUpdate(_) => EventKind::MetricsUpdate,
            Self::ConnectionState(_) => EventKind::ConnectionState,
        }
    }

    /// Parse one raw text frame into payloads.
    ///
    /// A frame is either a single JSON object or an array of them.
    /// Items that fail validation (unknown `kind`, missing required
    /// fields) are dropped and logged without affecting their siblings.
    pub fn parse_frame(text: &str) -> Vec<Self> {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "failed to parse stream frame");
                return Vec::new();
            }
        };

        let items = match value {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        };

        items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<Self>(item) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    tracing::debug!(error = %e, "dropping unrecognized stream message");
                    None
                }
            })
            .collect()
    }
}

// ── Event ────────────────────────────────────────────────────────────

/// The normalized unit of state change, as stored in history.
///
/// `received_at` is client-assigned and monotonically non-decreasing
/// within a session; recency windows additionally use a monotonic
/// instant so they cannot go backwards under wall-clock adjustment.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,

    #[serde(skip)]
    pub(crate) seen_at: Instant,

    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// The alert payload, if this is an alert event.
    pub fn as_alert(&self) -> Option<&AlertPayload> {
        match &self.payload {
            EventPayload::Alert(alert) => Some(alert),
            _ => None,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
