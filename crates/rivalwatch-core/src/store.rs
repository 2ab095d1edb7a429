// ── Bounded event history + derived views ──
//
// Owned exclusively by the client for its scope. Consumers only ever
// receive snapshots or cloned values, never references into the store,
// so reads can never race the ingestion path.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

use crate::model::{Event, EventKind, EventPayload, JobState, LiveJobStatus};

/// Bounded FIFO history plus the live-job map derived from it.
pub struct EventStore {
    history_cap: usize,
    max_completed_jobs: usize,
    history: Mutex<HistoryInner>,
    jobs: DashMap<String, LiveJobStatus>,
    last_event_at: watch::Sender<Option<DateTime<Utc>>>,
}

struct HistoryInner {
    events: VecDeque<Arc<Event>>,
    /// High-water mark keeping `received_at` non-decreasing even if the
    /// wall clock steps backwards mid-session.
    last_stamp: Option<DateTime<Utc>>,
}

impl EventStore {
    pub fn new(history_cap: usize, max_completed_jobs: usize) -> Self {
        let (last_event_at, _) = watch::channel(None);

        Self {
            history_cap: history_cap.max(1),
            max_completed_jobs,
            history: Mutex::new(HistoryInner {
                events: VecDeque::with_capacity(history_cap.max(1)),
                last_stamp: None,
            }),
            jobs: DashMap::new(),
            last_event_at,
        }
    }

    // ── Ingestion ────────────────────────────────────────────────────

    /// Stamp a validated payload, append it to history (evicting the
    /// oldest entry at capacity), and update the live-job map.
    pub fn ingest(&self, payload: EventPayload) -> Arc<Event> {
        let now = Utc::now();

        let event = {
            let mut inner = self.inner();
            let stamped = inner.last_stamp.map_or(now, |last| now.max(last));
            inner.last_stamp = Some(stamped);

            let event = Arc::new(Event {
                id: Uuid::new_v4(),
                received_at: stamped,
                seen_at: Instant::now(),
                payload,
            });

            if inner.events.len() == self.history_cap {
                inner.events.pop_front();
            }
            inner.events.push_back(Arc::clone(&event));
            event
        };

        self.apply_job_transition(&event);
        self.last_event_at.send_replace(Some(event.received_at));
        event
    }

    // ── Derived views ────────────────────────────────────────────────

    /// Snapshot of the full history, oldest first.
    pub fn history(&self) -> Vec<Arc<Event>> {
        self.inner().events.iter().cloned().collect()
    }

    /// The most recently ingested event.
    pub fn latest(&self) -> Option<Arc<Event>> {
        self.inner().events.back().cloned()
    }

    /// History filtered to one kind, delivery order preserved.
    pub fn events_by_kind(&self, kind: EventKind) -> Vec<Arc<Event>> {
        self.inner()
            .events
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }

    /// Whether any critical alert arrived within `window` of now.
    pub fn has_recent_critical_alert(&self, window: Duration) -> bool {
        self.inner().events.iter().rev().any(|event| {
            event.seen_at.elapsed() <= window
                && event
                    .as_alert()
                    .is_some_and(|a| a.severity == crate::model::AlertSeverity::Critical)
        })
    }

    /// Whether anything at all arrived within `window` of now.
    pub fn has_recent_activity(&self, window: Duration) -> bool {
        self.inner()
            .events
            .back()
            .is_some_and(|event| event.seen_at.elapsed() <= window)
    }

    /// Cloned snapshot of the live-job map.
    pub fn job_statuses(&self) -> HashMap<String, LiveJobStatus> {
        self.jobs
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    pub fn job_status(&self, job_id: &str) -> Option<LiveJobStatus> {
        self.jobs.get(job_id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner().events.is_empty()
    }

    /// When the last event arrived, if any.
    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        *self.last_event_at.borrow()
    }

    /// Push-based notification of ingestion, for consumers that render
    /// "last update: Ns ago" without polling the store.
    pub fn watch_last_event(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.last_event_at.subscribe()
    }

    /// Empty the history and the live-job map.
    ///
    /// Used by "dismiss all" actions; connection state and the
    /// underlying subscription are untouched.
    pub fn clear(&self) {
        self.inner().events.clear();
        self.jobs.clear();
        self.last_event_at.send_replace(None);
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn inner(&self) -> MutexGuard<'_, HistoryInner> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_job_transition(&self, event: &Event) {
        match &event.payload {
            EventPayload::AnalysisUpdate(update) => {
                let mut entry = self
                    .jobs
                    .entry(update.job_id.clone())
                    .or_insert_with(|| LiveJobStatus::new(update.job_id.clone(), event.received_at));
                entry.status = update.status;
                entry.progress = update.progress.min(100);
                entry.estimated_seconds_remaining = update.estimated_seconds_remaining;
                if update.status.is_terminal() && entry.completed_at.is_none() {
                    entry.completed_at = Some(event.received_at);
                }
            }
            EventPayload::AnalysisComplete(outcome) => {
                {
                    let mut entry = self.jobs.entry(outcome.job_id.clone()).or_insert_with(|| {
                        LiveJobStatus::new(outcome.job_id.clone(), event.received_at)
                    });
                    entry.status = if outcome.success {
                        JobState::Completed
                    } else {
                        JobState::Failed
                    };
                    if outcome.success {
                        entry.progress = 100;
                    }
                    entry.estimated_seconds_remaining = None;
                    entry.completed_at = Some(event.received_at);
                }
                self.evict_completed_jobs();
            }
            _ => {}
        }
    }

    /// Keep at most `max_completed_jobs` terminal entries, evicting the
    /// oldest by `completed_at`. Active jobs are never evicted.
    fn evict_completed_jobs(&self) {
        let mut completed: Vec<(String, DateTime<Utc>)> = self
            .jobs
            .iter()
            .filter_map(|r| r.completed_at.map(|at| (r.key().clone(), at)))
            .collect();

        if completed.len() <= self.max_completed_jobs {
            return;
        }

        completed.sort_by_key(|(_, at)| *at);
        let excess = completed.len() - self.max_completed_jobs;
        for (job_id, _) in completed.into_iter().take(excess) {
            self.jobs.remove(&job_id);
            tracing::trace!(job_id, "evicted completed job entry");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{AlertPayload, AlertSeverity, AnalysisOutcome, AnalysisProgress};

    fn alert(severity: AlertSeverity, title: &str) -> EventPayload {
        EventPayload::Alert(AlertPayload {
            severity,
            title: title.into(),
            description: None,
            competitor_id: None,
            timestamp: None,
        })
    }

    fn update(job_id: &str, progress: u8) -> EventPayload {
        EventPayload::AnalysisUpdate(AnalysisProgress {
            job_id: job_id.into(),
            progress,
            status: JobState::Processing,
            estimated_seconds_remaining: None,
        })
    }

    fn complete(job_id: &str, success: bool) -> EventPayload {
        EventPayload::AnalysisComplete(AnalysisOutcome {
            job_id: job_id.into(),
            success,
            summary: None,
        })
    }

    #[test]
    fn history_is_bounded_fifo() {
        let store = EventStore::new(3, 64);
        for i in 0..5 {
            store.ingest(alert(AlertSeverity::Info, &format!("a{i}")));
        }

        let titles: Vec<String> = store
            .history()
            .iter()
            .map(|e| e.as_alert().unwrap().title.clone())
            .collect();
        assert_eq!(titles, vec!["a2", "a3", "a4"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn events_by_kind_preserves_relative_order() {
        let store = EventStore::new(10, 64);
        store.ingest(alert(AlertSeverity::Info, "first"));
        store.ingest(update("J1", 10));
        store.ingest(alert(AlertSeverity::High, "second"));
        store.ingest(update("J1", 20));

        let alerts = store.events_by_kind(EventKind::Alert);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].as_alert().unwrap().title, "first");
        assert_eq!(alerts[1].as_alert().unwrap().title, "second");
    }

    #[test]
    fn latest_returns_newest_event() {
        let store = EventStore::new(10, 64);
        assert!(store.latest().is_none());

        store.ingest(alert(AlertSeverity::Info, "old"));
        store.ingest(alert(AlertSeverity::Info, "new"));
        assert_eq!(store.latest().unwrap().as_alert().unwrap().title, "new");
    }

    #[test]
    fn received_at_is_monotonically_non_decreasing() {
        let store = EventStore::new(10, 64);
        for _ in 0..20 {
            store.ingest(alert(AlertSeverity::Info, "x"));
        }

        let history = store.history();
        for pair in history.windows(2) {
            assert!(pair[1].received_at >= pair[0].received_at);
        }
    }

    #[test]
    fn job_updates_upsert_a_single_entry() {
        let store = EventStore::new(10, 64);
        store.ingest(update("J1", 40));
        store.ingest(update("J1", 90));

        let jobs = store.job_statuses();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs["J1"].progress, 90);
        assert_eq!(jobs["J1"].status, JobState::Processing);
        assert!(jobs["J1"].completed_at.is_none());
    }

    #[test]
    fn out_of_range_progress_is_clamped() {
        let store = EventStore::new(10, 64);
        store.ingest(update("J1", 250));
        assert_eq!(store.job_status("J1").unwrap().progress, 100);
    }

    #[test]
    fn completion_marks_the_job_terminal() {
        let store = EventStore::new(10, 64);
        store.ingest(update("J1", 80));
        store.ingest(complete("J1", true));

        let job = store.job_status("J1").unwrap();
        assert_eq!(job.status, JobState::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn failed_completion_keeps_last_progress() {
        let store = EventStore::new(10, 64);
        store.ingest(update("J1", 70));
        store.ingest(complete("J1", false));

        let job = store.job_status("J1").unwrap();
        assert_eq!(job.status, JobState::Failed);
        assert_eq!(job.progress, 70);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn completion_without_prior_update_creates_the_entry() {
        let store = EventStore::new(10, 64);
        store.ingest(complete("J9", true));
        assert_eq!(store.job_status("J9").unwrap().status, JobState::Completed);
    }

    #[test]
    fn completed_jobs_are_evicted_oldest_first() {
        let store = EventStore::new(100, 2);
        store.ingest(complete("J1", true));
        store.ingest(complete("J2", true));
        store.ingest(update("J4", 50)); // active, must survive
        store.ingest(complete("J3", true));

        let jobs = store.job_statuses();
        assert!(!jobs.contains_key("J1"), "oldest completed entry evicted");
        assert!(jobs.contains_key("J2"));
        assert!(jobs.contains_key("J3"));
        assert!(jobs.contains_key("J4"), "active job never evicted");
    }

    #[test]
    fn clear_empties_history_and_jobs() {
        let store = EventStore::new(10, 64);
        store.ingest(alert(AlertSeverity::Critical, "boom"));
        store.ingest(update("J1", 10));

        store.clear();
        assert!(store.is_empty());
        assert!(store.job_statuses().is_empty());
        assert!(store.last_event_at().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn recent_critical_alert_window() {
        let store = EventStore::new(10, 64);
        store.ingest(alert(AlertSeverity::Critical, "Rank drop"));

        let window = Duration::from_millis(60_000);
        assert!(store.has_recent_critical_alert(window));
        assert!(store.has_recent_activity(window));

        tokio::time::advance(Duration::from_millis(60_001)).await;
        assert!(!store.has_recent_critical_alert(window));
        assert!(!store.has_recent_activity(window));
    }

    #[tokio::test(start_paused = true)]
    async fn non_critical_alerts_do_not_trip_the_critical_check() {
        let store = EventStore::new(10, 64);
        store.ingest(alert(AlertSeverity::High, "pricing change"));

        assert!(!store.has_recent_critical_alert(Duration::from_secs(60)));
        assert!(store.has_recent_activity(Duration::from_secs(60)));
    }

    #[test]
    fn watch_last_event_notifies_on_ingest() {
        let store = EventStore::new(10, 64);
        let rx = store.watch_last_event();
        assert!(rx.borrow().is_none());

        store.ingest(alert(AlertSeverity::Info, "x"));
        assert!(rx.has_changed().unwrap());
        assert!(store.last_event_at().is_some());
    }
}
