// Lifecycle tests for RealtimeClient against a scripted in-memory
// provider. Time is paused, so backoff delays and connect timeouts
// elapse instantly once every task is idle.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use rivalwatch_channel::{
    ChannelError, ChannelProvider, ChannelSignal, ChannelSubscription, ScopeId,
};
use rivalwatch_core::{
    BackoffPolicy, ConnectOutcome, ConnectionState, EventKind, Handlers, JobState, RealtimeClient,
    RealtimeConfig,
};

// ── Scripted provider ────────────────────────────────────────────────

enum Attempt {
    /// Subscribe fails immediately.
    Fail,
    /// Subscribe succeeds; signals arrive through the given receiver.
    Succeed(mpsc::UnboundedReceiver<ChannelSignal>),
    /// Subscribe never settles.
    Hang,
}

#[derive(Clone)]
struct MockProvider {
    script: Arc<Mutex<VecDeque<Attempt>>>,
    subscribe_count: Arc<AtomicU32>,
}

impl MockProvider {
    fn new(attempts: Vec<Attempt>) -> Self {
        Self {
            script: Arc::new(Mutex::new(attempts.into())),
            subscribe_count: Arc::new(AtomicU32::new(0)),
        }
    }

    fn subscribe_count(&self) -> u32 {
        self.subscribe_count.load(Ordering::SeqCst)
    }
}

impl ChannelProvider for MockProvider {
    type Subscription = MockSubscription;

    fn subscribe(
        &self,
        _scope: &ScopeId,
    ) -> impl Future<Output = Result<Self::Subscription, ChannelError>> + Send {
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        let attempt = self.script.lock().unwrap().pop_front();
        async move {
            match attempt {
                Some(Attempt::Succeed(rx)) => Ok(MockSubscription { rx }),
                Some(Attempt::Fail) | None => {
                    Err(ChannelError::Connect("scripted failure".into()))
                }
                Some(Attempt::Hang) => std::future::pending().await,
            }
        }
    }
}

struct MockSubscription {
    rx: mpsc::UnboundedReceiver<ChannelSignal>,
}

impl ChannelSubscription for MockSubscription {
    fn next_signal(&mut self) -> impl Future<Output = ChannelSignal> + Send {
        async { self.rx.recv().await.unwrap_or(ChannelSignal::Closed) }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn scope() -> Option<ScopeId> {
    ScopeId::new("acme")
}

fn fast_config() -> RealtimeConfig {
    RealtimeConfig {
        backoff: BackoffPolicy {
            initial_delay: Duration::from_millis(100),
            ..BackoffPolicy::default()
        },
        ..RealtimeConfig::default()
    }
}

fn feed() -> (mpsc::UnboundedSender<ChannelSignal>, Attempt) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Attempt::Succeed(rx))
}

fn alert_frame(title: &str) -> ChannelSignal {
    ChannelSignal::Message(
        json!({ "kind": "alert", "severity": "critical", "title": title }).to_string(),
    )
}

async fn wait_for_state(client: &RealtimeClient<MockProvider>, state: ConnectionState) {
    let mut rx = client.connection();
    tokio::time::timeout(Duration::from_secs(300), rx.wait_for(|info| info.state == state))
        .await
        .expect("timed out waiting for connection state")
        .expect("connection channel closed");
}

/// Let the background read loop drain anything already queued.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// ── Connect / disconnect ─────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn connect_succeeds_on_first_attempt() {
    let (_tx, attempt) = feed();
    let provider = MockProvider::new(vec![attempt]);
    let client = RealtimeClient::new(scope(), provider.clone(), fast_config(), Handlers::new());

    assert_eq!(client.connect().await, ConnectOutcome::Connected);
    assert_eq!(client.state(), ConnectionState::Connected);
    assert!(client.connection_info().last_connected_at.is_some());
    assert_eq!(provider.subscribe_count(), 1);

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn connect_is_idempotent_while_connected() {
    let (_tx, attempt) = feed();
    let provider = MockProvider::new(vec![attempt]);
    let client = RealtimeClient::new(scope(), provider.clone(), fast_config(), Handlers::new());

    assert_eq!(client.connect().await, ConnectOutcome::Connected);
    assert_eq!(client.connect().await, ConnectOutcome::Connected);
    assert_eq!(provider.subscribe_count(), 1);

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_without_connect_is_a_noop() {
    let disconnects = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&disconnects);
    let handlers = Handlers::new().on_disconnect(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let provider = MockProvider::new(vec![]);
    let client = RealtimeClient::new(scope(), provider.clone(), fast_config(), handlers);

    client.disconnect().await;
    client.disconnect().await;

    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(disconnects.load(Ordering::SeqCst), 0);
    assert_eq!(provider.subscribe_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn disconnect_fires_callback_once() {
    let disconnects = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&disconnects);
    let handlers = Handlers::new().on_disconnect(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let (_tx, attempt) = feed();
    let provider = MockProvider::new(vec![attempt]);
    let client = RealtimeClient::new(scope(), provider, fast_config(), handlers);

    assert_eq!(client.connect().await, ConnectOutcome::Connected);
    client.disconnect().await;
    client.disconnect().await;

    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn client_without_scope_is_inert() {
    let provider = MockProvider::new(vec![]);
    let client = RealtimeClient::new(None, provider.clone(), fast_config(), Handlers::new());

    assert_eq!(client.connect().await, ConnectOutcome::Inert);
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(client.history().is_empty());
    assert!(client.live_job_statuses().is_empty());
    assert_eq!(provider.subscribe_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn connect_times_out_when_attempt_never_settles() {
    let provider = MockProvider::new(vec![Attempt::Hang]);
    let config = RealtimeConfig {
        connect_timeout: Some(Duration::from_secs(5)),
        ..fast_config()
    };
    let client = RealtimeClient::new(scope(), provider, config, Handlers::new());

    assert_eq!(client.connect().await, ConnectOutcome::TimedOut);

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Closed);
}

// ── Event flow ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn events_reach_history_callbacks_and_broadcast() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handlers = Handlers::new().on_event(move |event| {
        sink.lock().unwrap().push(event.kind());
    });

    let (tx, attempt) = feed();
    let provider = MockProvider::new(vec![attempt]);
    let client = RealtimeClient::new(scope(), provider, fast_config(), handlers);

    assert_eq!(client.connect().await, ConnectOutcome::Connected);
    let mut events = client.subscribe_events();

    tx.send(alert_frame("price drop")).unwrap();
    tx.send(ChannelSignal::Message(
        json!({ "kind": "metrics_update", "competitor_id": "c1", "visits": 9000 }).to_string(),
    ))
    .unwrap();
    settle().await;

    let history = client.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind(), EventKind::Alert);
    assert_eq!(history[1].kind(), EventKind::MetricsUpdate);
    assert_eq!(client.latest_event().unwrap().kind(), EventKind::MetricsUpdate);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![EventKind::Alert, EventKind::MetricsUpdate]
    );

    assert_eq!(events.recv().await.unwrap().kind(), EventKind::Alert);
    assert_eq!(events.recv().await.unwrap().kind(), EventKind::MetricsUpdate);

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_dropped_without_breaking_the_stream() {
    let (tx, attempt) = feed();
    let provider = MockProvider::new(vec![attempt]);
    let client = RealtimeClient::new(scope(), provider, fast_config(), Handlers::new());

    assert_eq!(client.connect().await, ConnectOutcome::Connected);

    tx.send(ChannelSignal::Message("not json at all".into())).unwrap();
    tx.send(ChannelSignal::Message(json!({ "kind": "launch_party" }).to_string()))
        .unwrap();
    tx.send(alert_frame("still alive")).unwrap();
    settle().await;

    assert_eq!(client.state(), ConnectionState::Connected);
    let history = client.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].as_alert().unwrap().title, "still alive");

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn job_lifecycle_is_tracked_through_the_stream() {
    let (tx, attempt) = feed();
    let provider = MockProvider::new(vec![attempt]);
    let client = RealtimeClient::new(scope(), provider, fast_config(), Handlers::new());

    assert_eq!(client.connect().await, ConnectOutcome::Connected);

    tx.send(ChannelSignal::Message(
        json!({ "kind": "analysis_update", "job_id": "j1", "progress": 40 }).to_string(),
    ))
    .unwrap();
    settle().await;

    let status = client.job_status("j1").unwrap();
    assert_eq!(status.status, JobState::Processing);
    assert_eq!(status.progress, 40);

    tx.send(ChannelSignal::Message(
        json!({ "kind": "analysis_complete", "job_id": "j1", "success": true }).to_string(),
    ))
    .unwrap();
    settle().await;

    let status = client.job_status("j1").unwrap();
    assert_eq!(status.status, JobState::Completed);
    assert_eq!(status.progress, 100);
    assert!(status.completed_at.is_some());

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn clear_empties_views_but_keeps_the_connection() {
    let (tx, attempt) = feed();
    let provider = MockProvider::new(vec![attempt]);
    let client = RealtimeClient::new(scope(), provider, fast_config(), Handlers::new());

    assert_eq!(client.connect().await, ConnectOutcome::Connected);
    tx.send(alert_frame("one")).unwrap();
    settle().await;
    assert_eq!(client.history().len(), 1);

    client.clear();

    assert!(client.history().is_empty());
    assert!(client.last_event_at().is_none());
    assert_eq!(client.state(), ConnectionState::Connected);

    tx.send(alert_frame("two")).unwrap();
    settle().await;
    assert_eq!(client.history().len(), 1);

    client.disconnect().await;
}

// ── Reconnection ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn retries_with_backoff_until_connected() {
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&attempts);
    let handlers = Handlers::new().on_reconnect_attempt(move |n| {
        sink.lock().unwrap().push(n);
    });

    let (_tx, attempt) = feed();
    let provider = MockProvider::new(vec![Attempt::Fail, Attempt::Fail, attempt]);
    let client = RealtimeClient::new(scope(), provider.clone(), fast_config(), handlers);

    // First attempt fails; connect reports that while retries continue.
    assert_eq!(client.connect().await, ConnectOutcome::Failed);

    wait_for_state(&client, ConnectionState::Connected).await;

    assert_eq!(provider.subscribe_count(), 3);
    assert_eq!(*attempts.lock().unwrap(), vec![1, 2]);
    assert_eq!(client.connection_info().reconnect_attempts, 0);

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn resubscribes_after_stream_interruption_and_marks_the_gap() {
    let connects = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&connects);
    let handlers = Handlers::new().on_connect(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let (tx1, first) = feed();
    let (tx2, second) = feed();
    let provider = MockProvider::new(vec![first, second]);
    let client = RealtimeClient::new(scope(), provider.clone(), fast_config(), handlers);

    assert_eq!(client.connect().await, ConnectOutcome::Connected);
    tx1.send(alert_frame("before the drop")).unwrap();
    settle().await;

    // Server closes the stream; the client should back off and resubscribe.
    drop(tx1);
    wait_for_state(&client, ConnectionState::Error).await;
    wait_for_state(&client, ConnectionState::Connected).await;

    assert_eq!(provider.subscribe_count(), 2);
    assert_eq!(connects.load(Ordering::SeqCst), 2);

    // A synthetic connection_state event marks the delivery gap.
    let markers = client.events_by_kind(EventKind::ConnectionState);
    assert_eq!(markers.len(), 1);

    tx2.send(alert_frame("after the drop")).unwrap();
    settle().await;
    assert_eq!(client.history().len(), 3);

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_attempts() {
    let provider = MockProvider::new(vec![]);
    let config = RealtimeConfig {
        backoff: BackoffPolicy {
            initial_delay: Duration::from_millis(100),
            max_attempts: Some(2),
            ..BackoffPolicy::default()
        },
        ..RealtimeConfig::default()
    };
    let client = RealtimeClient::new(scope(), provider.clone(), config, Handlers::new());

    assert_eq!(client.connect().await, ConnectOutcome::Failed);
    wait_for_state(&client, ConnectionState::Failed).await;

    // Initial attempt plus two retries.
    assert_eq!(provider.subscribe_count(), 3);
    assert_eq!(client.connection_info().reconnect_attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn manual_reconnect_resets_the_attempt_counter() {
    let (_tx, attempt) = feed();
    let provider = MockProvider::new(vec![Attempt::Fail, Attempt::Fail, Attempt::Fail, attempt]);
    let config = RealtimeConfig {
        backoff: BackoffPolicy {
            initial_delay: Duration::from_millis(100),
            max_attempts: Some(2),
            ..BackoffPolicy::default()
        },
        ..RealtimeConfig::default()
    };
    let client = RealtimeClient::new(scope(), provider.clone(), config, Handlers::new());

    assert_eq!(client.connect().await, ConnectOutcome::Failed);
    wait_for_state(&client, ConnectionState::Failed).await;
    assert_eq!(client.connection_info().reconnect_attempts, 2);

    assert_eq!(client.reconnect().await, ConnectOutcome::Connected);
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.connection_info().reconnect_attempts, 0);

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn reconnect_while_connected_is_a_noop() {
    let (_tx, attempt) = feed();
    let provider = MockProvider::new(vec![attempt]);
    let client = RealtimeClient::new(scope(), provider.clone(), fast_config(), Handlers::new());

    assert_eq!(client.connect().await, ConnectOutcome::Connected);
    assert_eq!(client.reconnect().await, ConnectOutcome::Connected);
    assert_eq!(provider.subscribe_count(), 1);

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_a_pending_backoff_timer() {
    let provider = MockProvider::new(vec![Attempt::Fail]);
    let config = RealtimeConfig {
        backoff: BackoffPolicy {
            initial_delay: Duration::from_secs(3600),
            ..BackoffPolicy::default()
        },
        ..RealtimeConfig::default()
    };
    let client = RealtimeClient::new(scope(), provider.clone(), config, Handlers::new());

    assert_eq!(client.connect().await, ConnectOutcome::Failed);
    client.disconnect().await;

    assert_eq!(client.state(), ConnectionState::Closed);
    // No further attempt fires after teardown, even well past the delay.
    tokio::time::sleep(Duration::from_secs(7200)).await;
    assert_eq!(provider.subscribe_count(), 1);
}
