// ── Real-time update client ──
//
// Owns one provider subscription per scope. Normalizes pushed messages
// into tagged events, maintains the bounded history and live-job map,
// and manages the connection lifecycle: connect, disconnect, automatic
// reconnect with bounded exponential backoff, manual retry.
//
// Transport failures are never surfaced as errors from steady-state
// operation -- consumers observe them only through connection state
// transitions and callbacks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rivalwatch_channel::{ChannelProvider, ChannelSignal, ChannelSubscription, ScopeId};

use crate::config::RealtimeConfig;
use crate::error::CoreError;
use crate::model::{ConnectionNotice, Event, EventKind, EventPayload, LiveJobStatus};
use crate::store::EventStore;

const EVENT_CHANNEL_SIZE: usize = 256;

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Closed,
    Connecting,
    Connected,
    Error,
    Failed,
}

/// Connection state plus the counters a UI renders alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub state: ConnectionState,

    /// Attempts since the last successful connect. Reset to 0 on success.
    pub reconnect_attempts: u32,

    pub last_connected_at: Option<DateTime<Utc>>,
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            state: ConnectionState::Closed,
            reconnect_attempts: 0,
            last_connected_at: None,
        }
    }
}

// ── ConnectOutcome ───────────────────────────────────────────────────

/// How the first connection attempt settled.
///
/// `connect()` never returns an `Err` for transport failure; it reports
/// the settled outcome and leaves retrying to the background loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The first attempt succeeded.
    Connected,

    /// The first attempt failed. Automatic reconnection continues in
    /// the background unless the backoff policy is exhausted.
    Failed,

    /// The configured connect timeout elapsed before the first attempt
    /// settled.
    TimedOut,

    /// The client has no scope and stays inert.
    Inert,
}

impl ConnectOutcome {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Convert to a `Result` for callers that treat anything but a
    /// successful connect as fatal (e.g. one-shot CLI commands).
    pub fn ok(self) -> Result<(), CoreError> {
        match self {
            Self::Connected => Ok(()),
            Self::Failed => Err(CoreError::ChannelFailed {
                reason: "first connection attempt failed".into(),
            }),
            Self::TimedOut => Err(CoreError::Timeout),
            Self::Inert => Err(CoreError::Config {
                message: "no scope configured".into(),
            }),
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

type EventFn = Box<dyn Fn(&Event) + Send + Sync>;
type LifecycleFn = Box<dyn Fn() + Send + Sync>;
type AttemptFn = Box<dyn Fn(u32) + Send + Sync>;

/// Optional callbacks invoked synchronously from the delivery path, in
/// delivery order. Keep them cheap -- they run on the event loop.
#[derive(Default)]
pub struct Handlers {
    on_event: Option<EventFn>,
    on_connect: Option<LifecycleFn>,
    on_disconnect: Option<LifecycleFn>,
    on_reconnect_attempt: Option<AttemptFn>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.on_event = Some(Box::new(f));
        self
    }

    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Box::new(f));
        self
    }

    pub fn on_disconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Box::new(f));
        self
    }

    /// Called with the attempt number (1-based) before each automatic
    /// reconnection attempt executes.
    pub fn on_reconnect_attempt(mut self, f: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_reconnect_attempt = Some(Box::new(f));
        self
    }

    fn event(&self, event: &Event) {
        if let Some(f) = &self.on_event {
            f(event);
        }
    }

    fn connected(&self) {
        if let Some(f) = &self.on_connect {
            f();
        }
    }

    fn disconnected(&self) {
        if let Some(f) = &self.on_disconnect {
            f();
        }
    }

    fn reconnect_attempt(&self, attempt: u32) {
        if let Some(f) = &self.on_reconnect_attempt {
            f(attempt);
        }
    }
}

// ── RealtimeClient ───────────────────────────────────────────────────

/// The real-time update client for one scope.
///
/// Cheaply cloneable via `Arc`; all clones share one subscription, one
/// history, and one connection state. `clear()` is therefore global to
/// the client -- consumers needing independent dismiss semantics should
/// construct their own client for the same scope.
pub struct RealtimeClient<P: ChannelProvider> {
    inner: Arc<ClientInner<P>>,
}

impl<P: ChannelProvider> Clone for RealtimeClient<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ClientInner<P> {
    scope: Option<ScopeId>,
    provider: P,
    config: RealtimeConfig,
    handlers: Handlers,
    store: EventStore,
    connection: watch::Sender<ConnectionInfo>,
    event_tx: broadcast::Sender<Arc<Event>>,
    session: Mutex<Option<Session>>,
}

struct Session {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl<P: ChannelProvider> RealtimeClient<P> {
    /// Create a client. Does NOT connect -- call
    /// [`connect()`](Self::connect) to open the subscription.
    ///
    /// A `None` scope yields an inert client: `connect()` is a no-op,
    /// state stays `Closed`, and all accessors return empty defaults.
    /// Dashboards without an active team construct clients this way.
    pub fn new(
        scope: Option<ScopeId>,
        provider: P,
        config: RealtimeConfig,
        handlers: Handlers,
    ) -> Self {
        let store = EventStore::new(config.history_cap, config.max_completed_jobs);
        let (connection, _) = watch::channel(ConnectionInfo::default());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Self {
            inner: Arc::new(ClientInner {
                scope,
                provider,
                config,
                handlers,
                store,
                connection,
                event_tx,
                session: Mutex::new(None),
            }),
        }
    }

    pub fn scope(&self) -> Option<&ScopeId> {
        self.inner.scope.as_ref()
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Open the subscription and resolve once the FIRST attempt settles
    /// (or the configured connect timeout elapses).
    ///
    /// Idempotent: while connecting or connected this never opens a
    /// second provider subscription. After a failed first attempt the
    /// background loop keeps retrying with backoff -- this method does
    /// not wait for eventual success.
    pub async fn connect(&self) -> ConnectOutcome {
        if self.inner.scope.is_none() {
            tracing::debug!("no scope configured, client stays inert");
            return ConnectOutcome::Inert;
        }

        {
            let mut session = self.inner.session.lock().await;
            let active = session
                .as_ref()
                .is_some_and(|s| !s.cancel.is_cancelled() && !s.task.is_finished());

            if active {
                if self.state() == ConnectionState::Connected {
                    return ConnectOutcome::Connected;
                }
                // Another connect is in flight; fall through and wait
                // for the same first attempt to settle.
            } else {
                self.inner
                    .connection
                    .send_modify(|info| info.state = ConnectionState::Connecting);

                let cancel = CancellationToken::new();
                let task = tokio::spawn(run_loop(Arc::clone(&self.inner), cancel.clone()));
                *session = Some(Session { cancel, task });
            }
        }

        self.first_settle().await
    }

    /// Tear down the subscription and any in-flight reconnect timer.
    ///
    /// Idempotent: calling this when already closed leaves state
    /// unchanged. Safe from teardown paths even if `connect()` never
    /// completed.
    pub async fn disconnect(&self) {
        let session = self.inner.session.lock().await.take();
        let Some(session) = session else { return };

        session.cancel.cancel();
        let _ = session.task.await;

        self.inner
            .connection
            .send_modify(|info| info.state = ConnectionState::Closed);
        self.inner.handlers.disconnected();
        tracing::debug!("disconnected");
    }

    /// Manual retry from `error` or `failed`: cancels any pending
    /// backoff timer, resets the attempt counter, and connects again.
    pub async fn reconnect(&self) -> ConnectOutcome {
        match self.state() {
            ConnectionState::Connected => return ConnectOutcome::Connected,
            ConnectionState::Connecting => return self.first_settle().await,
            ConnectionState::Closed | ConnectionState::Error | ConnectionState::Failed => {}
        }

        if let Some(session) = self.inner.session.lock().await.take() {
            session.cancel.cancel();
            let _ = session.task.await;
        }
        self.inner
            .connection
            .send_modify(|info| info.reconnect_attempts = 0);

        self.connect().await
    }

    async fn first_settle(&self) -> ConnectOutcome {
        let mut rx = self.inner.connection.subscribe();
        let settled = rx.wait_for(|info| info.state != ConnectionState::Connecting);

        let result = match self.inner.config.connect_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, settled).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("first connection attempt did not settle in time");
                    return ConnectOutcome::TimedOut;
                }
            },
            None => settled.await,
        };

        match result {
            Ok(info) if info.state == ConnectionState::Connected => ConnectOutcome::Connected,
            _ => ConnectOutcome::Failed,
        }
    }

    // ── State observation ────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.inner.connection.borrow().state
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        self.inner.connection.borrow().clone()
    }

    /// Subscribe to connection state changes.
    pub fn connection(&self) -> watch::Receiver<ConnectionInfo> {
        self.inner.connection.subscribe()
    }

    /// Subscribe to the event broadcast stream (read-only fan-out).
    pub fn subscribe_events(&self) -> broadcast::Receiver<Arc<Event>> {
        self.event_tx().subscribe()
    }

    fn event_tx(&self) -> &broadcast::Sender<Arc<Event>> {
        &self.inner.event_tx
    }

    // ── Derived views (delegate to EventStore) ───────────────────────

    pub fn history(&self) -> Vec<Arc<Event>> {
        self.inner.store.history()
    }

    pub fn latest_event(&self) -> Option<Arc<Event>> {
        self.inner.store.latest()
    }

    pub fn events_by_kind(&self, kind: EventKind) -> Vec<Arc<Event>> {
        self.inner.store.events_by_kind(kind)
    }

    pub fn has_recent_critical_alert(&self, window: Duration) -> bool {
        self.inner.store.has_recent_critical_alert(window)
    }

    pub fn has_recent_activity(&self, window: Duration) -> bool {
        self.inner.store.has_recent_activity(window)
    }

    pub fn live_job_statuses(&self) -> HashMap<String, LiveJobStatus> {
        self.inner.store.job_statuses()
    }

    pub fn job_status(&self, job_id: &str) -> Option<LiveJobStatus> {
        self.inner.store.job_status(job_id)
    }

    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.inner.store.last_event_at()
    }

    /// Push-based "last update" notification for UIs.
    pub fn watch_last_event(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.inner.store.watch_last_event()
    }

    /// Empty history and live jobs without touching the connection.
    pub fn clear(&self) {
        self.inner.store.clear();
    }
}

// ── Background loop: connect → read → backoff → reconnect ───────────

async fn run_loop<P: ChannelProvider>(inner: Arc<ClientInner<P>>, cancel: CancellationToken) {
    let Some(scope) = inner.scope.clone() else {
        return;
    };

    let mut attempt: u32 = 0;
    let mut interrupted = false;

    loop {
        inner
            .connection
            .send_modify(|info| info.state = ConnectionState::Connecting);

        let subscribed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = inner.provider.subscribe(&scope) => result,
        };

        match subscribed {
            Ok(mut subscription) => {
                attempt = 0;
                inner.connection.send_modify(|info| {
                    info.state = ConnectionState::Connected;
                    info.reconnect_attempts = 0;
                    info.last_connected_at = Some(Utc::now());
                });
                tracing::info!(scope = %scope, "stream connected");

                if interrupted {
                    // Mark the delivery gap left by the dropped session;
                    // no replay or backfill is attempted.
                    dispatch(
                        &inner,
                        EventPayload::ConnectionState(ConnectionNotice {
                            status: "reconnected".into(),
                            message: Some(
                                "stream resumed after interruption; events may be missing".into(),
                            ),
                        }),
                    );
                    interrupted = false;
                }
                inner.handlers.connected();

                loop {
                    let signal = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        signal = subscription.next_signal() => signal,
                    };

                    match signal {
                        ChannelSignal::Message(text) => ingest_frame(&inner, &text),
                        ChannelSignal::Closed => {
                            tracing::info!(scope = %scope, "stream closed unexpectedly");
                            break;
                        }
                        ChannelSignal::Error(e) => {
                            tracing::warn!(error = %e, scope = %scope, "stream error");
                            break;
                        }
                    }
                }

                interrupted = true;
                inner
                    .connection
                    .send_modify(|info| info.state = ConnectionState::Error);
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, scope = %scope, "stream connection failed");
                inner
                    .connection
                    .send_modify(|info| info.state = ConnectionState::Error);
            }
        }

        if let Some(max) = inner.config.backoff.max_attempts {
            if attempt >= max {
                tracing::error!(max_attempts = max, "reconnection limit reached, giving up");
                inner
                    .connection
                    .send_modify(|info| info.state = ConnectionState::Failed);
                return;
            }
        }

        let delay = inner.config.backoff.delay_for(attempt);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
        inner
            .connection
            .send_modify(|info| info.reconnect_attempts = attempt);
        inner.handlers.reconnect_attempt(attempt);
    }
}

/// Parse one raw frame and dispatch every valid payload in it.
fn ingest_frame<P>(inner: &Arc<ClientInner<P>>, text: &str) {
    for payload in EventPayload::parse_frame(text) {
        dispatch(inner, payload);
    }
}

/// Append to history, then notify callbacks and broadcast subscribers,
/// preserving delivery order.
fn dispatch<P>(inner: &ClientInner<P>, payload: EventPayload) {
    let event = inner.store.ingest(payload);
    inner.handlers.event(&event);
    // Ignore send errors -- just means no active subscribers right now
    let _ = inner.event_tx.send(event);
}

// ── Tests ────────────────────────────────────────────────────────────
