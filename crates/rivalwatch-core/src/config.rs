// ── Client configuration ──

use std::time::Duration;

/// Exponential backoff configuration for stream reconnection.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Growth factor between attempts. Default: 2.0.
    pub multiplier: f64,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before the client gives up and
    /// enters the failed state. `None` means retry forever.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl BackoffPolicy {
    /// Delay before reconnect attempt number `attempt + 1`.
    ///
    /// `delay = min(initial * multiplier^attempt, max) + jitter`
    ///
    /// Jitter is +-25% to spread out reconnection storms from multiple
    /// clients. It is seeded deterministically from the attempt number,
    /// which keeps attempt 0 at exactly `initial_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jitter_factor = 1.0 + 0.25 * ((f64::from(attempt) * 7.3).sin());
        let with_jitter = (capped * jitter_factor).max(0.0);

        Duration::from_secs_f64(with_jitter)
    }
}

/// Tunables for a [`RealtimeClient`](crate::RealtimeClient).
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Maximum events retained in history (FIFO eviction). Default: 50.
    pub history_cap: usize,

    /// Completed job entries retained before the oldest are evicted.
    /// Active jobs are never evicted. Default: 64.
    pub max_completed_jobs: usize,

    /// How long `connect()` waits for the first attempt to settle
    /// before reporting a timeout. `None` waits indefinitely.
    /// Default: 10s.
    pub connect_timeout: Option<Duration>,

    pub backoff: BackoffPolicy,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            history_cap: 50,
            max_completed_jobs: 64,
            connect_timeout: Some(Duration::from_secs(10)),
            backoff: BackoffPolicy::default(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
