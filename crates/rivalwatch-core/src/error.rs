// ── Core error types ──
//
// Consumer-facing errors. Steady-state transport failures never show
// up here -- they are reported through connection state transitions and
// callbacks only. These variants exist for the edges that ARE
// caller-visible: a first connection attempt that never settled, or
// configuration problems.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("stream connection failed: {reason}")]
    ChannelFailed { reason: String },

    #[error("connection attempt timed out")]
    Timeout,

    #[error("configuration error: {message}")]
    Config { message: String },
}
