// ── Transport-layer error types ──
//
// Everything the channel can report to the core. Consumers never see
// tungstenite types directly -- errors are stringified at the boundary.

use thiserror::Error;

/// Errors produced by a channel provider or a live subscription.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("channel connection failed: {0}")]
    Connect(String),

    #[error("invalid stream URL: {0}")]
    InvalidUrl(String),

    #[error("transport error: {0}")]
    Transport(String),
}
