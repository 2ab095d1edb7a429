// rivalwatch-channel: transport layer between a push stream and rivalwatch-core.
//
// The core never touches a concrete transport. It consumes the
// `ChannelProvider` seam defined here; `WebSocketProvider` is the
// production implementation.

pub mod error;
pub mod provider;
pub mod scope;
pub mod websocket;

// ── Primary re-exports ──────────────────────────────────────────────
pub use error::ChannelError;
pub use provider::{ChannelProvider, ChannelSignal, ChannelSubscription};
pub use scope::ScopeId;
pub use websocket::WebSocketProvider;
