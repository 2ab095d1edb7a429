// ── Provider seam ──
//
// rivalwatch-core consumes these traits and nothing else from the
// transport. One subscription per `subscribe` call; unsubscribing is
// dropping the subscription. Tests drive the core through a scripted
// implementation of the same seam.

use std::future::Future;

use crate::error::ChannelError;
use crate::scope::ScopeId;

/// One delivery from a live subscription.
#[derive(Debug)]
pub enum ChannelSignal {
    /// An opaque text payload pushed by the server.
    Message(String),

    /// The server closed the stream or it ended without a close frame.
    Closed,

    /// The transport failed mid-stream.
    Error(ChannelError),
}

/// A pub/sub transport that can open one stream per scope.
pub trait ChannelProvider: Send + Sync + 'static {
    type Subscription: ChannelSubscription;

    /// Open a subscription for the given scope.
    ///
    /// Resolves once the underlying transport is established (or has
    /// failed). Delivery starts with the first `next_signal` call.
    fn subscribe(
        &self,
        scope: &ScopeId,
    ) -> impl Future<Output = Result<Self::Subscription, ChannelError>> + Send;
}

/// A live stream of signals for one scope.
pub trait ChannelSubscription: Send {
    /// Wait for the next signal.
    ///
    /// After `Closed` or `Error` the subscription is spent; callers
    /// drop it and re-subscribe through the provider.
    fn next_signal(&mut self) -> impl Future<Output = ChannelSignal> + Send;
}
