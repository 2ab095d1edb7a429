//! WebSocket implementation of the channel provider seam.
//!
//! Connects to the dashboard's stream endpoint at
//! `<base>/streams/<project>[/<user>]` and surfaces text frames as
//! [`ChannelSignal::Message`]. Reconnection policy lives in the core --
//! this layer only reports that a stream opened, delivered, closed, or
//! failed.

use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::ChannelError;
use crate::provider::{ChannelProvider, ChannelSignal, ChannelSubscription};
use crate::scope::ScopeId;

type WsRead =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

// ── WebSocketProvider ────────────────────────────────────────────────

/// Production channel provider backed by a WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketProvider {
    base: Url,
    token: Option<SecretString>,
}

impl WebSocketProvider {
    /// Create a provider for the given base URL (`wss://...`).
    ///
    /// If `token` is set it is injected as a bearer `Authorization`
    /// header on every upgrade request.
    pub fn new(base: Url, token: Option<SecretString>) -> Self {
        Self { base, token }
    }

    /// Stream endpoint URL for a scope: `<base>/streams/<project>[/<user>]`.
    fn stream_url(&self, scope: &ScopeId) -> Result<Url, ChannelError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| ChannelError::InvalidUrl(format!("cannot-be-a-base URL: {}", self.base)))?;
            segments.pop_if_empty().push("streams");
            for segment in scope.segments() {
                segments.push(segment);
            }
        }
        Ok(url)
    }
}

impl ChannelProvider for WebSocketProvider {
    type Subscription = WebSocketSubscription;

    async fn subscribe(&self, scope: &ScopeId) -> Result<WebSocketSubscription, ChannelError> {
        let url = self.stream_url(scope)?;
        tracing::info!(url = %url, scope = %scope, "connecting to stream");

        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| {
                ChannelError::InvalidUrl(e.to_string())
            })?;

        let mut request = ClientRequestBuilder::new(uri);
        if let Some(ref token) = self.token {
            request = request.with_header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        tracing::info!(scope = %scope, "stream connected");

        let (_write, read) = ws_stream.split();
        Ok(WebSocketSubscription { read })
    }
}

// ── WebSocketSubscription ────────────────────────────────────────────

/// A live WebSocket stream for one scope.
pub struct WebSocketSubscription {
    read: WsRead,
}

impl ChannelSubscription for WebSocketSubscription {
    async fn next_signal(&mut self) -> ChannelSignal {
        loop {
            match self.read.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    return ChannelSignal::Message(text.to_string());
                }
                Some(Ok(tungstenite::Message::Ping(_))) => {
                    // tungstenite handles pong replies automatically
                    tracing::trace!("stream ping");
                }
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    if let Some(ref cf) = frame {
                        tracing::info!(code = %cf.code, reason = %cf.reason, "close frame received");
                    } else {
                        tracing::info!("close frame received (no payload)");
                    }
                    return ChannelSignal::Closed;
                }
                Some(Err(e)) => {
                    return ChannelSignal::Error(ChannelError::Transport(e.to_string()));
                }
                None => {
                    // Stream ended without a close frame
                    tracing::info!("stream ended");
                    return ChannelSignal::Closed;
                }
                _ => {
                    // Binary, Pong, Frame -- ignore
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
