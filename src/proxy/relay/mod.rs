//! Response relay - turns the backend's reply into the client's reply
//!
//! Entered once per request after forwarding. The relay state is decided
//! from the upstream status and the recorded stream flags:
//!
//! ```text
//! forward failed              → {"error": ...} 503
//! status >= 400               → UpstreamError  (JSON passthrough or wrapped status)
//! outbound stream == true     → Streaming      (byte-for-byte SSE copy)
//! simulate_stream && client
//!   asked for a stream        → Synthetic      (buffered JSON replayed as SSE)
//! otherwise                   → Buffered       (JSON with model rewritten)
//! ```

mod buffered;
mod streaming;
mod synthetic;

use axum::http::{StatusCode, Version};
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;

use crate::config::BackendEntry;

use super::error::ProxyError;

/// Per-request inputs the relay needs, captured before forwarding
#[derive(Debug, Clone)]
pub(crate) struct RelayContext {
    /// Snapshot of the selected backend
    pub backend: BackendEntry,
    /// `stream` as the client sent it
    pub client_stream: bool,
    /// `stream` as it was sent upstream
    pub upstream_stream: bool,
    /// HTTP version of the client request, decides connection headers
    pub client_version: Version,
    /// Stops open streams on shutdown
    pub cancel: CancellationToken,
}

/// Which way the upstream reply is relayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RelayState {
    UpstreamError,
    Streaming,
    Buffered,
    Synthetic,
}

impl RelayState {
    /// Pick the relay path for a successful forward
    pub(crate) fn decide(status: StatusCode, ctx: &RelayContext) -> Self {
        if status.as_u16() >= 400 {
            RelayState::UpstreamError
        } else if ctx.upstream_stream {
            RelayState::Streaming
        } else if ctx.backend.simulate_stream && ctx.client_stream {
            RelayState::Synthetic
        } else {
            RelayState::Buffered
        }
    }
}

/// Relay the forwarding outcome to the client
pub(crate) async fn relay(
    upstream: Result<reqwest::Response, ProxyError>,
    ctx: RelayContext,
) -> Response {
    let response = match upstream {
        Ok(response) => response,
        Err(e) => return e.into_response(),
    };

    let status = response.status();
    let state = RelayState::decide(status, &ctx);
    tracing::debug!(backend = %ctx.backend.name, %status, ?state, "Relaying upstream response");

    let result = match state {
        RelayState::UpstreamError => buffered::relay_error(response).await,
        RelayState::Streaming => Ok(streaming::relay_stream(response, ctx.client_version, ctx.cancel)),
        RelayState::Buffered => buffered::relay_json(response, &ctx.backend).await,
        RelayState::Synthetic => synthetic::relay_synthetic(response, &ctx).await,
    };

    result.unwrap_or_else(IntoResponse::into_response)
}
