//! POST /v1/chat/completions

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, HeaderMap, Version},
    response::Response,
};

use crate::proxy::error::ProxyError;
use crate::proxy::forward::forward_chat_completion;
use crate::proxy::helpers;
use crate::proxy::relay::{self, RelayContext};
use crate::proxy::selector::select_backend;
use crate::proxy::state::ProxyState;
use crate::proxy::translation;

/// Chat completion pipeline: select, translate, forward, relay
///
/// Everything that can fail before the upstream call returns a
/// [`ProxyError`]; after that the relay owns the response.
pub(in crate::proxy) async fn chat_completions(
    State(state): State<ProxyState>,
    version: Version,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ProxyError> {
    if !helpers::is_json_content_type(&headers) {
        return Err(ProxyError::MalformedRequest(
            "Content-Type must be application/json".to_string(),
        ));
    }

    // Oversized or aborted bodies still get the JSON error envelope
    let body = body.map_err(|rejection| ProxyError::BodyRejected {
        status: rejection.status(),
        message: rejection.body_text(),
    })?;

    let payload = translation::decode_request(&body)?;

    tracing::debug!("Request headers: {:?}", helpers::redacted_headers(&headers));
    tracing::debug!("Request body: {}", String::from_utf8_lossy(&body));

    let requested = translation::requested_model(&payload);
    let backend = select_backend(&state.config.apis, requested)?.clone();
    let credential = helpers::authorization(&headers)
        .map(helpers::credential_fingerprint)
        .unwrap_or_else(|| "none".to_string());
    tracing::info!(
        requested_model = %requested,
        %credential,
        "Selected backend: {} -> {}",
        backend.name,
        backend.endpoint
    );

    let outbound = translation::translate_request(payload, &backend)?;
    tracing::debug!(
        client_stream = outbound.client_stream,
        upstream_stream = outbound.upstream_stream,
        stream_mode = backend.stream_mode.as_str(),
        "Outbound body: {}",
        String::from_utf8_lossy(&outbound.body)
    );

    let upstream = forward_chat_completion(
        &state.client,
        &backend,
        outbound.body,
        headers.get(header::AUTHORIZATION),
    )
    .await;

    let ctx = RelayContext {
        backend,
        client_stream: outbound.client_stream,
        upstream_stream: outbound.upstream_stream,
        client_version: version,
        cancel: state.cancel.clone(),
    };

    Ok(relay::relay(upstream, ctx).await)
}
