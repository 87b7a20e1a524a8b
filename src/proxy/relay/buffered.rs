//! Buffered relays: upstream errors and non-streaming JSON replies

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use crate::config::BackendEntry;
use crate::proxy::error::ProxyError;
use crate::proxy::translation::{self, JsonObject};

/// Read the whole upstream body
pub(super) async fn read_body(response: reqwest::Response) -> Result<Bytes, ProxyError> {
    response.bytes().await.map_err(|e| {
        tracing::error!("Failed to read upstream body: {}", e);
        ProxyError::UpstreamTransport(e.to_string())
    })
}

fn json_response(status: StatusCode, body: impl Into<axum::body::Body>) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body.into()).into_response()
}

/// Pass a >= 400 reply through when it's a JSON object, wrap it otherwise
pub(super) async fn relay_error(response: reqwest::Response) -> Result<Response, ProxyError> {
    let status = response.status();
    let body = read_body(response).await?;

    if serde_json::from_slice::<JsonObject>(&body).is_ok() {
        tracing::warn!("Upstream returned {}: {}", status, String::from_utf8_lossy(&body));
        return Ok(json_response(status, body));
    }

    tracing::warn!("Upstream returned {} with a non-JSON body ({} bytes)", status, body.len());
    Err(ProxyError::UpstreamStatus(status))
}

/// Rewrite `model` on a JSON reply and return it with status 200
pub(super) async fn relay_json(
    response: reqwest::Response,
    backend: &BackendEntry,
) -> Result<Response, ProxyError> {
    let body = read_body(response).await?;
    tracing::debug!("Upstream response body: {}", String::from_utf8_lossy(&body));

    let rewritten = translation::translate_response(&body, backend)?;
    Ok(json_response(StatusCode::OK, rewritten))
}
