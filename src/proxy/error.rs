//! Proxy error types and response handling
//!
//! Every request-scoped failure ends up here and is rendered as the
//! `{"error": "<message>"}` envelope with a matching status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors that can occur during proxying
#[derive(Debug)]
pub(crate) enum ProxyError {
    /// Bad JSON body or wrong content type
    MalformedRequest(String),
    /// Request body could not be read (too large, client hung up)
    BodyRejected { status: StatusCode, message: String },
    /// Backend list was empty
    NoBackendAvailable,
    /// Connect/DNS/TLS/timeout failure talking to the backend
    UpstreamTransport(String),
    /// Backend answered >= 400 with a body that isn't a JSON object
    UpstreamStatus(StatusCode),
    /// Backend answered < 400 with a body we couldn't decode
    ResponseParse(String),
    /// Anything else that stops us before headers go out
    Internal(String),
}

impl ProxyError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            ProxyError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::BodyRejected { status, .. } => *status,
            ProxyError::NoBackendAvailable => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::UpstreamTransport(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::UpstreamStatus(status) => *status,
            ProxyError::ResponseParse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn message(&self) -> String {
        match self {
            ProxyError::MalformedRequest(msg) => msg.clone(),
            ProxyError::BodyRejected { message, .. } => message.clone(),
            ProxyError::NoBackendAvailable => "No backend API configured".to_string(),
            ProxyError::UpstreamTransport(msg) => format!("Upstream request failed: {}", msg),
            // Display renders the status line, e.g. "500 Internal Server Error"
            ProxyError::UpstreamStatus(status) => format!("HTTP error: {}", status),
            ProxyError::ResponseParse(msg) => format!("Failed to parse upstream response: {}", msg),
            ProxyError::Internal(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();

        if status.is_server_error() {
            tracing::error!("Proxy error: {} - {}", status, message);
        } else {
            tracing::warn!("Proxy error: {} - {}", status, message);
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: ProxyError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let (status, _) = render(ProxyError::MalformedRequest("bad".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = render(ProxyError::NoBackendAvailable).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = render(ProxyError::UpstreamTransport("refused".into())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = render(ProxyError::ResponseParse("eof".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_upstream_status_keeps_code_and_status_line() {
        let (status, body) =
            render(ProxyError::UpstreamStatus(StatusCode::INTERNAL_SERVER_ERROR)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            serde_json::json!({"error": "HTTP error: 500 Internal Server Error"})
        );
    }

    #[tokio::test]
    async fn test_body_rejection_keeps_its_status() {
        let (status, body) = render(ProxyError::BodyRejected {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "length limit exceeded".into(),
        })
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body, serde_json::json!({"error": "length limit exceeded"}));
    }

    #[tokio::test]
    async fn test_envelope_is_json_object() {
        let (_, body) = render(ProxyError::MalformedRequest("Content-Type must be application/json".into())).await;
        assert_eq!(body["error"], "Content-Type must be application/json");
    }
}
