//! Request forwarding to the selected backend
//!
//! One POST per client request, no retries. Only `Content-Type` and the
//! client's `Authorization` header go upstream; nothing else from the client
//! is propagated. The response body is left unread so the relay decides
//! whether to stream or buffer it.

use axum::http::{header, HeaderValue};
use reqwest::Client;

use crate::config::BackendEntry;

use super::error::ProxyError;

/// POST the translated body to `{endpoint}/v1/chat/completions`
pub(crate) async fn forward_chat_completion(
    client: &Client,
    backend: &BackendEntry,
    body: Vec<u8>,
    authorization: Option<&HeaderValue>,
) -> Result<reqwest::Response, ProxyError> {
    let url = backend.chat_completions_url();
    tracing::debug!("Forwarding request to {}", url);

    let mut request = client
        .post(&url)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body);

    if let Some(value) = authorization {
        request = request.header(header::AUTHORIZATION, value.clone());
    }

    request.send().await.map_err(|e| {
        tracing::error!(backend = %backend.name, "Request to {} failed: {}", url, e);
        ProxyError::UpstreamTransport(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamMode;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    fn backend(endpoint: String) -> BackendEntry {
        BackendEntry {
            name: "echo".to_string(),
            endpoint,
            custom_model_id: "c".to_string(),
            target_model_id: "t".to_string(),
            stream_mode: StreamMode::Unset,
            active: true,
            simulate_stream: false,
        }
    }

    /// Echoes what the proxy sent: selected headers and the body
    async fn echo(headers: HeaderMap, body: String) -> Json<Value> {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        Json(json!({
            "content_type": get("content-type"),
            "authorization": get("authorization"),
            "x_client_header": get("x-client-header"),
            "body": body,
        }))
    }

    async fn spawn_echo() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/v1/chat/completions", post(echo));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_forwards_body_and_authorization() {
        let endpoint = spawn_echo().await;
        let auth = HeaderValue::from_static("Bearer sk-test");

        let response = forward_chat_completion(
            &Client::new(),
            &backend(endpoint),
            br#"{"model":"t"}"#.to_vec(),
            Some(&auth),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let echoed: Value = response.json().await.unwrap();
        assert_eq!(echoed["content_type"], "application/json");
        assert_eq!(echoed["authorization"], "Bearer sk-test");
        assert_eq!(echoed["body"], r#"{"model":"t"}"#);
    }

    #[tokio::test]
    async fn test_no_authorization_when_client_sent_none() {
        let endpoint = spawn_echo().await;

        let response = forward_chat_completion(&Client::new(), &backend(endpoint), b"{}".to_vec(), None)
            .await
            .unwrap();

        let echoed: Value = response.json().await.unwrap();
        assert_eq!(echoed["authorization"], Value::Null);
        assert_eq!(echoed["x_client_header"], Value::Null);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = forward_chat_completion(
            &Client::new(),
            &backend(format!("http://{}", addr)),
            b"{}".to_vec(),
            None,
        )
        .await;

        assert!(matches!(result, Err(ProxyError::UpstreamTransport(_))));
    }
}
