//! Payload translation - model id rewriting on the JSON bodies
//!
//! Bodies are handled as untyped JSON objects so that every field the proxy
//! doesn't inspect survives verbatim (serde_json is built with
//! `preserve_order`, so key order survives too). Only three things are ever
//! looked at:
//!
//! - `model` on requests (replaced with the backend's target id)
//! - `stream` on requests (optionally forced by the backend's stream mode)
//! - `model` on buffered responses (replaced with the backend's custom id)
//!
//! Streaming responses are not rewritten: chunked SSE payloads would need
//! incremental JSON parsing across chunk boundaries, so the relay copies
//! them byte-for-byte.

use serde_json::{Map, Value};

use crate::config::{BackendEntry, StreamMode};

use super::error::ProxyError;

/// Untyped JSON object body
pub(crate) type JsonObject = Map<String, Value>;

/// A request body ready to forward, plus the stream flags the relay needs
#[derive(Debug)]
pub(crate) struct OutboundRequest {
    /// Encoded JSON body
    pub body: Vec<u8>,
    /// `stream` as the client sent it
    pub client_stream: bool,
    /// `stream` as it will be sent upstream (absent counts as false)
    pub upstream_stream: bool,
}

/// Decode a client request body; anything but a JSON object is rejected
pub(crate) fn decode_request(bytes: &[u8]) -> Result<JsonObject, ProxyError> {
    serde_json::from_slice::<JsonObject>(bytes)
        .map_err(|e| ProxyError::MalformedRequest(format!("Invalid JSON request body: {}", e)))
}

/// Model id the client asked for; empty when missing or not a string
pub(crate) fn requested_model(payload: &JsonObject) -> &str {
    payload.get("model").and_then(Value::as_str).unwrap_or("")
}

/// Truth value of a `stream` field: only a literal `true` counts
pub(crate) fn stream_flag(payload: &JsonObject) -> bool {
    matches!(payload.get("stream"), Some(Value::Bool(true)))
}

/// Rewrite a request for the selected backend
///
/// `model` is always overwritten with the target id. `stream` is forced
/// only when the backend says so; with [`StreamMode::Unset`] the key is
/// left exactly as the client sent it, including absent.
pub(crate) fn translate_request(
    mut payload: JsonObject,
    backend: &BackendEntry,
) -> Result<OutboundRequest, ProxyError> {
    let client_stream = stream_flag(&payload);

    payload.insert(
        "model".to_string(),
        Value::String(backend.target_model_id.clone()),
    );

    match backend.stream_mode {
        StreamMode::ForceTrue => {
            payload.insert("stream".to_string(), Value::Bool(true));
        }
        StreamMode::ForceFalse => {
            payload.insert("stream".to_string(), Value::Bool(false));
        }
        StreamMode::Unset => {}
    }

    let upstream_stream = stream_flag(&payload);
    let body = serde_json::to_vec(&payload)
        .map_err(|e| ProxyError::Internal(format!("Failed to serialize request: {}", e)))?;

    Ok(OutboundRequest {
        body,
        client_stream,
        upstream_stream,
    })
}

/// Decode a buffered upstream response body
pub(crate) fn decode_response(bytes: &[u8]) -> Result<JsonObject, ProxyError> {
    serde_json::from_slice::<JsonObject>(bytes).map_err(|e| ProxyError::ResponseParse(e.to_string()))
}

/// Rewrite `model` on a buffered response, if the key is present
pub(crate) fn rewrite_response_model(payload: &mut JsonObject, backend: &BackendEntry) {
    if let Some(model) = payload.get_mut("model") {
        *model = Value::String(backend.custom_model_id.clone());
    }
}

/// Decode, rewrite and re-encode a buffered response body
pub(crate) fn translate_response(
    bytes: &[u8],
    backend: &BackendEntry,
) -> Result<Vec<u8>, ProxyError> {
    let mut payload = decode_response(bytes)?;
    rewrite_response_model(&mut payload, backend);
    serde_json::to_vec(&payload)
        .map_err(|e| ProxyError::Internal(format!("Failed to serialize response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend(mode: StreamMode) -> BackendEntry {
        BackendEntry {
            name: "test".to_string(),
            endpoint: "https://example.com".to_string(),
            custom_model_id: "my-gpt4".to_string(),
            target_model_id: "gpt-4-internal".to_string(),
            stream_mode: mode,
            active: true,
            simulate_stream: false,
        }
    }

    fn object(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn translate(input: Value, mode: StreamMode) -> (JsonObject, OutboundRequest) {
        let out = translate_request(object(input), &backend(mode)).unwrap();
        let decoded: JsonObject = serde_json::from_slice(&out.body).unwrap();
        (decoded, out)
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        assert!(decode_request(br#"{"model":"x"}"#).is_ok());
        assert!(matches!(
            decode_request(b"[1,2]"),
            Err(ProxyError::MalformedRequest(_))
        ));
        assert!(matches!(
            decode_request(b"{not json"),
            Err(ProxyError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_requested_model() {
        assert_eq!(requested_model(&object(json!({"model": "gpt-4"}))), "gpt-4");
        assert_eq!(requested_model(&object(json!({"model": 4}))), "");
        assert_eq!(requested_model(&object(json!({}))), "");
    }

    #[test]
    fn test_model_is_always_overwritten() {
        let (out, _) = translate(json!({"model": "gpt-4", "messages": []}), StreamMode::Unset);
        assert_eq!(out["model"], "gpt-4-internal");

        let (out, _) = translate(json!({"messages": []}), StreamMode::Unset);
        assert_eq!(out["model"], "gpt-4-internal");
    }

    #[test]
    fn test_force_true_sets_stream() {
        for input in [json!({"model": "m"}), json!({"model": "m", "stream": false})] {
            let (out, req) = translate(input, StreamMode::ForceTrue);
            assert_eq!(out["stream"], json!(true));
            assert!(req.upstream_stream);
        }
    }

    #[test]
    fn test_force_false_clears_stream() {
        let (out, req) = translate(json!({"model": "m", "stream": true}), StreamMode::ForceFalse);
        assert_eq!(out["stream"], json!(false));
        assert!(req.client_stream);
        assert!(!req.upstream_stream);
    }

    #[test]
    fn test_unset_leaves_stream_untouched() {
        let (out, req) = translate(json!({"model": "m"}), StreamMode::Unset);
        assert!(!out.contains_key("stream"), "no default may be injected");
        assert!(!req.upstream_stream);

        let (out, req) = translate(json!({"model": "m", "stream": true}), StreamMode::Unset);
        assert_eq!(out["stream"], json!(true));
        assert!(req.upstream_stream);

        // Odd values pass through as-is and count as false
        let (out, req) = translate(json!({"model": "m", "stream": "yes"}), StreamMode::Unset);
        assert_eq!(out["stream"], json!("yes"));
        assert!(!req.upstream_stream);
    }

    #[test]
    fn test_other_keys_are_byte_identical() {
        let input = json!({
            "temperature": 0.7,
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "héllo \"quoted\""}],
            "stream": true,
            "tools": [{"type": "function", "function": {"name": "f", "parameters": {}}}],
            "x_custom": {"nested": [1, 2.5, null, false]},
        });

        for mode in [StreamMode::Unset, StreamMode::ForceTrue, StreamMode::ForceFalse] {
            let (out, _) = translate(input.clone(), mode);
            for (key, value) in input.as_object().unwrap() {
                if key == "model" || key == "stream" {
                    continue;
                }
                assert_eq!(
                    serde_json::to_string(&out[key]).unwrap(),
                    serde_json::to_string(value).unwrap(),
                    "key {key} changed under {mode:?}"
                );
            }
        }
    }

    #[test]
    fn test_key_order_is_preserved() {
        let out = translate_request(
            decode_request(br#"{"z":1,"model":"m","a":2}"#).unwrap(),
            &backend(StreamMode::Unset),
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out.body).unwrap(),
            r#"{"z":1,"model":"gpt-4-internal","a":2}"#
        );
    }

    #[test]
    fn test_response_model_rewrite() {
        let body = br#"{"model":"gpt-4-internal","choices":[{"index":0}],"usage":{"total_tokens":3}}"#;
        let out = translate_response(body, &backend(StreamMode::Unset)).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"{"model":"my-gpt4","choices":[{"index":0}],"usage":{"total_tokens":3}}"#
        );
    }

    #[test]
    fn test_response_without_model_is_unchanged() {
        let body = br#"{"choices":[]}"#;
        let out = translate_response(body, &backend(StreamMode::Unset)).unwrap();
        assert_eq!(out, body.to_vec());
    }

    #[test]
    fn test_response_non_json_is_parse_error() {
        assert!(matches!(
            translate_response(b"internal error", &backend(StreamMode::Unset)),
            Err(ProxyError::ResponseParse(_))
        ));
    }
}
