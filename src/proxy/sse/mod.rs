// SSE (Server-Sent Events) framing
//
// OpenAI-compatible streams are plain `data:` events:
// ```
// data: <json_payload>
//
// data: [DONE]
//
// ```
// The proxy never re-frames a live upstream stream; these helpers are used
// to detect SSE responses and to build the synthetic stream.

use bytes::Bytes;
use serde::Serialize;

/// Terminal event of an OpenAI-style stream
pub const DONE_EVENT: &[u8] = b"data: [DONE]\n\n";

/// Content type of an SSE response
pub const EVENT_STREAM: &str = "text/event-stream";

/// Check if a response is SSE based on content-type header
pub fn is_sse_response(headers: &reqwest::header::HeaderMap) -> bool {
    headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains(EVENT_STREAM))
        .unwrap_or(false)
}

/// Encode one `data: <json>\n\n` event
pub fn encode_data<T: Serialize>(payload: &T) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_vec(payload)?;

    let mut frame = Vec::with_capacity(json.len() + 8);
    frame.extend_from_slice(b"data: ");
    frame.extend_from_slice(&json);
    frame.extend_from_slice(b"\n\n");
    Ok(Bytes::from(frame))
}
