//! Synthetic stream: replay a buffered completion as SSE chunks
//!
//! Used for backends that can't stream but whose clients asked for one.
//! The assistant message is cut into pieces of at most four characters and
//! framed like an OpenAI stream: a role chunk, the content chunks, a
//! `finish_reason: "stop"` chunk, then `data: [DONE]`.

use std::convert::Infallible;

use axum::{body::Body, response::Response};
use bytes::Bytes;
use futures::{stream, StreamExt};
use serde::Serialize;

use super::buffered::read_body;
use super::streaming::sse_response;
use super::RelayContext;
use crate::proxy::error::ProxyError;
use crate::proxy::sse;
use crate::proxy::translation::{self, JsonObject};

/// Characters per content chunk
const PIECE_CHARS: usize = 4;

const CHUNK_ID: &str = "chatcmpl-simulated";
const CHUNK_OBJECT: &str = "chat.completion.chunk";

#[derive(Debug, Serialize)]
struct ChunkEnvelope<'a> {
    id: &'static str,
    object: &'static str,
    created: u64,
    model: &'a str,
    choices: [ChunkChoice<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChunkChoice<'a> {
    index: u32,
    delta: Delta<'a>,
    finish_reason: Option<&'static str>,
}

#[derive(Debug, Default, Serialize)]
struct Delta<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
}

fn chunk<'a>(model: &'a str, delta: Delta<'a>, finish_reason: Option<&'static str>) -> ChunkEnvelope<'a> {
    ChunkEnvelope {
        id: CHUNK_ID,
        object: CHUNK_OBJECT,
        created: 1,
        model,
        choices: [ChunkChoice {
            index: 0,
            delta,
            finish_reason,
        }],
    }
}

/// `choices[0].message.content` of a buffered completion
pub(super) fn extract_content(payload: &JsonObject) -> Result<&str, ProxyError> {
    payload
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .ok_or_else(|| ProxyError::ResponseParse("missing choices[0].message.content".to_string()))
}

/// Split on character boundaries, `PIECE_CHARS` characters per piece
pub(super) fn split_content(content: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (count, (idx, _)) in content.char_indices().enumerate() {
        if count > 0 && count % PIECE_CHARS == 0 {
            pieces.push(&content[start..idx]);
            start = idx;
        }
    }
    if start < content.len() {
        pieces.push(&content[start..]);
    }
    pieces
}

/// Every SSE frame of a synthetic stream, in order
pub(super) fn synthetic_events(model: &str, content: &str) -> Result<Vec<Bytes>, ProxyError> {
    let encode = |envelope: &ChunkEnvelope<'_>| {
        sse::encode_data(envelope)
            .map_err(|e| ProxyError::Internal(format!("Failed to encode stream chunk: {}", e)))
    };

    let mut events = Vec::new();
    events.push(encode(&chunk(
        model,
        Delta {
            role: Some("assistant"),
            content: None,
        },
        None,
    ))?);

    for piece in split_content(content) {
        events.push(encode(&chunk(
            model,
            Delta {
                role: None,
                content: Some(piece),
            },
            None,
        ))?);
    }

    events.push(encode(&chunk(model, Delta::default(), Some("stop")))?);
    events.push(Bytes::from_static(sse::DONE_EVENT));
    Ok(events)
}

/// Buffer the upstream reply and answer with a synthetic stream
pub(super) async fn relay_synthetic(
    response: reqwest::Response,
    ctx: &RelayContext,
) -> Result<Response, ProxyError> {
    let body = read_body(response).await?;
    let payload = translation::decode_response(&body)?;
    let content = extract_content(&payload)?;

    let events = synthetic_events(&ctx.backend.custom_model_id, content)?;
    tracing::debug!(
        backend = %ctx.backend.name,
        "Simulating stream with {} events",
        events.len()
    );

    let frames = stream::iter(events.into_iter().map(Ok::<_, Infallible>))
        .take_until(ctx.cancel.clone().cancelled_owned());
    Ok(sse_response(Body::from_stream(frames), ctx.client_version))
}
