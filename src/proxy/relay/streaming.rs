//! Streaming pass-through
//!
//! The upstream body is read in reads of at most [`READ_CHUNK_SIZE`] bytes
//! and every read becomes one body frame, so hyper writes and flushes it
//! before the next read is polled. A slow client therefore stalls the
//! upstream read loop (backpressure) and bytes are never reordered.
//!
//! The loop ends on upstream EOF, on an upstream read error (the client
//! connection is aborted, headers are already gone), on shutdown, or when
//! the client goes away and hyper drops the body, which drops the upstream
//! connection with it.

use std::io;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode, Version},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use tokio_util::io::{ReaderStream, StreamReader};
use tokio_util::sync::CancellationToken;

use crate::proxy::sse;

/// Upper bound for a single upstream read
pub(super) const READ_CHUNK_SIZE: usize = 4096;

/// Wrap an SSE body in the streaming response headers
///
/// `Connection: keep-alive` only goes to HTTP/1.x clients; connection-specific
/// headers are illegal on HTTP/2.
pub(super) fn sse_response(body: Body, version: Version) -> Response {
    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, sse::EVENT_STREAM),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response();

    if version < Version::HTTP_2 {
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    }
    response
}

/// Relay a live upstream stream byte-for-byte
pub(super) fn relay_stream(
    response: reqwest::Response,
    version: Version,
    cancel: CancellationToken,
) -> Response {
    if !sse::is_sse_response(response.headers()) {
        tracing::warn!(
            "Streaming requested but upstream content-type is {:?}; relaying as-is",
            response.headers().get(header::CONTENT_TYPE)
        );
    }

    let upstream = response.bytes_stream().map_err(io::Error::other);
    sse_response(Body::from_stream(passthrough(upstream, cancel)), version)
}

/// Re-chunk an upstream byte stream into reads of at most 4096 bytes
///
/// Empty upstream chunks produce nothing; content and order are untouched.
pub(super) fn passthrough<S>(
    upstream: S,
    cancel: CancellationToken,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    ReaderStream::with_capacity(StreamReader::new(upstream), READ_CHUNK_SIZE)
        .take_until(cancel.cancelled_owned())
        .inspect_err(|e| tracing::error!("Upstream stream aborted: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Sets the flag when the upstream stream is dropped
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        let items: Vec<io::Result<Bytes>> = parts
            .iter()
            .copied()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect();
        stream::iter(items)
    }

    async fn drain<S>(s: S) -> (Vec<Bytes>, Option<io::Error>)
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let mut out = Vec::new();
        let mut s = Box::pin(s);
        while let Some(item) = s.next().await {
            match item {
                Ok(bytes) => out.push(bytes),
                Err(e) => return (out, Some(e)),
            }
        }
        (out, None)
    }

    #[tokio::test]
    async fn test_identity_across_reads() {
        let (frames, err) = drain(passthrough(chunks(&["AB", "", "CDE"]), CancellationToken::new())).await;

        assert!(err.is_none());
        assert!(frames.iter().all(|f| !f.is_empty()));
        let joined: Vec<u8> = frames.iter().flat_map(|f| f.to_vec()).collect();
        assert_eq!(joined, b"ABCDE");
    }

    #[tokio::test]
    async fn test_large_chunk_is_split_at_read_size() {
        let big: &'static str = Box::leak("x".repeat(READ_CHUNK_SIZE * 2 + 10).into_boxed_str());
        let (frames, _) = drain(passthrough(chunks(&[big]), CancellationToken::new())).await;

        assert!(frames.iter().all(|f| f.len() <= READ_CHUNK_SIZE));
        assert_eq!(frames.iter().map(|f| f.len()).sum::<usize>(), big.len());
    }

    #[tokio::test]
    async fn test_read_error_ends_stream_after_delivered_bytes() {
        let items: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: 1\n\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"data: 2\n\n")),
        ];
        let (frames, err) = drain(passthrough(stream::iter(items), CancellationToken::new())).await;

        assert_eq!(frames.concat(), b"data: 1\n\n");
        assert_eq!(err.unwrap().kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_cancel_stops_relay() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Upstream that would never finish on its own
        let endless = stream::repeat_with(|| Ok(Bytes::from_static(b"data: tick\n\n")));
        let (frames, err) = drain(passthrough(endless, cancel)).await;

        assert!(err.is_none());
        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn test_client_drop_releases_upstream() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());

        // Endless upstream that owns the flag, like a live backend connection
        let endless = stream::repeat_with(move || {
            let _owner = &flag;
            Ok(Bytes::from_static(b"data: tick\n\n"))
        });

        let mut relay = Box::pin(passthrough(endless, CancellationToken::new()));
        let first = relay.next().await.unwrap().unwrap();
        assert!(!first.is_empty());
        assert!(!dropped.load(Ordering::SeqCst));

        // The client went away: hyper drops the response body
        drop(relay);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_keep_alive_only_on_http1() {
        let http1 = sse_response(Body::empty(), Version::HTTP_11);
        assert_eq!(http1.headers()[header::CONNECTION], "keep-alive");
        assert_eq!(http1.headers()[header::CONTENT_TYPE], "text/event-stream");

        let http2 = sse_response(Body::empty(), Version::HTTP_2);
        assert!(http2.headers().get(header::CONNECTION).is_none());
        assert_eq!(http2.headers()[header::CACHE_CONTROL], "no-cache");
    }
}
