//! Proxy server setup and the TLS accept loop

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::{server::TlsStream, TlsAcceptor};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::Config;

use super::handlers;
use super::state::ProxyState;

/// Largest accepted request body (long chat histories with inline images)
pub(crate) const MAX_REQUEST_BYTES: usize = 32 * 1024 * 1024;

/// How long open connections get to finish after shutdown starts
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Upper bound for a client to complete the TLS handshake
pub(crate) const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the router with the four OpenAI-compatible routes
///
/// Paths match exactly. A known path with the wrong method gets 405, any
/// other path 404.
pub(crate) fn build_router(state: ProxyState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/v1", get(handlers::v1_root))
        .route("/v1/models", get(handlers::list_models))
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .with_state(state)
}

/// Build the upstream HTTP client
///
/// No total timeout: streamed completions may legitimately run for minutes.
pub(crate) fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .build()
        .context("Failed to create HTTP client")
}

/// Start the proxy server
///
/// Runs until `cancel` fires, then stops accepting and gives open
/// connections [`SHUTDOWN_GRACE`] to drain.
pub async fn start_proxy(
    config: Arc<Config>,
    tls_config: Arc<rustls::ServerConfig>,
    cancel: CancellationToken,
) -> Result<()> {
    let bind_addr = config.bind_addr();

    let state = ProxyState::new(build_client()?, config, cancel.clone());
    let app = build_router(state);
    let acceptor = TlsAcceptor::from(tls_config);

    tracing::info!("Starting proxy on {}", bind_addr);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", bind_addr))?;

    tracing::info!("Proxy listening on https://{}", bind_addr);

    let tracker = TaskTracker::new();

    loop {
        let (stream, peer) = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    continue;
                }
            },
        };

        tracker.spawn(serve_connection(
            stream,
            peer,
            acceptor.clone(),
            app.clone(),
            cancel.clone(),
        ));
    }

    tracker.close();
    tracing::info!("Shutting down, waiting for {} connection(s)", tracker.len());

    if tokio::time::timeout(SHUTDOWN_GRACE, tracker.wait()).await.is_err() {
        tracing::warn!("Connections still open after {:?}, dropping them", SHUTDOWN_GRACE);
    }

    tracing::info!("Proxy server shut down gracefully");
    Ok(())
}

/// Run the TLS handshake, giving up on clients that stall past `limit`
async fn accept_tls<IO>(
    acceptor: &TlsAcceptor,
    stream: IO,
    peer: SocketAddr,
    limit: Duration,
) -> Option<TlsStream<IO>>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    match tokio::time::timeout(limit, acceptor.accept(stream)).await {
        Ok(Ok(tls_stream)) => Some(tls_stream),
        Ok(Err(e)) => {
            // Usually a client that doesn't trust our CA yet
            tracing::debug!(%peer, "TLS handshake failed: {}", e);
            None
        }
        Err(_) => {
            tracing::debug!(%peer, "TLS handshake timed out after {:?}", limit);
            None
        }
    }
}

/// Terminate TLS and serve HTTP/1.1 or HTTP/2 on one connection
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    app: Router,
    cancel: CancellationToken,
) {
    let Some(tls_stream) = accept_tls(&acceptor, stream, peer, TLS_HANDSHAKE_TIMEOUT).await else {
        return;
    };

    let alpn = tls_stream
        .get_ref()
        .1
        .alpn_protocol()
        .map(|p| String::from_utf8_lossy(p).into_owned());
    tracing::debug!(%peer, alpn = alpn.as_deref().unwrap_or("none"), "Connection accepted");

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(tls_stream), TowerToHyperService::new(app));
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = cancel.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = result {
        tracing::debug!(%peer, "Connection closed with error: {}", e);
    }
}
