//! Proxy state shared by every handler

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Shared state for the proxy server
///
/// The config is immutable after startup, so handlers read it without
/// locking. Each request takes its own backend snapshot from it.
#[derive(Clone)]
pub struct ProxyState {
    /// HTTP client for forwarding requests (pooled, shared)
    pub(super) client: reqwest::Client,
    /// Loaded configuration
    pub(super) config: Arc<Config>,
    /// Cancelled on shutdown; open streams stop relaying
    pub(super) cancel: CancellationToken,
}

impl ProxyState {
    pub fn new(client: reqwest::Client, config: Arc<Config>, cancel: CancellationToken) -> Self {
        Self {
            client,
            config,
            cancel,
        }
    }
}
