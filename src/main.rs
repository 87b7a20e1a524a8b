// Trae Proxy - HTTPS proxy that impersonates the OpenAI API
//
// Clients that only talk to api.openai.com (e.g. an IDE with a fixed model
// list) are pointed at this proxy via DNS and a locally trusted CA. Each
// chat completion is routed to an OpenAI-compatible backend chosen by the
// requested model id.
//
// Architecture:
// - Config (toml): backend list, listener and logging settings
// - Proxy server (axum over hyper + rustls): TLS listener and router
// - Pipeline: select backend -> rewrite request -> forward (reqwest) -> relay

mod cli;
mod config;
mod logging;
mod proxy;
mod startup;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::Config;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // If a command was handled, exit early
    if let Some(code) = cli::handle_command(&cli) {
        std::process::exit(code);
    }

    let config_path = Config::resolve_path(cli.config.as_deref());
    let mut config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Run `trae-proxy config --init` to create a default config.");
            std::process::exit(1);
        }
    };

    if cli.debug {
        config.server.debug = true;
    }

    // Keep the guard alive until exit so buffered file logs are flushed
    let _log_guard = logging::init(&config);

    let cert = cli.cert.clone().unwrap_or_else(|| config.default_cert_path());
    let key = cli.key.clone().unwrap_or_else(|| config.default_key_path());
    ensure_cert_files(&cert, &key)?;

    let tls_config = proxy::load_tls_config(&cert, &key).context("Failed to load TLS certificate")?;

    startup::print_startup(&config, &config_path, &cert, &key);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C, shutting down");
                shutdown.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    proxy::start_proxy(Arc::new(config), tls_config, cancel).await
}

/// Fail with a hint when the certificate pair hasn't been generated yet
///
/// Returned as an error so `main` unwinds normally and the log guard flushes.
fn ensure_cert_files(cert: &Path, key: &Path) -> Result<()> {
    for (what, path) in [("Certificate", cert), ("Private key", key)] {
        if !path.exists() {
            tracing::error!("{} file not found: {}", what, path.display());
            bail!(
                "{} file not found: {}. Generate the CA and server certificate for your domain first.",
                what,
                path.display()
            );
        }
    }
    Ok(())
}
