// Proxy module - HTTPS server that impersonates the OpenAI API
//
// Clients resolve the configured domain to this machine and trust our CA.
// Chat completion requests are routed to one of the configured
// OpenAI-compatible backends by model id; the model id is rewritten on the
// way out (custom → target) and on buffered replies on the way back
// (target → custom). Streams are relayed byte-for-byte.

mod error;
mod forward;
mod handlers;
mod helpers;
mod relay;
mod selector;
mod server;
mod sse;
mod state;
mod tls;
mod translation;

pub use server::start_proxy;
pub use tls::load_tls_config;
