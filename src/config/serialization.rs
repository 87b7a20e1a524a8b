//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use super::{BackendEntry, Config};

impl Config {
    /// Serialize the backend list as `[[apis]]` tables
    fn apis_to_toml(&self) -> String {
        let mut output = String::new();

        for api in &self.apis {
            output.push_str(&backend_to_toml(api));
        }
        output
    }

    /// Render the full config file, comments included
    pub fn to_toml(&self) -> String {
        format!(
            r#"# trae-proxy configuration

# Virtual hostname clients connect to (the certificate must be issued for it)
domain = {domain}

[server]
host = "{host}"
port = {port}
debug = {debug}

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = {log_level}
# JSON file logging in addition to stdout
file_enabled = {log_file_enabled}
file_dir = {log_file_dir}
file_rotation = "{log_file_rotation}"  # hourly, daily, never
file_prefix = {log_file_prefix}

# ─────────────────────────────────────────────────────────────────────────────
# BACKENDS
# ─────────────────────────────────────────────────────────────────────────────
# Order matters: exact model matches are tried first among active entries,
# then the first active entry, then the first entry.
#
# stream_mode: omit to keep the client's "stream" flag, true/false to force it
# simulate_stream: replay buffered replies as SSE when the client wanted a stream
{apis}"#,
            domain = quote(&self.domain),
            host = self.server.host,
            port = self.server.port,
            debug = self.server.debug,
            log_level = quote(&self.logging.level),
            log_file_enabled = self.logging.file_enabled,
            log_file_dir = quote(&self.logging.file_dir.display().to_string()),
            log_file_rotation = self.logging.file_rotation.as_str(),
            log_file_prefix = quote(&self.logging.file_prefix),
            apis = self.apis_to_toml(),
        )
    }
}

fn backend_to_toml(api: &BackendEntry) -> String {
    let mut output = String::from("\n[[apis]]\n");
    output.push_str(&format!("name = {}\n", quote(&api.name)));
    output.push_str(&format!("endpoint = {}\n", quote(&api.endpoint)));
    output.push_str(&format!(
        "custom_model_id = {}\n",
        quote(&api.custom_model_id)
    ));
    output.push_str(&format!(
        "target_model_id = {}\n",
        quote(&api.target_model_id)
    ));
    match api.stream_mode.as_flag() {
        Some(flag) => output.push_str(&format!("stream_mode = {}\n", flag)),
        None => output.push_str("# stream_mode = true\n"),
    }
    if api.simulate_stream {
        output.push_str("simulate_stream = true\n");
    }
    output.push_str(&format!("active = {}\n", api.active));
    output
}

/// TOML basic string with escaping (names may contain quotes or non-ASCII)
fn quote(s: &str) -> String {
    toml::Value::String(s.to_string()).to_string()
}
