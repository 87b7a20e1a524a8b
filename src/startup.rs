// Startup module - displays banner and backend table
//
// Printed to stdout before serving; the same facts go through tracing so
// they also land in log files.

use std::path::Path;

use crate::config::{BackendEntry, Config, VERSION};

/// ANSI color codes for terminal output
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const MAGENTA: &str = "\x1b[35m";
}

/// One backend line: `name [active|inactive]: endpoint -> custom id`
pub fn backend_line(backend: &BackendEntry) -> String {
    format!(
        "{} [{}]: {} -> {}",
        backend.name,
        if backend.active { "active" } else { "inactive" },
        backend.endpoint,
        backend.custom_model_id
    )
}

/// Print the startup banner
pub fn print_startup(config: &Config, config_path: &Path, cert: &Path, key: &Path) {
    use colors::*;

    println!();
    println!("  {BOLD}{CYAN}Trae Proxy{RESET} {DIM}v{VERSION}{RESET}");
    println!("  {DIM}OpenAI API impersonation for {}{RESET}", config.domain);
    println!();
    println!("  {DIM}Config:{RESET} {GREEN}✓{RESET} {}", config_path.display());
    println!("  {DIM}Cert:{RESET}   {}", cert.display());
    println!("  {DIM}Key:{RESET}    {}", key.display());
    if config.server.debug {
        println!("  {DIM}Debug:{RESET}  on");
    }
    println!();

    println!("  {DIM}Backends:{RESET}");
    for backend in &config.apis {
        let mark = if backend.active {
            format!("{GREEN}●{RESET}")
        } else {
            format!("{DIM}○{RESET}")
        };
        println!("    {mark} {}", backend_line(backend));
    }
    println!();

    println!(
        "  {MAGENTA}▸{RESET} Proxy listening on {BOLD}https://{}{RESET}",
        config.bind_addr()
    );
    println!();

    tracing::info!(version = VERSION, domain = %config.domain, "Trae Proxy starting");
    tracing::info!(config = %config_path.display(), cert = %cert.display(), key = %key.display(), "Startup paths");
    for backend in &config.apis {
        tracing::info!(
            stream_mode = backend.stream_mode.as_str(),
            simulate_stream = backend.simulate_stream,
            "Backend {}",
            backend_line(backend)
        );
    }
}
