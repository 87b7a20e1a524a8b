// Backend list editing: list, add, remove, update, activate, domain
//
// Edits start from the file as written (no env overrides), are validated,
// and then saved back. `add` and `domain` start from the default config when
// no file exists yet. Indices are 0-based, as printed by `list`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::config::{BackendEntry, Config, StreamMode};
use crate::startup::backend_line;

/// Fields for a new backend entry
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Display name
    #[arg(long)]
    pub name: String,

    /// Base URL of the OpenAI-compatible API
    #[arg(long)]
    pub endpoint: String,

    /// Model id clients request
    #[arg(long)]
    pub custom_model: String,

    /// Model id sent upstream
    #[arg(long)]
    pub target_model: String,

    /// Outbound stream flag: true, false or none (keep the client's)
    #[arg(long, default_value = "none")]
    pub stream_mode: StreamMode,

    /// Activate this backend and deactivate all others
    #[arg(long)]
    pub active: bool,

    /// Replay buffered replies as SSE when the client asked for a stream
    #[arg(long)]
    pub simulate_stream: bool,
}

/// Fields to change on an existing backend; omitted ones stay as they are
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Backend index as printed by `list`
    pub index: usize,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long)]
    pub custom_model: Option<String>,

    #[arg(long)]
    pub target_model: Option<String>,

    /// true, false or none
    #[arg(long)]
    pub stream_mode: Option<StreamMode>,

    /// `true` also deactivates every other backend
    #[arg(long)]
    pub active: Option<bool>,

    #[arg(long)]
    pub simulate_stream: Option<bool>,
}

fn load_existing(path: &Path) -> Result<Config> {
    Config::load_file(path).map_err(anyhow::Error::from)
}

fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_existing(path)
    } else {
        Ok(Config::default())
    }
}

fn save_validated(config: &Config, path: &Path) -> Result<()> {
    config.validate()?;
    config.save(path)
}

fn check_endpoint(endpoint: &str) -> Result<()> {
    let url = reqwest::Url::parse(endpoint)
        .with_context(|| format!("Invalid endpoint URL {:?}", endpoint))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Endpoint must be an http or https URL (got {:?})", endpoint);
    }
    Ok(())
}

fn check_index(config: &Config, index: usize) -> Result<()> {
    if index >= config.apis.len() {
        bail!(
            "No backend at index {} ({} configured)",
            index,
            config.apis.len()
        );
    }
    Ok(())
}

/// Leave exactly one backend active
fn activate_only(apis: &mut [BackendEntry], index: usize) {
    for (i, api) in apis.iter_mut().enumerate() {
        api.active = i == index;
    }
}

pub fn list_backends(path: &Path) -> Result<()> {
    let config = load_existing(path)?;

    println!("Domain: {}", config.domain);
    println!("Backends ({}):", config.apis.len());
    for (index, api) in config.apis.iter().enumerate() {
        println!("  {}  {}", index, backend_line(api));
        println!(
            "     target: {}, stream: {}, simulate_stream: {}",
            api.target_model_id,
            api.stream_mode.as_str(),
            api.simulate_stream
        );
    }
    Ok(())
}

pub fn add_backend(path: &Path, args: &AddArgs) -> Result<()> {
    check_endpoint(&args.endpoint)?;
    let mut config = load_or_default(path)?;

    config.apis.push(BackendEntry {
        name: args.name.clone(),
        endpoint: args.endpoint.clone(),
        custom_model_id: args.custom_model.clone(),
        target_model_id: args.target_model.clone(),
        stream_mode: args.stream_mode,
        active: args.active,
        simulate_stream: args.simulate_stream,
    });
    if args.active {
        let added = config.apis.len() - 1;
        activate_only(&mut config.apis, added);
    }

    save_validated(&config, path)?;
    println!("✓ Added backend {}", args.name);
    Ok(())
}

pub fn remove_backend(path: &Path, index: usize) -> Result<()> {
    let mut config = load_existing(path)?;
    check_index(&config, index)?;
    if config.apis.len() == 1 {
        bail!("Refusing to remove the last backend");
    }

    let removed = config.apis.remove(index);
    save_validated(&config, path)?;
    println!("✓ Removed backend {}", removed.name);
    if config.active_backends().next().is_none() {
        println!("  note: no backend is active; requests fall back to the first entry");
    }
    Ok(())
}

pub fn update_backend(path: &Path, args: &UpdateArgs) -> Result<()> {
    let mut config = load_existing(path)?;
    check_index(&config, args.index)?;
    if let Some(endpoint) = &args.endpoint {
        check_endpoint(endpoint)?;
    }

    let api = &mut config.apis[args.index];
    if let Some(name) = &args.name {
        api.name = name.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        api.endpoint = endpoint.clone();
    }
    if let Some(custom) = &args.custom_model {
        api.custom_model_id = custom.clone();
    }
    if let Some(target) = &args.target_model {
        api.target_model_id = target.clone();
    }
    if let Some(mode) = args.stream_mode {
        api.stream_mode = mode;
    }
    if let Some(simulate) = args.simulate_stream {
        api.simulate_stream = simulate;
    }
    match args.active {
        Some(true) => activate_only(&mut config.apis, args.index),
        Some(false) => config.apis[args.index].active = false,
        None => {}
    }

    save_validated(&config, path)?;
    println!("✓ Updated backend {}", config.apis[args.index].name);
    Ok(())
}

pub fn activate_backend(path: &Path, index: usize) -> Result<()> {
    let mut config = load_existing(path)?;
    check_index(&config, index)?;

    activate_only(&mut config.apis, index);
    save_validated(&config, path)?;
    println!("✓ Activated backend {}", config.apis[index].name);
    Ok(())
}

pub fn set_domain(path: &Path, domain: &str) -> Result<()> {
    let mut config = load_or_default(path)?;
    config.domain = domain.trim().to_string();

    save_validated(&config, path)?;
    println!("✓ Domain set to {}", config.domain);
    println!(
        "  certificate expected at {}",
        config.default_cert_path().display()
    );
    Ok(())
}
