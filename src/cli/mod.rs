// CLI module - command-line argument parsing and handlers
//
// Without a subcommand the proxy is started. Subcommands for configuration:
// - config --show: Display effective configuration
// - config --path: Show which config file would be loaded
// - config --init: Write a default config file
// - config --validate: Load and validate the config, then exit
// - list / add / remove / update / activate / domain: edit the backend list

mod backends;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::config::{Config, VERSION};

use backends::{AddArgs, UpdateArgs};

/// Trae Proxy - HTTPS proxy that maps OpenAI model ids onto other backends
#[derive(Parser, Debug)]
#[command(name = "trae-proxy")]
#[command(version = VERSION)]
#[command(about = "Impersonates the OpenAI API and routes requests to compatible backends", long_about = None)]
pub struct Cli {
    /// Config file path (overrides TRAE_PROXY_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Certificate file (default: ca/<domain>.crt)
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// Private key file (default: ca/<domain>.key)
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,

        /// Write a default config file
        #[arg(long)]
        init: bool,

        /// Overwrite an existing file with --init
        #[arg(long, requires = "init")]
        force: bool,

        /// Check the config file and exit
        #[arg(long)]
        validate: bool,
    },

    /// List configured backends with their indices
    List,

    /// Add a backend
    Add(AddArgs),

    /// Remove the backend at INDEX
    Remove {
        /// Backend index as printed by `list`
        index: usize,
    },

    /// Change fields of the backend at INDEX
    Update(UpdateArgs),

    /// Make the backend at INDEX the only active one
    Activate {
        /// Backend index as printed by `list`
        index: usize,
    },

    /// Set the domain the proxy impersonates
    Domain {
        /// e.g. api.openai.com
        domain: String,
    },
}

/// Handle CLI subcommands. Returns the exit code if one ran, None to start the proxy.
pub fn handle_command(cli: &Cli) -> Option<i32> {
    let command = cli.command.as_ref()?;
    let config_path = Config::resolve_path(cli.config.as_deref());

    let result = match command {
        Commands::Config {
            show,
            path,
            init,
            force,
            validate,
        } => {
            return Some(handle_config(
                &config_path,
                *show,
                *path,
                *init,
                *force,
                *validate,
            ))
        }
        Commands::List => backends::list_backends(&config_path),
        Commands::Add(args) => backends::add_backend(&config_path, args),
        Commands::Remove { index } => backends::remove_backend(&config_path, *index),
        Commands::Update(args) => backends::update_backend(&config_path, args),
        Commands::Activate { index } => backends::activate_backend(&config_path, *index),
        Commands::Domain { domain } => backends::set_domain(&config_path, domain),
    };

    match result {
        Ok(()) => Some(0),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            Some(1)
        }
    }
}

fn handle_config(
    config_path: &Path,
    show: bool,
    path: bool,
    init: bool,
    force: bool,
    validate: bool,
) -> i32 {
    if path {
        println!("{}", config_path.display());
        0
    } else if init {
        handle_config_init(config_path, force)
    } else if show {
        handle_config_show(config_path)
    } else if validate {
        handle_config_validate(config_path)
    } else {
        // No flag provided, show help
        println!("Usage: trae-proxy config [--show|--path|--init [--force]|--validate]");
        println!();
        println!("Options:");
        println!("  --show      Display effective configuration");
        println!("  --path      Show config file path");
        println!("  --init      Write a default config file");
        println!("  --validate  Check the config file and exit");
        0
    }
}

fn handle_config_show(path: &Path) -> i32 {
    match Config::load(path) {
        Ok(config) => {
            println!("# Effective configuration (env > file > defaults)");
            println!("# Loaded from {}", path.display());
            println!();
            print!("{}", config.to_toml());
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn handle_config_init(path: &Path, force: bool) -> i32 {
    if path.exists() && !force {
        eprintln!(
            "Error: {} already exists (use --force to overwrite)",
            path.display()
        );
        return 1;
    }

    match Config::default().save(path) {
        Ok(()) => {
            println!("✓ Wrote default config to {}", path.display());
            0
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn handle_config_validate(path: &Path) -> i32 {
    match Config::load(path) {
        Ok(config) => {
            let active = config.active_backends().count();
            println!(
                "✓ {} is valid: domain {}, {} backend(s), {} active",
                path.display(),
                config.domain,
                config.apis.len(),
                active
            );
            if active == 0 {
                println!("  note: no backend is active; requests fall back to the first entry");
            }
            0
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            1
        }
    }
}
