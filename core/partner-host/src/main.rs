//! partner-host: single-writer host process for the Thought Partner overlay.
//!
//! Owns the canonical state, drives the docked panel and the clipboard
//! capture loop, and serves the rendering shell over a Unix socket.
//!
//! ## Subcommands
//!
//! - `run`: Start the host (socket listener plus scheduler thread)
//! - `inspect`: Print the reconciled state from disk without modifying it

mod clipboard;
mod groq;
mod host;
mod logging;
mod scheduler;
mod server;
mod window;

use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use partner_core::{
    load_runtime_config, reconcile, JsonFileStore, Persistence, RuntimeConfig, StateStore,
    StorageConfig,
};
use tracing::{error, info, warn};

use groq::GroqClient;
use host::Host;
use scheduler::SchedulerOptions;

#[derive(Parser)]
#[command(name = "partner-host")]
#[command(about = "Thought Partner overlay host")]
#[command(version)]
struct Cli {
    /// Data directory (defaults to ~/.thought-partner)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the host
    Run {
        /// Skip the clipboard watcher (headless sessions and tests)
        #[arg(long)]
        no_clipboard: bool,
    },

    /// Print the reconciled state as JSON
    Inspect,
}

fn main() {
    let cli = Cli::parse();
    let storage = cli
        .root
        .map(StorageConfig::with_root)
        .unwrap_or_default();

    match cli.command {
        Commands::Run { no_clipboard } => {
            let _logging_guard = logging::init(&storage.logs_dir());
            if let Err(err) = run(&storage, !no_clipboard) {
                error!(error = %err, "partner-host failed");
                std::process::exit(1);
            }
        }
        Commands::Inspect => {
            if let Err(err) = inspect(&storage) {
                eprintln!("partner-host inspect failed: {}", err);
                std::process::exit(1);
            }
        }
    }
}

fn load_config(storage: &StorageConfig) -> RuntimeConfig {
    match load_runtime_config(&storage.config_file()) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load config; using defaults");
            RuntimeConfig::default()
        }
    }
}

fn run(storage: &StorageConfig, capture_clipboard: bool) -> Result<(), String> {
    let config = load_config(storage);
    let store = StateStore::open(JsonFileStore::new(storage.state_file()), Utc::now());

    let model = GroqClient::from_env(config.suggestions.clone());
    if !model.is_configured() {
        info!("{} not set; suggestions will use heuristics", groq::API_KEY_ENV);
    }

    let host = Arc::new(Host::new(config, store, Box::new(model)));

    let socket_path = storage.socket_path();
    server::prepare_socket(&socket_path)?;
    let listener = UnixListener::bind(&socket_path)
        .map_err(|err| format!("Failed to bind {}: {}", socket_path.display(), err))?;
    info!(path = %socket_path.display(), "partner-host started");

    let scheduler = scheduler::spawn(Arc::clone(&host), SchedulerOptions { capture_clipboard })
        .map_err(|err| format!("Failed to start scheduler: {}", err))?;

    server::serve(listener, socket_path, Arc::clone(&host));

    if scheduler.join().is_err() {
        warn!("Scheduler thread panicked");
    }
    info!("partner-host stopped");
    Ok(())
}

fn inspect(storage: &StorageConfig) -> Result<(), String> {
    let store = JsonFileStore::new(storage.state_file());
    let raw = store
        .load()
        .map_err(|err| err.to_string())?
        .unwrap_or(serde_json::Value::Null);
    let state = reconcile(&raw, Utc::now());
    let output = serde_json::to_string_pretty(&state).map_err(|err| err.to_string())?;
    println!("{}", output);
    Ok(())
}
