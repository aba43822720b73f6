use std::env;
use std::sync::Arc;

use helmsman_engine::Controller;
use helmsman_server::config::loader::load_config;
use helmsman_server::{AppState, Server, build_router, observability};
use helmsman_target_memory::MemoryTarget;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From HELMSMAN_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (helmsman.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (HELMSMAN_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present; its absence is not an error.
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    observability::init_tracing();

    let (config_path, source) = resolve_config_path();
    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    tracing::info!(path = %config_path, source = %source, "Configuration loaded");
    observability::apply_logging_level(&cfg.logging.level);

    let addr = match cfg.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    let target = Arc::new(MemoryTarget::new());
    let controller = match Controller::new(target, cfg.controller.clone()) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Controller initialization failed: {e}");
            std::process::exit(2);
        }
    };

    let app = build_router(AppState::new(controller.clone()));
    Server::new(addr, app, controller).run().await
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: HELMSMAN_CONFIG
/// 3. Default: helmsman.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::CliArgument);
            }
        }
    }
    if let Ok(path) = env::var("HELMSMAN_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }
    ("helmsman.toml".to_string(), ConfigSource::Default)
}
