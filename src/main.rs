use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use xcloud::web::WebServer;
use xcloud::{Config, StorageService};

#[derive(Parser)]
#[command(name = "xcloud")]
#[command(about = "Self-hosted file cloud with an API-key protected HTTP API")]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Load and validate the configuration, print a summary and exit
    #[arg(long)]
    check_config: bool,
}

fn load_config(path: &Path) -> Config {
    let mut config = match Config::load(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", path.display());
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();
    config
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config = load_config(&args.config);

    if args.check_config {
        println!("{}", config.summary());
        return match config.validate() {
            Ok(()) => {
                println!("Configuration OK");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Configuration invalid: {e}");
                ExitCode::FAILURE
            }
        };
    }

    // Initialize logging
    if let Err(e) = xcloud::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        xcloud::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    info!("xCloud starting");
    let storage = match StorageService::open(&config.storage) {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            error!("Failed to open storage at {}: {}", config.storage.root, e);
            return ExitCode::FAILURE;
        }
    };
    info!(root = %storage.root().display(), "Storage ready");

    let server = match WebServer::new(&config, storage) {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Web server failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
