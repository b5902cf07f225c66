//! OMV Monitor CLI - Command line interface for OpenMediaVault disk monitoring.
//!
//! `refresh` runs one cycle and prints the reconciled snapshot as JSON.
//! `watch` keeps polling at the configured scan interval.

mod logging;
mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use omv_monitor_core::{Config, Coordinator, Error, Result};

/// OpenMediaVault disk monitor.
#[derive(Parser)]
#[command(name = "omv-monitor")]
#[command(about = "Monitor OpenMediaVault disks", long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/omv-monitor/config.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// OMV host, optionally with a port.
    #[arg(long, global = true)]
    host: Option<String>,

    #[arg(short, long, global = true)]
    username: Option<String>,

    #[arg(short, long, global = true)]
    #[arg(env = "OMV_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one refresh cycle and print the snapshot as JSON.
    Refresh {
        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },
    /// Poll the host and log a summary after every cycle.
    Watch {
        /// Override the scan interval (seconds).
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", snafu::Report::from_error(e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = resolve_config(&cli)?;

    match cli.command {
        Commands::Refresh { pretty } => {
            let coordinator = Coordinator::from_config(&config)?;
            let snapshot = coordinator.refresh().await?;
            let json = if pretty {
                serde_json::to_string_pretty(&snapshot)
            } else {
                serde_json::to_string(&snapshot)
            };
            let json = json.map_err(|e| Error::Generic {
                message: "failed to serialize snapshot".to_string(),
                source: Some(Box::new(e)),
            })?;
            println!("{json}");
        }
        Commands::Watch { interval } => {
            if let Some(secs) = interval {
                config.scan_interval_secs = secs;
            }
            let coordinator = Coordinator::from_config(&config)?;
            watch::run(&coordinator, config.scan_interval()).await;
        }
    }

    Ok(())
}

/// Builds the effective config: file values first, command line flags on top.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let from_file = match &cli.config {
        Some(path) => Some(Config::load(path)?),
        None => Config::load_default()?,
    };

    let mut config = match from_file {
        Some(config) => config,
        None => {
            let (Some(host), Some(username)) = (&cli.host, &cli.username) else {
                return Err(Error::InvalidConfig {
                    message: "no config file found; pass --host and --username".to_string(),
                });
            };
            Config::new(host, username, "")
        }
    };

    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(username) = &cli.username {
        config.username = username.clone();
    }
    if let Some(password) = &cli.password {
        config.password = password.clone();
    }

    Ok(config)
}
