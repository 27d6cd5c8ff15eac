use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use expense_sync::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "expense-sync",
    version,
    about = "Share expense data across devices on the local network",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// TOML config file; environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the local record store to other devices
    Serve {
        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,

        /// Bind address (host:port)
        #[arg(short, long)]
        bind: Option<String>,

        /// Device name advertised to clients
        #[arg(long)]
        device_name: Option<String>,

        /// Expose Prometheus metrics at /metrics
        #[arg(long, default_value = "false")]
        metrics: bool,

        /// Disable CORS headers
        #[arg(long, default_value = "false")]
        no_cors: bool,
    },

    /// Load a JSON array of purchase records into the store
    Import {
        /// JSON file to import
        input: PathBuf,

        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Sweep the local network for servers
    Scan {
        /// /24 prefix to sweep, e.g. 192.168.1 (repeatable)
        #[arg(short, long)]
        prefix: Vec<String>,

        /// Server port
        #[arg(long)]
        port: Option<u16>,

        /// Maximum probes in flight
        #[arg(long)]
        concurrency: Option<usize>,

        /// Probe timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Connect to a server and print its data
    Connect {
        /// Server address (host, host:port or http URL)
        address: String,

        /// Keep refreshing and health-checking until interrupted
        #[arg(short, long, default_value = "false")]
        watch: bool,

        /// Refresh interval in seconds when watching
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }

    // Initialize tracing/logging
    setup_tracing(&config.logging.format, &config.logging.level, cli.verbose)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "expense-sync starting");

    match cli.command {
        Commands::Serve {
            db,
            bind,
            device_name,
            metrics,
            no_cors,
        } => {
            if let Some(db) = db {
                config.storage.sqlite_path = db;
            }
            if let Some(bind) = bind {
                config.server.bind_address = bind
                    .parse()
                    .with_context(|| format!("Invalid bind address: {bind}"))?;
            }
            if device_name.is_some() {
                config.server.device_name = device_name;
            }
            config.server.enable_metrics |= metrics;
            if no_cors {
                config.server.enable_cors = false;
            }
            config.validate()?;

            tracing::info!(
                bind = %config.server.bind_address,
                db = %config.storage.sqlite_path.display(),
                "Starting serve command"
            );
            commands::serve(config).await?;
        }

        Commands::Import { input, db } => {
            if let Some(db) = db {
                config.storage.sqlite_path = db;
            }
            tracing::info!(input = %input.display(), "Starting import command");
            commands::import(config, input).await?;
        }

        Commands::Scan {
            prefix,
            port,
            concurrency,
            timeout,
        } => {
            if !prefix.is_empty() {
                config.discovery.prefixes = prefix;
            }
            if let Some(port) = port {
                config.discovery.port = port;
            }
            if let Some(concurrency) = concurrency {
                config.discovery.max_concurrent_probes = concurrency;
            }
            if let Some(timeout) = timeout {
                config.discovery.probe_timeout_secs = timeout;
            }
            config.validate()?;

            tracing::info!(
                prefixes = ?config.discovery.prefixes,
                port = config.discovery.port,
                "Starting scan command"
            );
            commands::scan(config).await?;
        }

        Commands::Connect {
            address,
            watch,
            interval,
        } => {
            if let Some(interval) = interval {
                config.client.auto_refresh_ms = interval.saturating_mul(1000);
            }
            config.validate()?;

            tracing::info!(address = %address, watch, "Starting connect command");
            commands::connect(config, address, watch).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("expense_sync=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(format!("expense_sync={level},warn")))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
