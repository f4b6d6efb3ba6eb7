// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! CLI tool for Metric Exchange (metricx)

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use metricx::config::{ExchangeConfig, LogLevel};
#[cfg(feature = "cli")]
use metricx::http_server::HttpServer;
#[cfg(feature = "cli")]
use metricx::metric::MetricId;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "metricx")]
#[command(about = "Metric Exchange: authorized remote access to recorded metrics with peer synchronization", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Serve hosted metrics over HTTP
    Serve {
        /// Configuration file
        #[arg(short, long, default_value = "metricx.toml")]
        config: PathBuf,
        /// Override the bind address
        #[arg(long)]
        bind: Option<String>,
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Validate a configuration file and show what it hosts
    Check {
        /// Configuration file
        #[arg(short, long, default_value = "metricx.toml")]
        config: PathBuf,
    },
    /// Print the fingerprint callers use for each metric name
    Fingerprint {
        /// Metric names
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Print a commented sample configuration
    SampleConfig {
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(feature = "cli")]
fn init_logging(level: LogLevel) {
    let env = env_logger::Env::default().default_filter_or(level.as_filter().to_string());
    env_logger::Builder::from_env(env).init();
}

#[cfg(feature = "cli")]
fn load(path: &std::path::Path) -> Result<ExchangeConfig, Box<dyn std::error::Error>> {
    let path = path
        .to_str()
        .ok_or_else(|| format!("Config path is not valid UTF-8: {}", path.display()))?;
    Ok(ExchangeConfig::from_toml_file(path)?)
}

#[cfg(feature = "cli")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, bind, port } => {
            let mut config = load(&config)?;
            if let Some(bind) = bind {
                config.bind_address = bind;
            }
            if let Some(port) = port {
                config.port = port;
            }
            init_logging(config.log_level);

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async move {
                let exchange = config.build()?;
                log::info!(
                    "Hosting {} metrics, {} pull bindings, {} push subscriptions",
                    exchange.metrics.len(),
                    exchange.synchronizer.registry().len(),
                    exchange.subscriptions.len()
                );
                HttpServer::new(config.server(), exchange.handler).run().await
            })?;
        }
        Commands::Check { config } => {
            let config = load(&config)?;
            println!("Listening on {}", config.server().address());
            println!("Routes under /{}", config.prefix);
            println!(
                "Credentials: {} secrets, {} scoped tokens",
                config.access.secrets.len(),
                config.access.tokens.len()
            );
            for metric in &config.metrics {
                println!(
                    "  {}  {}{}",
                    MetricId::of(&metric.name),
                    metric.name,
                    if metric.remotely_updatable { " (remote)" } else { "" }
                );
            }
            for entry in &config.sync {
                println!(
                    "  sync {} <-> {}:{} ({:?})",
                    entry.metric,
                    entry.peer,
                    entry.remote_name(),
                    entry.direction
                );
            }
        }
        Commands::Fingerprint { names } => {
            for name in names {
                println!("{}  {}", MetricId::of(&name), name);
            }
        }
        Commands::SampleConfig { output } => {
            let sample = ExchangeConfig::sample_toml();
            match output {
                Some(path) => {
                    std::fs::write(&path, sample)?;
                    eprintln!("Wrote {}", path.display());
                }
                None => print!("{}", sample),
            }
        }
    }

    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features not enabled. Please compile with --features cli");
    std::process::exit(1);
}
