mod commands;
mod ui;

use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "policy-exporter")]
#[command(about = "Synthetic policy compliance metrics exporter for Prometheus", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the metrics endpoint and refresh it periodically
    Serve {
        /// Exporter config file (YAML, TOML, or JSON)
        #[arg(short, long, env = "POLICY_EXPORTER_CONFIG")]
        config: Option<PathBuf>,

        /// Address to bind
        #[arg(long, env = "POLICY_EXPORTER_BIND")]
        bind: Option<IpAddr>,

        /// Port for the metrics endpoint
        #[arg(short, long, env = "POLICY_EXPORTER_PORT")]
        port: Option<u16>,

        /// Refresh period, e.g. "60s" or "5m"
        #[arg(long, env = "POLICY_EXPORTER_PERIOD", value_parser = humantime::parse_duration)]
        period: Option<Duration>,

        /// Catalogue file replacing the builtin series table
        #[arg(long, env = "POLICY_EXPORTER_CATALOGUE")]
        catalogue: Option<PathBuf>,

        /// Do not export process_* series
        #[arg(long)]
        no_process_metrics: bool,
    },

    /// Validate a catalogue file
    Validate {
        /// Path to catalogue file
        catalogue_file: PathBuf,
    },

    /// List the series a catalogue publishes
    List {
        /// Catalogue file (defaults to the builtin table)
        #[arg(long)]
        catalogue: Option<PathBuf>,
    },

    /// Run an instant query against Prometheus
    Query {
        /// PromQL expression
        expr: String,

        /// Prometheus base URL
        #[arg(long, env = "PROMETHEUS_URL", default_value = policy_client::DEFAULT_PROMETHEUS_URL)]
        prometheus_url: String,
    },

    /// Print the current values of a running exporter
    Snapshot {
        /// Exporter base URL
        #[arg(long, default_value = "http://localhost:9091")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve {
            config,
            bind,
            port,
            period,
            catalogue,
            no_process_metrics,
        } => {
            commands::serve::execute(commands::serve::ServeOptions {
                config,
                bind,
                port,
                period,
                catalogue,
                no_process_metrics,
            })
            .await?;
        }

        Commands::Validate { catalogue_file } => {
            commands::validate::execute(catalogue_file).await?;
        }

        Commands::List { catalogue } => {
            commands::list::execute(catalogue).await?;
        }

        Commands::Query {
            expr,
            prometheus_url,
        } => {
            commands::query::execute(expr, prometheus_url).await?;
        }

        Commands::Snapshot { url } => {
            commands::snapshot::execute(url).await?;
        }
    }

    Ok(())
}
