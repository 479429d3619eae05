//! Cluster metrics service.
//!
//! # Architecture Overview
//!
//! ```text
//!   producers ──record──▶ ┌──────────────────────────────┐
//!   (pin tracker, RPC)    │            Stats             │
//!                         │  tag keys · measures · views │
//!                         └──────────────┬───────────────┘
//!                                        │ snapshots
//!                     ┌──────────────────┼──────────────────┐
//!                     ▼                  ▼                  ▼
//!               LogExporter       FacadeExporter        `views` CLI
//!                                 (Prometheus)
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;

use cluster_metrics::config::{load_config, MetricsConfig};
use cluster_metrics::export::Reporter;
use cluster_metrics::lifecycle::{bootstrap, wait_for_signal, Shutdown};
use cluster_metrics::observability::init_logging;

/// How long the reporter gets for its final flush.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "cluster-metrics")]
#[command(about = "Metrics registry and default views for a cluster peer", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the views and export until interrupted (default)
    Run,
    /// Print the installed views as JSON
    Views,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => MetricsConfig::default(),
    };

    init_logging(&config.observability)?;
    tracing::info!("cluster-metrics v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Views => print_views(&config),
    }
}

async fn run(config: MetricsConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.export.prometheus_enabled {
        let addr: std::net::SocketAddr = config.export.prometheus_address.parse()?;
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        tracing::info!(address = %addr, "Prometheus endpoint listening");
    }

    let boot = bootstrap(&config)?;

    let mut shutdown = Shutdown::new();
    if config.export.enabled {
        let interval = Duration::from_millis(config.export.interval_ms);
        let handle = Reporter::new(boot.stats.clone(), interval).spawn(shutdown.subscribe());
        shutdown.track("reporter", handle);
    } else {
        tracing::info!("Periodic export disabled");
    }

    wait_for_signal().await;
    shutdown.complete(SHUTDOWN_GRACE).await;

    tracing::info!("cluster-metrics stopped");
    Ok(())
}

fn print_views(config: &MetricsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let boot = bootstrap(config)?;

    let views: Vec<serde_json::Value> = boot
        .stats
        .view_names()
        .iter()
        .filter_map(|name| boot.stats.find_view(name))
        .map(|view| {
            serde_json::json!({
                "name": view.name(),
                "description": view.description(),
                "measure": view.measure().name(),
                "unit": view.measure().unit().symbol(),
                "aggregation": view.aggregation().kind(),
                "tag_keys": view.tag_keys().iter().map(|k| k.name()).collect::<Vec<_>>(),
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&views)?);
    Ok(())
}
