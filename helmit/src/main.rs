mod config;

use clap::{Parser, Subcommand};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "helmit", version, about = "Aggregation gateway for deployed shipments")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the gateway
    Run {
        #[arg(long, short)]
        config: PathBuf,
    },
    /// Load and validate a config file, then exit
    CheckConfig {
        #[arg(long, short)]
        config: PathBuf,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to set up metrics: {0}")]
    Metrics(String),
    #[error(transparent)]
    Barge(#[from] barge::SetupError),
    #[error(transparent)]
    Harbor(#[from] harbor::errors::HarborError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Run { config } => run(&config),
        CliCommand::CheckConfig { config } => {
            let config = load_config(&config)?;
            println!(
                "config ok: listening on {}:{}, {} static barge(s), discovery {}",
                config.harbor.listener.host,
                config.harbor.listener.port,
                config.barge.static_endpoints.len(),
                if config.barge.discovery.is_some() {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            Ok(())
        }
    }
}

fn load_config(path: &std::path::Path) -> Result<Config, ConfigError> {
    let mut config = Config::from_file(path)?;
    config.barge.apply_env(std::env::vars());
    config.validate()?;
    Ok(config)
}

fn run(path: &std::path::Path) -> Result<(), CliError> {
    let config = load_config(path)?;

    let _sentry = init_logging(config.common.logging.as_ref());
    if let Some(metrics) = &config.common.metrics {
        init_metrics(metrics)?;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let (resolver, sweeper) = barge::from_config(&config.barge)?;
        tracing::info!(
            location = %resolver.location(),
            static_barges = config.barge.static_endpoints.len(),
            "Starting helmit"
        );

        let result = tokio::select! {
            result = harbor::run(config.harbor, Arc::new(resolver)) => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                Ok(())
            }
        };
        sweeper.shutdown();
        Ok::<(), CliError>(result?)
    })
}

/// Installs the fmt subscriber, plus the sentry layer when a DSN is set.
/// The returned guard flushes pending sentry events on drop.
fn init_logging(logging: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let guard = logging.map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();

    guard
}

fn init_metrics(metrics: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(metrics.statsd_host.as_str(), metrics.statsd_port)
        .build(Some(metrics.prefix.as_str()))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    shared::metrics_defs::describe_all(barge::metrics_defs::ALL_METRICS);
    shared::metrics_defs::describe_all(harbor::metrics_defs::ALL_METRICS);
    tracing::info!(
        host = %metrics.statsd_host,
        port = metrics.statsd_port,
        "Reporting metrics to statsd"
    );
    Ok(())
}
