use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use host_telemetry::{
    actors::capture::{ActivityProvider, LineActivityProvider},
    config::{AgentConfig, AgentSettings},
    monitors::SysinfoProvider,
    status, storage,
    supervisor::Supervisor,
    util::get_log_level,
};
use tracing::{debug, error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(name = "telemetry-agent", version, about = "Local host telemetry agent")]
struct Args {
    /// Config file (defaults to ~/.config/host-telemetry/agent.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Read activity events from stdin, one `category description` per line
    #[arg(long)]
    events_from_stdin: bool,
}

fn init(verbose: bool) {
    dotenv::dotenv().ok();

    let level = get_log_level().unwrap_or(if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    });

    let filter = filter::Targets::new()
        .with_targets(vec![("host_telemetry", level), ("telemetry_agent", level)])
        .with_default(LevelFilter::WARN);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

/// Log a setup failure and leave it in the error file
async fn report_setup_failure(settings: &AgentSettings, error: &anyhow::Error) {
    error!("{error:#}");
    if let Err(e) = status::write_error(&settings.error_file, error).await {
        warn!(
            "failed to write error file {}: {e}",
            settings.error_file.display()
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = match AgentConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            report_setup_failure(&AgentSettings::default(), &e).await;
            return Err(e);
        }
    };

    let store = match storage::open(&config.storage)
        .await
        .context("no usable storage location")
    {
        Ok(store) => store,
        Err(e) => {
            report_setup_failure(&config.agent, &e).await;
            return Err(e);
        }
    };

    match store.health_check().await {
        Ok(health) if health.healthy => debug!("store ready: {}", health.message),
        Ok(health) => warn!("store reports unhealthy: {}", health.message),
        Err(e) => warn!("store health check failed: {e}"),
    }

    // priming the CPU counters sleeps, keep it off the runtime threads
    let disk_mount = config.collector.disk_mount.clone();
    let metrics = tokio::task::spawn_blocking(move || SysinfoProvider::new(disk_mount)).await?;

    let mut activity: Vec<Box<dyn ActivityProvider>> = Vec::new();
    if args.events_from_stdin {
        activity.push(Box::new(LineActivityProvider::stdin()));
    }

    let started = Supervisor::start(&config, store.clone(), Arc::new(metrics), activity).await;
    let supervisor = match started {
        Ok(supervisor) => supervisor,
        Err(e) => {
            report_setup_failure(&config.agent, &e).await;
            return Err(e);
        }
    };

    supervisor.run().await;

    if let Err(e) = store.close().await {
        warn!("failed to close store: {e}");
    }
    info!("agent stopped");

    Ok(())
}
