//! Cluster coordinator entry point: loads the cluster topology, constructs
//! one Secondary Session per configured secondary, and drives each on its
//! own worker task.

mod collaborators_stub;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clusternode_coordinator::cluster::ClusterNodeSet;
use clusternode_coordinator::config::{ClusterConfig, RuntimeConfig};
use clusternode_coordinator::repeater;
use clusternode_coordinator::session::SecondarySession;
use clusternode_coordinator::time::TimeBase;
use clusternode_coordinator::transport::WebSocketTransport;
use clusternode_coordinator::worker;

use collaborators_stub::{NoopEventBus, NoopRaceContext, NoopRaceData, NoopUi};

#[derive(Parser, Debug)]
#[command(name = "clusternode", about = "Cluster coordinator for secondary race timers")]
struct Cli {
    /// Path to the cluster topology TOML file.
    #[arg(long)]
    config: Option<String>,

    /// Overrides RUST_LOG for this run.
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime_config = RuntimeConfig::from_env();
    init_tracing(cli.log_filter.as_deref().unwrap_or(&runtime_config.log_filter));

    info!("cluster coordinator starting");

    let config_path = cli.config.unwrap_or(runtime_config.cluster_config_path.clone());
    let cluster_config = ClusterConfig::load(Path::new(&config_path))
        .with_context(|| format!("loading cluster config from {config_path}"))?;

    if cluster_config.secondaries.is_empty() {
        warn!("no secondaries configured; coordinator has nothing to do");
    }

    let time_base = Arc::new(TimeBase::new());
    let cluster = Arc::new(ClusterNodeSet::new(time_base.clone()));

    // Collaborator wiring is out of scope for this engine (§1) beyond the
    // narrow interfaces it calls through; these no-op stand-ins let the
    // binary start up and run standalone.
    let race_ctx: Arc<dyn clusternode_coordinator::collaborators::RaceContext> = Arc::new(NoopRaceContext);
    let race_data: Arc<dyn clusternode_coordinator::collaborators::RaceData> = Arc::new(NoopRaceData);
    let ui: Arc<dyn clusternode_coordinator::collaborators::UiEmitter> = Arc::new(NoopUi);
    let event_bus: Arc<dyn clusternode_coordinator::collaborators::EventBus> = Arc::new(NoopEventBus);

    // Event Repeater glue (§4.5): one wildcard subscription, registered once.
    repeater::register(event_bus.as_ref(), cluster.clone());

    for (id, secondary_config) in cluster_config.secondaries.into_iter().enumerate() {
        let transport = Box::new(WebSocketTransport::new(secondary_config.address.clone()));
        let session = SecondarySession::new(
            id,
            secondary_config,
            time_base.clone(),
            race_ctx.clone(),
            race_data.clone(),
            ui.clone(),
            event_bus.clone(),
            transport,
        );
        let shared = cluster.add_secondary(session);
        let tick_secs = runtime_config.worker_tick_secs;
        tokio::spawn(async move {
            worker::run(shared, tick_secs).await;
        });
    }

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received");
    cluster.shutdown().await;

    Ok(())
}

fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
