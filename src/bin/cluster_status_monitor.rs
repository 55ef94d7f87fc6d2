//! Standalone operator tool: loads the same cluster topology as the
//! coordinator and logs the cluster status projection (§6) every few
//! seconds, for watching cluster health without a UI.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clusternode_coordinator::cluster::ClusterNodeSet;
use clusternode_coordinator::collaborators::{
    ActiveLap, CollaboratorError, EventBus, LapSplit, NewLapSplit, RaceContext, RaceData, RaceStatus,
    UiEmitter,
};
use clusternode_coordinator::config::{ClusterConfig, RuntimeConfig};
use clusternode_coordinator::session::SecondarySession;
use clusternode_coordinator::time::TimeBase;
use clusternode_coordinator::transport::WebSocketTransport;
use clusternode_coordinator::worker;

struct NullRaceContext;
impl RaceContext for NullRaceContext {
    fn status(&self) -> RaceStatus {
        RaceStatus::Ready
    }
    fn start_time_epoch_ms(&self) -> i64 {
        0
    }
    fn current_heat(&self) -> i64 {
        0
    }
    fn frequencies(&self) -> Vec<(u32, u32)> {
        Vec::new()
    }
}
struct NullRaceData;
impl RaceData for NullRaceData {
    fn get_pilot(&self, _id: i64) -> Option<String> {
        None
    }
    fn get_option(&self, _key: &str) -> Option<String> {
        None
    }
    fn pilot_from_heat_node(&self, _heat: i64, _node: u32) -> Option<i64> {
        None
    }
    fn active_laps(&self, _node: u32) -> Vec<ActiveLap> {
        Vec::new()
    }
    fn lap_splits(&self, _node: u32, _lap_id: u32) -> Vec<LapSplit> {
        Vec::new()
    }
    fn add_lap_split(&self, _record: NewLapSplit) -> Result<(), CollaboratorError> {
        Ok(())
    }
}
struct NullUi;
impl UiEmitter for NullUi {
    fn emit_cluster_connect_change(&self, _id: usize, _connected: bool) {}
    fn emit_split_pass_info(&self, _pilot_id: i64, _split_id: u32, _split_time: i64) {}
    fn emit_play_beep_tone(&self, _d: u32, _f: u32, _v: u32, _t: &str) {}
}
struct NullEventBus;
impl EventBus for NullEventBus {
    fn trigger(&self, _event_name: &str, _args: serde_json::Value) {}
    fn on(
        &self,
        _event_name: &str,
        _scope: &str,
        _handler: Box<dyn Fn(&str, serde_json::Value) + Send + Sync>,
        _priority: i32,
        _unique: bool,
    ) {
    }
}

#[derive(Parser, Debug)]
#[command(name = "cluster_status_monitor", about = "Watch cluster health without a UI")]
struct Cli {
    #[arg(long)]
    config: Option<String>,
    /// Seconds between status log lines.
    #[arg(long, default_value_t = 5.0)]
    interval_secs: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime_config = RuntimeConfig::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| runtime_config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = cli.config.unwrap_or(runtime_config.cluster_config_path.clone());
    let cluster_config = ClusterConfig::load(Path::new(&config_path))
        .with_context(|| format!("loading cluster config from {config_path}"))?;

    let time_base = Arc::new(TimeBase::new());
    let cluster = Arc::new(ClusterNodeSet::new(time_base.clone()));

    let race_ctx: Arc<dyn RaceContext> = Arc::new(NullRaceContext);
    let race_data: Arc<dyn RaceData> = Arc::new(NullRaceData);
    let ui: Arc<dyn UiEmitter> = Arc::new(NullUi);
    let event_bus: Arc<dyn EventBus> = Arc::new(NullEventBus);

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

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(cli.interval_secs.max(0.5)));
    loop {
        ticker.tick().await;
        for row in cluster.cluster_status_info().await {
            info!(
                address = %row.address,
                mode = row.mode_indicator,
                min_ms = row.min_latency_ms,
                avg_ms = row.avg_latency_ms,
                max_ms = row.max_latency_ms,
                disconnects = row.num_disconnects,
                contacts = row.num_contacts,
                time_diff_ms = row.time_diff_ms,
                availability_pct = row.availability,
                last_contact = ?row.last_contact,
                "secondary status"
            );
        }
    }
}
