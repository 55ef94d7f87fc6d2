//! Cluster topology and runtime configuration (§6 "Configuration knobs",
//! expanded in SPEC_FULL.md §10). Topology loads from a TOML file; a
//! handful of scalar runtime knobs load from the environment, following
//! this codebase's existing `Config::from_env` convention.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::wire::SecondaryMode;

fn default_mode() -> SecondaryMode {
    SecondaryMode::Split
}

fn default_query_interval() -> u64 {
    10
}

fn default_timeout() -> u64 {
    300
}

fn default_distance() -> f64 {
    0.0
}

fn default_min_repeat_secs() -> u64 {
    10
}

fn default_tone_volume() -> u32 {
    100
}

fn default_tone_type() -> String {
    "square".to_string()
}

/// One secondary's configuration, as loaded from the cluster topology file.
#[derive(Debug, Clone, Deserialize)]
pub struct SecondaryConfig {
    pub address: String,
    #[serde(default = "default_mode")]
    pub mode: SecondaryMode,
    /// Defaults to `mode == Mirror` when absent; resolved in `normalize`.
    #[serde(default, rename = "recEventsFlag")]
    pub record_events_flag: Option<bool>,
    #[serde(default = "default_query_interval")]
    pub query_interval: u64,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_distance")]
    pub distance: f64,
    #[serde(default = "default_min_repeat_secs")]
    pub min_repeat_secs: u64,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub effect: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tone_duration: u32,
    #[serde(default)]
    pub tone_frequency: u32,
    #[serde(default = "default_tone_volume")]
    pub tone_volume: u32,
    #[serde(default = "default_tone_type")]
    pub tone_type: String,
}

impl SecondaryConfig {
    /// Applies the boundary coercions and role-dependent defaults from §3/§6:
    /// `queryInterval <= 0` coerces to 10; `recordEvents` defaults to
    /// `mode == mirror`; `event` defaults to a synthesised per-id name.
    pub fn normalize(mut self, id: usize) -> Self {
        if self.query_interval == 0 {
            self.query_interval = default_query_interval();
        }
        if self.record_events_flag.is_none() {
            self.record_events_flag = Some(self.mode == SecondaryMode::Mirror);
        }
        if self.event.is_none() {
            self.event = Some(format!("SecondaryActionTimer_{}", id + 1));
        }
        if !self.address.contains("://") {
            self.address = format!("http://{}", self.address);
        }
        self
    }

    pub fn record_events(&self) -> bool {
        self.record_events_flag.unwrap_or(self.mode == SecondaryMode::Mirror)
    }

    /// `firstQueryInterval = min(3, queryInterval)`, exactly.
    pub fn first_query_interval(&self) -> u64 {
        self.query_interval.min(3)
    }
}

/// Cluster topology: the ordered list of configured secondaries.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    #[serde(default, rename = "secondary")]
    pub secondaries: Vec<SecondaryConfig>,
}

impl ClusterConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading cluster config {}", path.display()))?;
        let mut cfg: ClusterConfig =
            toml::from_str(&raw).with_context(|| format!("parsing cluster config {}", path.display()))?;
        cfg.secondaries = cfg
            .secondaries
            .into_iter()
            .enumerate()
            .map(|(id, s)| s.normalize(id))
            .collect();
        Ok(cfg)
    }
}

/// Process-wide runtime knobs sourced from the environment, mirroring
/// this codebase's `Config::from_env` pattern.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub log_filter: String,
    pub cluster_config_path: String,
    pub worker_tick_secs: f64,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        load_env();

        let log_filter = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "clusternode_coordinator=debug".to_string());

        let cluster_config_path = std::env::var("CLUSTER_CONFIG_PATH")
            .unwrap_or_else(|_| "cluster.toml".to_string());

        let worker_tick_secs = std::env::var("CLUSTER_WORKER_TICK_SECS")
            .unwrap_or_else(|_| "1.0".to_string())
            .parse()
            .unwrap_or(1.0);

        Self {
            log_filter,
            cluster_config_path,
            worker_tick_secs,
        }
    }
}

/// Loads `.env` from the working directory and, as a fallback, from
/// `CARGO_MANIFEST_DIR` — useful when running via `cargo run --manifest-path`
/// from elsewhere.
fn load_env() {
    let _ = dotenv::dotenv();

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    for candidate in [manifest_dir.join(".env"), manifest_dir.join("../.env")] {
        if candidate.exists() {
            let _ = dotenv::from_path(&candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_query_interval_coerces_to_ten() {
        let toml = r#"
            address = "10.0.0.5:8080"
            query_interval = 0
        "#;
        let cfg: SecondaryConfig = toml::from_str(toml).unwrap();
        let cfg = cfg.normalize(0);
        assert_eq!(cfg.query_interval, 10);
        assert_eq!(cfg.first_query_interval(), 3);
    }

    #[test]
    fn mirror_defaults_record_events_true() {
        let toml = r#"
            address = "10.0.0.5:8080"
            mode = "mirror"
        "#;
        let cfg: SecondaryConfig = toml::from_str(toml).unwrap();
        let cfg = cfg.normalize(0);
        assert!(cfg.record_events());
    }

    #[test]
    fn action_event_name_synthesised_from_id() {
        let toml = r#"
            address = "10.0.0.5:8080"
            mode = "action"
        "#;
        let cfg: SecondaryConfig = toml::from_str(toml).unwrap();
        let cfg = cfg.normalize(3);
        assert_eq!(cfg.event.as_deref(), Some("SecondaryActionTimer_4"));
    }

    #[test]
    fn address_gets_default_scheme() {
        let toml = r#"address = "10.0.0.5:8080""#;
        let cfg: SecondaryConfig = toml::from_str(toml).unwrap();
        let cfg = cfg.normalize(0);
        assert_eq!(cfg.address, "http://10.0.0.5:8080");
    }

    #[test]
    fn first_query_interval_never_exceeds_three() {
        let toml = r#"address = "x"
            query_interval = 20"#;
        let cfg: SecondaryConfig = toml::from_str(toml).unwrap();
        let cfg = cfg.normalize(0);
        assert_eq!(cfg.first_query_interval(), 3);
    }
}
