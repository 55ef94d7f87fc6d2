//! No-op collaborator implementations so the binary can run standalone.
//! The race database, UI emitter, and event bus are external to this
//! engine (§1) — a real deployment wires in the primary's actual
//! implementations of these traits instead.

use serde_json::Value;

use clusternode_coordinator::collaborators::{
    ActiveLap, CollaboratorError, EventBus, LapSplit, NewLapSplit, RaceContext, RaceData,
    RaceStatus, UiEmitter,
};

pub struct NoopRaceContext;

impl RaceContext for NoopRaceContext {
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

pub struct NoopRaceData;

impl RaceData for NoopRaceData {
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

pub struct NoopUi;

impl UiEmitter for NoopUi {
    fn emit_cluster_connect_change(&self, _secondary_id: usize, _connected: bool) {}
    fn emit_split_pass_info(&self, _pilot_id: i64, _split_id: u32, _split_time: i64) {}
    fn emit_play_beep_tone(&self, _duration_ms: u32, _frequency: u32, _volume: u32, _tone_type: &str) {}
}

pub struct NoopEventBus;

impl EventBus for NoopEventBus {
    fn trigger(&self, _event_name: &str, _args: Value) {}
    fn on(
        &self,
        _event_name: &str,
        _scope: &str,
        _handler: Box<dyn Fn(&str, Value) + Send + Sync>,
        _priority: i32,
        _unique: bool,
    ) {
    }
}
