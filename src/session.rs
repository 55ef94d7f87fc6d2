//! The per-secondary session engine (§4.3): connection state machine,
//! heartbeat/latency/skew tracking, and split/action ingestion.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::collaborators::{EventBus, RaceContext, RaceData, RaceStatus, UiEmitter};
use crate::config::SecondaryConfig;
use crate::error::CollaboratorError;
use crate::stats::{LatencyAverager, RunningMedian};
use crate::time::TimeBase;
use crate::transport::SecondaryTransport;
use crate::wire::{CheckSecondaryResponse, JoinClusterResponse, PassRecord, SecondaryMode, ServerInfo};

/// Forced-disconnect threshold: no heartbeat response within this many
/// seconds of a pending `check_secondary_query`.
pub const FORCED_DISCONNECT_SECS: f64 = 3.9;
/// Skew-correction threshold: |timeDiffMedianMs| above this latches a
/// correction at race-start.
pub const SKEW_CORRECTION_THRESHOLD_MS: i64 = 250;
/// Back-off once a previously-connected Session has been down longer than
/// its own `queryTimeout`.
pub const SLOW_RETRY_SECS: f64 = 30.0;

/// The connection lifecycle, modelled explicitly per the design notes
/// rather than as a `lastContactTime <= 0` sentinel. The sentinel is kept
/// only as a derived boundary view (`SessionRuntime::last_contact_time`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Stopped,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Connected => write!(f, "CONNECTED"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// All runtime (non-configuration) state for one Session (§3).
pub struct SessionRuntime {
    pub state: ConnectionState,
    pub start_connect_time: f64,
    pub first_contact_time: f64,
    /// Monotonic seconds; `<= 0.0` means disconnected (derived boundary view).
    pub last_contact_time: f64,
    pub last_check_query_time: f64,
    pub num_disconnects: u64,
    pub num_disconnects_during_race: u64,
    pub num_contacts: u64,
    pub freqs_sent_flag: bool,
    pub latency: LatencyAverager,
    pub skew: RunningMedian,
    pub time_diff_median_ms: i64,
    pub time_correction_ms: i64,
    pub prog_start_epoch: Option<f64>,
    pub total_up_time_secs: f64,
    pub total_down_time_secs: f64,
    pub action_pass_times: HashMap<u32, f64>,
    pub running_flag: bool,
    warned_empty_skew_once: bool,
}

impl SessionRuntime {
    fn new(now: f64) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            start_connect_time: now,
            first_contact_time: 0.0,
            last_contact_time: -1.0,
            last_check_query_time: 0.0,
            num_disconnects: 0,
            num_disconnects_during_race: 0,
            num_contacts: 0,
            freqs_sent_flag: false,
            latency: LatencyAverager::new(),
            skew: RunningMedian::new(),
            time_diff_median_ms: 0,
            time_correction_ms: 0,
            prog_start_epoch: None,
            total_up_time_secs: 0.0,
            total_down_time_secs: 0.0,
            action_pass_times: HashMap::new(),
            running_flag: true,
            warned_empty_skew_once: false,
        }
    }

    /// `(lastContactTime > 0) <=> Connected` (§8 quantified invariant).
    pub fn is_connected(&self) -> bool {
        debug_assert_eq!(self.last_contact_time > 0.0, self.state == ConnectionState::Connected);
        self.state == ConnectionState::Connected
    }

    pub fn has_ever_connected(&self) -> bool {
        self.num_disconnects > 0 || self.state == ConnectionState::Connected || self.first_contact_time > 0.0
    }
}

/// One configured secondary's live session.
pub struct SecondarySession {
    pub id: usize,
    pub config: SecondaryConfig,
    pub runtime: SessionRuntime,
    time_base: Arc<TimeBase>,
    race_ctx: Arc<dyn RaceContext>,
    race_data: Arc<dyn RaceData>,
    ui: Arc<dyn UiEmitter>,
    event_bus: Arc<dyn EventBus>,
    transport: Box<dyn SecondaryTransport>,
}

impl SecondarySession {
    pub fn new(
        id: usize,
        config: SecondaryConfig,
        time_base: Arc<TimeBase>,
        race_ctx: Arc<dyn RaceContext>,
        race_data: Arc<dyn RaceData>,
        ui: Arc<dyn UiEmitter>,
        event_bus: Arc<dyn EventBus>,
        transport: Box<dyn SecondaryTransport>,
    ) -> Self {
        let now = time_base.now_secs();
        Self {
            id,
            config,
            runtime: SessionRuntime::new(now),
            time_base,
            race_ctx,
            race_data,
            ui,
            event_bus,
            transport,
        }
    }

    pub fn now_secs(&self) -> f64 {
        self.time_base.now_secs()
    }

    /// Pulls the next inbound event off this Session's own transport.
    /// Exclusively owned by this Session's worker (§5).
    pub async fn recv_inbound(&mut self) -> Option<crate::wire::InboundEvent> {
        self.transport.recv().await
    }

    fn is_split(&self) -> bool {
        self.config.mode == SecondaryMode::Split
    }

    fn is_mirror(&self) -> bool {
        self.config.mode == SecondaryMode::Mirror
    }

    fn is_action(&self) -> bool {
        self.config.mode == SecondaryMode::Action
    }

    /// Sends a message whose successful delivery observes liveness
    /// (join_cluster_ex / stage_race / set_frequency): refreshes
    /// `lastContactTime` and `numContacts` on success. Never the path for
    /// acks or the heartbeat query itself (§8: "acks never mutate").
    async fn emit_tracked(&mut self, now: f64, event: &'static str, data: serde_json::Value) {
        match self.transport.emit(event, data).await {
            Ok(()) => {
                self.runtime.last_contact_time = now;
                self.runtime.num_contacts += 1;
            }
            Err(e) => {
                warn!(secondary = self.id, event, error = %e, "emit failed");
                if self.transport.is_connected() {
                    self.force_disconnect(now).await;
                }
            }
        }
    }

    /// Sends a message that must never mutate liveness: acks and the
    /// outbound heartbeat query (whose round trip is what actually proves
    /// liveness, on the response).
    async fn emit_raw(&mut self, event: &'static str, data: serde_json::Value) {
        if let Err(e) = self.transport.emit(event, data).await {
            warn!(secondary = self.id, event, error = %e, "raw emit failed");
        }
    }

    // ---- connection lifecycle -------------------------------------------------

    /// The race-in-progress connect guard (§4.3): never-connected Sessions
    /// suspend connection attempts while the race is staging/racing.
    fn connect_suspended_by_race(&self) -> bool {
        !self.runtime.has_ever_connected() && self.race_ctx.status().is_in_progress()
    }

    pub async fn try_connect(&mut self, now: f64) {
        if self.runtime.state != ConnectionState::Disconnected {
            return;
        }
        if self.connect_suspended_by_race() {
            return;
        }
        let secs_since_disconnect = now - self.runtime.start_connect_time;
        if secs_since_disconnect < 1.0 {
            return;
        }

        let timed_out = !self.runtime.has_ever_connected()
            && now - self.runtime.start_connect_time > self.config.timeout as f64;
        if timed_out {
            self.stop(now).await;
            return;
        }

        if self.runtime.has_ever_connected() {
            let down_for = now - self.runtime.start_connect_time;
            if down_for > self.config.timeout as f64 {
                // slow retry back-off: only attempt roughly every 30s.
                let phase = down_for % SLOW_RETRY_SECS;
                if phase > 1.0 {
                    return;
                }
                debug!(secondary = self.id, "slow-retry reconnect attempt");
            } else {
                debug!(secondary = self.id, "reconnect attempt");
            }
        } else {
            info!(secondary = self.id, address = %self.config.address, "first connect attempt");
        }

        self.runtime.state = ConnectionState::Connecting;
        match self.transport.connect().await {
            Ok(()) => {
                // The remote delivers on_connect asynchronously in the real
                // transport; for transports that connect synchronously we
                // invoke it immediately.
                self.on_connect(now).await;
            }
            Err(e) => {
                warn!(secondary = self.id, error = %e, "connect failed");
                self.runtime.state = ConnectionState::Disconnected;
            }
        }
    }

    pub async fn on_connect(&mut self, now: f64) {
        if self.runtime.state == ConnectionState::Connected {
            // spurious second on_connect: only refresh liveness.
            self.runtime.last_contact_time = now;
            return;
        }

        self.runtime.state = ConnectionState::Connected;
        self.runtime.first_contact_time = now;
        self.runtime.last_contact_time = now;
        self.runtime.freqs_sent_flag = false;

        let mode_payload = json!({ "mode": self.config.mode.as_str() });
        self.emit_tracked(now, "join_cluster_ex", mode_payload).await;

        if !self.is_mirror() && self.race_ctx.status().is_in_progress() {
            self.emit_tracked(now, "stage_race", json!({})).await;
        }

        self.ui.emit_cluster_connect_change(self.id, true);
    }

    pub async fn on_disconnect(&mut self, now: f64) {
        if self.runtime.state != ConnectionState::Connected
            && self.runtime.state != ConnectionState::Connecting
        {
            debug!(secondary = self.id, "duplicate on_disconnect ignored");
            return;
        }

        if self.runtime.first_contact_time > 0.0 {
            let up_interval = now - self.runtime.first_contact_time.max(self.runtime.start_connect_time);
            self.runtime.total_up_time_secs += up_interval.max(0.0);
        }

        self.runtime.last_contact_time = -1.0;
        self.runtime.start_connect_time = now;
        self.runtime.num_disconnects += 1;
        self.runtime.num_disconnects_during_race += 1;
        self.runtime.state = ConnectionState::Disconnected;

        self.ui.emit_cluster_connect_change(self.id, false);
    }

    async fn force_disconnect(&mut self, now: f64) {
        self.transport.disconnect().await;
        self.on_disconnect(now).await;
    }

    async fn stop(&mut self, now: f64) {
        info!(secondary = self.id, "giving up after never connecting; session stopped");
        self.ui.emit_play_beep_tone(200, 440, self.config.tone_volume, "sine");
        self.runtime.state = ConnectionState::Stopped;
        self.runtime.running_flag = false;
        let _ = now;
    }

    /// Restores a Stopped Session's runtime fields (not configuration) and
    /// relaunches it. No-op (logged) if already running or unknown.
    pub async fn retry(&mut self, now: f64) -> bool {
        if self.runtime.state != ConnectionState::Stopped {
            warn!(secondary = self.id, state = %self.runtime.state, "retry ignored: not stopped");
            return false;
        }
        self.runtime = SessionRuntime::new(now);
        info!(secondary = self.id, "session retried");
        true
    }

    pub async fn shutdown(&mut self) {
        self.runtime.running_flag = false;
    }

    /// `doClusterRaceStart` per-Session effect (§4.4): zero the during-race
    /// disconnect counter for every Session, and for connected Sessions
    /// latch `timeCorrectionMs` iff the skew exceeds the threshold.
    pub fn apply_race_start(&mut self) {
        self.runtime.num_disconnects_during_race = 0;
        if self.runtime.is_connected() {
            self.runtime.time_correction_ms = if self.runtime.time_diff_median_ms.abs() > SKEW_CORRECTION_THRESHOLD_MS {
                self.runtime.time_diff_median_ms
            } else {
                0
            };
        }
    }

    pub fn log_race_stop_status(&self) {
        info!(
            secondary = self.id,
            state = %self.runtime.state,
            num_contacts = self.runtime.num_contacts,
            num_disconnects_during_race = self.runtime.num_disconnects_during_race,
            "cluster race stop"
        );
    }

    /// Generic broadcast emit used by the Cluster Node Set's fan-out
    /// (§4.4 `emit`/`emitToSplits`): observes liveness like any other
    /// non-ack outbound message.
    pub async fn emit_broadcast(&mut self, now: f64, event: &'static str, data: serde_json::Value) {
        self.emit_tracked(now, event, data).await;
    }

    /// `cluster_event_trigger` fan-out from the Event Repeater (§4.5):
    /// never observes liveness, matching the ack/heartbeat-query family.
    pub async fn emit_event_trigger(&mut self, data: serde_json::Value) {
        self.emit_raw("cluster_event_trigger", data).await;
    }

    // ---- frequency push ---------------------------------------------------

    pub async fn push_frequencies_if_needed(&mut self, now: f64) {
        if self.is_mirror() || self.runtime.freqs_sent_flag {
            return;
        }
        let freqs = self.race_ctx.frequencies();
        if freqs.is_empty() {
            return;
        }
        self.runtime.freqs_sent_flag = true;
        for (node, frequency) in freqs {
            self.emit_tracked(now, "set_frequency", json!({ "node": node, "frequency": frequency }))
                .await;
            tokio::task::yield_now().await;
        }
    }

    // ---- heartbeat / latency / skew ---------------------------------------

    pub async fn tick(&mut self, now: f64) {
        if !self.runtime.is_connected() {
            self.try_connect(now).await;
            return;
        }

        self.push_frequencies_if_needed(now).await;

        let query_interval = self.config.query_interval as f64;
        let first_query_due = self.runtime.last_check_query_time == 0.0
            && now > self.runtime.last_contact_time + self.config.first_query_interval() as f64;
        let repeat_query_due = now > self.runtime.last_contact_time + query_interval
            && now > self.runtime.last_check_query_time + query_interval;

        if repeat_query_due || first_query_due {
            let epoch_ms = self.time_base.monotonic_to_epoch_ms(now);
            self.runtime.last_check_query_time = now;
            self.emit_raw("check_secondary_query", json!({ "timestamp": epoch_ms })).await;
            return;
        }

        if self.runtime.last_check_query_time > self.runtime.last_contact_time {
            let gap = now - self.runtime.last_check_query_time;
            if gap > FORCED_DISCONNECT_SECS {
                if !self.runtime.skew.is_empty() {
                    self.transport.disconnect().await;
                    if self.transport.is_connected() {
                        self.force_disconnect(now).await;
                    } else {
                        self.on_disconnect(now).await;
                    }
                } else if !self.runtime.warned_empty_skew_once {
                    warn!(secondary = self.id, "no heartbeat response and empty skew window; rebasing to avoid disconnect storm");
                    self.runtime.warned_empty_skew_once = true;
                    self.runtime.last_check_query_time = now;
                    self.runtime.last_contact_time = now;
                } else {
                    self.runtime.last_check_query_time = now;
                    self.runtime.last_contact_time = now;
                }
            }
        }
    }

    pub async fn on_check_secondary_response(&mut self, now: f64, data: CheckSecondaryResponse) {
        if !self.runtime.is_connected() {
            return;
        }
        let transit_time = now - self.runtime.last_check_query_time;
        self.runtime.latency.add((transit_time * 1000.0).round() as i64);

        if let Some(secondary_ts) = data.timestamp {
            let midpoint = self.runtime.last_check_query_time + transit_time / 2.0;
            let local_midpoint_epoch = self.time_base.monotonic_to_epoch_ms(midpoint);
            self.runtime.skew.insert(secondary_ts - local_midpoint_epoch);
            self.runtime.time_diff_median_ms = self.runtime.skew.median();
        }

        self.runtime.last_contact_time = now;
        self.runtime.num_contacts += 1;
    }

    pub async fn on_join_cluster_response(&mut self, now: f64, data: JoinClusterResponse) {
        match serde_json::from_str::<ServerInfo>(&data.server_info) {
            Ok(info) => {
                if let Some(epoch) = info.prog_start_epoch {
                    let restarted = match self.runtime.prog_start_epoch {
                        Some(prev) if (prev - epoch).abs() > f64::EPSILON => true,
                        None => false,
                        _ => false,
                    };
                    if restarted {
                        info!(secondary = self.id, "secondary restarted; resetting skew window");
                        self.runtime.skew.reset();
                    }
                    self.runtime.prog_start_epoch = Some(epoch);
                }
                match info.release_version {
                    Some(v) if v != env!("CARGO_PKG_VERSION") => {
                        warn!(secondary = self.id, remote_version = %v, "secondary release version differs");
                    }
                    None => warn!(secondary = self.id, "secondary did not report a release version"),
                    _ => {}
                }
            }
            Err(e) => {
                let err = CollaboratorError::MalformedPayload { reason: e.to_string() };
                warn!(secondary = self.id, error = %err, "malformed server_info payload");
            }
        }

        self.emit_raw(
            "cluster_message_ack",
            json!({ "messageType": "join_cluster_response" }),
        )
        .await;
        let _ = now;
    }

    // ---- split / action ingestion ------------------------------------------

    pub async fn on_pass_record(&mut self, now: f64, data: PassRecord) {
        self.runtime.last_contact_time = now;
        self.runtime.num_contacts += 1;

        if self.is_action() {
            self.handle_action_pass(now, &data).await;
        } else if self.is_split() {
            self.handle_split_pass(now, &data).await;
        }

        self.emit_raw(
            "cluster_message_ack",
            json!({ "messageType": "pass_record", "messagePayload": { "node": data.node, "timestamp": data.timestamp } }),
        )
        .await;
    }

    async fn handle_split_pass(&mut self, now: f64, data: &PassRecord) {
        let _ = now;
        if self.race_ctx.status() != RaceStatus::Racing {
            debug!(secondary = self.id, error = %CollaboratorError::RaceNotRacing, "split dropped");
            return;
        }

        let heat = self.race_ctx.current_heat();
        let Some(pilot_id) = self.race_data.pilot_from_heat_node(heat, data.node) else {
            let err = CollaboratorError::PilotNotFound { heat, node: data.node };
            debug!(secondary = self.id, error = %err, "split dropped");
            return;
        };

        let split_ts_raw = data.timestamp - self.race_ctx.start_time_epoch_ms();

        let laps = self.race_data.active_laps(data.node);
        let Some(last_lap) = laps.last() else {
            let err = CollaboratorError::NoActiveLap { node: data.node };
            debug!(secondary = self.id, error = %err, "split dropped");
            return;
        };
        let lap_count = laps.len().saturating_sub(1) as u32;
        let split_id = self.id as u32;

        let mut splits = self.race_data.lap_splits(data.node, lap_count);
        splits.sort_by_key(|s| s.id);

        let last_split_ts = match splits.last() {
            None => {
                if split_id > 0 {
                    debug!(secondary = self.id, node = data.node, split_id, "gap: first split for lap has nonzero id");
                }
                last_lap.lap_time_stamp
            }
            Some(last_split) => {
                if split_id > last_split.id {
                    if split_id > last_split.id + 1 {
                        debug!(secondary = self.id, node = data.node, split_id, last_split_id = last_split.id, "gap between splits");
                    }
                    last_split.split_time_stamp
                } else {
                    debug!(secondary = self.id, node = data.node, split_id, last_split_id = last_split.id, "out-of-order split dropped");
                    return;
                }
            }
        };

        let split_ts = split_ts_raw - self.runtime.time_correction_ms;
        let split_time = split_ts - last_split_ts;
        let distance_mm = self.config.distance * 1000.0;
        let split_speed = if distance_mm > 0.0 && split_time > 0 {
            Some(distance_mm / split_time as f64)
        } else {
            None
        };

        let record = crate::collaborators::NewLapSplit {
            pilot_id,
            node: data.node,
            lap_id: lap_count,
            split_id,
            split_timestamp: split_ts,
            split_time,
            split_speed,
        };

        if let Err(e) = self.race_data.add_lap_split(record) {
            warn!(secondary = self.id, error = %e, "failed to persist split");
            return;
        }

        self.ui.emit_split_pass_info(pilot_id, split_id, split_time);
    }

    async fn handle_action_pass(&mut self, now: f64, data: &PassRecord) {
        if self.race_ctx.status() != RaceStatus::Racing {
            debug!(secondary = self.id, error = %CollaboratorError::RaceNotRacing, "action dropped");
            return;
        }
        let heat = self.race_ctx.current_heat();
        let Some(pilot_id) = self.race_data.pilot_from_heat_node(heat, data.node) else {
            let err = CollaboratorError::PilotNotFound { heat, node: data.node };
            debug!(secondary = self.id, error = %err, "action dropped");
            return;
        };

        let last_honoured = self.runtime.action_pass_times.get(&data.node).copied().unwrap_or(f64::NEG_INFINITY);
        if now - last_honoured < self.config.min_repeat_secs as f64 {
            debug!(secondary = self.id, node = data.node, "action debounced");
            return;
        }
        self.runtime.action_pass_times.insert(data.node, now);

        if self.config.tone_duration > 0 && self.config.tone_frequency > 0 && self.config.tone_volume > 0 {
            self.ui.emit_play_beep_tone(
                self.config.tone_duration,
                self.config.tone_frequency,
                self.config.tone_volume,
                &self.config.tone_type,
            );
        }

        match self.config.effect.as_deref() {
            Some(effect) if !effect.is_empty() => {
                let event_name = self.config.event.clone().unwrap_or_default();
                self.event_bus.trigger(&event_name, json!({ "pilot_id": pilot_id, "effect": effect }));
            }
            _ => {
                warn!(secondary = self.id, "action mode has no effect configured");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{ActiveLap, LapSplit, NewLapSplit};
    use crate::transport::fake::FakeTransport;
    use parking_lot::Mutex;

    struct FakeRaceContext {
        status: Mutex<RaceStatus>,
        start_epoch_ms: i64,
    }
    impl RaceContext for FakeRaceContext {
        fn status(&self) -> RaceStatus {
            *self.status.lock()
        }
        fn start_time_epoch_ms(&self) -> i64 {
            self.start_epoch_ms
        }
        fn current_heat(&self) -> i64 {
            1
        }
        fn frequencies(&self) -> Vec<(u32, u32)> {
            vec![]
        }
    }

    struct FakeRaceData {
        pilot: Option<i64>,
        laps: Vec<ActiveLap>,
        splits: Mutex<Vec<LapSplit>>,
        recorded: Mutex<Vec<NewLapSplit>>,
    }
    impl RaceData for FakeRaceData {
        fn get_pilot(&self, _id: i64) -> Option<String> {
            None
        }
        fn get_option(&self, _key: &str) -> Option<String> {
            None
        }
        fn pilot_from_heat_node(&self, _heat: i64, _node: u32) -> Option<i64> {
            self.pilot
        }
        fn active_laps(&self, _node: u32) -> Vec<ActiveLap> {
            self.laps.clone()
        }
        fn lap_splits(&self, _node: u32, _lap_id: u32) -> Vec<LapSplit> {
            self.splits.lock().clone()
        }
        fn add_lap_split(&self, record: NewLapSplit) -> Result<(), CollaboratorError> {
            self.recorded.lock().push(record);
            Ok(())
        }
    }

    struct FakeUi {
        split_pass_calls: Mutex<Vec<(i64, u32, i64)>>,
        connect_changes: Mutex<Vec<bool>>,
    }
    impl UiEmitter for FakeUi {
        fn emit_cluster_connect_change(&self, _id: usize, connected: bool) {
            self.connect_changes.lock().push(connected);
        }
        fn emit_split_pass_info(&self, pilot_id: i64, split_id: u32, split_time: i64) {
            self.split_pass_calls.lock().push((pilot_id, split_id, split_time));
        }
        fn emit_play_beep_tone(&self, _duration_ms: u32, _frequency: u32, _volume: u32, _tone_type: &str) {}
    }

    struct FakeEventBus {
        triggers: Mutex<Vec<(String, serde_json::Value)>>,
    }
    impl EventBus for FakeEventBus {
        fn trigger(&self, event_name: &str, args: serde_json::Value) {
            self.triggers.lock().push((event_name.to_string(), args));
        }
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

    fn make_session(
        mode: SecondaryMode,
        distance: f64,
        race_status: RaceStatus,
        pilot: Option<i64>,
        laps: Vec<ActiveLap>,
        splits: Vec<LapSplit>,
    ) -> (SecondarySession, Arc<FakeUi>, Arc<FakeEventBus>, Arc<FakeRaceData>) {
        let cfg = SecondaryConfig {
            address: "http://x".into(),
            mode,
            record_events_flag: Some(false),
            query_interval: 10,
            timeout: 300,
            distance,
            min_repeat_secs: 10,
            event: Some("evt".into()),
            effect: Some("beep".into()),
            text: None,
            tone_duration: 0,
            tone_frequency: 0,
            tone_volume: 100,
            tone_type: "square".into(),
        };
        let race_ctx = Arc::new(FakeRaceContext {
            status: Mutex::new(race_status),
            start_epoch_ms: 1_000_000_000_000,
        });
        let race_data = Arc::new(FakeRaceData {
            pilot,
            laps,
            splits: Mutex::new(splits),
            recorded: Mutex::new(vec![]),
        });
        let ui = Arc::new(FakeUi {
            split_pass_calls: Mutex::new(vec![]),
            connect_changes: Mutex::new(vec![]),
        });
        let bus = Arc::new(FakeEventBus { triggers: Mutex::new(vec![]) });
        let transport = Box::new(FakeTransport::new());
        let session = SecondarySession::new(
            0,
            cfg,
            Arc::new(TimeBase::new()),
            race_ctx,
            race_data.clone(),
            ui.clone(),
            bus.clone(),
            transport,
        );
        (session, ui, bus, race_data)
    }

    #[tokio::test]
    async fn split_pass_happy_path() {
        let (mut session, ui, _bus, race_data) = make_session(
            SecondaryMode::Split,
            10.0,
            RaceStatus::Racing,
            Some(77),
            vec![ActiveLap { lap_time_stamp: 0 }],
            vec![],
        );
        session.runtime.state = ConnectionState::Connected;
        session.runtime.last_contact_time = 5.0;

        session
            .on_pass_record(5.1, PassRecord { node: 0, timestamp: 1_000_000_003_500 })
            .await;

        let recorded = race_data.recorded.lock();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].split_time, 3500);
        let speed = recorded[0].split_speed.unwrap();
        assert!((speed - 2.857).abs() < 0.01);
        assert_eq!(ui.split_pass_calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn out_of_order_split_is_dropped() {
        let (mut session, _ui, _bus, race_data) = make_session(
            SecondaryMode::Split,
            10.0,
            RaceStatus::Racing,
            Some(77),
            vec![ActiveLap { lap_time_stamp: 0 }],
            vec![LapSplit { id: 0, split_time_stamp: 1000 }],
        );
        session.runtime.state = ConnectionState::Connected;
        session.runtime.last_contact_time = 5.0;

        session
            .on_pass_record(5.1, PassRecord { node: 0, timestamp: 1_000_000_001_500 })
            .await;

        assert!(race_data.recorded.lock().is_empty());
    }

    #[tokio::test]
    async fn clock_skew_correction_applied() {
        let (mut session, _ui, _bus, race_data) = make_session(
            SecondaryMode::Split,
            10.0,
            RaceStatus::Racing,
            Some(77),
            vec![ActiveLap { lap_time_stamp: 0 }],
            vec![],
        );
        session.runtime.skew.insert(400);
        session.runtime.time_correction_ms = 400;
        session.runtime.state = ConnectionState::Connected;
        session.runtime.last_contact_time = 5.0;

        session
            .on_pass_record(5.1, PassRecord { node: 0, timestamp: 1_000_000_002_400 })
            .await;

        let recorded = race_data.recorded.lock();
        assert_eq!(recorded[0].split_time, 2000);
    }

    #[tokio::test]
    async fn action_debounce_fires_once() {
        let (mut session, ui, bus, _race_data) = make_session(
            SecondaryMode::Action,
            0.0,
            RaceStatus::Racing,
            Some(9),
            vec![],
            vec![],
        );
        session.runtime.state = ConnectionState::Connected;

        session.on_pass_record(0.0, PassRecord { node: 0, timestamp: 0 }).await;
        session.on_pass_record(5.0, PassRecord { node: 0, timestamp: 0 }).await;

        assert_eq!(bus.triggers.lock().len(), 1);
        let _ = ui;
    }

    #[tokio::test]
    async fn acks_never_mutate_last_contact_time() {
        let (mut session, _ui, _bus, _race_data) = make_session(
            SecondaryMode::Mirror,
            0.0,
            RaceStatus::Ready,
            None,
            vec![],
            vec![],
        );
        session.runtime.state = ConnectionState::Connected;
        session.runtime.last_contact_time = 10.0;
        let before = session.runtime.last_contact_time;
        session.emit_raw("cluster_message_ack", json!({})).await;
        assert_eq!(session.runtime.last_contact_time, before);
    }

    #[tokio::test]
    async fn retry_resets_runtime_but_keeps_config() {
        let (mut session, _ui, _bus, _race_data) = make_session(
            SecondaryMode::Split,
            10.0,
            RaceStatus::Ready,
            None,
            vec![],
            vec![],
        );
        session.runtime.state = ConnectionState::Stopped;
        session.runtime.num_disconnects = 3;
        session.runtime.running_flag = false;

        let ok = session.retry(100.0).await;
        assert!(ok);
        assert_eq!(session.runtime.num_disconnects, 0);
        assert!(session.runtime.running_flag);
        assert_eq!(session.config.distance, 10.0);
    }
}
