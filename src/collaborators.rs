//! Narrow interfaces to the external collaborators named in §6: the race
//! database/state registry, the UI event emitter, the language service, and
//! the parent event bus. The Session only ever sees these traits, never the
//! primary's concrete types — this is what keeps the engine testable.

use serde_json::Value;

use crate::error::CollaboratorError;

/// Race lifecycle status, as observed by the cluster coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceStatus {
    Ready,
    Staging,
    Racing,
}

impl RaceStatus {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Staging | Self::Racing)
    }
}

/// One already-recorded lap crossing.
#[derive(Debug, Clone, Copy)]
pub struct ActiveLap {
    pub lap_time_stamp: i64,
}

/// One already-recorded split within a lap.
#[derive(Debug, Clone, Copy)]
pub struct LapSplit {
    pub id: u32,
    pub split_time_stamp: i64,
}

/// A split about to be persisted by `addLapSplit`.
#[derive(Debug, Clone)]
pub struct NewLapSplit {
    pub pilot_id: i64,
    pub node: u32,
    pub lap_id: u32,
    pub split_id: u32,
    pub split_timestamp: i64,
    pub split_time: i64,
    pub split_speed: Option<f64>,
}

/// Read-mostly view over the primary's race context (§6, "Race context").
pub trait RaceContext: Send + Sync {
    fn status(&self) -> RaceStatus;
    fn start_time_epoch_ms(&self) -> i64;
    fn current_heat(&self) -> i64;
    /// `node -> frequency`, sourced from the active race profile. Empty
    /// when no profile is loaded.
    fn frequencies(&self) -> Vec<(u32, u32)>;
}

/// Read/write access to race data (§6, "Race data").
pub trait RaceData: Send + Sync {
    /// `getPilot(id)`: pilot display name/callsign, or `None` if `id`
    /// doesn't resolve to a known pilot.
    fn get_pilot(&self, id: i64) -> Option<String>;
    /// `getOption(key)`: a named race-server option (e.g. `"timeFormat"`),
    /// or `None` if unset.
    fn get_option(&self, key: &str) -> Option<String>;
    fn pilot_from_heat_node(&self, heat: i64, node: u32) -> Option<i64>;
    fn active_laps(&self, node: u32) -> Vec<ActiveLap>;
    fn lap_splits(&self, node: u32, lap_id: u32) -> Vec<LapSplit>;
    fn add_lap_split(&self, record: NewLapSplit) -> Result<(), CollaboratorError>;
}

/// UI notification surface (§6, "UI").
pub trait UiEmitter: Send + Sync {
    fn emit_cluster_connect_change(&self, secondary_id: usize, connected: bool);
    fn emit_split_pass_info(&self, pilot_id: i64, split_id: u32, split_time: i64);
    fn emit_play_beep_tone(&self, duration_ms: u32, frequency: u32, volume: u32, tone_type: &str);
}

/// Wildcard event-name sentinel passed to `EventBus::on` by a subscriber
/// that wants every event, not just one by name.
pub const ALL: &str = "*";

/// The parent event bus (§6, "Event bus"): `on(ALL, scope, handler,
/// priority, unique)`, `trigger(name, args)`. The Session only ever calls
/// `trigger`; the Event Repeater glue (§4.5) is the one subscriber, via
/// `on`, registered once at startup with `crate::repeater::register`.
pub trait EventBus: Send + Sync {
    fn trigger(&self, event_name: &str, args: Value);

    /// Registers `handler` for `event_name` (or every event, if `event_name
    /// == ALL`), within `scope`, at dispatch `priority` (lower runs first).
    /// `unique` asks the bus to skip registering a duplicate handler
    /// already present under the same `scope`.
    fn on(
        &self,
        event_name: &str,
        scope: &str,
        handler: Box<dyn Fn(&str, Value) + Send + Sync>,
        priority: i32,
        unique: bool,
    );
}

/// Localisation (§6, "Language"). `translate` returns the key itself when
/// no translation is registered, same as a missing-key fallback would.
pub trait Language: Send + Sync {
    fn translate(&self, key: &str) -> String;
}
