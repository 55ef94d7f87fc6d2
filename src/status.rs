//! The read-only cluster status projection (§6) consumed by UI/telemetry.

use serde::Serialize;

use crate::session::{ConnectionState, SecondarySession};

/// One row of the cluster status projection.
#[derive(Debug, Clone, Serialize)]
pub struct SecondaryStatus {
    pub address: String,
    pub mode_indicator: &'static str,
    pub min_latency_ms: i64,
    pub avg_latency_ms: i64,
    pub max_latency_ms: i64,
    pub last_latency_ms: i64,
    pub num_disconnects: u64,
    pub num_contacts: u64,
    pub time_diff_ms: i64,
    pub up_time_secs: f64,
    pub down_time_secs: f64,
    /// Percentage, rounded to one decimal place.
    pub availability: f64,
    pub last_contact: LastContact,
}

/// `last_contact` is one of four distinct shapes depending on connection
/// history, per §6 — never a single ambiguous "seconds or text" string.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum LastContact {
    SecondsAgo(i64),
    ConnectionLost,
    NeverConnected,
    StoppedRetryable { secondary_id: usize },
}

pub fn secondary_status(session: &SecondarySession, now: f64) -> SecondaryStatus {
    let rt = &session.runtime;

    // The current episode (connected since first_contact_time, or down
    // since start_connect_time) hasn't been folded into the cumulative
    // totals yet — those only grow on_disconnect. Add it in here the same
    // way the original ClusterNodeSet.py's getClusterStatusInfo does,
    // rather than reporting a row that only reflects completed episodes.
    let episode_up_secs = if rt.is_connected() {
        (now - rt.first_contact_time).max(0.0)
    } else {
        0.0
    };
    let episode_down_secs = if !rt.is_connected() && rt.state != ConnectionState::Stopped {
        (now - rt.start_connect_time).max(0.0)
    } else {
        0.0
    };

    let up_time_secs = rt.total_up_time_secs + episode_up_secs;
    let down_time_secs = rt.total_down_time_secs + episode_down_secs;

    let total_time = up_time_secs + down_time_secs;
    let availability = if total_time > 0.0 {
        ((up_time_secs / total_time) * 1000.0).round() / 10.0
    } else {
        0.0
    };

    let last_contact = match rt.state {
        ConnectionState::Connected => LastContact::SecondsAgo((now - rt.last_contact_time).max(0.0) as i64),
        ConnectionState::Stopped => LastContact::StoppedRetryable { secondary_id: session.id },
        ConnectionState::Disconnected if rt.has_ever_connected() => LastContact::ConnectionLost,
        _ => LastContact::NeverConnected,
    };

    SecondaryStatus {
        address: session.config.address.clone(),
        mode_indicator: session.config.mode.indicator(),
        min_latency_ms: rt.latency.min(),
        avg_latency_ms: rt.latency.int_avg(),
        max_latency_ms: rt.latency.max(),
        last_latency_ms: rt.latency.last(),
        num_disconnects: rt.num_disconnects,
        num_contacts: rt.num_contacts,
        time_diff_ms: rt.time_diff_median_ms,
        up_time_secs,
        down_time_secs,
        availability,
        last_contact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::collaborators::{
        ActiveLap, CollaboratorError, EventBus, LapSplit, NewLapSplit, RaceContext, RaceData,
        RaceStatus, UiEmitter,
    };
    use crate::config::SecondaryConfig;
    use crate::time::TimeBase;
    use crate::transport::fake::FakeTransport;
    use crate::wire::SecondaryMode;

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
            vec![]
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
            vec![]
        }
        fn lap_splits(&self, _node: u32, _lap_id: u32) -> Vec<LapSplit> {
            vec![]
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

    fn make_cfg() -> SecondaryConfig {
        SecondaryConfig {
            address: "http://x".into(),
            mode: SecondaryMode::Split,
            record_events_flag: Some(false),
            query_interval: 10,
            timeout: 300,
            distance: 0.0,
            min_repeat_secs: 10,
            event: None,
            effect: None,
            text: None,
            tone_duration: 0,
            tone_frequency: 0,
            tone_volume: 100,
            tone_type: "square".into(),
        }
    }

    #[test]
    fn availability_is_zero_with_no_history() {
        let tb = Arc::new(TimeBase::new());
        let session = SecondarySession::new(
            0,
            make_cfg(),
            tb,
            Arc::new(NullRaceContext),
            Arc::new(NullRaceData),
            Arc::new(NullUi),
            Arc::new(NullEventBus),
            Box::new(FakeTransport::new()),
        );
        let status = secondary_status(&session, 0.0);
        assert_eq!(status.availability, 0.0);
    }

    /// A secondary connected since startup with zero completed episodes
    /// must still report nonzero up time and availability — not wait for
    /// a disconnect to fold anything into the cumulative totals.
    #[test]
    fn in_progress_connected_episode_counts_toward_availability() {
        let tb = Arc::new(TimeBase::new());
        let mut session = SecondarySession::new(
            0,
            make_cfg(),
            tb,
            Arc::new(NullRaceContext),
            Arc::new(NullRaceData),
            Arc::new(NullUi),
            Arc::new(NullEventBus),
            Box::new(FakeTransport::new()),
        );
        session.runtime.state = ConnectionState::Connected;
        session.runtime.first_contact_time = 0.0;
        session.runtime.last_contact_time = 0.0;

        let status = secondary_status(&session, 10.0);
        assert_eq!(status.up_time_secs, 10.0);
        assert_eq!(status.down_time_secs, 0.0);
        assert_eq!(status.availability, 100.0);
    }

    /// A secondary that has never connected is down, not "up 0 / down 0".
    #[test]
    fn in_progress_down_episode_counts_toward_availability() {
        let tb = Arc::new(TimeBase::new());
        let session = SecondarySession::new(
            0,
            make_cfg(),
            tb,
            Arc::new(NullRaceContext),
            Arc::new(NullRaceData),
            Arc::new(NullUi),
            Arc::new(NullEventBus),
            Box::new(FakeTransport::new()),
        );
        // start_connect_time defaults to the construction time (0.0 here
        // since the fake TimeBase anchors at its own creation instant).
        let status = secondary_status(&session, 5.0);
        assert!(status.down_time_secs > 0.0);
        assert_eq!(status.availability, 0.0);
    }
}
