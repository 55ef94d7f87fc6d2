//! The Cluster Node Set (§4.4): registry and fan-out surface over the
//! configured Secondary Sessions.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use crate::session::{ConnectionState, SecondarySession};
use crate::status::{secondary_status, SecondaryStatus};
use crate::time::TimeBase;
use crate::wire::SecondaryMode;

type SharedSession = Arc<Mutex<SecondarySession>>;

/// Owns the collection of Secondary Sessions and all cluster-wide
/// broadcast operations. Fan-out never waits on a single slow Session
/// (§5): each broadcast spawns one task per Session.
pub struct ClusterNodeSet {
    sessions: RwLock<Vec<SharedSession>>,
    time_base: Arc<TimeBase>,
}

impl ClusterNodeSet {
    pub fn new(time_base: Arc<TimeBase>) -> Self {
        Self {
            sessions: RwLock::new(Vec::new()),
            time_base,
        }
    }

    /// `addSecondary` (§4.4): appends and partitions implicitly — split-
    /// capable / record-events membership is read directly off each
    /// Session's own configuration rather than duplicated into side lists.
    pub fn add_secondary(&self, session: SecondarySession) -> SharedSession {
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().push(shared.clone());
        shared
    }

    pub fn sessions(&self) -> Vec<SharedSession> {
        self.sessions.read().clone()
    }

    async fn split_capable(&self) -> Vec<SharedSession> {
        let mut out = Vec::new();
        for s in self.sessions() {
            let is_split_capable = s.lock().await.config.mode != SecondaryMode::Mirror;
            if is_split_capable {
                out.push(s);
            }
        }
        out
    }

    async fn record_events_capable(&self) -> Vec<SharedSession> {
        let mut out = Vec::new();
        for s in self.sessions() {
            let opted_in = s.lock().await.config.record_events();
            if opted_in {
                out.push(s);
            }
        }
        out
    }

    /// `emit(evt, data)`: broadcast to all Sessions in parallel tasks.
    pub async fn emit(&self, event: &'static str, data: Value) {
        fan_out(self.sessions(), self.time_base.clone(), event, data).await;
    }

    /// `emitToSplits(evt, data)`: broadcast over split-capable Sessions.
    pub async fn emit_to_splits(&self, event: &'static str, data: Value) {
        fan_out(self.split_capable().await, self.time_base.clone(), event, data).await;
    }

    /// `emitEventTrigger(data)`: `cluster_event_trigger` to record-events
    /// Sessions only.
    pub async fn emit_event_trigger(&self, data: Value) {
        let targets = self.record_events_capable().await;
        if targets.is_empty() {
            return;
        }
        let mut handles = Vec::with_capacity(targets.len());
        for session in targets {
            let data = data.clone();
            handles.push(tokio::spawn(async move {
                session.lock().await.emit_event_trigger(data).await;
            }));
        }
        for h in handles {
            let _ = h.await;
        }
    }

    /// `retrySecondary(id)`: revives a Stopped Session; logs and ignores
    /// otherwise.
    pub async fn retry_secondary(&self, id: usize) -> bool {
        let sessions = self.sessions();
        for session in sessions {
            let mut guard = session.lock().await;
            if guard.id == id {
                if guard.runtime.state != ConnectionState::Stopped {
                    warn!(secondary = id, "retry ignored: session not stopped or unknown");
                    return false;
                }
                let now = self.time_base.now_secs();
                return guard.retry(now).await;
            }
        }
        warn!(secondary = id, "retry ignored: unknown secondary id");
        false
    }

    /// `shutdown()`: clears `runningFlag` on all Sessions.
    pub async fn shutdown(&self) {
        for session in self.sessions() {
            session.lock().await.shutdown().await;
        }
    }

    /// `getClusterStatusInfo()` (§6).
    pub async fn cluster_status_info(&self) -> Vec<SecondaryStatus> {
        let now = self.time_base.now_secs();
        let mut out = Vec::new();
        for session in self.sessions() {
            let guard = session.lock().await;
            out.push(secondary_status(&guard, now));
        }
        out
    }

    /// `doClusterRaceStart()` (§4.4).
    pub async fn do_cluster_race_start(&self) {
        for session in self.sessions() {
            session.lock().await.apply_race_start();
        }
    }

    /// `doClusterRaceStop()` (§4.4): log per-session final status.
    pub async fn do_cluster_race_stop(&self) {
        for session in self.sessions() {
            session.lock().await.log_race_stop_status();
        }
    }
}

async fn fan_out(targets: Vec<SharedSession>, time_base: Arc<TimeBase>, event: &'static str, data: Value) {
    let mut handles = Vec::with_capacity(targets.len());
    for session in targets {
        let data = data.clone();
        let time_base = time_base.clone();
        handles.push(tokio::spawn(async move {
            let now = time_base.now_secs();
            session.lock().await.emit_broadcast(now, event, data).await;
        }));
    }
    // Fan-out never awaits results back into cluster-level control flow
    // (§5/§7); we still join here so callers that `.await` this function
    // see all sends dispatched before returning, without any one Session
    // blocking another (each runs its own task).
    for h in handles {
        let _ = h.await;
    }
}
