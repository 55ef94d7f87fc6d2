//! Drives one Secondary Session's worker task: a `select!` loop between the
//! ~1s tick and the Session's own inbound event stream (§5 Concurrency
//! Model — one cooperative task per Session, sole writer of its state).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::error;

use crate::session::SecondarySession;
use crate::wire::InboundEvent;

/// How long a single inbound-poll attempt holds the Session lock before
/// releasing it and trying again. Bounds the worst case a cluster-level
/// status/retry call can wait behind this worker.
const POLL_SLICE: Duration = Duration::from_millis(50);

/// Runs until `runtime.running_flag` is cleared (by `shutdown()` or by the
/// Session giving up after a first-ever-connect timeout).
///
/// The Session is held behind a `Mutex` rather than owned outright so the
/// Cluster Node Set can still snapshot its status or retry it. The lock is
/// never held across the loop's actual idle wait: the tick branch only
/// locks after a tick fires, and the inbound-event branch polls
/// `recv_inbound` in `POLL_SLICE` chunks, dropping the guard between
/// attempts so a pending status/retry call gets a turn at least that often.
pub async fn run(session: Arc<Mutex<SecondarySession>>, tick_secs: f64) {
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(tick_secs.max(0.05)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        {
            let guard = session.lock().await;
            if !guard.runtime.running_flag {
                break;
            }
        }

        tokio::select! {
            _ = ticker.tick() => {
                let mut guard = session.lock().await;
                let now = guard.now_secs();
                guard.tick(now).await;
            }
            event = poll_inbound(&session) => {
                let mut guard = session.lock().await;
                let now = guard.now_secs();
                match event {
                    Some(InboundEvent::PassRecord(data)) => guard.on_pass_record(now, data).await,
                    Some(InboundEvent::CheckSecondaryResponse(data)) => {
                        guard.on_check_secondary_response(now, data).await
                    }
                    Some(InboundEvent::JoinClusterResponse(data)) => {
                        guard.on_join_cluster_response(now, data).await
                    }
                    Some(InboundEvent::Unknown { event, .. }) => {
                        error!(secondary = guard.id, event, "unrecognised inbound event");
                    }
                    None => {
                        // Transport-side close with no explicit on_disconnect:
                        // treat it the same way, so the worker doesn't spin.
                        guard.on_disconnect(now).await;
                    }
                }
            }
        }
    }
}

/// Waits for the next inbound event without pinning the Session lock for
/// the whole wait: each attempt locks, polls for `POLL_SLICE`, then drops
/// the guard and retries if nothing arrived.
async fn poll_inbound(session: &Mutex<SecondarySession>) -> Option<InboundEvent> {
    loop {
        let mut guard = session.lock().await;
        match tokio::time::timeout(POLL_SLICE, guard.recv_inbound()).await {
            Ok(event) => return event,
            Err(_) => {
                drop(guard);
                continue;
            }
        }
    }
}
