//! Event Repeater glue (§4.5): republishes local event-bus traffic to every
//! Secondary Session that opted in via `recordEvents`.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cluster::ClusterNodeSet;
use crate::collaborators::{EventBus, ALL};

/// Scope name the repeater registers its wildcard subscription under.
pub const SCOPE: &str = "cluster_repeater";
/// Dispatch priority for the repeater's subscription; low, so the repeater
/// observes events after any handler that might still reject or rewrite one.
pub const PRIORITY: i32 = 100;

/// Serialises an event's args, falling back to a sentinel string for
/// anything that cannot be represented as JSON, so the repeater can never
/// fail the event bus dispatch on a bad payload (§9 Design Notes).
pub fn safe_serialize(args: &impl Serialize) -> String {
    serde_json::to_string(args).unwrap_or_else(|_| "\"<unserializable>\"".to_string())
}

/// Invoked by the wildcard event-bus subscription for every event raised on
/// the primary. Only fans out when at least one Session has opted in.
pub async fn on_event(cluster: &Arc<ClusterNodeSet>, evt_name: &str, evt_args: &impl Serialize) {
    let payload: Value = serde_json::json!({
        "evt_name": evt_name,
        "evt_args": safe_serialize(evt_args),
    });
    debug!(evt_name, "repeater fan-out");
    cluster.emit_event_trigger(payload).await;
}

/// Subscribes `on_event` to every event on `bus`, once, at startup (§4.5:
/// "subscribes once to the local event bus with a wildcard subscription at
/// a defined priority"). The handler itself runs synchronously from the
/// bus's dispatch call, so it spawns the actual fan-out rather than
/// blocking the event trigger on every Session's send.
pub fn register(bus: &dyn EventBus, cluster: Arc<ClusterNodeSet>) {
    let handler: Box<dyn Fn(&str, Value) + Send + Sync> = Box::new(move |evt_name, evt_args| {
        let cluster = cluster.clone();
        let evt_name = evt_name.to_string();
        tokio::spawn(async move {
            on_event(&cluster, &evt_name, &evt_args).await;
        });
    });
    bus.on(ALL, SCOPE, handler, PRIORITY, true);
}
