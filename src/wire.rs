//! JSON message shapes exchanged with a secondary (§6 of the coordination
//! spec). Outbound and inbound messages are framed as newline-delimited JSON
//! objects of the shape `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A role a secondary can be configured to run as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecondaryMode {
    Split,
    Mirror,
    Action,
}

impl SecondaryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Split => "split",
            Self::Mirror => "mirror",
            Self::Action => "action",
        }
    }

    /// Single-letter indicator used in the cluster status projection.
    pub fn indicator(&self) -> &'static str {
        match self {
            Self::Split => "S",
            Self::Mirror => "M",
            Self::Action => "A",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinClusterEx {
    pub mode: SecondaryMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageRace {}

#[derive(Debug, Clone, Serialize)]
pub struct SetFrequency {
    pub node: u32,
    pub frequency: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckSecondaryQuery {
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterMessageAck {
    #[serde(rename = "messageType")]
    pub message_type: String,
    #[serde(rename = "messagePayload", skip_serializing_if = "Option::is_none")]
    pub message_payload: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterEventTrigger {
    pub evt_name: String,
    /// JSON-encoded event args; always a string so non-serialisable values
    /// can be substituted with a sentinel without breaking the envelope.
    pub evt_args: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PassRecord {
    pub node: u32,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckSecondaryResponse {
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinClusterResponse {
    pub server_info: String,
}

/// Decoded `server_info` JSON carried by `join_cluster_response`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub prog_start_epoch: Option<f64>,
    pub release_version: Option<String>,
}

/// Envelope every outbound frame is wrapped in on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame {
    pub event: &'static str,
    pub data: Value,
}

impl OutboundFrame {
    pub fn new(event: &'static str, data: impl Serialize) -> serde_json::Result<Self> {
        Ok(Self {
            event,
            data: serde_json::to_value(data)?,
        })
    }
}

/// Events a secondary can send us, decoded off the inbound envelope.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    PassRecord(PassRecord),
    CheckSecondaryResponse(CheckSecondaryResponse),
    JoinClusterResponse(JoinClusterResponse),
    Unknown { event: String, data: Value },
}

/// Raw `{"event": ..., "data": ...}` envelope as received off the socket.
#[derive(Debug, Clone, Deserialize)]
struct InboundFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Decodes one line of inbound JSON into a typed event.
pub fn decode_inbound(line: &str) -> Result<InboundEvent, serde_json::Error> {
    let frame: InboundFrame = serde_json::from_str(line)?;
    Ok(match frame.event.as_str() {
        "pass_record" => InboundEvent::PassRecord(serde_json::from_value(frame.data)?),
        "check_secondary_response" => {
            InboundEvent::CheckSecondaryResponse(serde_json::from_value(frame.data)?)
        }
        "join_cluster_response" => {
            InboundEvent::JoinClusterResponse(serde_json::from_value(frame.data)?)
        }
        other => InboundEvent::Unknown {
            event: other.to_string(),
            data: frame.data,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pass_record() {
        let line = r#"{"event":"pass_record","data":{"node":2,"timestamp":1234}}"#;
        match decode_inbound(line).unwrap() {
            InboundEvent::PassRecord(p) => {
                assert_eq!(p.node, 2);
                assert_eq!(p.timestamp, 1234);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decodes_unknown_event_without_failing() {
        let line = r#"{"event":"something_else","data":{"x":1}}"#;
        match decode_inbound(line).unwrap() {
            InboundEvent::Unknown { event, .. } => assert_eq!(event, "something_else"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn mode_indicator_matches_role() {
        assert_eq!(SecondaryMode::Split.indicator(), "S");
        assert_eq!(SecondaryMode::Mirror.indicator(), "M");
        assert_eq!(SecondaryMode::Action.indicator(), "A");
    }
}
