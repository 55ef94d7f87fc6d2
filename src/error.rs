//! Narrow, expected-failure error kinds for the collaborator interfaces.
//!
//! Anything outside of this set (transport setup, config parsing, channel
//! teardown) travels as `anyhow::Error` with `.context(...)` at the call
//! site, same as the rest of this codebase. `CollaboratorError` covers only
//! the lookups a Session is expected to fail sometimes and must swallow.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// No pilot assigned to this heat/node.
    PilotNotFound { heat: i64, node: u32 },
    /// No active lap for this node yet.
    NoActiveLap { node: u32 },
    /// A race-state read came back in a shape the session didn't expect.
    MalformedPayload { reason: String },
    /// The race is not currently in a state that accepts this message.
    RaceNotRacing,
}

impl fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PilotNotFound { heat, node } => {
                write!(f, "no pilot assigned for heat {heat} node {node}")
            }
            Self::NoActiveLap { node } => write!(f, "no active lap yet for node {node}"),
            Self::MalformedPayload { reason } => write!(f, "malformed payload: {reason}"),
            Self::RaceNotRacing => write!(f, "race is not in RACING state"),
        }
    }
}

impl std::error::Error for CollaboratorError {}
