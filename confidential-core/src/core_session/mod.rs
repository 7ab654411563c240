//! Session messaging
//!
//! Ordered point-to-point sessions between two parties, the versioned
//! envelope their payloads travel in, and the substrate that opens them.

pub mod envelope;
pub mod network;
pub mod session;

pub use envelope::{Envelope, SessionId};
pub use network::{FlowKind, InMemoryNetwork, InboundSession, Messaging, NetworkHandle};
pub use session::{Session, SessionSettings};

use crate::core_identity::PartyName;
use std::time::Duration;
use thiserror::Error;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session with {party} closed")]
    Closed { party: PartyName },

    #[error("No message from {party} within {after:?}")]
    Timeout { party: PartyName, after: Duration },

    #[error("Party {0} is not reachable")]
    UnknownParty(PartyName),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Envelope version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    #[error("Frame for session {actual} arrived on session {expected}")]
    WrongSession { expected: SessionId, actual: SessionId },
}

impl From<bincode::Error> for SessionError {
    fn from(e: bincode::Error) -> Self {
        SessionError::Codec(e.to_string())
    }
}
