//! Versioned session envelope
//!
//! Every payload travels inside an [`Envelope`] naming the protocol version
//! and the session it belongs to. A receiver rejects envelopes for any other
//! session, so a proof can never be accepted on a session that did not issue
//! the matching challenge.

use super::SessionError;
use crate::codec;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Session identifier, shared by both ends of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Envelope wrapping one encoded payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u8,
    pub session_id: SessionId,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Current protocol version
    pub const VERSION: u8 = 1;

    /// Encode `payload` into a wire frame for `session_id`
    pub fn seal<T: Serialize>(session_id: SessionId, payload: &T) -> Result<Vec<u8>, SessionError> {
        let envelope = Envelope {
            version: Self::VERSION,
            session_id,
            payload: codec::encode(payload)?,
        };
        Ok(codec::encode(&envelope)?)
    }

    /// Decode a wire frame received on `session_id`
    pub fn open<T: DeserializeOwned>(session_id: SessionId, frame: &[u8]) -> Result<T, SessionError> {
        let envelope: Envelope = codec::decode(frame)?;

        if envelope.version != Self::VERSION {
            return Err(SessionError::VersionMismatch {
                expected: Self::VERSION,
                actual: envelope.version,
            });
        }

        if envelope.session_id != session_id {
            return Err(SessionError::WrongSession {
                expected: session_id,
                actual: envelope.session_id,
            });
        }

        Ok(codec::decode(&envelope.payload)?)
    }
}
