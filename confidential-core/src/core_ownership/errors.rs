//! Error types for key ownership protocols

use crate::core_identity::{KeystoreError, PartyName, PublicKey, RegistryError};
use crate::core_session::SessionError;
use thiserror::Error;

/// Result type for key ownership operations
pub type OwnershipResult<T> = Result<T, OwnershipError>;

/// Errors that abort a protocol run
#[derive(Debug, Error)]
pub enum OwnershipError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Argument(#[from] ArgumentError),

    /// Local collaborator failure (poisoned lock and the like)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Messaging-level failures
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Counterparty {party} unresponsive: {reason}")]
    CounterpartyUnresponsive { party: PartyName, reason: String },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

/// Cryptographic failures
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Signature does not verify against key {key}")]
    InvalidSignature { key: PublicKey },

    #[error("Private key not held for {0}")]
    UnknownKey(PublicKey),
}

/// Policy violations
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Counterparty returned key {actual} but ownership was requested for {expected}")]
    KeyMismatch {
        expected: PublicKey,
        actual: PublicKey,
    },

    #[error("Key {key} already maps to {existing}, refusing to map it to {attempted}")]
    MappingConflict {
        key: PublicKey,
        existing: PartyName,
        attempted: PartyName,
    },
}

/// Caller errors
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl OwnershipError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        ProtocolError::MalformedPayload(msg.into()).into()
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        ArgumentError::InvalidArgument(msg.into()).into()
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            OwnershipError::Protocol(ProtocolError::CounterpartyUnresponsive { .. }) => {
                "counterparty_unresponsive"
            }
            OwnershipError::Protocol(ProtocolError::MalformedPayload(_)) => "malformed_payload",
            OwnershipError::Crypto(CryptoError::InvalidSignature { .. }) => "invalid_signature",
            OwnershipError::Crypto(CryptoError::UnknownKey(_)) => "unknown_key",
            OwnershipError::Policy(PolicyError::KeyMismatch { .. }) => "key_mismatch",
            OwnershipError::Policy(PolicyError::MappingConflict { .. }) => "mapping_conflict",
            OwnershipError::Argument(_) => "invalid_argument",
            OwnershipError::Internal(_) => "internal",
        }
    }
}

impl From<KeystoreError> for OwnershipError {
    fn from(e: KeystoreError) -> Self {
        match e {
            KeystoreError::UnknownKey(key) => CryptoError::UnknownKey(key).into(),
            KeystoreError::Other(msg) => OwnershipError::Internal(msg),
        }
    }
}

impl From<RegistryError> for OwnershipError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::MappingConflict {
                key,
                existing,
                attempted,
            } => PolicyError::MappingConflict {
                key,
                existing,
                attempted,
            }
            .into(),
            RegistryError::NameConflict(name) => {
                OwnershipError::invalid_argument(format!("party name {name} already registered"))
            }
            RegistryError::Other(msg) => OwnershipError::Internal(msg),
        }
    }
}

impl From<SessionError> for OwnershipError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Closed { party } => ProtocolError::CounterpartyUnresponsive {
                party,
                reason: "session closed".to_string(),
            }
            .into(),
            SessionError::Timeout { party, after } => ProtocolError::CounterpartyUnresponsive {
                party,
                reason: format!("no message within {after:?}"),
            }
            .into(),
            SessionError::UnknownParty(party) => ProtocolError::CounterpartyUnresponsive {
                party,
                reason: "not reachable on this network".to_string(),
            }
            .into(),
            other @ (SessionError::Codec(_)
            | SessionError::VersionMismatch { .. }
            | SessionError::WrongSession { .. }) => OwnershipError::malformed(other.to_string()),
        }
    }
}

impl From<bincode::Error> for OwnershipError {
    fn from(e: bincode::Error) -> Self {
        OwnershipError::malformed(e.to_string())
    }
}
