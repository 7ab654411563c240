//! Confidential identities
//!
//! Challenge-response proofs that a counterparty owns a public key, and sync
//! of key to well-known party mappings between nodes.

mod codec;

pub mod config;
pub mod core_flows;
pub mod core_identity;
pub mod core_ledger;
pub mod core_ownership;
pub mod core_session;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod test_utils;

pub use config::Config;
pub use core_identity::{AbstractParty, AnonymousParty, Party, PartyName, PublicKey};
pub use core_ownership::{OwnershipError, OwnershipResult};
pub use logging::{init_logging, LogLevel};
pub use node::{Node, NodeServices};
