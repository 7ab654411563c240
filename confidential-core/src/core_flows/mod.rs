//! Protocol flows
//!
//! - `request_key`: key ownership request and its provider
//! - `sync_mapping`: key to party mapping sync and its handler
//! - `disclosure`: what a sync handler is willing to reveal

pub mod disclosure;
pub mod request_key;
pub mod sync_mapping;

pub use disclosure::{DiscloseAll, DiscloseNone, DiscloseOwnKeys, DisclosureMode, DisclosurePolicy};
pub use request_key::{ProvideKeyFlow, ProviderState, RequestKeyFlow, RequesterState};
pub use sync_mapping::{
    KeyMapping, SyncKeyMappingFlow, SyncKeyMappingHandler, SyncOutcome, SyncReply, SyncRequest, SyncTarget,
};
