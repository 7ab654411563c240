//! Metrics for key ownership and mapping sync
//!
//! Recorded through the `metrics` facade; no recorder is installed here, so
//! an embedding application chooses the exporter.

use metrics::{describe_counter, describe_histogram, histogram};
use std::time::Instant;

pub const PROOFS_CREATED: &str = "confidential_proofs_created_total";
pub const PROOFS_VERIFIED: &str = "confidential_proofs_verified_total";
pub const KEY_REQUESTS: &str = "confidential_key_requests_total";
pub const KEY_REQUEST_DURATION: &str = "confidential_key_request_duration_ms";
pub const KEY_MAPPINGS_REGISTERED: &str = "confidential_key_mappings_registered_total";
pub const SYNC_MAPPINGS_DISCLOSED: &str = "confidential_sync_mappings_disclosed_total";
pub const SYNC_MAPPINGS_WITHHELD: &str = "confidential_sync_mappings_withheld_total";
pub const INBOUND_SESSIONS: &str = "confidential_inbound_sessions_total";

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    describe_counter!(
        PROOFS_CREATED,
        "Ownership proofs signed by this node"
    );
    describe_counter!(
        PROOFS_VERIFIED,
        "Ownership proofs checked, labeled by result (valid, invalid_signature, malformed_payload)"
    );
    describe_counter!(
        KEY_REQUESTS,
        "Key ownership requests initiated, labeled by request kind and result"
    );
    describe_histogram!(
        KEY_REQUEST_DURATION,
        "Round trip of a key ownership request in milliseconds"
    );
    describe_counter!(
        KEY_MAPPINGS_REGISTERED,
        "Key to party mappings newly registered, labeled by source (proof, sync)"
    );
    describe_counter!(
        SYNC_MAPPINGS_DISCLOSED,
        "Mappings returned to sync requesters"
    );
    describe_counter!(
        SYNC_MAPPINGS_WITHHELD,
        "Resolved mappings withheld by the disclosure policy"
    );
    describe_counter!(
        INBOUND_SESSIONS,
        "Inbound sessions dispatched to a responder, labeled by flow"
    );
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        let duration = self.start.elapsed();
        histogram!(self.name).record(duration.as_secs_f64() * 1000.0);
    }
}
