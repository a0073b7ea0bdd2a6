//! SHA-256 chained audit log for completed and rejected GENERATE requests
//! (SPEC_FULL.md S10.5). Each block hashes the previous block's hash, so
//! tampering with any entry breaks the chain for anyone replaying it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    /// A GENERATE request produced a command stream.
    PlanAccepted,
    /// A GENERATE request was rejected before or during sequencing.
    PlanRejected,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_string(self).unwrap_or_default();
        write!(f, "{}", s.trim_matches('"'))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditBlock {
    /// Monotonically increasing block sequence number.
    pub block_seq: u64,
    pub timestamp_ms: u64,
    /// SHA-256 hash of the previous block, hex-encoded. Genesis: 64 zeros.
    pub prev_hash: String,
    pub event_type: AuditEventType,
    /// JSON-serialized event payload (instrument, flags, outcome, counts).
    pub payload_json: String,
    /// SHA-256 of (prev_hash || timestamp_ms || event_type || payload_json).
    pub block_hash: String,
}

impl AuditBlock {
    fn compute_hash(prev_hash: &str, timestamp_ms: u64, event_type: &AuditEventType, payload_json: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(prev_hash.as_bytes());
        hasher.update(timestamp_ms.to_le_bytes());
        hasher.update(event_type.to_string().as_bytes());
        hasher.update(payload_json.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn new(block_seq: u64, timestamp_ms: u64, prev_hash: String, event_type: AuditEventType, payload_json: String) -> Self {
        let block_hash = Self::compute_hash(&prev_hash, timestamp_ms, &event_type, &payload_json);
        Self { block_seq, timestamp_ms, prev_hash, event_type, payload_json, block_hash }
    }

    /// Verify this block's hash is internally consistent.
    pub fn verify(&self) -> bool {
        Self::compute_hash(&self.prev_hash, self.timestamp_ms, &self.event_type, &self.payload_json) == self.block_hash
    }
}

const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000"; // 64 hex zeros

#[derive(Default)]
struct AuditState {
    block_seq: u64,
    last_hash: String,
}

/// Thread-safe, in-memory SHA-256 chained audit log. One entry per
/// completed or rejected GENERATE request.
#[derive(Clone)]
pub struct AuditLog {
    state: Arc<RwLock<AuditState>>,
}

impl AuditLog {
    pub fn new() -> Self {
        let state = AuditState { block_seq: 0, last_hash: GENESIS_HASH.to_string() };
        Self { state: Arc::new(RwLock::new(state)) }
    }

    /// Append one audit block and return it.
    pub async fn append(&self, event_type: AuditEventType, payload: serde_json::Value, timestamp_ms: u64) -> AuditBlock {
        let payload_json = payload.to_string();
        let block = {
            let mut state = self.state.write().await;
            let block = AuditBlock::new(state.block_seq, timestamp_ms, state.last_hash.clone(), event_type, payload_json);
            state.last_hash = block.block_hash.clone();
            state.block_seq += 1;
            block
        };
        debug_assert!(block.verify(), "AuditBlock hash mismatch immediately after creation");
        block
    }

    pub async fn log_plan_accepted(&self, instrument: &str, pivots: usize, fiducials: usize, num_moves: u32, num_parks: u32, timestamp_ms: u64) {
        self.append(
            AuditEventType::PlanAccepted,
            serde_json::json!({
                "instrument": instrument,
                "pivots": pivots,
                "fiducials": fiducials,
                "numMoves": num_moves,
                "numParks": num_parks,
            }),
            timestamp_ms,
        )
        .await;
    }

    pub async fn log_plan_rejected(&self, instrument: &str, code: &str, message: &str, timestamp_ms: u64) {
        self.append(
            AuditEventType::PlanRejected,
            serde_json::json!({
                "instrument": instrument,
                "code": code,
                "message": message,
            }),
            timestamp_ms,
        )
        .await;
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chain_links_successive_blocks() {
        let log = AuditLog::new();
        let first = log.append(AuditEventType::PlanAccepted, serde_json::json!({"n": 1}), 1_000).await;
        let second = log.append(AuditEventType::PlanRejected, serde_json::json!({"n": 2}), 2_000).await;
        assert_eq!(first.prev_hash, GENESIS_HASH);
        assert_eq!(second.prev_hash, first.block_hash);
        assert!(first.verify());
        assert!(second.verify());
    }

    #[tokio::test]
    async fn tampered_block_fails_verification() {
        let log = AuditLog::new();
        let mut block = log.append(AuditEventType::PlanAccepted, serde_json::json!({"n": 1}), 1_000).await;
        block.payload_json = "{}".to_string();
        assert!(!block.verify());
    }
}
