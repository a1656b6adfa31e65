use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::diff::Diff;
use crate::etag::Etag;
use crate::ids::TxnId;

/// Change record produced once, when a transaction commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub txn_id: TxnId,
    /// Etag the transaction was begun against.
    pub baseline: Etag,
    /// Names of the applied operations, in application order.
    pub operations: Vec<String>,
    pub diff: Diff,
    pub committed_at_ms: u64,
}

impl AuditRecord {
    pub fn new(txn_id: TxnId, baseline: Etag, operations: Vec<String>, diff: Diff) -> Self {
        Self {
            txn_id,
            baseline,
            operations,
            diff,
            committed_at_ms: now_ms(),
        }
    }
}

/// One retained entry of a resource's version history.
/// Creation and direct compare-and-swap writes carry no audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub etag: Etag,
    pub audit: Option<AuditRecord>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
