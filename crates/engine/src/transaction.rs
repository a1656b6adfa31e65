use std::fmt;
use std::time::{Duration, Instant};

use modelstore_core::{Etag, OperationRecord, ResourceId, ResourceKind, TxnId, Value};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Open,
    Committed,
    RolledBack,
    Conflict,
}

impl TxnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::Conflict => "conflict",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of a transaction handed to callers.
#[derive(Debug, Clone)]
pub struct TransactionInfo {
    pub txn_id: TxnId,
    pub resource_id: ResourceId,
    pub kind: ResourceKind,
    pub baseline_etag: Etag,
    pub state: TxnState,
    pub log: Vec<OperationRecord>,
}

/// One in-flight edit attempt. Owned by the manager; the working copy is a
/// private clone and is dropped as soon as the transaction terminates.
pub(crate) struct Transaction {
    pub txn_id: TxnId,
    pub resource_id: ResourceId,
    pub kind: ResourceKind,
    pub baseline_etag: Etag,
    pub baseline: Value,
    pub working: Value,
    pub log: Vec<OperationRecord>,
    pub state: TxnState,
    last_touched: Instant,
}

impl Transaction {
    pub fn new(
        txn_id: TxnId,
        resource_id: ResourceId,
        kind: ResourceKind,
        baseline_etag: Etag,
        baseline: Value,
    ) -> Self {
        Self {
            txn_id,
            resource_id,
            kind,
            baseline_etag,
            working: baseline.clone(),
            baseline,
            log: Vec::new(),
            state: TxnState::Open,
            last_touched: Instant::now(),
        }
    }

    pub fn require_open(&self) -> Result<(), EngineError> {
        if self.state.is_terminal() {
            return Err(EngineError::TransactionClosed {
                txn_id: self.txn_id,
                state: self.state,
            });
        }
        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_touched = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_touched.elapsed()
    }

    /// Names of the operations that changed the working copy, in order.
    pub fn applied_names(&self) -> Vec<String> {
        self.log
            .iter()
            .filter(|r| r.is_applied())
            .map(|r| r.name.clone())
            .collect()
    }

    /// Move to a terminal state, releasing both document copies.
    pub fn finish(&mut self, state: TxnState) {
        debug_assert!(state.is_terminal());
        self.state = state;
        self.baseline = Value::Null;
        self.working = Value::Null;
        self.touch();
    }

    pub fn info(&self) -> TransactionInfo {
        TransactionInfo {
            txn_id: self.txn_id,
            resource_id: self.resource_id,
            kind: self.kind,
            baseline_etag: self.baseline_etag,
            state: self.state,
            log: self.log.clone(),
        }
    }
}
