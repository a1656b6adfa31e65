pub mod builtin;
pub mod config;
pub mod error;
pub mod registry;
pub mod transaction;
pub mod validation;

pub use config::{EngineConfig, SnapshotStrategy};
pub use error::EngineError;
pub use registry::{HandlerOutput, OperationHandler, OperationRegistry};
pub use transaction::{TransactionInfo, TxnState};
pub use validation::{AcceptAll, Diagnostic, Severity, ValidationReport, Validator};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use modelstore_core::{
    AuditRecord, Diff, Etag, OperationCall, OperationOutcome, OperationRecord, Published,
    ResourceId, ResourceKind, TxnId, Value, VersionRecord, compute_diff,
};
use modelstore_storage::{StorageError, VersionedStore};

use crate::transaction::Transaction;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Run the installed validator on the working copy before publishing.
    pub validate: bool,
}

impl CommitOptions {
    pub fn validated() -> Self {
        Self { validate: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub resource_id: ResourceId,
    pub new_etag: Etag,
    pub diff: Diff,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub begun: u64,
    pub committed: u64,
    pub conflicted: u64,
    pub rolled_back: u64,
    pub reaped: u64,
}

#[derive(Default)]
struct Counters {
    begun: AtomicU64,
    committed: AtomicU64,
    conflicted: AtomicU64,
    rolled_back: AtomicU64,
    reaped: AtomicU64,
}

/// Coordinates begin → apply → commit | rollback over a versioned store.
///
/// No lock is taken on a resource at `begin`; each transaction edits a
/// private clone and the only synchronization point is the store's
/// compare-and-swap at commit. Safe to share across threads.
pub struct TransactionManager {
    store: Arc<dyn VersionedStore>,
    registry: Arc<OperationRegistry>,
    validator: Arc<dyn Validator>,
    config: EngineConfig,
    transactions: RwLock<HashMap<TxnId, Arc<Mutex<Transaction>>>>,
    counters: Counters,
}

impl TransactionManager {
    pub fn new(store: Arc<dyn VersionedStore>, registry: Arc<OperationRegistry>) -> Self {
        Self {
            store,
            registry,
            validator: Arc::new(AcceptAll),
            config: EngineConfig::default(),
            transactions: RwLock::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<dyn VersionedStore> {
        &self.store
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn txn(&self, txn_id: TxnId) -> Result<Arc<Mutex<Transaction>>, EngineError> {
        self.transactions
            .read()
            .get(&txn_id)
            .cloned()
            .ok_or(EngineError::TransactionNotFound(txn_id))
    }

    // ========================================================================
    // Resources
    // ========================================================================

    pub fn create(
        &self,
        kind: ResourceKind,
        value: Value,
        explicit_id: Option<ResourceId>,
    ) -> Result<(ResourceId, Etag), EngineError> {
        Ok(self.store.create(kind, value, explicit_id)?)
    }

    pub fn get(&self, resource_id: ResourceId) -> Result<Published, EngineError> {
        Ok(self.store.get(resource_id)?)
    }

    /// Write `value` directly, outside any transaction, if the resource
    /// still carries `expected`. The version gets no audit record.
    pub fn replace_if_match(
        &self,
        resource_id: ResourceId,
        expected: &Etag,
        value: Value,
    ) -> Result<Etag, EngineError> {
        Ok(self.store.replace_if_match(resource_id, expected, value)?)
    }

    /// Open transactions against the resource will fail at commit.
    pub fn delete(&self, resource_id: ResourceId) -> Result<(), EngineError> {
        Ok(self.store.delete(resource_id)?)
    }

    pub fn history(&self, resource_id: ResourceId) -> Result<Vec<VersionRecord>, EngineError> {
        Ok(self.store.history(resource_id)?)
    }

    // ========================================================================
    // Transaction lifecycle
    // ========================================================================

    /// Snapshot the resource into a private working copy.
    pub fn begin(&self, resource_id: ResourceId) -> Result<(TxnId, Etag), EngineError> {
        let published = self.store.get(resource_id)?;
        let txn_id = TxnId::new();
        let etag = published.etag;
        let txn = Transaction::new(txn_id, resource_id, published.kind, etag, published.value);

        self.transactions
            .write()
            .insert(txn_id, Arc::new(Mutex::new(txn)));
        self.counters.begun.fetch_add(1, Ordering::Relaxed);

        debug!(%txn_id, %resource_id, baseline = %etag, "transaction begun");
        Ok((txn_id, etag))
    }

    /// Apply operations in order against the working copy.
    ///
    /// Stops at the first failing operation: the returned records end with
    /// that failure and nothing after it is dispatched. The transaction stays
    /// open either way.
    pub fn apply(
        &self,
        txn_id: TxnId,
        calls: Vec<OperationCall>,
    ) -> Result<Vec<OperationRecord>, EngineError> {
        let txn = self.txn(txn_id)?;
        let mut txn = txn.lock();
        txn.require_open()?;

        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let seq = txn.log.len() as u64;
            let dispatched = self
                .registry
                .dispatch(txn.kind, &call.name, &call.params, &txn.working);
            let outcome = match dispatched {
                Ok(out) => {
                    txn.working = out.document;
                    OperationOutcome::Applied { output: out.output }
                }
                Err(err) => {
                    debug!(%txn_id, op = %call.name, error = %err, "operation failed");
                    OperationOutcome::Failed(err)
                }
            };

            let record = OperationRecord {
                seq,
                name: call.name,
                params: call.params,
                outcome,
            };
            let failed = !record.is_applied();
            txn.log.push(record.clone());
            results.push(record);
            if failed {
                break;
            }
        }
        txn.touch();

        debug!(%txn_id, submitted = results.len(), log_len = txn.log.len(), "operations applied");
        Ok(results)
    }

    /// Publish the working copy if the resource still carries the baseline
    /// etag.
    ///
    /// A failed validation leaves the transaction open. A moved etag ends it
    /// in `Conflict` and reports the current etag; so does a deleted
    /// resource, reported as `NotFound`.
    pub fn commit(
        &self,
        txn_id: TxnId,
        options: CommitOptions,
    ) -> Result<CommitOutcome, EngineError> {
        let txn = self.txn(txn_id)?;
        let mut txn = txn.lock();
        txn.require_open()?;

        if options.validate {
            let report = self.validator.validate(txn.kind, &txn.working);
            if !report.passed() {
                warn!(%txn_id, diagnostics = report.diagnostics.len(), "validation failed");
                txn.touch();
                return Err(EngineError::ValidationFailed {
                    diagnostics: report.diagnostics,
                });
            }
        }

        let resource_id = txn.resource_id;
        let diff = compute_diff(&txn.baseline, &txn.working);
        let audit = AuditRecord::new(txn_id, txn.baseline_etag, txn.applied_names(), diff.clone());

        let published = self.store.publish_if_match(
            resource_id,
            &txn.baseline_etag,
            txn.working.clone(),
            Some(audit),
        );
        match published {
            Ok(new_etag) => {
                txn.finish(TxnState::Committed);
                self.counters.committed.fetch_add(1, Ordering::Relaxed);
                info!(%txn_id, %resource_id, %new_etag, changes = diff.len(), "transaction committed");
                Ok(CommitOutcome {
                    resource_id,
                    new_etag,
                    diff,
                })
            }
            Err(err @ (StorageError::Conflict { .. } | StorageError::NotFound(_))) => {
                txn.finish(TxnState::Conflict);
                self.counters.conflicted.fetch_add(1, Ordering::Relaxed);
                warn!(%txn_id, %resource_id, baseline = %txn.baseline_etag, error = %err, "commit conflict");
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Discard the working copy. A no-op on a transaction that already
    /// terminated, was reaped, or never existed.
    pub fn rollback(&self, txn_id: TxnId) -> Result<(), EngineError> {
        let Some(txn) = self.transactions.read().get(&txn_id).cloned() else {
            debug!(%txn_id, "rollback of unknown transaction ignored");
            return Ok(());
        };
        let mut txn = txn.lock();
        if txn.state.is_terminal() {
            return Ok(());
        }
        txn.finish(TxnState::RolledBack);
        self.counters.rolled_back.fetch_add(1, Ordering::Relaxed);
        debug!(%txn_id, "transaction rolled back");
        Ok(())
    }

    /// Direct path: `begin → apply(call) → commit` without validation. On
    /// operation failure or conflict the transaction is rolled back and the
    /// error returned.
    pub fn execute(
        &self,
        resource_id: ResourceId,
        call: OperationCall,
    ) -> Result<(OperationRecord, CommitOutcome), EngineError> {
        let (txn_id, _) = self.begin(resource_id)?;
        let mut records = self.apply(txn_id, vec![call])?;
        let Some(record) = records.pop() else {
            self.rollback(txn_id)?;
            return Err(EngineError::TransactionClosed {
                txn_id,
                state: TxnState::RolledBack,
            });
        };
        if let Some(err) = record.error() {
            let err = err.clone();
            self.rollback(txn_id)?;
            return Err(EngineError::Operation(err));
        }

        match self.commit(txn_id, CommitOptions::default()) {
            Ok(outcome) => Ok((record, outcome)),
            Err(err) => {
                self.rollback(txn_id)?;
                Err(err)
            }
        }
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn state(&self, txn_id: TxnId) -> Result<TxnState, EngineError> {
        Ok(self.txn(txn_id)?.lock().state)
    }

    pub fn log(&self, txn_id: TxnId) -> Result<Vec<OperationRecord>, EngineError> {
        Ok(self.txn(txn_id)?.lock().log.clone())
    }

    /// Clone of the working copy, or `None` once the transaction terminated.
    pub fn working_copy(&self, txn_id: TxnId) -> Result<Option<Value>, EngineError> {
        let txn = self.txn(txn_id)?;
        let txn = txn.lock();
        Ok((!txn.state.is_terminal()).then(|| txn.working.clone()))
    }

    pub fn info(&self, txn_id: TxnId) -> Result<TransactionInfo, EngineError> {
        Ok(self.txn(txn_id)?.lock().info())
    }

    /// Reapply the applied records of `log` on top of `baseline`.
    pub fn replay(
        &self,
        kind: ResourceKind,
        baseline: &Value,
        log: &[OperationRecord],
    ) -> Result<Value, EngineError> {
        Ok(self.registry.replay(kind, baseline, log)?)
    }

    pub fn open_transactions(&self) -> usize {
        let txns: Vec<_> = self.transactions.read().values().cloned().collect();
        txns.iter().filter(|t| t.lock().state == TxnState::Open).count()
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            begun: self.counters.begun.load(Ordering::Relaxed),
            committed: self.counters.committed.load(Ordering::Relaxed),
            conflicted: self.counters.conflicted.load(Ordering::Relaxed),
            rolled_back: self.counters.rolled_back.load(Ordering::Relaxed),
            reaped: self.counters.reaped.load(Ordering::Relaxed),
        }
    }

    // ========================================================================
    // Reaping
    // ========================================================================

    /// Forget transactions untouched for longer than `max_idle`. Open ones
    /// are rolled back first. Transactions busy in another call are skipped.
    /// Returns how many were removed.
    pub fn reap(&self, max_idle: Duration) -> usize {
        let mut txns = self.transactions.write();
        let before = txns.len();
        txns.retain(|txn_id, txn| {
            let Some(mut txn) = txn.try_lock() else {
                return true;
            };
            if txn.idle_for() < max_idle {
                return true;
            }
            if !txn.state.is_terminal() {
                txn.finish(TxnState::RolledBack);
                self.counters.rolled_back.fetch_add(1, Ordering::Relaxed);
                debug!(%txn_id, "abandoned transaction reaped");
            }
            false
        });
        let reaped = before - txns.len();
        self.counters
            .reaped
            .fetch_add(reaped as u64, Ordering::Relaxed);
        reaped
    }

    /// `reap` with the configured idle limit; does nothing when none is set.
    pub fn reap_expired(&self) -> usize {
        match self.config.reap_after() {
            Some(max_idle) => self.reap(max_idle),
            None => 0,
        }
    }
}
