use std::sync::Barrier;
use std::thread;

use modelstore_core::{Etag, OperationCall, ResourceId};
use modelstore_engine::{CommitOptions, CommitOutcome, EngineError, TransactionManager};

/// Begin one transaction per worker against the same baseline, apply each
/// worker's batch, then release all commits at once. Results are in worker
/// order.
pub fn race_commits(
    manager: &TransactionManager,
    resource_id: ResourceId,
    batches: Vec<Vec<OperationCall>>,
) -> Vec<Result<CommitOutcome, EngineError>> {
    let begun = Barrier::new(batches.len());
    let applied = Barrier::new(batches.len());

    thread::scope(|s| {
        let handles: Vec<_> = batches
            .into_iter()
            .map(|batch| {
                let (begun, applied) = (&begun, &applied);
                s.spawn(move || {
                    let started = manager.begin(resource_id);
                    begun.wait();
                    let result = started.and_then(|(txn_id, _)| {
                        manager.apply(txn_id, batch)?;
                        Ok(txn_id)
                    });
                    applied.wait();
                    result.and_then(|txn_id| manager.commit(txn_id, CommitOptions::default()))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("contention worker panicked"))
            .collect()
    })
}

/// Run `calls` in a fresh transaction, re-beginning after each conflict.
/// Returns the committed etag and the number of attempts it took.
pub fn commit_with_retry(
    manager: &TransactionManager,
    resource_id: ResourceId,
    calls: &[OperationCall],
    max_attempts: usize,
) -> Result<(Etag, usize), EngineError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let (txn_id, _) = manager.begin(resource_id)?;
        let records = manager.apply(txn_id, calls.to_vec())?;
        if let Some(err) = records.iter().find_map(|r| r.error()) {
            manager.rollback(txn_id)?;
            return Err(EngineError::Operation(err.clone()));
        }
        match manager.commit(txn_id, CommitOptions::default()) {
            Ok(outcome) => return Ok((outcome.new_etag, attempt)),
            Err(EngineError::Conflict { .. }) if attempt < max_attempts => continue,
            Err(err) => return Err(err),
        }
    }
}
