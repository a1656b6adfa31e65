use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use modelstore_core::{
    AuditRecord, Etag, Published, ResourceId, ResourceKind, Value, VersionRecord,
};

use crate::error::StorageError;
use crate::history::VersionHistory;
use crate::traits::VersionedStore;

pub const DEFAULT_HISTORY_DEPTH: usize = 32;

struct Slot {
    kind: ResourceKind,
    value: Value,
    etag: Etag,
    history: VersionHistory,
    /// Cleared by `delete`. A writer that fetched the slot before removal
    /// sees this under the slot lock and reports `NotFound`.
    live: bool,
}

/// In-process versioned store.
///
/// The id map is only locked long enough to find or insert a slot; each
/// slot has its own mutex, so a compare-and-swap on one resource never
/// waits on writes to another.
pub struct MemoryStore {
    slots: RwLock<HashMap<ResourceId, Arc<Mutex<Slot>>>>,
    sequence: AtomicU64,
    history_depth: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_history_depth(DEFAULT_HISTORY_DEPTH)
    }

    pub fn with_history_depth(history_depth: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(1),
            history_depth,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    fn next_etag(&self, kind: ResourceKind, value: &Value) -> Result<Etag, StorageError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        Ok(Etag::compute(sequence, kind, value)?)
    }

    fn slot(&self, resource_id: ResourceId) -> Result<Arc<Mutex<Slot>>, StorageError> {
        self.slots
            .read()
            .get(&resource_id)
            .cloned()
            .ok_or(StorageError::NotFound(resource_id))
    }
}

impl VersionedStore for MemoryStore {
    fn create(
        &self,
        kind: ResourceKind,
        value: Value,
        explicit_id: Option<ResourceId>,
    ) -> Result<(ResourceId, Etag), StorageError> {
        let resource_id = explicit_id.unwrap_or_default();
        let etag = self.next_etag(kind, &value)?;

        let mut slots = self.slots.write();
        if slots.contains_key(&resource_id) {
            return Err(StorageError::AlreadyExists(resource_id));
        }
        let mut history = VersionHistory::new(self.history_depth);
        history.push(VersionRecord { etag, audit: None });
        slots.insert(
            resource_id,
            Arc::new(Mutex::new(Slot {
                kind,
                value,
                etag,
                history,
                live: true,
            })),
        );
        drop(slots);

        debug!(%resource_id, %kind, %etag, "resource created");
        Ok((resource_id, etag))
    }

    fn get(&self, resource_id: ResourceId) -> Result<Published, StorageError> {
        let slot = self.slot(resource_id)?;
        let slot = slot.lock();
        if !slot.live {
            return Err(StorageError::NotFound(resource_id));
        }
        Ok(Published {
            resource_id,
            kind: slot.kind,
            value: slot.value.clone(),
            etag: slot.etag,
        })
    }

    fn publish_if_match(
        &self,
        resource_id: ResourceId,
        expected: &Etag,
        value: Value,
        audit: Option<AuditRecord>,
    ) -> Result<Etag, StorageError> {
        let slot = self.slot(resource_id)?;
        let mut slot = slot.lock();
        if !slot.live {
            return Err(StorageError::NotFound(resource_id));
        }
        if slot.etag != *expected {
            trace!(%resource_id, %expected, current = %slot.etag, "etag mismatch");
            return Err(StorageError::Conflict {
                resource_id,
                current: slot.etag,
            });
        }

        let etag = self.next_etag(slot.kind, &value)?;
        slot.value = value;
        slot.etag = etag;
        slot.history.push(VersionRecord { etag, audit });
        trace!(%resource_id, previous = %expected, %etag, "published");
        Ok(etag)
    }

    fn delete(&self, resource_id: ResourceId) -> Result<(), StorageError> {
        let slot = self
            .slots
            .write()
            .remove(&resource_id)
            .ok_or(StorageError::NotFound(resource_id))?;
        slot.lock().live = false;
        debug!(%resource_id, "resource deleted");
        Ok(())
    }

    fn history(&self, resource_id: ResourceId) -> Result<Vec<VersionRecord>, StorageError> {
        let slot = self.slot(resource_id)?;
        let slot = slot.lock();
        if !slot.live {
            return Err(StorageError::NotFound(resource_id));
        }
        Ok(slot.history.to_vec())
    }

    fn list(&self) -> Result<Vec<(ResourceId, ResourceKind, Etag)>, StorageError> {
        let slots: Vec<(ResourceId, Arc<Mutex<Slot>>)> = self
            .slots
            .read()
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect();
        let mut out: Vec<_> = slots
            .into_iter()
            .filter_map(|(id, slot)| {
                let slot = slot.lock();
                slot.live.then_some((id, slot.kind, slot.etag))
            })
            .collect();
        out.sort_by_key(|(id, _, _)| *id);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn counter(n: i64) -> Value {
        Value::from_pairs([("count", Value::Integer(n))])
    }

    #[test]
    fn create_and_get_independent_copy() {
        let store = MemoryStore::new();
        let (id, etag) = store.create(ResourceKind::Model, counter(0), None).unwrap();

        let mut fetched = store.get(id).unwrap();
        assert_eq!(fetched.etag, etag);
        assert_eq!(fetched.kind, ResourceKind::Model);
        fetched.value = counter(99);

        assert_eq!(store.get(id).unwrap().value, counter(0));
    }

    #[test]
    fn explicit_id_collision() {
        let store = MemoryStore::new();
        let id = ResourceId::new();
        store.create(ResourceKind::Layout, Value::map(), Some(id)).unwrap();
        let err = store.create(ResourceKind::Layout, Value::map(), Some(id)).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(got) if got == id));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = MemoryStore::new();
        let id = ResourceId::new();
        assert!(matches!(store.get(id), Err(StorageError::NotFound(_))));
        assert!(matches!(store.delete(id), Err(StorageError::NotFound(_))));
        assert!(matches!(store.history(id), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn replace_if_match_publishes_new_etag() {
        let store = MemoryStore::new();
        let (id, e0) = store.create(ResourceKind::Model, counter(0), None).unwrap();

        let e1 = store.replace_if_match(id, &e0, counter(1)).unwrap();
        assert_ne!(e0, e1);
        assert!(e1.sequence() > e0.sequence());
        assert_eq!(store.get(id).unwrap().value, counter(1));

        // Stale etag
        let err = store.replace_if_match(id, &e0, counter(2)).unwrap_err();
        match err {
            StorageError::Conflict { resource_id, current } => {
                assert_eq!(resource_id, id);
                assert_eq!(current, e1);
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
        assert_eq!(store.get(id).unwrap().value, counter(1));
    }

    #[test]
    fn identical_content_still_gets_new_etag() {
        let store = MemoryStore::new();
        let (id, e0) = store.create(ResourceKind::Model, counter(0), None).unwrap();
        let e1 = store.replace_if_match(id, &e0, counter(0)).unwrap();
        assert_ne!(e0, e1);
        assert!(e0.same_content(&e1));
    }

    #[test]
    fn delete_then_replace_is_not_found() {
        let store = MemoryStore::new();
        let (id, e0) = store.create(ResourceKind::Model, counter(0), None).unwrap();
        store.delete(id).unwrap();
        assert!(matches!(
            store.replace_if_match(id, &e0, counter(1)),
            Err(StorageError::NotFound(_))
        ));

        // The id can be reused, and never yields a previously issued etag.
        let (_, recreated) = store.create(ResourceKind::Model, counter(0), Some(id)).unwrap();
        assert_ne!(recreated, e0);
    }

    #[test]
    fn history_records_each_version() {
        let store = MemoryStore::with_history_depth(2);
        let (id, e0) = store.create(ResourceKind::Model, counter(0), None).unwrap();
        let e1 = store.replace_if_match(id, &e0, counter(1)).unwrap();
        let e2 = store.replace_if_match(id, &e1, counter(2)).unwrap();

        let history = store.history(id).unwrap();
        let etags: Vec<Etag> = history.iter().map(|r| r.etag).collect();
        assert_eq!(etags, vec![e1, e2]);
        assert!(history.iter().all(|r| r.audit.is_none()));
    }

    #[test]
    fn list_skips_deleted() {
        let store = MemoryStore::new();
        let (a, _) = store.create(ResourceKind::Model, counter(0), None).unwrap();
        let (b, _) = store.create(ResourceKind::Layout, Value::map(), None).unwrap();
        store.delete(a).unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, b);
        assert_eq!(listed[0].1, ResourceKind::Layout);
    }

    #[test]
    fn racing_cas_has_single_winner() {
        let store = MemoryStore::new();
        let (id, e0) = store.create(ResourceKind::Model, counter(0), None).unwrap();

        let results: Vec<Result<Etag, StorageError>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|n| {
                    let store = &store;
                    s.spawn(move || store.replace_if_match(id, &e0, counter(n + 1)))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners: Vec<&Etag> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        let winner = *winners[0];
        for result in &results {
            if let Err(err) = result {
                assert!(
                    matches!(err, StorageError::Conflict { current, .. } if *current == winner),
                    "loser should see the winner's etag, got {err:?}"
                );
            }
        }
        assert_eq!(store.get(id).unwrap().etag, winner);
    }

    #[test]
    fn etags_never_repeat_across_resources() {
        let store = MemoryStore::new();
        let mut seen = HashSet::new();
        for _ in 0..4 {
            let (id, mut etag) = store.create(ResourceKind::Model, counter(0), None).unwrap();
            assert!(seen.insert(etag));
            for n in 1..4 {
                etag = store.replace_if_match(id, &etag, counter(n)).unwrap();
                assert!(seen.insert(etag));
            }
        }
    }
}
