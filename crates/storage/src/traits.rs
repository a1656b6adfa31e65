use modelstore_core::{
    AuditRecord, Etag, Published, ResourceId, ResourceKind, Value, VersionRecord,
};

use crate::error::StorageError;

/// Holds the current published state of every resource.
///
/// Implementations must make `publish_if_match` indivisible per resource id:
/// of two calls carrying the same expected etag, at most one succeeds.
pub trait VersionedStore: Send + Sync {
    /// Publish a new resource. When `explicit_id` is `None` a fresh id is
    /// allocated; a colliding explicit id fails with `AlreadyExists`.
    fn create(
        &self,
        kind: ResourceKind,
        value: Value,
        explicit_id: Option<ResourceId>,
    ) -> Result<(ResourceId, Etag), StorageError>;

    /// Independent copy of the published state.
    fn get(&self, resource_id: ResourceId) -> Result<Published, StorageError>;

    /// Compare-and-swap with an audit record attached to the new version.
    fn publish_if_match(
        &self,
        resource_id: ResourceId,
        expected: &Etag,
        value: Value,
        audit: Option<AuditRecord>,
    ) -> Result<Etag, StorageError>;

    fn replace_if_match(
        &self,
        resource_id: ResourceId,
        expected: &Etag,
        value: Value,
    ) -> Result<Etag, StorageError> {
        self.publish_if_match(resource_id, expected, value, None)
    }

    fn delete(&self, resource_id: ResourceId) -> Result<(), StorageError>;

    /// Retained version records, oldest first.
    fn history(&self, resource_id: ResourceId) -> Result<Vec<VersionRecord>, StorageError>;

    fn list(&self) -> Result<Vec<(ResourceId, ResourceKind, Etag)>, StorageError>;
}
