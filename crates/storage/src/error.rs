use modelstore_core::{Etag, ResourceId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("resource not found: {0}")]
    NotFound(ResourceId),

    #[error("resource already exists: {0}")]
    AlreadyExists(ResourceId),

    #[error("etag mismatch on {resource_id}: current is {current}")]
    Conflict { resource_id: ResourceId, current: Etag },

    #[error("core error: {0}")]
    Core(#[from] modelstore_core::CoreError),
}
