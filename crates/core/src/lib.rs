pub mod audit;
pub mod diff;
pub mod error;
pub mod etag;
pub mod ids;
pub mod operations;
pub mod resource;
pub mod value;

pub use audit::{AuditRecord, VersionRecord};
pub use diff::{Change, ChangeKind, Diff, PathSegment, compute_diff};
pub use error::CoreError;
pub use etag::Etag;
pub use ids::*;
pub use operations::{OperationCall, OperationError, OperationOutcome, OperationRecord};
pub use resource::{Published, ResourceKind};
pub use value::Value;
