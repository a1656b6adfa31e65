pub mod bench;
pub mod contention;

pub use bench::{DispatchLog, TestBench, counter, increment_by, init_tracing};
pub use contention::{commit_with_retry, race_commits};
