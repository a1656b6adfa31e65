pub mod error;
pub mod history;
pub mod memory;
pub mod traits;

pub use error::StorageError;
pub use history::VersionHistory;
pub use memory::MemoryStore;
pub use traits::*;
