// pixform/src/batch/mod.rs
mod coordinator;
mod job;
mod storage;

pub use coordinator::{read_snapshot, BatchConfig, BatchCoordinator};
pub use job::{BatchJob, ItemFailure, JobStatus, CANCELLED_MESSAGE};
pub use storage::{FsStorage, MemoryStorage, Storage};
