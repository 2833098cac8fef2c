pub mod config;
pub mod error;
pub mod types;

pub use error::{Phase, SealError, SealResult};
pub use types::{ArchiveFile, CancelFlag, Hooks, Progress, ProgressFn};
