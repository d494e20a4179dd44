//! tagsweep: export blob names matching a tag filter to text files and re-apply tags from them,
//! plus an SFTP bulk upload benchmark.

pub mod bench;
pub mod engine;
pub mod fanout;
pub mod pipeline;
pub mod storage;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use bench::run_upload_bench;
pub use fanout::run_set_tags;
pub use pipeline::run_export;

/// Result alias used by the public tagsweep API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;
