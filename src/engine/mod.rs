//! Engine module: command-line surface and shared console helpers

pub mod arg_parser;
pub mod cli;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::{BenchCli, Cli};
#[cfg(feature = "sftp")]
pub use cli::handle_bench;
pub use cli::handle_run;
pub use tools::{path_relative_to, path_to_remote_string};
