use clap::Parser;
use std::path::PathBuf;

use crate::Operation;
use crate::utils::SettingsOverrides;
use crate::utils::config::BenchConsts;

struct DefaultArgs;

impl DefaultArgs {
    pub const CONFIG: &'static str = "config.toml";
}

/// Export blob names matching a tag filter to text files, or re-apply tags from those files.
#[derive(Clone, Parser)]
#[command(name = "tagsweep")]
#[command(about = "Export blobs by tag filter to data files (export) or set tags from them (set).")]
pub struct Cli {
    /// Configuration file (TOML, or JSON when it ends in .json).
    #[arg(value_name = "CONFIG", default_value = DefaultArgs::CONFIG)]
    pub config: PathBuf,

    /// Operation to run; overrides the config file.
    #[arg(long, short = 'o', value_enum)]
    pub operation: Option<Operation>,

    /// Data file folder; overrides the config file.
    #[arg(long, short = 'f')]
    pub folder: Option<PathBuf>,

    /// Rows per data file before rolling to the next one.
    #[arg(long, short = 'r')]
    pub rows_per_file: Option<usize>,

    /// Tag updates in flight per file (set).
    #[arg(long, short = 'm')]
    pub max_in_flight: Option<usize>,

    /// Number of file groups processed concurrently (set). Default: available processors.
    #[arg(long, short = 'p')]
    pub partitions: Option<usize>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}

impl Cli {
    /// Values that win over the config file.
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            operation: self.operation,
            folder: self.folder.clone(),
            rows_per_file: self.rows_per_file,
            max_in_flight: self.max_in_flight,
            partitions: self.partitions,
            verbose: self.verbose,
        }
    }
}

/// Benchmark bulk upload throughput to an SFTP server with parallel connections.
#[derive(Clone, Parser)]
#[command(name = "upload-bench")]
#[command(about = "Upload a folder to an SFTP server with N parallel workers and report throughput.")]
pub struct BenchCli {
    /// SFTP host.
    #[arg(long, env = "UPLOAD_BENCH_HOST")]
    pub host: String,

    #[arg(long, env = "UPLOAD_BENCH_PORT", default_value_t = BenchConsts::DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, short = 'u', env = "UPLOAD_BENCH_USER")]
    pub user: String,

    /// Password. Falls back to UPLOAD_BENCH_PASSWORD, .env, then a prompt.
    #[arg(long, env = "UPLOAD_BENCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Local folder to upload.
    #[arg(long, short = 's', env = "UPLOAD_BENCH_SOURCE")]
    pub source: PathBuf,

    /// Remote folder to upload into. Default: a random UUID.
    #[arg(long, short = 't', env = "UPLOAD_BENCH_TARGET")]
    pub target: Option<String>,

    /// Worker threads (one session each).
    #[arg(long, short = 'n', env = "UPLOAD_BENCH_THREADS", default_value_t = BenchConsts::DEFAULT_THREADS)]
    pub threads: usize,

    /// Seconds between status lines.
    #[arg(long, env = "UPLOAD_BENCH_INTERVAL", default_value_t = BenchConsts::DEFAULT_REPORT_INTERVAL_SECS)]
    pub interval: u64,

    /// Include files in subfolders.
    #[arg(long, short = 'R', env = "UPLOAD_BENCH_RECURSIVE")]
    pub recursive: bool,

    /// Open a new connection for every file.
    #[arg(long, env = "UPLOAD_BENCH_CONNECT_PER_FILE")]
    pub connect_per_file: bool,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
