//! Application configuration constants.
//! Defaults and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / names (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    storage_key_env: String,
    user_agent: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                storage_key_env: format!("{}_STORAGE_KEY", pkg.to_uppercase()),
                user_agent: format!("{pkg}/{}", env!("CARGO_PKG_VERSION")),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Env var consulted for the storage account key when the config file has none.
    pub fn storage_key_env(&self) -> &str {
        &self.storage_key_env
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

// ---- Data files ----

/// Data file naming and row limits.
pub struct DataFiles;

impl DataFiles {
    pub const DEFAULT_PREFIX: &'static str = "data";
    pub const EXTENSION: &'static str = "txt";
    /// Rows per file before the writer rolls to the next index.
    pub const DEFAULT_ROWS_PER_FILE: usize = 100_000;
    /// First file index.
    pub const FIRST_INDEX: usize = 1;

    /// `{prefix}-{index}.txt`
    pub fn file_name(prefix: &str, index: usize) -> String {
        format!("{prefix}-{index}.{}", Self::EXTENSION)
    }

    /// Parse the index out of a `{prefix}-{index}.txt` name. None for anything else.
    pub fn index_of(prefix: &str, file_name: &str) -> Option<usize> {
        file_name
            .strip_prefix(prefix)?
            .strip_prefix('-')?
            .strip_suffix(Self::EXTENSION)?
            .strip_suffix('.')?
            .parse()
            .ok()
    }
}

// ---- Export pipeline ----

/// Producer / writer tuning.
pub struct ExportConsts;

impl ExportConsts {
    /// Results requested per page.
    pub const DEFAULT_PAGE_SIZE: u32 = 5_000;
    /// Queue capacity in batches. Producer blocks once the writer falls this far behind.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
    /// Writer poll timeout; bounds how long a cancel goes unnoticed.
    pub const WRITER_POLL_INTERVAL: Duration = Duration::from_millis(100);
    /// Blob count used for the "time for a billion blobs" estimate.
    pub const EXTRAPOLATION_TARGET: f64 = 1_000_000_000.0;
}

// ---- Set pipeline ----

/// Fan-out tuning.
pub struct FanOutConsts;

impl FanOutConsts {
    /// In-flight tag updates per file.
    pub const DEFAULT_MAX_IN_FLIGHT: usize = 100;
    /// Seconds between progress lines.
    pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 5;
    /// Error messages are grouped on this many leading characters.
    pub const ERROR_KEY_CHARS: usize = 200;
    /// Most frequent errors repeated in each progress line.
    pub const TOP_ERRORS: usize = 3;
    /// Progress lines shorten each error to this many characters.
    pub const TOP_ERROR_DISPLAY_CHARS: usize = 100;
}

/// Partition count when not configured: available processors.
pub fn default_partitions() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// ---- Storage ----

/// Blob REST API constants.
pub struct StorageConsts;

impl StorageConsts {
    /// `x-ms-version` sent with every request (tag queries need 2019-12-12 or later).
    pub const API_VERSION: &'static str = "2021-12-02";
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    /// Max response body characters kept in an error message.
    pub const ERROR_BODY_LIMIT: usize = 512;
}

// ---- Upload benchmark ----

/// Benchmark defaults.
pub struct BenchConsts;

impl BenchConsts {
    pub const DEFAULT_THREADS: usize = 10;
    pub const DEFAULT_PORT: u16 = 22;
    /// Seconds between queue/uploading status lines.
    pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 1;
}
