//! Run configuration file (TOML, or JSON when the extension is `.json`) plus CLI overrides.
//! Accepts the camelCase keys used by older JSON config files as aliases.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::config::{
    DataFiles, ExportConsts, FanOutConsts, StorageConsts, default_partitions,
};
use crate::{ExportOpts, Operation, SetOpts, Tags};

/// Raw file contents. Every field optional; [`Settings::into_run_config`] decides what is required.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub operation: Option<String>,
    #[serde(alias = "storageName")]
    pub storage_name: Option<String>,
    #[serde(alias = "storageKey")]
    pub storage_key: Option<String>,
    #[serde(alias = "tagFilter")]
    pub tag_filter: Option<String>,
    pub container: Option<String>,
    pub endpoint: Option<String>,
    pub folder: Option<PathBuf>,
    #[serde(alias = "rowsPerFile")]
    pub rows_per_file: Option<usize>,
    #[serde(alias = "filePrefix", alias = "prefix")]
    pub file_prefix: Option<String>,
    #[serde(alias = "pageSize", alias = "maxResults")]
    pub page_size: Option<u32>,
    #[serde(alias = "queueCapacity")]
    pub queue_capacity: Option<usize>,
    #[serde(alias = "maxInFlight")]
    pub max_in_flight: Option<usize>,
    pub partitions: Option<usize>,
    pub tags: Option<Tags>,
    #[serde(alias = "requestTimeoutSecs")]
    pub request_timeout_secs: Option<u64>,
    #[serde(alias = "reportIntervalSecs")]
    pub report_interval_secs: Option<u64>,
    pub verbose: Option<bool>,
}

/// Values given on the command line; each one wins over the file.
#[derive(Clone, Debug, Default)]
pub struct SettingsOverrides {
    pub operation: Option<Operation>,
    pub folder: Option<PathBuf>,
    pub rows_per_file: Option<usize>,
    pub max_in_flight: Option<usize>,
    pub partitions: Option<usize>,
    pub verbose: Option<bool>,
}

/// Validated configuration for one run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub operation: Operation,
    pub account: String,
    /// None when the key has to come from the environment or a prompt.
    pub storage_key: Option<String>,
    pub endpoint: Option<String>,
    pub request_timeout: Duration,
    pub verbose: bool,
    pub export: ExportOpts,
    pub set: SetOpts,
}

/// Load settings from `path`. Missing or unparsable files are fatal.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Configuration file '{}' not found or unreadable", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&raw)
            .with_context(|| format!("Error reading configuration file {}", path.display()))
    } else {
        toml::from_str(&raw)
            .with_context(|| format!("Error reading configuration file {}", path.display()))
    }
}

/// Overwrite a settings field from the CLI when present.
macro_rules! apply_cli_opt {
    ($cli:expr, $settings:expr, $field:ident) => {
        if let Some(ref v) = $cli.$field {
            $settings.$field = Some(v.clone());
        }
    };
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn positive(name: &str, v: usize) -> Result<usize> {
    if v == 0 {
        bail!("Invalid configuration: {name} must be greater than 0");
    }
    Ok(v)
}

impl Settings {
    /// Apply CLI overrides on top of the file values.
    pub fn apply_overrides(&mut self, cli: &SettingsOverrides) {
        if let Some(op) = cli.operation {
            self.operation = Some(op.to_string());
        }
        apply_cli_opt!(cli, self, folder);
        apply_cli_opt!(cli, self, rows_per_file);
        apply_cli_opt!(cli, self, max_in_flight);
        apply_cli_opt!(cli, self, partitions);
        apply_cli_opt!(cli, self, verbose);
    }

    /// Validate and fill defaults. Any error here aborts before a remote call is made.
    pub fn into_run_config(self) -> Result<RunConfig> {
        let operation: Operation = non_empty(self.operation)
            .context("Invalid configuration: operation is required ('export' or 'set')")?
            .parse()?;
        let account = non_empty(self.storage_name)
            .context("Invalid configuration: storageName is required")?;
        let folder = self
            .folder
            .filter(|f| !f.as_os_str().is_empty())
            .context("Invalid configuration: folder is required")?;

        let tag_filter = non_empty(self.tag_filter);
        if operation == Operation::Export && tag_filter.is_none() {
            bail!("Invalid configuration: tagFilter is required for export");
        }

        let file_prefix =
            non_empty(self.file_prefix).unwrap_or_else(|| DataFiles::DEFAULT_PREFIX.to_string());
        if file_prefix.contains(['/', '\\']) {
            bail!("Invalid configuration: filePrefix must not contain path separators");
        }

        let rows_per_file = positive(
            "rowsPerFile",
            self.rows_per_file.unwrap_or(DataFiles::DEFAULT_ROWS_PER_FILE),
        )?;
        let page_size = self.page_size.unwrap_or(ExportConsts::DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            bail!("Invalid configuration: pageSize must be greater than 0");
        }
        let queue_capacity = positive(
            "queueCapacity",
            self.queue_capacity
                .unwrap_or(ExportConsts::DEFAULT_QUEUE_CAPACITY),
        )?;
        let max_in_flight = positive(
            "maxInFlight",
            self.max_in_flight
                .unwrap_or(FanOutConsts::DEFAULT_MAX_IN_FLIGHT),
        )?;
        let partitions = positive(
            "partitions",
            self.partitions.unwrap_or_else(default_partitions),
        )?;
        let request_timeout = self
            .request_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(StorageConsts::DEFAULT_REQUEST_TIMEOUT);
        let report_interval = Duration::from_secs(
            self.report_interval_secs
                .filter(|s| *s > 0)
                .unwrap_or(FanOutConsts::DEFAULT_REPORT_INTERVAL_SECS),
        );
        let verbose = self.verbose.unwrap_or(false);

        Ok(RunConfig {
            operation,
            account,
            storage_key: non_empty(self.storage_key),
            endpoint: non_empty(self.endpoint),
            request_timeout,
            verbose,
            export: ExportOpts {
                tag_filter: tag_filter.unwrap_or_default(),
                container: non_empty(self.container),
                folder: folder.clone(),
                file_prefix: file_prefix.clone(),
                rows_per_file,
                page_size,
                queue_capacity,
            },
            set: SetOpts {
                folder,
                file_prefix,
                tags: self.tags.unwrap_or_default(),
                max_in_flight,
                partitions,
                verbose,
                report_interval,
            },
        })
    }
}
