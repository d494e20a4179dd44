//! CLI command handlers: tagsweep export/set and the upload benchmark.

use anyhow::{Result, bail};
use log::{debug, info};
use std::path::Path;

use crate::engine::arg_parser::Cli;
use crate::fanout::run_set_tags;
use crate::pipeline::run_export;
use crate::storage::{AzureBlobClient, AzureBlobConfig};
use crate::utils::config::PackagePaths;
use crate::utils::{CancelFlag, RunConfig, load_settings, resolve_secret, setup_logging};
use crate::{Operation, RunState};

fn storage_key(config: &RunConfig) -> Result<String> {
    if let Some(key) = &config.storage_key {
        return Ok(key.clone());
    }
    resolve_secret(
        PackagePaths::get().storage_key_env(),
        Path::new("."),
        "storage account key",
    )
}

/// Load the config file, apply CLI overrides, then run export or set against the storage account.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let mut settings = load_settings(&cli.config)?;
    settings.apply_overrides(&cli.overrides());
    let config = settings.into_run_config()?;

    setup_logging(config.verbose);
    debug!(
        "{} CONFIG: operation={}, account={}, endpoint={:?}",
        PackagePaths::get().pkg_name().to_uppercase(),
        config.operation,
        config.account,
        config.endpoint
    );
    let cancel = CancelFlag::install_ctrlc()?;

    let client = AzureBlobClient::new(AzureBlobConfig {
        account: config.account.clone(),
        key: storage_key(&config)?,
        endpoint: config.endpoint.clone(),
        timeout: config.request_timeout,
    })?;

    let state = match config.operation {
        Operation::Export => {
            let report = run_export(&client, &config.export, &cancel)?;
            if let Some(reason) = report.abort_reason() {
                bail!("Export aborted: {reason}");
            }
            report.state
        }
        Operation::Set => run_set_tags(&client, &config.set, &cancel)?.state,
    };
    if state == RunState::Aborted {
        bail!("{} operation aborted", config.operation);
    }
    info!("{} operation finished", config.operation);
    Ok(())
}

#[cfg(feature = "sftp")]
pub use bench_handler::handle_bench;

#[cfg(feature = "sftp")]
mod bench_handler {
    use anyhow::{Result, bail};
    use std::path::Path;
    use std::time::Duration;

    use crate::RunState;
    use crate::bench::sftp::SftpTransfer;
    use crate::bench::{BenchOpts, run_upload_bench};
    use crate::engine::arg_parser::BenchCli;
    use crate::utils::{CancelFlag, resolve_secret, setup_logging};

    /// Run the upload benchmark against the SFTP server named on the command line.
    pub fn handle_bench(cli: &BenchCli) -> Result<()> {
        setup_logging(cli.verbose.unwrap_or(false));
        let cancel = CancelFlag::install_ctrlc()?;

        let password = match &cli.password {
            Some(p) if !p.is_empty() => p.clone(),
            _ => resolve_secret("UPLOAD_BENCH_PASSWORD", Path::new("."), "SFTP password")?,
        };
        let transfer = SftpTransfer {
            host: cli.host.clone(),
            port: cli.port,
            user: cli.user.clone(),
            password,
        };
        let opts = BenchOpts {
            source: cli.source.clone(),
            target: cli
                .target
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            threads: cli.threads,
            recursive: cli.recursive,
            connect_per_file: cli.connect_per_file,
            report_interval: Duration::from_secs(cli.interval.max(1)),
        };

        let report = run_upload_bench(&transfer, &opts, &cancel)?;
        if report.state == RunState::Aborted {
            bail!("Upload benchmark aborted");
        }
        Ok(())
    }
}
