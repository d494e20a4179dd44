//! Data file discovery, partitioning and line parsing for the set path.

use anyhow::{Context, Result};
use log::warn;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::utils::config::DataFiles;
use crate::{BlobRef, WorkItem};

/// What one data file line turned into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineOutcome {
    Blank,
    Target(BlobRef),
    Malformed,
}

/// `{prefix}-{n}.txt` files directly inside `folder`, ordered by `n`.
pub fn list_data_files(folder: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut indexed: Vec<(usize, PathBuf)> = fs::read_dir(folder)
        .with_context(|| format!("read data folder {}", folder.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|entry| {
            let name = entry.file_name();
            let idx = DataFiles::index_of(prefix, name.to_str()?)?;
            Some((idx, entry.path()))
        })
        .collect();
    indexed.sort_by_key(|(idx, _)| *idx);
    Ok(indexed.into_iter().map(|(_, p)| p).collect())
}

/// Split `files` into contiguous groups of `ceil(len / partitions)`. Never returns empty groups.
pub fn partition_files(files: &[PathBuf], partitions: usize) -> Vec<Vec<PathBuf>> {
    if files.is_empty() {
        return Vec::new();
    }
    let size = files.len().div_ceil(partitions.max(1));
    files.chunks(size).map(|c| c.to_vec()).collect()
}

/// `/container/path/to/blob` (leading `/` optional). Container and path must both be non-empty.
pub fn parse_target_line(line: &str) -> LineOutcome {
    let line = line.trim();
    if line.is_empty() {
        return LineOutcome::Blank;
    }
    let body = line.strip_prefix('/').unwrap_or(line);
    match body.split_once('/') {
        Some((container, name)) if !container.is_empty() && !name.is_empty() => {
            LineOutcome::Target(BlobRef::new(container, name))
        }
        _ => LineOutcome::Malformed,
    }
}

/// Read a data file and parse every line. Malformed lines are warned about and counted.
pub fn load_work_item(path: &Path) -> io::Result<WorkItem> {
    let text = fs::read_to_string(path)?;
    let mut targets = Vec::new();
    let mut skipped = 0;
    for (lineno, line) in text.lines().enumerate() {
        match parse_target_line(line) {
            LineOutcome::Blank => {}
            LineOutcome::Target(blob) => targets.push(blob),
            LineOutcome::Malformed => {
                warn!(
                    "Invalid blob name format in {} line {}: {}",
                    path.display(),
                    lineno + 1,
                    line.trim()
                );
                skipped += 1;
            }
        }
    }
    Ok(WorkItem {
        path: path.to_path_buf(),
        targets,
        skipped,
    })
}
