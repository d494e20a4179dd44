//! Public and internal types for the export / set pipelines.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// One blob as returned by a tag query: container plus blob name (may contain `/`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlobRef {
    pub container: String,
    pub name: String,
}

impl BlobRef {
    pub fn new(container: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            name: name.into(),
        }
    }
}

/// Line form used in data files: `/container/blobpath`.
impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.container, self.name)
    }
}

/// One page of query results, handed from producer to writer. Never mutated after it is formed.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    blobs: Vec<BlobRef>,
}

impl Batch {
    pub fn new(blobs: Vec<BlobRef>) -> Self {
        Self { blobs }
    }

    pub fn blobs(&self) -> &[BlobRef] {
        &self.blobs
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

/// Tag set written by the `set` operation. Empty clears all tags.
pub type Tags = BTreeMap<String, String>;

/// A data file and the targets parsed from it.
#[derive(Clone, Debug)]
pub struct WorkItem {
    pub path: PathBuf,
    pub targets: Vec<BlobRef>,
    /// Malformed lines dropped while parsing.
    pub skipped: usize,
}

/// Which half of the tool to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Operation {
    /// Query blobs by tag filter and write their names to data files.
    Export,
    /// Read data files and set tags on every listed blob.
    Set,
}

impl FromStr for Operation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "export" => Ok(Operation::Export),
            "set" => Ok(Operation::Set),
            other => Err(anyhow::anyhow!(
                "Unknown operation '{other}'. Supported operations are 'export' and 'set'."
            )),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Export => f.write_str("export"),
            Operation::Set => f.write_str("set"),
        }
    }
}

/// Lifecycle of one run: `Idle → Running → (Completed | Aborted)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Aborted,
}

impl RunState {
    /// Terminal state for a run that was `Running`.
    pub fn finish(aborted: bool) -> Self {
        if aborted {
            RunState::Aborted
        } else {
            RunState::Completed
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted)
    }
}

/// Options for the export path.
#[derive(Clone, Debug)]
pub struct ExportOpts {
    /// Tag filter expression, e.g. `"project" = 'alpha' AND "tier" = 'cold'`.
    pub tag_filter: String,
    /// Restrict the query to one container. None queries the whole account.
    pub container: Option<String>,
    /// Output directory for data files (created if missing).
    pub folder: PathBuf,
    /// Data file name prefix; files are `{prefix}-{n}.txt`.
    pub file_prefix: String,
    /// Row threshold per data file.
    pub rows_per_file: usize,
    /// Requested results per page.
    pub page_size: u32,
    /// Bounded queue capacity between producer and writer (in batches).
    pub queue_capacity: usize,
}

/// Options for the set path.
#[derive(Clone, Debug)]
pub struct SetOpts {
    /// Folder holding `{prefix}-{n}.txt` data files.
    pub folder: PathBuf,
    pub file_prefix: String,
    /// Tags applied to every listed blob.
    pub tags: Tags,
    /// In-flight update cap per file.
    pub max_in_flight: usize,
    /// Number of file groups processed concurrently.
    pub partitions: usize,
    /// Show a per-file progress bar.
    pub verbose: bool,
    /// Time between progress lines.
    pub report_interval: Duration,
}
