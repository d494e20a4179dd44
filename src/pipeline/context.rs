//! Export pipeline plumbing: the bounded batch queue and the per-stage reports.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::path::PathBuf;
use std::time::Duration;

use crate::{Batch, RunState};

/// Both ends of the producer → writer queue. The producer owns `batch_tx`; dropping it is the
/// completion signal. The writer owns `batch_rx`; dropping it makes every further send fail fast.
pub struct ExportChannels {
    pub batch_tx: Sender<Batch>,
    pub batch_rx: Receiver<Batch>,
}

pub fn create_export_channels(capacity: usize) -> ExportChannels {
    let (batch_tx, batch_rx) = bounded::<Batch>(capacity.max(1));
    ExportChannels { batch_tx, batch_rx }
}

/// What the paginated producer saw.
#[derive(Clone, Debug, Default)]
pub struct ProducerReport {
    pub pages: usize,
    pub blobs_found: usize,
    /// Blobs handed to the writer (less than `blobs_found` only if the writer stopped early).
    pub blobs_queued: usize,
    /// Sum of page fetch times.
    pub fetch_time: Duration,
    /// First page fetch error; enumeration stopped there.
    pub error: Option<String>,
    pub cancelled: bool,
    /// Writer went away before enumeration finished.
    pub writer_gone: bool,
}

impl ProducerReport {
    pub fn average_page_time(&self) -> Duration {
        if self.pages == 0 {
            Duration::ZERO
        } else {
            self.fetch_time / self.pages as u32
        }
    }
}

/// Position of the writer: current file index and rows already in it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputCursor {
    pub index: usize,
    pub rows: usize,
}

/// What the single writer did.
#[derive(Clone, Debug)]
pub struct WriterReport {
    pub files_written: usize,
    pub rows_written: usize,
    pub cursor: OutputCursor,
    pub error: Option<String>,
    pub cancelled: bool,
    pub elapsed: Duration,
    /// Every file the writer appended to, in index order.
    pub files: Vec<PathBuf>,
}

/// Final result of [`run_export`](crate::pipeline::run_export).
#[derive(Clone, Debug)]
pub struct ExportReport {
    pub state: RunState,
    pub producer: ProducerReport,
    pub writer: WriterReport,
    pub elapsed: Duration,
}

impl ExportReport {
    /// Why the run aborted, if it did.
    pub fn abort_reason(&self) -> Option<String> {
        if self.producer.cancelled || self.writer.cancelled {
            return Some("cancelled by user".to_string());
        }
        if let Some(e) = &self.producer.error {
            return Some(format!("page fetch failed: {e}"));
        }
        self.writer
            .error
            .as_ref()
            .map(|e| format!("file writer failed: {e}"))
    }
}
