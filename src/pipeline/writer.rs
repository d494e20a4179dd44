//! Single writer: drains the batch queue into `{prefix}-{n}.txt` files, rolling at the row threshold.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{error, info, warn};
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::context::{OutputCursor, WriterReport};
use crate::utils::CancelFlag;
use crate::utils::config::{DataFiles, ExportConsts};
use crate::{Batch, BlobRef};

/// Owns the output cursor. Appends to the current file (creating it if needed) and advances the
/// index once the file holds `rows_per_file` rows. A batch that crosses the threshold is split
/// at the threshold line; a file never holds more than `rows_per_file` rows from this writer.
#[derive(Debug)]
pub struct BatchWriter {
    folder: PathBuf,
    prefix: String,
    rows_per_file: usize,
    cursor: OutputCursor,
    rows_written: usize,
    files: Vec<PathBuf>,
}

impl BatchWriter {
    pub fn new(folder: &Path, prefix: &str, rows_per_file: usize) -> Self {
        Self {
            folder: folder.to_path_buf(),
            prefix: prefix.to_string(),
            rows_per_file: rows_per_file.max(1),
            cursor: OutputCursor {
                index: DataFiles::FIRST_INDEX,
                rows: 0,
            },
            rows_written: 0,
            files: Vec::new(),
        }
    }

    /// Writer that continues after the data files already in `folder`. The highest-numbered
    /// file is appended to while it holds fewer than `rows_per_file` complete lines; otherwise
    /// writing starts at the next index. Directories named like data files are ignored.
    pub fn open(folder: &Path, prefix: &str, rows_per_file: usize) -> io::Result<Self> {
        let mut writer = Self::new(folder, prefix, rows_per_file);
        let Some(last) = last_data_file_index(folder, prefix)? else {
            return Ok(writer);
        };
        let contents = fs::read(writer.folder.join(DataFiles::file_name(prefix, last)))?;
        let rows = contents.iter().filter(|&&b| b == b'\n').count();
        let whole_lines = contents.last().is_none_or(|&b| b == b'\n');
        writer.cursor = if rows < writer.rows_per_file && whole_lines {
            OutputCursor { index: last, rows }
        } else {
            OutputCursor {
                index: last + 1,
                rows: 0,
            }
        };
        info!(
            "Resuming output at {} ({} existing rows)",
            writer.current_path().display(),
            writer.cursor.rows
        );
        Ok(writer)
    }

    pub fn cursor(&self) -> OutputCursor {
        self.cursor
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Files appended to so far, in index order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn current_path(&self) -> PathBuf {
        self.folder
            .join(DataFiles::file_name(&self.prefix, self.cursor.index))
    }

    pub fn write_batch(&mut self, batch: &Batch) -> io::Result<()> {
        let mut remaining = batch.blobs();
        while !remaining.is_empty() {
            let room = self.rows_per_file - self.cursor.rows;
            let (chunk, rest) = remaining.split_at(room.min(remaining.len()));
            self.append_lines(chunk)?;
            self.cursor.rows += chunk.len();
            self.rows_written += chunk.len();
            if self.cursor.rows >= self.rows_per_file {
                self.cursor.index += 1;
                self.cursor.rows = 0;
            }
            remaining = rest;
        }
        Ok(())
    }

    fn append_lines(&mut self, blobs: &[BlobRef]) -> io::Result<()> {
        let path = self.current_path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        if self.files.last() != Some(&path) {
            self.files.push(path);
        }
        let mut out = BufWriter::new(file);
        for blob in blobs {
            writeln!(out, "{}", blob)?;
        }
        out.flush()
    }
}

/// Highest `{prefix}-{n}.txt` index among the regular files in `folder`.
pub fn last_data_file_index(folder: &Path, prefix: &str) -> io::Result<Option<usize>> {
    let mut last = None;
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(n) = entry
            .file_name()
            .to_str()
            .and_then(|name| DataFiles::index_of(prefix, name))
        {
            last = last.max(Some(n));
        }
    }
    Ok(last)
}

/// Writer loop: poll `batch_rx` with a short timeout until the producer disconnects, the run is
/// cancelled, or a write fails. Dropping `batch_rx` on exit unblocks a producer stuck on a full queue.
pub fn run_writer(
    batch_rx: Receiver<Batch>,
    mut writer: BatchWriter,
    cancel: &CancelFlag,
) -> WriterReport {
    let started = Instant::now();
    let mut error_msg = None;
    let mut cancelled = false;

    loop {
        if cancel.is_cancelled() {
            warn!("File writer: operation was cancelled");
            cancelled = true;
            break;
        }
        match batch_rx.recv_timeout(ExportConsts::WRITER_POLL_INTERVAL) {
            Ok(batch) => {
                if let Err(e) = writer.write_batch(&batch) {
                    error!(
                        "File writer error on {}: {}",
                        writer.current_path().display(),
                        e
                    );
                    error_msg = Some(e.to_string());
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    drop(batch_rx);

    let elapsed = started.elapsed();
    info!(
        "File writer completed: {} files written with {} blobs in {:.2} seconds",
        writer.files().len(),
        writer.rows_written(),
        elapsed.as_secs_f64()
    );

    WriterReport {
        files_written: writer.files().len(),
        rows_written: writer.rows_written(),
        cursor: writer.cursor(),
        error: error_msg,
        cancelled,
        elapsed,
        files: writer.files,
    }
}
