//! Remote file-transfer seam for the upload benchmark.

use anyhow::Result;
use std::io::Read;

/// A remote endpoint that hands out sessions. Shared by every worker.
pub trait FileTransfer: Send + Sync {
    type Session: TransferSession;

    /// Open a fresh authenticated session.
    fn connect(&self) -> Result<Self::Session>;
}

/// One live connection. Owned by a single worker at a time.
pub trait TransferSession: Send {
    /// True when `remote_path` exists (file or directory).
    fn exists(&mut self, remote_path: &str) -> Result<bool>;

    /// Create a single directory. Fails if the parent is missing or it already exists.
    fn create_dir(&mut self, remote_path: &str) -> Result<()>;

    /// Write `src` to `remote_path`, replacing any existing file. Returns bytes written.
    fn upload(&mut self, src: &mut dyn Read, remote_path: &str) -> Result<u64>;
}
