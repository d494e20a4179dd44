//! Shared cancellation flag, set by Ctrl+C and polled by every loop in the run.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag wired to Ctrl+C. Can only be installed once per process.
    pub fn install_ctrlc() -> Result<Self> {
        let flag = Self::new();
        let handler_flag = flag.clone();
        ctrlc::set_handler(move || {
            log::warn!("Cancellation requested; finishing in-flight work...");
            handler_flag.cancel();
        })
        .context("set Ctrl+C handler")?;
        Ok(flag)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
