//! Progress bar utilities for displaying processing status

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};

/// Configuration for creating a progress bar
pub struct ProgressBarConfig {
    pub total: usize,
    pub desc: &'static str,
    pub animation: Animation,
}

impl ProgressBarConfig {
    pub fn new(total: usize, desc: &'static str, animation: Animation) -> Self {
        Self {
            total,
            desc,
            animation,
        }
    }
}

/// Create a progress bar with the given configuration
pub fn create_progress_bar(config: ProgressBarConfig) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = config.total,
        desc = config.desc,
        animation = config.animation,
        unit = " files"
    )))
}

/// Advance the bar by `n`. Called once per file, so contention is low.
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    if let Ok(mut pb) = pb.lock() {
        let _ = pb.update(n);
    }
}

pub type ProgressBar = Arc<Mutex<Bar>>;
