//! In-process [`TagStore`] used by the test suite.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::error::{Error, Result};
use super::{FindPage, TagQuery, TagStore};
use crate::{BlobRef, Tags};

/// Serves a fixed list of matching blobs page by page and records every tag write.
/// Markers are decimal offsets into the list.
#[derive(Debug, Default)]
pub struct MemoryStore {
    matching: Vec<BlobRef>,
    /// Page index (0-based) whose fetch fails.
    fail_page: Option<usize>,
    /// Blob lines (`/container/name`) whose tag write fails.
    fail_blobs: HashSet<String>,
    set_delay: Duration,
    pages_served: AtomicUsize,
    writes: Mutex<Vec<(BlobRef, Tags)>>,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl MemoryStore {
    pub fn new(matching: Vec<BlobRef>) -> Self {
        Self {
            matching,
            ..Self::default()
        }
    }

    pub fn fail_on_page(mut self, page: usize) -> Self {
        self.fail_page = Some(page);
        self
    }

    pub fn fail_on_blob(mut self, blob: &BlobRef) -> Self {
        self.fail_blobs.insert(blob.to_string());
        self
    }

    /// Sleep inside every `set_tags` call (makes concurrency observable).
    pub fn with_set_delay(mut self, delay: Duration) -> Self {
        self.set_delay = delay;
        self
    }

    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::Relaxed)
    }

    /// Every successful tag write so far, in completion order.
    pub fn writes(&self) -> Vec<(BlobRef, Tags)> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Highest number of `set_tags` calls observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_active.load(Ordering::Relaxed)
    }
}

impl TagStore for MemoryStore {
    fn find_page(&self, query: &TagQuery, marker: Option<&str>) -> Result<FindPage> {
        let page = self.pages_served.fetch_add(1, Ordering::Relaxed);
        if self.fail_page == Some(page) {
            return Err(Error::Other(format!("injected failure on page {page}")));
        }
        let offset = match marker {
            Some(m) => m
                .parse::<usize>()
                .map_err(|_| Error::Other(format!("bad marker '{m}'")))?,
            None => 0,
        };
        let page_size = (query.page_size as usize).max(1);
        let in_scope: Vec<&BlobRef> = self
            .matching
            .iter()
            .filter(|b| query.container.as_ref().is_none_or(|c| &b.container == c))
            .collect();
        let end = (offset + page_size).min(in_scope.len());
        let blobs = in_scope
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|b| (*b).clone())
            .collect();
        let next_marker = (end < in_scope.len()).then(|| end.to_string());
        Ok(FindPage { blobs, next_marker })
    }

    fn set_tags(&self, blob: &BlobRef, tags: &Tags) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now, Ordering::SeqCst);
        if !self.set_delay.is_zero() {
            std::thread::sleep(self.set_delay);
        }
        let result = if self.fail_blobs.contains(&blob.to_string()) {
            Err(Error::Status {
                status: 404,
                body: "BlobNotFound".to_string(),
            })
        } else {
            if let Ok(mut writes) = self.writes.lock() {
                writes.push((blob.clone(), tags.clone()));
            }
            Ok(())
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
