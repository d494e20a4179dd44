//! Object-storage collaborator: paginated tag queries and per-blob tag writes.

pub mod auth;
pub mod azure;
pub mod error;
pub mod memory;
pub mod xml;

pub use azure::{AzureBlobClient, AzureBlobConfig};
pub use error::{Error, Result};
pub use memory::MemoryStore;

use crate::{BlobRef, Tags};

/// Parameters for one tag query, shared by every page request.
#[derive(Clone, Debug)]
pub struct TagQuery {
    pub filter: String,
    /// Restrict to one container; None queries the whole account.
    pub container: Option<String>,
    pub page_size: u32,
}

/// One page of results and the continuation marker, if any.
#[derive(Clone, Debug, Default)]
pub struct FindPage {
    pub blobs: Vec<BlobRef>,
    pub next_marker: Option<String>,
}

/// Remote store operations used by export (`find_page`) and set (`set_tags`).
/// Implementations are called from several threads at once.
pub trait TagStore: Send + Sync {
    /// Fetch the page starting at `marker` (None for the first page).
    fn find_page(&self, query: &TagQuery, marker: Option<&str>) -> Result<FindPage>;

    /// Replace the tag set of `blob` with `tags`.
    fn set_tags(&self, blob: &BlobRef, tags: &Tags) -> Result<()>;
}
