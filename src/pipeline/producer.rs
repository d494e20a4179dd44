//! Paginated producer: pulls pages from the store and pushes each non-empty page as one batch.

use crossbeam_channel::Sender;
use log::{error, info, warn};
use std::time::Instant;

use super::context::ProducerReport;
use crate::storage::{FindPage, TagQuery, TagStore};
use crate::utils::CancelFlag;
use crate::Batch;

/// Enumerate every page of `query`, sending batches on `batch_tx`.
///
/// Stops on the last page, the first fetch error, cancellation, or when the writer has gone.
/// `batch_tx` is dropped on every one of those paths, so the writer always sees completion.
pub fn run_producer<S>(
    store: &S,
    query: &TagQuery,
    batch_tx: Sender<Batch>,
    cancel: &CancelFlag,
) -> ProducerReport
where
    S: TagStore + ?Sized,
{
    let started = Instant::now();
    let mut report = ProducerReport::default();
    let mut marker: Option<String> = None;

    loop {
        if cancel.is_cancelled() {
            warn!("Enumeration cancelled after {} batches", report.pages);
            report.cancelled = true;
            break;
        }

        let fetch_started = Instant::now();
        let FindPage { blobs, next_marker } = match store.find_page(query, marker.as_deref()) {
            Ok(page) => page,
            Err(e) => {
                error!("Error fetching blobs with tags: {}", e);
                report.error = Some(e.to_string());
                break;
            }
        };
        let fetch_time = fetch_started.elapsed();

        report.pages += 1;
        report.fetch_time += fetch_time;
        report.blobs_found += blobs.len();
        let total = started.elapsed();
        info!(
            "Batch #{} fetched in {:.2} seconds ({} blobs)",
            report.pages,
            fetch_time.as_secs_f64(),
            blobs.len()
        );
        info!(
            "  Average batch time: {:.2} seconds",
            report.average_page_time().as_secs_f64()
        );
        info!("  Total time elapsed: {:.2} minutes", total.as_secs_f64() / 60.0);
        info!(
            "  Estimated throughput: {:.2} blobs/second",
            report.blobs_found as f64 / total.as_secs_f64().max(1.0)
        );

        if !blobs.is_empty() {
            let n = blobs.len();
            if batch_tx.send(Batch::new(blobs)).is_err() {
                warn!("File writer stopped; ending enumeration early");
                report.writer_gone = true;
                break;
            }
            report.blobs_queued += n;
        }

        match next_marker {
            Some(m) => marker = Some(m),
            None => break,
        }
    }

    drop(batch_tx);
    report
}
