use log::{info, warn};

use super::context::ExportReport;
use crate::RunState;
use crate::utils::config::ExportConsts;

/// Log the end-of-run export statistics, including the billion-blob extrapolation.
pub fn log_export_summary(report: &ExportReport) {
    let producer = &report.producer;
    let secs = report.elapsed.as_secs_f64();

    if report.state == RunState::Aborted {
        warn!(
            "Export aborted ({}); {} blobs already written to {} files remain readable",
            report.abort_reason().unwrap_or_else(|| "unknown".to_string()),
            report.writer.rows_written,
            report.writer.files_written
        );
    } else {
        info!("Export completed. Total blobs: {}", producer.blobs_found);
    }
    info!(
        "Total batches: {}, Average batch time: {:.2} seconds",
        producer.pages,
        producer.average_page_time().as_secs_f64()
    );
    info!("Total run time: {:.2} minutes", secs / 60.0);
    info!(
        "Final throughput: {:.2} blobs/second",
        producer.blobs_found as f64 / secs.max(f64::EPSILON)
    );

    if producer.pages > 0 && producer.blobs_found > 0 {
        let hours_per_blob = secs / 3600.0 / producer.blobs_found as f64;
        info!(
            "Extrapolated time for 1 billion blobs: {:.2} hours",
            hours_per_blob * ExportConsts::EXTRAPOLATION_TARGET
        );
        info!(
            "Estimated blobs per batch: {}",
            producer.blobs_found / producer.pages
        );
    }
}
