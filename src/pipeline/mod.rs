//! Export pipeline: paginated producer → bounded queue → single file writer.

pub mod context;
pub mod orchestrator;
pub mod producer;
pub mod summary;
pub mod writer;

pub use context::{
    ExportChannels, ExportReport, OutputCursor, ProducerReport, WriterReport,
    create_export_channels,
};
pub use orchestrator::{prepare_output_folder, run_export};
pub use producer::run_producer;
pub use summary::log_export_summary;
pub use writer::{BatchWriter, run_writer};
