//! tagsweep CLI: export blobs by tag filter to data files, or set tags from them.

use anyhow::Result;
use clap::Parser;
use std::time::Instant;
use tagsweep::engine::arg_parser::Cli;
use tagsweep::engine::handle_run;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
