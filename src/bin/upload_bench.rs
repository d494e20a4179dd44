//! upload-bench: bulk SFTP upload throughput with parallel connections.

use anyhow::Result;
use clap::Parser;
use std::time::Instant;
use tagsweep::engine::arg_parser::BenchCli;
use tagsweep::engine::handle_bench;

fn main() -> Result<()> {
    let start_time = Instant::now();
    // Flags fall back to UPLOAD_BENCH_* variables, which may live in .env.
    dotenvy::dotenv().ok();
    let cli = BenchCli::parse();
    handle_bench(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
