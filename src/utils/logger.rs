use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Install the process logger. Dependencies log at WARN; this crate at INFO, or DEBUG when `verbose`.
/// Safe to call more than once (later calls are ignored).
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .filter_module("upload_bench", level)
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME");
            let line = match record.level() {
                Level::Error | Level::Warn => {
                    let level_str = match record.level() {
                        Level::Warn => "WARN".yellow(),
                        Level::Error => "ERROR".red(),
                        _ => unreachable!(),
                    };
                    let path = record.target().to_string().white();
                    format!("[{} {} {}] {}", name.cyan(), level_str, path, record.args())
                }
                Level::Debug | Level::Trace => {
                    format!("[{}] {}", name.cyan(), record.args().to_string().dimmed())
                }
                _ => format!("[{}] {}", name.cyan(), record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .try_init();
}
