//! # Twinframe Demo
//!
//! Usage: `twinframe_demo [path/to/twinframe.toml]`
//!
//! Launches the worker and main-thread instances over the simulated module,
//! walks the pointer along the configured path and reports what both
//! contexts picked.

use std::path::PathBuf;
use std::process::ExitCode;

use twinframe::{init_logging, run_session, TwinframeConfig};
use twinframe_engine::LogNotifier;

fn main() -> ExitCode {
    let path = std::env::args_os().nth(1).map(PathBuf::from);

    let config = match TwinframeConfig::load_or_default(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("twinframe_demo: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.logging.filter.as_deref());

    match run_session(&config, &LogNotifier) {
        Ok(report) => {
            println!("ticks:           {}", report.ticks);
            println!("main renders:    {}", report.main_renders);
            println!("worker messages: {}", report.messages);
            println!("picks displayed: {}", report.picks_displayed);
            println!("pick list:       {}", report.board_text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "session failed");
            ExitCode::FAILURE
        }
    }
}
