//! # Twinframe
//!
//! Runs one engine in two execution contexts, a main-thread instance driven
//! by direct foreign calls and a worker instance driven by messages, and
//! keeps their pick, hover and selection state in step.
//!
//! | crate | role |
//! |---|---|
//! | `twinframe_ffi` | foreign-call bridge: heap table, views, marshalling, closures |
//! | `twinframe_shared` | handles, pick lists, message protocol, surfaces |
//! | `twinframe_engine` | coordinators, throttle, worker loop, orchestrator |
//! | `twinframe_sim` | deterministic stand-in for the compiled engine module |
//!
//! This crate adds configuration, logging and the scripted demo session.
//!
//! ## Quick start
//!
//! ```no_run
//! use twinframe::{init_logging, run_session, TwinframeConfig};
//! use twinframe_engine::LogNotifier;
//!
//! let config = TwinframeConfig::load_or_default(None)?;
//! init_logging(config.logging.filter.as_deref());
//! let report = run_session(&config, &LogNotifier)?;
//! println!("{}", report.board_text);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod logging;
pub mod session;

pub use config::{ConfigError, ConfigResult, TwinframeConfig};
pub use logging::init_logging;
pub use session::{run_session, SessionReport};
