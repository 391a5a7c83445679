//! # Twinframe Shared
//!
//! Common types used by both execution contexts.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on the bridge or the engine crates.
//! Everything here is plain data that can be posted between the main
//! thread and the worker.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod error;
pub mod handle;
pub mod pick;
pub mod protocol;
pub mod surface;

pub use constants::{
    DEFAULT_FRAME_INTERVAL_MS, DEFAULT_READY_POLL_MS, DEFAULT_WORKER_RENDER_BLOCK_MS,
    MAIN_CANVAS_ID, REMAINING_FRAMES_ON_INPUT, WARMUP_CADENCE, WORKER_CANVAS_ID,
};
pub use error::{ProtocolError, ProtocolResult};
pub use handle::EngineHandle;
pub use pick::{PickItem, PickList};
pub use protocol::{Envelope, HostMessage, WorkerMessage};
pub use surface::{CanvasElement, OffscreenSurface};
