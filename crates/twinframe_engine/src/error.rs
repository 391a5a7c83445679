//! # Engine Error Types

use thiserror::Error;
use twinframe_ffi::FfiError;
use twinframe_shared::ProtocolError;

/// Errors raised by the coordinators, the worker and the orchestrator.
///
/// Calls that arrive before an instance is ready are NOT errors; they come
/// back as [`crate::Dispatch::Skipped`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The coordinator's instance was released; it accepts no more calls.
    #[error("engine instance was released")]
    Released,

    /// `initialize` ran twice on one coordinator.
    #[error("engine instance already initialized")]
    AlreadyInitialized,

    /// A bridge call failed.
    #[error(transparent)]
    Ffi(#[from] FfiError),

    /// A message could not be built or unpacked.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The other context hung up.
    #[error("message port disconnected")]
    Disconnected,

    /// The worker never came up.
    #[error("worker startup failed: {0}")]
    WorkerStartup(String),

    /// A required platform capability is missing.
    #[error("missing platform capability: {0}")]
    MissingCapability(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
