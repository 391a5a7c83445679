//! # Bridge Error Types
//!
//! Everything that can go wrong while moving data across the module
//! boundary. Heap misses are deliberately NOT here: a freed or unknown slot
//! reads as `undefined`.

use thiserror::Error;

use crate::memory::ViewKind;

/// Errors raised by the foreign-call bridge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FfiError {
    /// Module memory held bytes that are not valid UTF-8.
    #[error("invalid utf-8 at {ptr}+{len}: {reason}")]
    InvalidUtf8 {
        /// Start of the string in module memory.
        ptr: u32,
        /// Byte length of the string.
        len: u32,
        /// Decoder diagnostic.
        reason: String,
    },

    /// A view was used after module memory changed size.
    #[error("stale {kind} view: built for {built} bytes, memory is now {current} bytes")]
    StaleView {
        /// Element type of the view.
        kind: ViewKind,
        /// Byte length the view was built for.
        built: usize,
        /// Current byte length of module memory.
        current: usize,
    },

    /// An access fell outside module memory.
    #[error("access {offset}+{len} outside memory of {size} elements")]
    OutOfBounds {
        /// First element accessed.
        offset: usize,
        /// Number of elements accessed.
        len: usize,
        /// Elements available in the view.
        size: usize,
    },

    /// The module allocator could not satisfy a request.
    #[error("module allocator exhausted: requested {requested} bytes")]
    OutOfMemory {
        /// Bytes requested.
        requested: usize,
    },

    /// A typed access used a pointer that is not a multiple of its element size.
    #[error("pointer {ptr} is not aligned to {align} bytes")]
    Misaligned {
        /// Offending pointer.
        ptr: u32,
        /// Required alignment.
        align: u32,
    },

    /// Memory geometry the module cannot use.
    #[error("page size {0} is not a non-zero multiple of 4")]
    InvalidPageSize(usize),

    /// A closure id has no registered state.
    #[error("closure {0} is not registered")]
    UnknownClosure(u32),

    /// The module raised an error of its own through the `throw` import.
    #[error("module threw: {0}")]
    Thrown(String),
}

/// Result type for bridge operations.
pub type FfiResult<T> = Result<T, FfiError>;
