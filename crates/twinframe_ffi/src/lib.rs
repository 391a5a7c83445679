//! # Twinframe FFI Bridge
//!
//! Safe value exchange with a compiled module that owns its own linear
//! memory and has no native object model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────── HOST ─────────────────────────────┐
//! │  EngineBridge (typed calls: mouse_move, set_hover, ...)        │
//! │      │                                                         │
//! │      ├── HostState ── HeapTable      (slot -> HostValue)       │
//! │      │            ├── ViewCache      (u8 / i32 / u32 views)    │
//! │      │            ├── ClosureRegistry (refcounts, finalizer)   │
//! │      │            └── IntervalTimers (host-triggered events)   │
//! │      ▼                                                         │
//! │  ForeignModule exports  ◄──────►  HostImports (re-entry)       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! 1. **Explicit pairing** - every heap slot is either freed or owned by a
//!    live closure; nothing is reclaimed implicitly.
//! 2. **Views are tokens** - a [`MemoryView`] is tagged with the byte length
//!    it was built for and refuses to read once memory has grown.
//! 3. **Exceptions stay on their side** - an import that fails stores the
//!    error for the module to pick up instead of unwinding through it.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bridge;
pub mod closure;
pub mod error;
pub mod heap;
pub mod host;
pub mod marshal;
pub mod memory;
pub mod module;
pub mod timers;
pub mod value;

pub use bridge::EngineBridge;
pub use closure::{ClosureRef, ClosureRegistry, Teardown};
pub use error::{FfiError, FfiResult};
pub use heap::{HeapTable, FALSE_SLOT, FIRST_FREE_SLOT, NULL_SLOT, TRUE_SLOT, UNDEFINED_SLOT};
pub use host::{block_for, HostState};
pub use marshal::{array_u32, pass_string, read_string};
pub use memory::{LinearMemory, MemoryView, ViewCache, ViewKind, PAGE_SIZE};
pub use module::{ForeignModule, HostImports, ModuleMemory};
pub use timers::IntervalTimers;
pub use value::HostValue;
