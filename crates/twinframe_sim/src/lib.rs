//! # Twinframe Simulated Module
//!
//! A deterministic [`twinframe_ffi::ForeignModule`] used by the demo binary
//! and the test suites in place of a compiled rendering engine.
//!
//! It behaves the way the host expects a real engine module to:
//!
//! - handles come from `init_app` and die in `release_app`
//! - binding a surface starts device preparation on a host interval timer;
//!   readiness is only observable through `is_preparation_completed`
//! - every input call re-arms ten frames of updates
//! - `enter_frame` picks under the cursor and publishes through `send_pick`
//!
//! Nothing here reaches host state except through the import table.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod app;
pub mod module;
pub mod scene;
pub mod space;

pub use app::{ActiveInfo, PluginsState, SimApp, WindowTarget};
pub use module::{SimConfig, SimModule};
pub use scene::{Scene, SceneItem};
pub use space::ModuleSpace;
