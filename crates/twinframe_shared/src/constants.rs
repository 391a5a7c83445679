//! # Shared Constants
//!
//! Values both contexts must agree on. Anything tunable at runtime lives in
//! the `twinframe` config instead; these are the defaults it falls back to.

// =============================================================================
// FRAME LOOP
// =============================================================================

/// Interval between animation-frame ticks (~60Hz display refresh).
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

/// Inside the warm-up window only every Nth tick issues a render.
pub const WARMUP_CADENCE: u64 = 60;

/// Frames the engine keeps updating after any input call when
/// auto-animation is off.
pub const REMAINING_FRAMES_ON_INPUT: u32 = 10;

// =============================================================================
// STARTUP
// =============================================================================

/// How often the orchestrator re-checks worker readiness before `init`.
pub const DEFAULT_READY_POLL_MS: u64 = 50;

/// Initial synthetic render busy-wait inside the worker.
pub const DEFAULT_WORKER_RENDER_BLOCK_MS: f64 = 1.0;

// =============================================================================
// SURFACES
// =============================================================================

/// Element id of the canvas the main-thread instance renders into.
pub const MAIN_CANVAS_ID: &str = "main-thread-canvas";

/// Element id of the canvas whose control is transferred to the worker.
pub const WORKER_CANVAS_ID: &str = "worker-thread-canvas";
