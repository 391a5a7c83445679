//! # Latency Hooks
//!
//! Synthetic busy-waits used to reproduce slow message handling and slow
//! renders. They spin on the calling thread only.

use twinframe_ffi::block_for;
use twinframe_shared::DEFAULT_WORKER_RENDER_BLOCK_MS;

/// Busy-wait durations in milliseconds. Zero disables a hook.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatencyHooks {
    /// Before the orchestrator handles each worker message.
    pub onmessage_ms: f64,
    /// Before each pointer move is forwarded.
    pub mousemove_ms: f64,
    /// Inside the main-thread instance's render call.
    pub render_ms: f64,
    /// Inside the worker instance's render call, until `blockRender`
    /// changes it.
    pub worker_render_ms: f64,
}

impl LatencyHooks {
    /// All hooks off except the worker's default render wait.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            onmessage_ms: 0.0,
            mousemove_ms: 0.0,
            render_ms: 0.0,
            worker_render_ms: DEFAULT_WORKER_RENDER_BLOCK_MS,
        }
    }

    /// Every hook off.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            onmessage_ms: 0.0,
            mousemove_ms: 0.0,
            render_ms: 0.0,
            worker_render_ms: 0.0,
        }
    }

    /// Runs the message-handling wait.
    #[inline]
    pub fn before_message(&self) {
        block_for(self.onmessage_ms);
    }

    /// Runs the pointer-move wait.
    #[inline]
    pub fn before_mousemove(&self) {
        block_for(self.mousemove_ms);
    }
}

impl Default for LatencyHooks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_hooks_spin() {
        let hooks = LatencyHooks {
            onmessage_ms: 3.0,
            ..LatencyHooks::none()
        };
        let start = Instant::now();
        hooks.before_message();
        assert!(start.elapsed() >= Duration::from_millis(3));

        let start = Instant::now();
        hooks.before_mousemove();
        assert!(start.elapsed() < Duration::from_millis(3));
    }

    #[test]
    fn test_default_worker_render_wait() {
        assert_eq!(LatencyHooks::default().worker_render_ms, 1.0);
        assert_eq!(LatencyHooks::none().worker_render_ms, 0.0);
    }
}
