//! # Platform Capability Check
//!
//! Startup refuses to continue on a platform that cannot run the engine.
//! The user is told exactly once, through a blocking notification.

use crate::error::{EngineError, EngineResult};

/// Shown when a required capability is missing.
pub const UNSUPPORTED_PLATFORM_MESSAGE: &str = "Please use a browser with WebGPU support (Chrome or Edge 113+)";

/// What the platform probe found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlatformCapabilities {
    /// A GPU adapter could be requested.
    pub gpu_adapter: bool,
    /// Canvas control can be transferred to a worker.
    pub offscreen_surface: bool,
}

impl PlatformCapabilities {
    /// Everything available.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            gpu_adapter: true,
            offscreen_surface: true,
        }
    }

    /// Name of the first missing capability.
    #[must_use]
    pub const fn missing(&self) -> Option<&'static str> {
        if !self.gpu_adapter {
            Some("gpu_adapter")
        } else if !self.offscreen_surface {
            Some("offscreen_surface")
        } else {
            None
        }
    }
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self::full()
    }
}

/// Blocking user notification (an alert dialog on the page).
pub trait Notifier {
    /// Shows `message` and returns once the user dismissed it.
    fn notify_blocking(&self, message: &str);
}

/// Writes the notification to the error log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_blocking(&self, message: &str) {
        tracing::error!("{message}");
    }
}

/// Aborts startup if anything is missing.
///
/// # Errors
///
/// [`EngineError::MissingCapability`] naming the first missing capability,
/// after exactly one notification.
pub fn check_capabilities(capabilities: &PlatformCapabilities, notifier: &dyn Notifier) -> EngineResult<()> {
    match capabilities.missing() {
        Some(name) => {
            notifier.notify_blocking(UNSUPPORTED_PLATFORM_MESSAGE);
            Err(EngineError::MissingCapability(name.to_string()))
        }
        None => Ok(()),
    }
}
