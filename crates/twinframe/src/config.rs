//! # Configuration
//!
//! `twinframe.toml`, loaded once at startup. Every field has a default, so
//! an empty file (or no file) is a valid configuration.
//!
//! ```toml
//! [engine]
//! frame_interval_ms = 16
//! warmup_frames = 0
//! device_pixel_ratio = 2.0
//!
//! [latency]
//! onmessage_ms = 0.0
//! worker_render_ms = 1.0
//!
//! [logging]
//! filter = "twinframe=debug"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use twinframe_engine::{LatencyHooks, OrchestratorSettings, PlatformCapabilities, WorkerConfig};
use twinframe_shared::{
    CanvasElement, DEFAULT_FRAME_INTERVAL_MS, DEFAULT_READY_POLL_MS, DEFAULT_WORKER_RENDER_BLOCK_MS, MAIN_CANVAS_ID,
    WARMUP_CADENCE, WORKER_CANVAS_ID,
};
use twinframe_sim::SimConfig;

/// Surface id given to the worker canvas's offscreen surface.
const WORKER_SURFACE_ID: u32 = 1;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config: {0}")]
    Io(String),

    /// The file is not valid TOML for this schema.
    #[error("cannot parse config: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// `[engine]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Frame tick interval for both loops.
    pub frame_interval_ms: u64,
    /// Worker warm-up window in renders; 0 disables it.
    pub warmup_frames: u64,
    /// Worker render cadence inside the warm-up window.
    pub warmup_cadence: u64,
    /// Physical pixels per logical pixel.
    pub device_pixel_ratio: f32,
    /// Canvas the main-thread instance binds by id.
    pub main_canvas_id: String,
    /// Canvas transferred to the worker.
    pub worker_canvas_id: String,
    /// Worker canvas client size in logical pixels.
    pub canvas_size: (u32, u32),
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            warmup_frames: 0,
            warmup_cadence: WARMUP_CADENCE,
            device_pixel_ratio: 1.0,
            main_canvas_id: MAIN_CANVAS_ID.to_string(),
            worker_canvas_id: WORKER_CANVAS_ID.to_string(),
            canvas_size: (800, 600),
        }
    }
}

/// `[latency]`, all in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencySection {
    /// Before handling each worker message.
    pub onmessage_ms: f64,
    /// Before forwarding each pointer move.
    pub mousemove_ms: f64,
    /// Main-thread render wait.
    pub render_ms: f64,
    /// Initial worker render wait.
    pub worker_render_ms: f64,
}

impl Default for LatencySection {
    fn default() -> Self {
        Self {
            onmessage_ms: 0.0,
            mousemove_ms: 0.0,
            render_ms: 0.0,
            worker_render_ms: DEFAULT_WORKER_RENDER_BLOCK_MS,
        }
    }
}

/// `[startup]`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupSection {
    /// Readiness re-check interval before `init`.
    pub ready_poll_interval_ms: u64,
    /// Give up on the worker after this long.
    pub ready_timeout_ms: u64,
}

impl Default for StartupSection {
    fn default() -> Self {
        Self {
            ready_poll_interval_ms: DEFAULT_READY_POLL_MS,
            ready_timeout_ms: 10_000,
        }
    }
}

/// `[capabilities]`: what the platform probe reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitySection {
    /// A GPU adapter is available.
    pub gpu_adapter: bool,
    /// Canvas control can move to a worker.
    pub offscreen_surface: bool,
}

impl Default for CapabilitySection {
    fn default() -> Self {
        Self {
            gpu_adapter: true,
            offscreen_surface: true,
        }
    }
}

/// `[logging]`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directives. Falls back to `RUST_LOG`, then `info`.
    pub filter: Option<String>,
}

/// `[demo]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSection {
    /// How long the scripted session runs.
    pub duration_ms: u64,
    /// Pointer positions in logical pixels, visited in a loop.
    pub path: Vec<(f32, f32)>,
    /// Ticks between path steps.
    pub step_every: u32,
    /// Click after every step that has a pick.
    pub click: bool,
}

impl Default for DemoSection {
    fn default() -> Self {
        Self {
            duration_ms: 1_000,
            path: vec![(10.0, 20.0), (120.0, 120.0), (320.0, 320.0), (700.0, 700.0)],
            step_every: 6,
            click: true,
        }
    }
}

/// The whole file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwinframeConfig {
    /// Frame loops and surfaces.
    pub engine: EngineSection,
    /// Synthetic busy-waits.
    pub latency: LatencySection,
    /// Worker startup.
    pub startup: StartupSection,
    /// Platform probe result.
    pub capabilities: CapabilitySection,
    /// Log filter.
    pub logging: LoggingSection,
    /// Scripted session.
    pub demo: DemoSection,
    /// Simulated module tunables, shared by both instances.
    pub sim: SimConfig,
}

impl TwinframeConfig {
    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`], [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Loads `path` if given, otherwise the defaults.
    ///
    /// # Errors
    ///
    /// As [`Self::load`].
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Range checks.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.engine.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid("engine.frame_interval_ms must be positive".into()));
        }
        if self.engine.warmup_cadence == 0 {
            return Err(ConfigError::Invalid("engine.warmup_cadence must be positive".into()));
        }
        let ratio = self.engine.device_pixel_ratio;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "engine.device_pixel_ratio must be a positive number, got {ratio}"
            )));
        }
        let latencies = [
            ("latency.onmessage_ms", self.latency.onmessage_ms),
            ("latency.mousemove_ms", self.latency.mousemove_ms),
            ("latency.render_ms", self.latency.render_ms),
            ("latency.worker_render_ms", self.latency.worker_render_ms),
        ];
        if let Some((name, _)) = latencies.iter().find(|(_, ms)| !ms.is_finite() || *ms < 0.0) {
            return Err(ConfigError::Invalid(format!("{name} must be a non-negative number")));
        }
        if self.demo.step_every == 0 {
            return Err(ConfigError::Invalid("demo.step_every must be positive".into()));
        }
        let sim = &self.sim;
        if sim.page_size == 0 || sim.page_size % 4 != 0 {
            return Err(ConfigError::Invalid(format!(
                "sim.page_size must be a non-zero multiple of 4, got {}",
                sim.page_size
            )));
        }
        if sim.initial_pages.checked_mul(sim.page_size).is_none() {
            return Err(ConfigError::Invalid("sim.initial_pages * sim.page_size overflows".into()));
        }
        if sim.max_pages < sim.initial_pages {
            return Err(ConfigError::Invalid(format!(
                "sim.max_pages ({}) is below sim.initial_pages ({})",
                sim.max_pages, sim.initial_pages
            )));
        }
        Ok(())
    }

    /// Frame tick interval.
    #[inline]
    #[must_use]
    pub const fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.engine.frame_interval_ms)
    }

    /// Platform probe result.
    #[must_use]
    pub const fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities {
            gpu_adapter: self.capabilities.gpu_adapter,
            offscreen_surface: self.capabilities.offscreen_surface,
        }
    }

    /// Latency hooks.
    #[must_use]
    pub const fn latency(&self) -> LatencyHooks {
        LatencyHooks {
            onmessage_ms: self.latency.onmessage_ms,
            mousemove_ms: self.latency.mousemove_ms,
            render_ms: self.latency.render_ms,
            worker_render_ms: self.latency.worker_render_ms,
        }
    }

    /// Worker loop settings.
    #[must_use]
    pub const fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            frame_interval: self.frame_interval(),
            warmup_frames: self.engine.warmup_frames,
            warmup_cadence: self.engine.warmup_cadence,
            render_block_ms: self.latency.worker_render_ms,
        }
    }

    /// Orchestrator settings, with a fresh worker canvas.
    #[must_use]
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        let ratio = self.engine.device_pixel_ratio;
        OrchestratorSettings {
            device_pixel_ratio: ratio,
            main_canvas_id: self.engine.main_canvas_id.clone(),
            worker_canvas: CanvasElement::new(
                &self.engine.worker_canvas_id,
                WORKER_SURFACE_ID,
                self.engine.canvas_size,
                ratio,
            ),
            ready_poll_interval: Duration::from_millis(self.startup.ready_poll_interval_ms),
            ready_timeout: Duration::from_millis(self.startup.ready_timeout_ms),
            latency: self.latency(),
            worker: self.worker_config(),
        }
    }
}
