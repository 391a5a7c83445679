//! # Engine Instances
//!
//! One [`SimApp`] per handle. Interaction state lives in [`ActiveInfo`]:
//! hover and selection sets, the dragged item, and the frame budget that
//! input re-arms when auto-animation is off.

use std::sync::Arc;

use twinframe_shared::{OffscreenSurface, PickItem, PickList, REMAINING_FRAMES_ON_INPUT};

use crate::scene::Scene;

/// Interaction state of one instance.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveInfo {
    /// Highlighted items.
    pub hover: PickList,
    /// Selected items.
    pub selection: PickList,
    /// Item following the cursor, if any.
    pub drag: Option<PickItem>,
    /// Cursor position at the last drag step, physical pixels.
    pub last_drag_pos: (f32, f32),
    /// Bound to a transferred surface rather than a page canvas.
    pub is_in_worker: bool,
    /// Whether the scene animates without input.
    pub auto_animate: bool,
    /// Updates still owed to recent input while auto-animation is off.
    pub remaining_frames: u32,
}

impl ActiveInfo {
    /// Fresh state: nothing hovered or selected, auto-animation on.
    #[must_use]
    pub const fn new(is_in_worker: bool) -> Self {
        Self {
            hover: PickList::new(),
            selection: PickList::new(),
            drag: None,
            last_drag_pos: (0.0, 0.0),
            is_in_worker,
            auto_animate: true,
            remaining_frames: 0,
        }
    }

    /// Input arrived: owe a few more frames.
    #[inline]
    pub fn touch(&mut self) {
        self.remaining_frames = REMAINING_FRAMES_ON_INPUT;
    }
}

/// Progress of asynchronous device preparation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PluginsState {
    /// No surface bound yet.
    Adding,
    /// Device creation in flight.
    Preparing,
    /// Device ready; finishing happens on the next poll or frame.
    Ready,
    /// Fully set up; frames update the scene.
    Cleaned,
}

/// What an instance renders into.
#[derive(Clone, Debug, PartialEq)]
pub enum WindowTarget {
    /// A page canvas, by element id.
    Canvas(String),
    /// A surface transferred from the page.
    Offscreen(Arc<OffscreenSurface>),
}

/// Interval timer and closure slot driving preparation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PrepareTimer {
    pub(crate) interval: i32,
    pub(crate) callback: u32,
}

/// One engine instance.
#[derive(Clone, Debug)]
pub struct SimApp {
    pub(crate) info: ActiveInfo,
    pub(crate) window: Option<WindowTarget>,
    pub(crate) scale_factor: f32,
    pub(crate) plugins: PluginsState,
    pub(crate) prepare_steps: u32,
    pub(crate) prepare: Option<PrepareTimer>,
    pub(crate) scene: Scene,
    pending_moves: Vec<(f32, f32)>,
    cursor: Option<(f32, f32)>,
    frames_updated: u64,
    close_requested: bool,
}

impl SimApp {
    /// Creates an instance with no window.
    #[must_use]
    pub fn new(scene: Scene) -> Self {
        Self {
            info: ActiveInfo::new(false),
            window: None,
            scale_factor: 1.0,
            plugins: PluginsState::Adding,
            prepare_steps: 0,
            prepare: None,
            scene,
            pending_moves: Vec::new(),
            cursor: None,
            frames_updated: 0,
            close_requested: false,
        }
    }

    /// Interaction state.
    #[inline]
    #[must_use]
    pub const fn info(&self) -> &ActiveInfo {
        &self.info
    }

    /// Bound window, if any.
    #[inline]
    #[must_use]
    pub const fn window(&self) -> Option<&WindowTarget> {
        self.window.as_ref()
    }

    /// Physical pixels per logical pixel.
    #[inline]
    #[must_use]
    pub const fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    /// Preparation progress.
    #[inline]
    #[must_use]
    pub const fn plugins(&self) -> PluginsState {
        self.plugins
    }

    /// Number of scene updates run.
    #[inline]
    #[must_use]
    pub const fn frames_updated(&self) -> u64 {
        self.frames_updated
    }

    /// Last cursor position, physical pixels.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> Option<(f32, f32)> {
        self.cursor
    }

    /// The scene.
    #[inline]
    #[must_use]
    pub const fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Whether a window-close request was raised.
    #[inline]
    #[must_use]
    pub const fn close_requested(&self) -> bool {
        self.close_requested
    }

    /// Logical to physical pixels.
    #[inline]
    #[must_use]
    pub fn to_physical(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale_factor, y * self.scale_factor)
    }

    pub(crate) fn queue_move(&mut self, position: (f32, f32)) {
        self.pending_moves.push(position);
        self.cursor = Some(position);
    }

    pub(crate) fn request_close(&mut self) {
        self.close_requested = true;
    }

    /// Runs one update. Returns the pick list to publish, if any.
    ///
    /// While dragging, only the last queued move counts and the dragged
    /// item follows it. Otherwise every queued move is ray cast and the
    /// union of hits is returned, first hit first.
    pub(crate) fn update(&mut self, dt: f32) -> Option<PickList> {
        self.frames_updated += 1;
        if self.info.auto_animate {
            self.scene.animate(dt);
        }

        let moves = std::mem::take(&mut self.pending_moves);
        if let Some(dragged) = self.info.drag {
            if let Some(&last) = moves.last() {
                let from = self.info.last_drag_pos;
                self.scene.translate(dragged, (last.0 - from.0, last.1 - from.1));
                self.info.last_drag_pos = last;
            }
            return None;
        }

        let mut picked: Vec<PickItem> = Vec::new();
        for position in moves {
            for item in self.scene.ray_pick(position) {
                if !picked.contains(&item) {
                    picked.push(item);
                }
            }
        }
        if picked.is_empty() {
            None
        } else {
            Some(picked.into())
        }
    }
}
