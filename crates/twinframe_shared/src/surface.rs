//! Rendering surfaces.
//!
//! A page canvas can hand control of its pixels to an [`OffscreenSurface`]
//! exactly once. The surface is move-only: it travels to the worker in the
//! transfer slot of the `init` envelope and can never come back.

/// A rendering surface detached from its page canvas.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct OffscreenSurface {
    id: u32,
    width: u32,
    height: u32,
}

impl OffscreenSurface {
    /// Creates a surface with the given physical size.
    #[must_use]
    pub const fn new(id: u32, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }

    /// Identifier of the canvas this surface was detached from.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Physical width in pixels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Physical height in pixels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }
}

/// A canvas element on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasElement {
    element_id: String,
    surface_id: u32,
    width: u32,
    height: u32,
    transferred: bool,
}

impl CanvasElement {
    /// Creates a canvas sized in logical pixels; the backing store is
    /// scaled by `pixel_ratio`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn new(element_id: impl Into<String>, surface_id: u32, client: (u32, u32), pixel_ratio: f32) -> Self {
        Self {
            element_id: element_id.into(),
            surface_id,
            width: (client.0 as f32 * pixel_ratio).round() as u32,
            height: (client.1 as f32 * pixel_ratio).round() as u32,
            transferred: false,
        }
    }

    /// The element id the main-thread instance binds by.
    #[inline]
    #[must_use]
    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    /// Backing store size in physical pixels.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether control has already been handed to an offscreen surface.
    #[inline]
    #[must_use]
    pub const fn is_transferred(&self) -> bool {
        self.transferred
    }

    /// Detaches the canvas pixels into an offscreen surface.
    ///
    /// Returns `None` on every call after the first.
    pub fn transfer_control_to_offscreen(&mut self) -> Option<OffscreenSurface> {
        if self.transferred {
            return None;
        }
        self.transferred = true;
        Some(OffscreenSurface::new(self.surface_id, self.width, self.height))
    }
}
