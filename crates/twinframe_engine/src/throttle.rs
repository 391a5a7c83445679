//! # Frame Throttle
//!
//! The worker's frame source fires at display refresh rate. For the first
//! `warmup_frames` renders only every `cadence`-th tick is let through;
//! after that every tick renders.

use twinframe_shared::WARMUP_CADENCE;

/// Warm-up gate for the worker's render calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameThrottle {
    /// Renders issued.
    frame_index: u64,
    /// Ticks observed.
    frame_count: u64,
    /// Length of the warm-up window, in renders.
    frame_flag: u64,
    cadence: u64,
}

impl FrameThrottle {
    /// Creates a throttle.
    ///
    /// # Arguments
    ///
    /// * `warmup_frames` - Renders gated by the cadence; 0 disables the gate
    /// * `cadence` - Inside the window, render when `frame_count % cadence == 0`
    #[must_use]
    pub const fn new(warmup_frames: u64, cadence: u64) -> Self {
        Self {
            frame_index: 0,
            frame_count: 0,
            frame_flag: warmup_frames,
            cadence: if cadence == 0 { 1 } else { cadence },
        }
    }

    /// Decides one tick. Returns whether it renders.
    #[inline]
    pub fn tick(&mut self) -> bool {
        let render = self.frame_index >= self.frame_flag || self.frame_count % self.cadence == 0;
        if render {
            self.frame_index += 1;
        }
        self.frame_count += 1;
        render
    }

    /// Renders issued so far.
    #[inline]
    #[must_use]
    pub const fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Ticks observed so far.
    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Whether the warm-up window is still open.
    #[inline]
    #[must_use]
    pub const fn in_warmup(&self) -> bool {
        self.frame_index < self.frame_flag
    }
}

impl Default for FrameThrottle {
    fn default() -> Self {
        Self::new(0, WARMUP_CADENCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_gate_renders_every_tick() {
        let mut throttle = FrameThrottle::default();
        assert!((0..500).all(|_| throttle.tick()));
        assert_eq!(throttle.frame_index(), 500);
        assert_eq!(throttle.frame_count(), 500);
    }

    #[test]
    fn test_warmup_renders_on_cadence() {
        let mut throttle = FrameThrottle::new(5, 60);
        let mut rendered = Vec::new();
        for count in 0..400_u64 {
            if throttle.tick() {
                rendered.push(count);
            }
        }

        // Five renders inside the window, one per 60 ticks.
        assert_eq!(&rendered[..5], &[0, 60, 120, 180, 240]);
        // Then every tick.
        assert_eq!(rendered[5], 241);
        assert!(rendered[5..].windows(2).all(|w| w[1] == w[0] + 1));
        assert!(!throttle.in_warmup());
    }

    #[test]
    fn test_counts_every_tick() {
        let mut throttle = FrameThrottle::new(3, 60);
        for _ in 0..59 {
            throttle.tick();
        }
        assert_eq!(throttle.frame_count(), 59);
        assert_eq!(throttle.frame_index(), 1);
        assert!(throttle.in_warmup());
    }

    #[test]
    fn test_zero_cadence_is_clamped() {
        let mut throttle = FrameThrottle::new(2, 0);
        assert!(throttle.tick());
        assert!(throttle.tick());
        assert!(throttle.tick());
    }
}
