//! # Engine Instance Coordinator
//!
//! One coordinator per execution context. It owns the bridge, the handle
//! the module gave out, and the lifecycle around it:
//!
//! ```text
//! Created ──initialize──► Initializing ──bind_*──► AwaitingReadiness
//!                                                       │ tick polls
//!                                                       ▼
//!              Released ◄──release── Running ◄──start/stop──► Stopped
//! ```
//!
//! Input and frame calls made before readiness are skipped, not errors.
//! Anything after `release` fails with [`EngineError::Released`].

use std::time::Instant;

use twinframe_ffi::{EngineBridge, ForeignModule};
use twinframe_shared::{EngineHandle, OffscreenSurface, PickItem, PickList};

use crate::error::{EngineError, EngineResult};
use crate::throttle::FrameThrottle;

/// Observable lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorState {
    /// No handle yet.
    Created,
    /// Handle created, no surface bound.
    Initializing,
    /// Surface bound, module still preparing.
    AwaitingReadiness,
    /// Ready and rendering on every tick.
    Running,
    /// Ready, but ticks skip the render call.
    Stopped,
    /// Handle released. Terminal.
    Released,
}

/// Whether a gated call reached the module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// The call was made.
    Issued,
    /// Not ready yet (or nothing to act on); nothing was called.
    Skipped,
}

impl Dispatch {
    /// Whether the call was made.
    #[inline]
    #[must_use]
    pub const fn issued(self) -> bool {
        matches!(self, Self::Issued)
    }
}

/// What one frame tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No surface bound yet.
    Unbound,
    /// The loop is stopped.
    Paused,
    /// Readiness polled, still preparing.
    Preparing,
    /// Readiness polled and observed on this tick.
    BecameReady,
    /// The warm-up throttle held this tick back.
    Throttled,
    /// The module advanced one frame.
    Rendered,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Created,
    Initializing,
    AwaitingReadiness,
    Ready,
    Released,
}

/// Lifecycle owner of one engine instance.
pub struct EngineCoordinator<M> {
    bridge: EngineBridge<M>,
    context: &'static str,
    handle: EngineHandle,
    phase: Phase,
    running: bool,
    throttle: Option<FrameThrottle>,
    frames_rendered: u64,
}

impl<M: ForeignModule> EngineCoordinator<M> {
    /// Wraps an instantiated module.
    ///
    /// # Arguments
    ///
    /// * `module` - The instantiated module
    /// * `context` - Name of the owning execution context, for logs
    #[must_use]
    pub fn new(module: M, context: &'static str) -> Self {
        Self {
            bridge: EngineBridge::new(module, context),
            context,
            handle: EngineHandle::NONE,
            phase: Phase::Created,
            running: false,
            throttle: None,
            frames_rendered: 0,
        }
    }

    /// Gates render calls through `throttle`.
    #[must_use]
    pub fn with_throttle(mut self, throttle: FrameThrottle) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> CoordinatorState {
        match self.phase {
            Phase::Created => CoordinatorState::Created,
            Phase::Initializing => CoordinatorState::Initializing,
            Phase::AwaitingReadiness => CoordinatorState::AwaitingReadiness,
            Phase::Ready if self.running => CoordinatorState::Running,
            Phase::Ready => CoordinatorState::Stopped,
            Phase::Released => CoordinatorState::Released,
        }
    }

    /// The instance handle; `NONE` before `initialize` and after `release`.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> EngineHandle {
        self.handle
    }

    /// Whether readiness was observed.
    #[inline]
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.phase, Phase::Ready)
    }

    /// Whether ticks are allowed to render.
    #[inline]
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Render calls issued by ticks.
    #[inline]
    #[must_use]
    pub const fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// The warm-up throttle, if any.
    #[inline]
    #[must_use]
    pub const fn throttle(&self) -> Option<&FrameThrottle> {
        self.throttle.as_ref()
    }

    /// The bridge.
    #[inline]
    #[must_use]
    pub const fn bridge(&self) -> &EngineBridge<M> {
        &self.bridge
    }

    /// Mutable bridge.
    #[inline]
    pub fn bridge_mut(&mut self) -> &mut EngineBridge<M> {
        &mut self.bridge
    }

    /// Creates the module instance.
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyInitialized`] on a second call,
    /// [`EngineError::Released`] after release.
    pub fn initialize(&mut self) -> EngineResult<EngineHandle> {
        match self.phase {
            Phase::Released => return Err(EngineError::Released),
            Phase::Created => {}
            _ => return Err(EngineError::AlreadyInitialized),
        }
        self.handle = self.bridge.init_app();
        self.phase = Phase::Initializing;
        tracing::info!(context = self.context, handle = self.handle.raw(), "engine instance created");
        Ok(self.handle)
    }

    /// Binds a page canvas by element id and starts the loop.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`], or a marshalling error for the id.
    pub fn bind_canvas(&mut self, element_id: &str, pixel_ratio: f32) -> EngineResult<Dispatch> {
        if !self.can_bind()? {
            return Ok(Dispatch::Skipped);
        }
        self.bridge.create_window_by_canvas(self.handle, element_id, pixel_ratio)?;
        self.bound(pixel_ratio);
        Ok(Dispatch::Issued)
    }

    /// Binds a transferred surface and starts the loop.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`].
    pub fn bind_offscreen(&mut self, surface: OffscreenSurface, pixel_ratio: f32) -> EngineResult<Dispatch> {
        if !self.can_bind()? {
            return Ok(Dispatch::Skipped);
        }
        self.bridge
            .create_window_by_offscreen_canvas(self.handle, surface, pixel_ratio);
        self.bound(pixel_ratio);
        Ok(Dispatch::Issued)
    }

    /// Asks the module whether it is ready. Returns the readiness flag.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`].
    pub fn poll_readiness(&mut self) -> EngineResult<bool> {
        match self.phase {
            Phase::Released => Err(EngineError::Released),
            Phase::Ready => Ok(true),
            Phase::Created | Phase::Initializing => Ok(false),
            Phase::AwaitingReadiness => {
                if self.bridge.is_preparation_completed(self.handle) {
                    self.phase = Phase::Ready;
                    tracing::info!(context = self.context, handle = self.handle.raw(), "engine instance ready");
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// One scheduled frame tick.
    ///
    /// Host timers are fired first. Then, if the loop is running, either
    /// readiness is polled or a frame is advanced, subject to the throttle.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`], or a bridge error from a timer callback.
    pub fn tick(&mut self, now: Instant) -> EngineResult<TickOutcome> {
        if self.phase == Phase::Released {
            return Err(EngineError::Released);
        }
        self.bridge.pump(now)?;

        let outcome = match self.phase {
            Phase::Created | Phase::Initializing => TickOutcome::Unbound,
            _ if !self.running => TickOutcome::Paused,
            Phase::AwaitingReadiness => {
                if self.poll_readiness()? {
                    TickOutcome::BecameReady
                } else {
                    TickOutcome::Preparing
                }
            }
            _ => {
                if self.throttle.as_mut().map_or(true, FrameThrottle::tick) {
                    self.bridge.enter_frame(self.handle);
                    self.frames_rendered += 1;
                    TickOutcome::Rendered
                } else {
                    TickOutcome::Throttled
                }
            }
        };
        tracing::trace!(context = self.context, ?outcome, "frame tick");
        Ok(outcome)
    }

    /// Resumes rendering. Returns true if the loop was stopped.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`].
    pub fn start(&mut self) -> EngineResult<bool> {
        self.live()?;
        let resumed = !self.running;
        self.running = true;
        if resumed {
            tracing::info!(context = self.context, "frame loop started");
        }
        Ok(resumed)
    }

    /// Pauses rendering. The handle stays alive.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`].
    pub fn stop(&mut self) -> EngineResult<()> {
        self.live()?;
        if self.running {
            tracing::info!(context = self.context, "frame loop stopped");
        }
        self.running = false;
        Ok(())
    }

    /// Pointer moved, logical coordinates.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`].
    pub fn mouse_move(&mut self, x: f32, y: f32) -> EngineResult<Dispatch> {
        let Some(handle) = self.ready_handle("mouse_move")? else {
            return Ok(Dispatch::Skipped);
        };
        self.bridge.mouse_move(handle, x, y);
        Ok(Dispatch::Issued)
    }

    /// Left button pressed over `item`.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`].
    pub fn left_bt_down(&mut self, item: PickItem, x: f32, y: f32) -> EngineResult<Dispatch> {
        let Some(handle) = self.ready_handle("left_bt_down")? else {
            return Ok(Dispatch::Skipped);
        };
        self.bridge.left_bt_down(handle, item, x, y);
        Ok(Dispatch::Issued)
    }

    /// Left button released.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`].
    pub fn left_bt_up(&mut self) -> EngineResult<Dispatch> {
        let Some(handle) = self.ready_handle("left_bt_up")? else {
            return Ok(Dispatch::Skipped);
        };
        self.bridge.left_bt_up(handle);
        Ok(Dispatch::Issued)
    }

    /// Replaces the hover highlight.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`].
    pub fn set_hover(&mut self, list: &PickList) -> EngineResult<Dispatch> {
        let Some(handle) = self.ready_handle("set_hover")? else {
            return Ok(Dispatch::Skipped);
        };
        self.bridge.set_hover(handle, list);
        Ok(Dispatch::Issued)
    }

    /// Replaces the selection.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`].
    pub fn set_selection(&mut self, list: &PickList) -> EngineResult<Dispatch> {
        let Some(handle) = self.ready_handle("set_selection")? else {
            return Ok(Dispatch::Skipped);
        };
        self.bridge.set_selection(handle, list);
        Ok(Dispatch::Issued)
    }

    /// Toggles auto-animation.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`].
    pub fn set_auto_animation(&mut self, enabled: bool) -> EngineResult<Dispatch> {
        let Some(handle) = self.ready_handle("set_auto_animation")? else {
            return Ok(Dispatch::Skipped);
        };
        self.bridge.set_auto_animation(handle, enabled);
        Ok(Dispatch::Issued)
    }

    /// Advances one frame now, outside the loop and the throttle.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`].
    pub fn advance_frame(&mut self) -> EngineResult<Dispatch> {
        let Some(handle) = self.ready_handle("advance_frame")? else {
            return Ok(Dispatch::Skipped);
        };
        self.bridge.enter_frame(handle);
        Ok(Dispatch::Issued)
    }

    /// Destroys the instance. The coordinator is unusable afterwards.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`] on a second call.
    pub fn release(&mut self) -> EngineResult<Dispatch> {
        let Some(handle) = self.ready_handle("release")? else {
            return Ok(Dispatch::Skipped);
        };
        self.bridge.release_app(handle);
        self.bridge.run_finalizers();
        self.handle = EngineHandle::NONE;
        self.phase = Phase::Released;
        self.running = false;
        tracing::info!(context = self.context, handle = handle.raw(), "engine instance released");
        Ok(Dispatch::Issued)
    }

    /// Pick lists the module published since the last call.
    pub fn take_picks(&mut self) -> Vec<PickList> {
        self.bridge.take_picks()
    }

    /// Sets the busy-wait inside the module's render call.
    pub fn set_render_block_ms(&mut self, ms: f64) {
        self.bridge.set_render_block_ms(ms);
    }

    fn live(&self) -> EngineResult<()> {
        if self.phase == Phase::Released {
            tracing::warn!(context = self.context, "call on released engine instance");
            return Err(EngineError::Released);
        }
        Ok(())
    }

    fn can_bind(&self) -> EngineResult<bool> {
        self.live()?;
        if self.phase == Phase::Initializing {
            return Ok(true);
        }
        tracing::debug!(context = self.context, phase = ?self.phase, "surface bind skipped");
        Ok(false)
    }

    fn bound(&mut self, pixel_ratio: f32) {
        self.phase = Phase::AwaitingReadiness;
        self.running = true;
        tracing::info!(
            context = self.context,
            handle = self.handle.raw(),
            pixel_ratio,
            "surface bound, awaiting readiness"
        );
    }

    /// The handle, if calls may reach the module.
    fn ready_handle(&self, call: &'static str) -> EngineResult<Option<EngineHandle>> {
        self.live()?;
        if self.phase == Phase::Ready && !self.handle.is_none() {
            Ok(Some(self.handle))
        } else {
            tracing::trace!(context = self.context, call, "skipped before readiness");
            Ok(None)
        }
    }
}

impl<M> std::fmt::Debug for EngineCoordinator<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineCoordinator")
            .field("context", &self.context)
            .field("handle", &self.handle)
            .field("phase", &self.phase)
            .field("running", &self.running)
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinframe_sim::{SimConfig, SimModule};

    fn sim(prepare_steps: u32) -> SimModule {
        SimModule::new(SimConfig {
            prepare_steps,
            prepare_interval_ms: 0,
            ..SimConfig::default()
        })
        .unwrap()
    }

    fn running(prepare_steps: u32) -> EngineCoordinator<SimModule> {
        let mut coordinator = EngineCoordinator::new(sim(prepare_steps), "test");
        coordinator.initialize().unwrap();
        coordinator.bind_canvas("main-thread-canvas", 1.0).unwrap();
        while coordinator.tick(Instant::now()).unwrap() != TickOutcome::BecameReady {}
        coordinator
    }

    #[test]
    fn test_lifecycle_states() {
        let mut coordinator = EngineCoordinator::new(sim(2), "test");
        assert_eq!(coordinator.state(), CoordinatorState::Created);
        assert_eq!(coordinator.tick(Instant::now()).unwrap(), TickOutcome::Unbound);

        let handle = coordinator.initialize().unwrap();
        assert!(!handle.is_none());
        assert_eq!(coordinator.state(), CoordinatorState::Initializing);
        assert_eq!(coordinator.initialize(), Err(EngineError::AlreadyInitialized));

        coordinator.bind_canvas("main-thread-canvas", 1.0).unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::AwaitingReadiness);

        let mut outcomes = Vec::new();
        loop {
            let outcome = coordinator.tick(Instant::now()).unwrap();
            outcomes.push(outcome);
            if outcome == TickOutcome::BecameReady {
                break;
            }
        }
        assert!(outcomes[..outcomes.len() - 1].iter().all(|o| *o == TickOutcome::Preparing));
        assert_eq!(coordinator.state(), CoordinatorState::Running);
        assert_eq!(coordinator.tick(Instant::now()).unwrap(), TickOutcome::Rendered);
    }

    #[test]
    fn test_input_before_readiness_is_skipped() {
        let mut coordinator = EngineCoordinator::new(sim(50), "test");
        assert_eq!(coordinator.mouse_move(1.0, 1.0).unwrap(), Dispatch::Skipped);
        coordinator.initialize().unwrap();
        coordinator.bind_canvas("c", 1.0).unwrap();

        assert_eq!(coordinator.left_bt_down(PickItem::new(7), 0.0, 0.0).unwrap(), Dispatch::Skipped);
        assert_eq!(coordinator.set_hover(&PickList::new()).unwrap(), Dispatch::Skipped);
        assert_eq!(coordinator.advance_frame().unwrap(), Dispatch::Skipped);
        assert_eq!(coordinator.release().unwrap(), Dispatch::Skipped);
        assert_eq!(coordinator.bridge().module().app(coordinator.handle().raw()).unwrap().info().remaining_frames, 0);
    }

    #[test]
    fn test_stop_pauses_without_release() {
        let mut coordinator = running(1);
        coordinator.stop().unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::Stopped);
        assert_eq!(coordinator.tick(Instant::now()).unwrap(), TickOutcome::Paused);
        assert!(!coordinator.handle().is_none());

        // Input still reaches a stopped instance.
        assert!(coordinator.mouse_move(2.0, 2.0).unwrap().issued());

        assert!(coordinator.start().unwrap());
        assert!(!coordinator.start().unwrap());
        assert_eq!(coordinator.tick(Instant::now()).unwrap(), TickOutcome::Rendered);
    }

    #[test]
    fn test_calls_after_release_fail() {
        let mut coordinator = running(1);
        assert!(coordinator.release().unwrap().issued());
        assert_eq!(coordinator.state(), CoordinatorState::Released);
        assert!(coordinator.handle().is_none());
        assert_eq!(coordinator.bridge().module().live_apps(), 0);

        assert_eq!(coordinator.release(), Err(EngineError::Released));
        assert_eq!(coordinator.mouse_move(0.0, 0.0), Err(EngineError::Released));
        assert_eq!(coordinator.tick(Instant::now()), Err(EngineError::Released));
        assert_eq!(coordinator.start(), Err(EngineError::Released));
        assert_eq!(coordinator.initialize(), Err(EngineError::Released));
    }

    #[test]
    fn test_throttled_loop() {
        let mut coordinator = EngineCoordinator::new(sim(0), "test").with_throttle(FrameThrottle::new(2, 3));
        coordinator.initialize().unwrap();
        coordinator.bind_offscreen(OffscreenSurface::new(1, 8, 8), 1.0).unwrap();
        assert_eq!(coordinator.tick(Instant::now()).unwrap(), TickOutcome::BecameReady);

        let outcomes: Vec<TickOutcome> = (0..6).map(|_| coordinator.tick(Instant::now()).unwrap()).collect();
        assert_eq!(
            outcomes,
            vec![
                TickOutcome::Rendered,
                TickOutcome::Throttled,
                TickOutcome::Throttled,
                TickOutcome::Rendered,
                TickOutcome::Rendered,
                TickOutcome::Rendered,
            ]
        );
        assert_eq!(coordinator.frames_rendered(), 4);
    }

    #[test]
    fn test_picks_flow_out_of_ticks() {
        let mut coordinator = running(1);
        coordinator.mouse_move(10.0, 20.0).unwrap();
        coordinator.tick(Instant::now()).unwrap();
        assert_eq!(coordinator.take_picks(), vec![vec![PickItem::new(7)].into()]);
    }
}
