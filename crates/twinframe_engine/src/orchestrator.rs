//! # Orchestrator
//!
//! The main-thread owner of everything page-side: the worker port, the
//! latest pick, the pick board, and the main-thread engine instance.
//!
//! ```text
//!            spawn            workerIsReady
//! launch ─────────► worker ─────────────────► load main instance
//!    │                                         attach pointer handlers
//!    └─ poll every ready_poll_interval ──► post init + transferred surface
//!
//! pick (worker) ──► board + latest pick ──► hover (to worker)
//! pick (main)   ──► board + latest pick ──► set_hover (main instance)
//! ```
//!
//! The two engine instances never talk to each other. Only intent crosses,
//! as messages.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use twinframe_ffi::ForeignModule;
use twinframe_shared::{
    CanvasElement, Envelope, HostMessage, PickList, ProtocolError, WorkerMessage, DEFAULT_READY_POLL_MS,
    MAIN_CANVAS_ID, WORKER_CANVAS_ID,
};

use crate::capability::{check_capabilities, Notifier, PlatformCapabilities};
use crate::coordinator::{CoordinatorState, Dispatch, EngineCoordinator, TickOutcome};
use crate::error::{EngineError, EngineResult};
use crate::latency::LatencyHooks;
use crate::pick::{PickBoard, PickState};
use crate::port::{channel, OrchestratorPort};
use crate::worker::{spawn_worker, WorkerConfig};

/// Startup and page settings.
#[derive(Clone, Debug, PartialEq)]
pub struct OrchestratorSettings {
    /// Physical pixels per logical pixel, for both instances.
    pub device_pixel_ratio: f32,
    /// Element id the main-thread instance binds by.
    pub main_canvas_id: String,
    /// The canvas whose control moves to the worker.
    pub worker_canvas: CanvasElement,
    /// How often readiness is re-checked before `init`.
    pub ready_poll_interval: Duration,
    /// Give up on the worker after this long.
    pub ready_timeout: Duration,
    /// Synthetic busy-waits.
    pub latency: LatencyHooks,
    /// Worker loop settings. Its render wait is taken from `latency`.
    pub worker: WorkerConfig,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            main_canvas_id: MAIN_CANVAS_ID.to_string(),
            worker_canvas: CanvasElement::new(WORKER_CANVAS_ID, 1, (800, 600), 1.0),
            ready_poll_interval: Duration::from_millis(DEFAULT_READY_POLL_MS),
            ready_timeout: Duration::from_secs(10),
            latency: LatencyHooks::default(),
            worker: WorkerConfig::default(),
        }
    }
}

/// Main-thread orchestration of both engine instances.
pub struct Orchestrator<M> {
    port: OrchestratorPort,
    settings: OrchestratorSettings,
    worker_ready: bool,
    init_sent: bool,
    picks: PickState,
    board: Arc<PickBoard>,
    pending_main: Option<M>,
    main: Option<EngineCoordinator<M>>,
    worker: Option<JoinHandle<EngineResult<()>>>,
}

impl<M: ForeignModule> Orchestrator<M> {
    /// Full startup: capability check, worker spawn, deferred `init`.
    ///
    /// # Arguments
    ///
    /// * `settings` - Startup and page settings
    /// * `capabilities` - Platform probe result
    /// * `notifier` - Receives the one blocking notification on failure
    /// * `worker_module` - Builds the worker's module on the worker thread
    /// * `main_module` - The main-thread module, loaded after the worker's
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingCapability`] after notifying,
    /// [`EngineError::WorkerStartup`] if the worker does not come up in time.
    pub fn launch<W, F>(
        settings: OrchestratorSettings,
        capabilities: &PlatformCapabilities,
        notifier: &dyn Notifier,
        worker_module: F,
        main_module: M,
    ) -> EngineResult<Self>
    where
        W: ForeignModule + 'static,
        F: FnOnce() -> W + Send + 'static,
    {
        check_capabilities(capabilities, notifier)?;

        let (port, worker_port) = channel();
        let worker_config = WorkerConfig {
            render_block_ms: settings.latency.worker_render_ms,
            ..settings.worker
        };
        let worker = spawn_worker(worker_module, worker_port, worker_config)?;
        let mut orchestrator = Self::with_port(port, settings, main_module);
        orchestrator.worker = Some(worker);

        orchestrator.await_worker_ready()?;
        Ok(orchestrator)
    }

    /// Wraps an already connected port. Nothing is sent yet.
    #[must_use]
    pub fn with_port(port: OrchestratorPort, settings: OrchestratorSettings, main_module: M) -> Self {
        Self {
            port,
            settings,
            worker_ready: false,
            init_sent: false,
            picks: PickState::new(),
            board: Arc::new(PickBoard::new()),
            pending_main: Some(main_module),
            main: None,
            worker: None,
        }
    }

    /// Whether `workerIsReady` was received.
    #[inline]
    #[must_use]
    pub const fn is_worker_ready(&self) -> bool {
        self.worker_ready
    }

    /// Whether `init` went out.
    #[inline]
    #[must_use]
    pub const fn init_sent(&self) -> bool {
        self.init_sent
    }

    /// The latest pick from either instance.
    #[inline]
    #[must_use]
    pub const fn latest_pick(&self) -> &PickList {
        self.picks.latest()
    }

    /// The pick display.
    #[must_use]
    pub fn board(&self) -> Arc<PickBoard> {
        Arc::clone(&self.board)
    }

    /// The main-thread instance, once loaded.
    #[inline]
    #[must_use]
    pub const fn main(&self) -> Option<&EngineCoordinator<M>> {
        self.main.as_ref()
    }

    /// The settings in use.
    #[inline]
    #[must_use]
    pub const fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Polls for worker readiness, then posts `init`.
    ///
    /// # Errors
    ///
    /// [`EngineError::WorkerStartup`] on timeout or if the worker hung up.
    pub fn await_worker_ready(&mut self) -> EngineResult<()> {
        let deadline = Instant::now() + self.settings.ready_timeout;
        while !self.worker_ready {
            if Instant::now() >= deadline {
                return Err(EngineError::WorkerStartup(format!(
                    "no readiness signal within {:?}",
                    self.settings.ready_timeout
                )));
            }
            match self.port.recv_timeout(self.settings.ready_poll_interval) {
                Ok(Some(envelope)) => self.handle_message(envelope)?,
                Ok(None) => tracing::trace!("worker not ready yet"),
                Err(EngineError::Disconnected) => {
                    return Err(EngineError::WorkerStartup("worker exited before readiness".into()));
                }
                Err(e) => return Err(e),
            }
        }
        self.send_init()?;
        Ok(())
    }

    /// Transfers the worker canvas and posts `init`. Skipped before
    /// readiness and after the first send.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`], or a missing transfer if the canvas was
    /// already detached elsewhere.
    pub fn send_init(&mut self) -> EngineResult<Dispatch> {
        if !self.worker_ready || self.init_sent {
            return Ok(Dispatch::Skipped);
        }
        let surface = self
            .settings
            .worker_canvas
            .transfer_control_to_offscreen()
            .ok_or(ProtocolError::MissingTransfer("init"))?;
        let message = WorkerMessage::Init {
            device_pixel_ratio: self.settings.device_pixel_ratio,
        };
        self.port.post(Envelope::with_transfer(message, surface))?;
        self.init_sent = true;
        tracing::info!(ratio = self.settings.device_pixel_ratio, "init posted to worker");
        Ok(Dispatch::Issued)
    }

    /// Handles one envelope from the worker.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`] when the hover reply cannot be posted,
    /// or a failure loading the main-thread instance.
    pub fn handle_message(&mut self, envelope: Envelope<HostMessage>) -> EngineResult<()> {
        self.settings.latency.before_message();
        let (message, _) = envelope.into_parts();
        tracing::debug!(ty = message.ty(), "orchestrator message");

        match message {
            HostMessage::WorkerIsReady => self.on_worker_ready(),
            HostMessage::Pick { list } => {
                self.board.publish(&list);
                self.picks.store(list.clone());
                self.port.post_message(WorkerMessage::Hover { list })
            }
            HostMessage::Unknown => {
                tracing::trace!("unrecognised message ignored");
                Ok(())
            }
        }
    }

    /// Handles everything queued, in arrival order. Returns the count.
    ///
    /// # Errors
    ///
    /// As [`Self::handle_message`], or [`EngineError::Disconnected`] once the
    /// worker is gone and the queue is empty.
    pub fn pump_messages(&mut self) -> EngineResult<usize> {
        let mut count = 0;
        while let Some(envelope) = self.port.try_recv()? {
            self.handle_message(envelope)?;
            count += 1;
        }
        Ok(count)
    }

    fn on_worker_ready(&mut self) -> EngineResult<()> {
        if self.worker_ready {
            return Ok(());
        }
        self.worker_ready = true;
        tracing::info!("worker ready, loading main-thread instance");

        if let Some(module) = self.pending_main.take() {
            let mut main = EngineCoordinator::new(module, "main");
            main.set_render_block_ms(self.settings.latency.render_ms);
            main.initialize()?;
            main.bind_canvas(&self.settings.main_canvas_id, self.settings.device_pixel_ratio)?;
            self.main = Some(main);
        }
        Ok(())
    }

    // =========================================================================
    // Worker container pointer handlers
    // =========================================================================

    /// Pointer moved over the worker's canvas.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`].
    pub fn worker_pointer_move(&mut self, x: f32, y: f32) -> EngineResult<Dispatch> {
        if !self.worker_ready {
            return Ok(Dispatch::Skipped);
        }
        self.settings.latency.before_mousemove();
        self.picks.invalidate();
        self.post(WorkerMessage::MouseMove { x, y })
    }

    /// Button pressed over the worker's canvas. Needs a latest pick.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`].
    pub fn worker_pointer_down(&mut self, x: f32, y: f32) -> EngineResult<Dispatch> {
        match self.picks.pointer_down_item() {
            Some(pick_item) if self.worker_ready => self.post(WorkerMessage::LeftBtDown { pick_item, x, y }),
            _ => Ok(Dispatch::Skipped),
        }
    }

    /// Button released over the worker's canvas.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`].
    pub fn worker_pointer_up(&mut self) -> EngineResult<Dispatch> {
        if !self.worker_ready {
            return Ok(Dispatch::Skipped);
        }
        self.post(WorkerMessage::LeftBtUp)
    }

    /// Click on the worker's canvas: selects the whole latest pick.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`].
    pub fn worker_click(&mut self) -> EngineResult<Dispatch> {
        match self.picks.click_selection() {
            Some(list) if self.worker_ready => {
                let list = list.clone();
                self.post(WorkerMessage::Select { list })
            }
            _ => Ok(Dispatch::Skipped),
        }
    }

    // =========================================================================
    // Main container pointer handlers
    // =========================================================================

    /// Pointer moved over the main canvas.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`] after `release_main`.
    pub fn main_pointer_move(&mut self, x: f32, y: f32) -> EngineResult<Dispatch> {
        if !self.worker_ready {
            return Ok(Dispatch::Skipped);
        }
        self.settings.latency.before_mousemove();
        self.picks.invalidate();
        match self.main.as_mut() {
            Some(main) => main.mouse_move(x, y),
            None => Ok(Dispatch::Skipped),
        }
    }

    /// Button pressed over the main canvas. Needs a latest pick.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`] after `release_main`.
    pub fn main_pointer_down(&mut self, x: f32, y: f32) -> EngineResult<Dispatch> {
        match (self.picks.pointer_down_item(), self.main.as_mut()) {
            (Some(item), Some(main)) => main.left_bt_down(item, x, y),
            _ => Ok(Dispatch::Skipped),
        }
    }

    /// Button released over the main canvas.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`] after `release_main`.
    pub fn main_pointer_up(&mut self) -> EngineResult<Dispatch> {
        match self.main.as_mut() {
            Some(main) => main.left_bt_up(),
            None => Ok(Dispatch::Skipped),
        }
    }

    /// Click on the main canvas: selects the whole latest pick.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`] after `release_main`.
    pub fn main_click(&mut self) -> EngineResult<Dispatch> {
        match (self.picks.click_selection(), self.main.as_mut()) {
            (Some(list), Some(main)) => main.set_selection(list),
            _ => Ok(Dispatch::Skipped),
        }
    }

    /// One tick of the main-thread frame loop. New picks are displayed,
    /// stored and fed back as hover.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`] after `release_main`, or a tick error.
    pub fn main_frame(&mut self, now: Instant) -> EngineResult<TickOutcome> {
        let Some(main) = self.main.as_mut() else {
            return Ok(TickOutcome::Unbound);
        };
        let outcome = main.tick(now)?;
        for list in main.take_picks() {
            self.board.publish(&list);
            main.set_hover(&list)?;
            self.picks.store(list);
        }
        Ok(outcome)
    }

    // =========================================================================
    // Controls
    // =========================================================================

    /// Resumes the worker's render calls.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`].
    pub fn start_worker(&mut self) -> EngineResult<Dispatch> {
        self.post(WorkerMessage::StartRunning)
    }

    /// Pauses the worker's render calls.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`].
    pub fn stop_worker(&mut self) -> EngineResult<Dispatch> {
        self.post(WorkerMessage::StopRunning)
    }

    /// Toggles the worker's auto-animation.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`].
    pub fn set_worker_auto_animation(&mut self, enabled: bool) -> EngineResult<Dispatch> {
        self.post(WorkerMessage::AutoAnimation {
            auto_animation: enabled,
        })
    }

    /// Sets the worker's render busy-wait.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`].
    pub fn block_worker_render(&mut self, ms: f64) -> EngineResult<Dispatch> {
        self.post(WorkerMessage::BlockRender { block_time: ms })
    }

    /// Resumes the main-thread loop. Returns true if it was stopped.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`] after `release_main`.
    pub fn start_main(&mut self) -> EngineResult<bool> {
        self.main.as_mut().map_or(Ok(false), EngineCoordinator::start)
    }

    /// Pauses the main-thread loop. The instance stays alive.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`] after `release_main`.
    pub fn stop_main(&mut self) -> EngineResult<()> {
        self.main.as_mut().map_or(Ok(()), EngineCoordinator::stop)
    }

    /// Destroys the main-thread instance.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`] on a second call.
    pub fn release_main(&mut self) -> EngineResult<Dispatch> {
        self.main.as_mut().map_or(Ok(Dispatch::Skipped), EngineCoordinator::release)
    }

    /// Toggles the main-thread instance's auto-animation.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`] after `release_main`.
    pub fn set_main_auto_animation(&mut self, enabled: bool) -> EngineResult<Dispatch> {
        match self.main.as_mut() {
            Some(main) => main.set_auto_animation(enabled),
            None => Ok(Dispatch::Skipped),
        }
    }

    /// Releases the main instance, hangs up on the worker and waits for it.
    ///
    /// # Errors
    ///
    /// The worker's own exit error, or [`EngineError::WorkerStartup`] if its
    /// thread panicked.
    pub fn shutdown(self) -> EngineResult<()> {
        let Self {
            port, mut main, worker, ..
        } = self;
        if let Some(main) = main.as_mut() {
            if main.state() != CoordinatorState::Released {
                main.release()?;
            }
        }
        drop(port);

        match worker {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(EngineError::WorkerStartup("worker thread panicked".into()))),
            None => Ok(()),
        }
    }

    fn post(&self, message: WorkerMessage) -> EngineResult<Dispatch> {
        self.port.post_message(message)?;
        Ok(Dispatch::Issued)
    }
}

impl<M> std::fmt::Debug for Orchestrator<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("worker_ready", &self.worker_ready)
            .field("init_sent", &self.init_sent)
            .field("picks", &self.picks)
            .field("main", &self.main)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::WorkerPort;
    use twinframe_shared::PickItem;
    use twinframe_sim::{SimConfig, SimModule};

    fn sim() -> SimModule {
        SimModule::new(SimConfig {
            prepare_steps: 1,
            prepare_interval_ms: 0,
            ..SimConfig::default()
        })
        .unwrap()
    }

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            latency: LatencyHooks::none(),
            ready_poll_interval: Duration::from_millis(1),
            ..OrchestratorSettings::default()
        }
    }

    fn ready() -> (Orchestrator<SimModule>, WorkerPort) {
        let (port, worker) = channel();
        let mut orchestrator = Orchestrator::with_port(port, settings(), sim());
        worker.post_message(HostMessage::WorkerIsReady).unwrap();
        orchestrator.await_worker_ready().unwrap();
        (orchestrator, worker)
    }

    fn drain(worker: &WorkerPort) -> Vec<WorkerMessage> {
        let mut out = Vec::new();
        while let Some(envelope) = worker.try_recv().unwrap() {
            out.push(envelope.into_parts().0);
        }
        out
    }

    #[test]
    fn test_init_deferred_until_ready() {
        let (port, worker) = channel();
        let mut orchestrator = Orchestrator::with_port(port, settings(), sim());
        assert_eq!(orchestrator.send_init().unwrap(), Dispatch::Skipped);
        assert_eq!(orchestrator.worker_pointer_move(1.0, 1.0).unwrap(), Dispatch::Skipped);
        assert!(worker.try_recv().unwrap().is_none());
        assert!(orchestrator.main().is_none());

        worker.post_message(HostMessage::WorkerIsReady).unwrap();
        orchestrator.await_worker_ready().unwrap();

        let envelope = worker.try_recv().unwrap().unwrap();
        assert!(envelope.has_transfer());
        assert!(matches!(envelope.message(), WorkerMessage::Init { .. }));
        assert!(orchestrator.settings().worker_canvas.is_transferred());
        assert_eq!(orchestrator.send_init().unwrap(), Dispatch::Skipped);

        let main = orchestrator.main().unwrap();
        assert_eq!(main.state(), CoordinatorState::AwaitingReadiness);
    }

    #[test]
    fn test_ready_timeout() {
        let (port, _worker) = channel();
        let mut orchestrator = Orchestrator::with_port(
            port,
            OrchestratorSettings {
                ready_timeout: Duration::from_millis(5),
                ..settings()
            },
            sim(),
        );
        assert!(matches!(
            orchestrator.await_worker_ready(),
            Err(EngineError::WorkerStartup(_))
        ));
    }

    #[test]
    fn test_worker_pick_is_mirrored_as_hover() {
        let (mut orchestrator, worker) = ready();
        drain(&worker);

        let list: PickList = vec![PickItem::new(7)].into();
        worker.post_message(HostMessage::Pick { list: list.clone() }).unwrap();
        assert_eq!(orchestrator.pump_messages().unwrap(), 1);

        assert_eq!(orchestrator.latest_pick(), &list);
        assert_eq!(orchestrator.board().text(), "e7");
        assert_eq!(drain(&worker), vec![WorkerMessage::Hover { list }]);
    }

    #[test]
    fn test_move_invalidates_before_forwarding() {
        let (mut orchestrator, worker) = ready();
        worker
            .post_message(HostMessage::Pick {
                list: vec![PickItem::new(7)].into(),
            })
            .unwrap();
        orchestrator.pump_messages().unwrap();
        drain(&worker);

        orchestrator.worker_pointer_move(10.0, 20.0).unwrap();
        assert!(orchestrator.latest_pick().is_empty());
        assert_eq!(drain(&worker), vec![WorkerMessage::MouseMove { x: 10.0, y: 20.0 }]);

        assert_eq!(orchestrator.worker_pointer_down(10.0, 20.0).unwrap(), Dispatch::Skipped);
        assert_eq!(orchestrator.worker_click().unwrap(), Dispatch::Skipped);
        assert!(drain(&worker).is_empty());
    }

    #[test]
    fn test_down_and_click_use_latest_pick() {
        let (mut orchestrator, worker) = ready();
        let list: PickList = vec![PickItem::new(12), PickItem::new(7)].into();
        worker.post_message(HostMessage::Pick { list: list.clone() }).unwrap();
        orchestrator.pump_messages().unwrap();
        drain(&worker);

        orchestrator.worker_pointer_down(3.0, 4.0).unwrap();
        orchestrator.worker_pointer_up().unwrap();
        orchestrator.worker_click().unwrap();
        assert_eq!(
            drain(&worker),
            vec![
                WorkerMessage::LeftBtDown {
                    pick_item: PickItem::new(12),
                    x: 3.0,
                    y: 4.0
                },
                WorkerMessage::LeftBtUp,
                WorkerMessage::Select { list },
            ]
        );
    }

    #[test]
    fn test_main_pick_feeds_hover() {
        let (mut orchestrator, _worker) = ready();
        while orchestrator.main_frame(Instant::now()).unwrap() != TickOutcome::BecameReady {}

        orchestrator.main_pointer_move(10.0, 20.0).unwrap();
        assert_eq!(orchestrator.main_frame(Instant::now()).unwrap(), TickOutcome::Rendered);
        assert_eq!(orchestrator.latest_pick().to_string(), "e7");
        assert_eq!(orchestrator.board().revision(), 1);

        let main = orchestrator.main().unwrap();
        let app = main.bridge().module().app(main.handle().raw()).unwrap();
        assert_eq!(app.info().hover.to_string(), "e7");

        orchestrator.main_click().unwrap();
        let main = orchestrator.main().unwrap();
        let app = main.bridge().module().app(main.handle().raw()).unwrap();
        assert_eq!(app.info().selection.to_string(), "e7");
    }

    #[test]
    fn test_main_stop_is_pause() {
        let (mut orchestrator, _worker) = ready();
        while orchestrator.main_frame(Instant::now()).unwrap() != TickOutcome::BecameReady {}

        orchestrator.stop_main().unwrap();
        assert_eq!(orchestrator.main_frame(Instant::now()).unwrap(), TickOutcome::Paused);
        assert_eq!(orchestrator.main().unwrap().state(), CoordinatorState::Stopped);
        assert!(orchestrator.start_main().unwrap());

        assert!(orchestrator.release_main().unwrap().issued());
        assert_eq!(orchestrator.release_main(), Err(EngineError::Released));
        assert_eq!(orchestrator.main_pointer_up(), Err(EngineError::Released));
        assert!(orchestrator.shutdown().is_ok());
    }

    #[test]
    fn test_controls_post_messages() {
        let (mut orchestrator, worker) = ready();
        drain(&worker);
        orchestrator.stop_worker().unwrap();
        orchestrator.start_worker().unwrap();
        orchestrator.set_worker_auto_animation(false).unwrap();
        orchestrator.block_worker_render(4.0).unwrap();
        assert_eq!(
            drain(&worker),
            vec![
                WorkerMessage::StopRunning,
                WorkerMessage::StartRunning,
                WorkerMessage::AutoAnimation {
                    auto_animation: false
                },
                WorkerMessage::BlockRender { block_time: 4.0 },
            ]
        );
    }
}
