//! # Worker Context
//!
//! The background context. It instantiates its own module, creates its
//! handle, announces itself with `workerIsReady`, and from then on only
//! reacts: envelopes from the orchestrator on one side, frame ticks on the
//! other. Every pick its engine produces is posted back.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, tick};
use twinframe_ffi::ForeignModule;
use twinframe_shared::{
    Envelope, HostMessage, ProtocolError, WorkerMessage, DEFAULT_FRAME_INTERVAL_MS, DEFAULT_WORKER_RENDER_BLOCK_MS,
    WARMUP_CADENCE,
};

use crate::coordinator::{Dispatch, EngineCoordinator, TickOutcome};
use crate::error::{EngineError, EngineResult};
use crate::port::WorkerPort;
use crate::throttle::FrameThrottle;

/// Worker loop settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorkerConfig {
    /// Interval of the frame source.
    pub frame_interval: Duration,
    /// Warm-up window in renders; 0 disables it.
    pub warmup_frames: u64,
    /// Render cadence inside the warm-up window.
    pub warmup_cadence: u64,
    /// Initial render busy-wait in milliseconds.
    pub render_block_ms: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(DEFAULT_FRAME_INTERVAL_MS),
            warmup_frames: 0,
            warmup_cadence: WARMUP_CADENCE,
            render_block_ms: DEFAULT_WORKER_RENDER_BLOCK_MS,
        }
    }
}

/// The worker's engine plus its port.
#[derive(Debug)]
pub struct WorkerContext<M> {
    engine: EngineCoordinator<M>,
    port: WorkerPort,
    handled: u64,
}

impl<M: ForeignModule> WorkerContext<M> {
    /// Creates the instance and posts `workerIsReady`.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`] if the orchestrator is gone.
    pub fn start(module: M, port: WorkerPort, config: &WorkerConfig) -> EngineResult<Self> {
        let throttle = FrameThrottle::new(config.warmup_frames, config.warmup_cadence);
        let mut engine = EngineCoordinator::new(module, "worker").with_throttle(throttle);
        engine.initialize()?;
        engine.set_render_block_ms(config.render_block_ms);

        port.post_message(HostMessage::WorkerIsReady)?;
        tracing::info!("worker is ready");
        Ok(Self {
            engine,
            port,
            handled: 0,
        })
    }

    /// The worker's engine.
    #[inline]
    #[must_use]
    pub const fn engine(&self) -> &EngineCoordinator<M> {
        &self.engine
    }

    /// Envelopes handled so far.
    #[inline]
    #[must_use]
    pub const fn handled(&self) -> u64 {
        self.handled
    }

    /// Handles one envelope from the orchestrator.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MissingTransfer`] for an `init` without its surface,
    /// or [`EngineError::Released`].
    pub fn handle(&mut self, envelope: Envelope<WorkerMessage>) -> EngineResult<Dispatch> {
        self.handled += 1;
        let (message, transfer) = envelope.into_parts();
        tracing::debug!(ty = message.ty(), "worker message");

        match message {
            WorkerMessage::Init { device_pixel_ratio } => {
                let surface = transfer.ok_or(ProtocolError::MissingTransfer("init"))?;
                let dispatch = self.engine.bind_offscreen(surface, device_pixel_ratio)?;
                self.engine.poll_readiness()?;
                Ok(dispatch)
            }
            WorkerMessage::StartRunning => {
                self.engine.start()?;
                Ok(Dispatch::Issued)
            }
            WorkerMessage::StopRunning => {
                self.engine.stop()?;
                Ok(Dispatch::Issued)
            }
            WorkerMessage::MouseMove { x, y } => self.engine.mouse_move(x, y),
            WorkerMessage::LeftBtDown { pick_item, x, y } => self.engine.left_bt_down(pick_item, x, y),
            WorkerMessage::LeftBtUp => self.engine.left_bt_up(),
            WorkerMessage::Select { list } => self.engine.set_selection(&list),
            WorkerMessage::Hover { list } => self.engine.set_hover(&list),
            WorkerMessage::BlockRender { block_time } => {
                self.engine.set_render_block_ms(block_time);
                Ok(Dispatch::Issued)
            }
            WorkerMessage::AutoAnimation { auto_animation } => self.engine.set_auto_animation(auto_animation),
            WorkerMessage::Unknown => {
                tracing::trace!("unrecognised message ignored");
                Ok(Dispatch::Skipped)
            }
        }
    }

    /// Handles everything queued, in arrival order. Returns the count.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`] once the orchestrator is gone and the
    /// queue is empty. Other failures are logged and skipped.
    pub fn drain(&mut self) -> EngineResult<usize> {
        let mut count = 0;
        while let Some(envelope) = self.port.try_recv()? {
            self.handle_logged(envelope);
            count += 1;
        }
        Ok(count)
    }

    /// One frame tick. Posts any picks the engine produced.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`] if a pick cannot be posted, or a tick
    /// error from the engine.
    pub fn on_frame(&mut self, now: Instant) -> EngineResult<TickOutcome> {
        let outcome = self.engine.tick(now)?;
        for list in self.engine.take_picks() {
            tracing::debug!(pick = %list, "posting pick");
            self.port.post_message(HostMessage::Pick { list })?;
        }
        Ok(outcome)
    }

    /// Runs until the orchestrator hangs up, then releases the instance.
    ///
    /// # Errors
    ///
    /// A tick error from the engine.
    pub fn run(mut self, frame_interval: Duration) -> EngineResult<()> {
        let frames = tick(frame_interval);
        let inbox = self.port.receiver().clone();

        loop {
            select! {
                recv(inbox) -> envelope => match envelope {
                    Ok(envelope) => {
                        self.handle_logged(envelope);
                        match self.drain() {
                            Ok(_) => {}
                            Err(EngineError::Disconnected) => break,
                            Err(e) => return Err(e),
                        }
                    }
                    Err(_) => break,
                },
                recv(frames) -> now => {
                    let now = now.unwrap_or_else(|_| Instant::now());
                    match self.on_frame(now) {
                        Ok(_) => {}
                        Err(EngineError::Disconnected) => break,
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        tracing::info!(handled = self.handled, "orchestrator gone, worker shutting down");
        self.engine.release()?;
        Ok(())
    }

    fn handle_logged(&mut self, envelope: Envelope<WorkerMessage>) {
        if let Err(e) = self.handle(envelope) {
            tracing::warn!(error = %e, "worker message failed");
        }
    }
}

/// Spawns the worker thread. The module is built on that thread.
///
/// # Errors
///
/// [`EngineError::WorkerStartup`] if the thread cannot be spawned.
pub fn spawn_worker<M, F>(factory: F, port: WorkerPort, config: WorkerConfig) -> EngineResult<JoinHandle<EngineResult<()>>>
where
    M: ForeignModule + 'static,
    F: FnOnce() -> M + Send + 'static,
{
    thread::Builder::new()
        .name("twinframe-worker".into())
        .spawn(move || {
            let context = WorkerContext::start(factory(), port, &config)?;
            context.run(config.frame_interval)
        })
        .map_err(|e| EngineError::WorkerStartup(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::channel;
    use twinframe_shared::{OffscreenSurface, PickItem, PickList};
    use twinframe_sim::{SimConfig, SimModule};

    fn config() -> WorkerConfig {
        WorkerConfig {
            render_block_ms: 0.0,
            ..WorkerConfig::default()
        }
    }

    fn sim() -> SimModule {
        SimModule::new(SimConfig {
            prepare_steps: 1,
            prepare_interval_ms: 0,
            ..SimConfig::default()
        })
        .unwrap()
    }

    fn init(ratio: f32) -> Envelope<WorkerMessage> {
        Envelope::with_transfer(
            WorkerMessage::Init {
                device_pixel_ratio: ratio,
            },
            OffscreenSurface::new(1, 800, 600),
        )
    }

    #[test]
    fn test_start_announces_readiness() {
        let (orchestrator, worker) = channel();
        let context = WorkerContext::start(sim(), worker, &config()).unwrap();
        assert!(!context.engine().handle().is_none());

        let envelope = orchestrator.try_recv().unwrap().unwrap();
        assert_eq!(envelope.message(), &HostMessage::WorkerIsReady);
    }

    #[test]
    fn test_init_without_transfer_is_rejected() {
        let (_orchestrator, worker) = channel();
        let mut context = WorkerContext::start(sim(), worker, &config()).unwrap();
        let bare = Envelope::new(WorkerMessage::Init {
            device_pixel_ratio: 1.0,
        });
        assert_eq!(
            context.handle(bare),
            Err(EngineError::Protocol(ProtocolError::MissingTransfer("init")))
        );
    }

    #[test]
    fn test_picks_are_posted_back() {
        let (orchestrator, worker) = channel();
        let mut context = WorkerContext::start(sim(), worker, &config()).unwrap();
        orchestrator.try_recv().unwrap();

        context.handle(init(2.0)).unwrap();
        while context.on_frame(Instant::now()).unwrap() != TickOutcome::BecameReady {}

        orchestrator
            .post_message(WorkerMessage::MouseMove { x: 10.0, y: 20.0 })
            .unwrap();
        assert_eq!(context.drain().unwrap(), 1);
        assert_eq!(context.on_frame(Instant::now()).unwrap(), TickOutcome::Rendered);

        let envelope = orchestrator.try_recv().unwrap().unwrap();
        assert_eq!(
            envelope.message(),
            &HostMessage::Pick {
                list: vec![PickItem::new(7)].into()
            }
        );
    }

    #[test]
    fn test_unknown_and_stop_messages() {
        let (orchestrator, worker) = channel();
        let mut context = WorkerContext::start(sim(), worker, &config()).unwrap();
        context.handle(init(1.0)).unwrap();

        assert_eq!(
            context.handle(Envelope::new(WorkerMessage::Unknown)).unwrap(),
            Dispatch::Skipped
        );
        orchestrator.post_message(WorkerMessage::StopRunning).unwrap();
        context.drain().unwrap();
        assert_eq!(context.on_frame(Instant::now()).unwrap(), TickOutcome::Paused);

        orchestrator.post_message(WorkerMessage::StartRunning).unwrap();
        context.drain().unwrap();
        assert!(context.engine().is_running());
    }

    #[test]
    fn test_selection_message_reaches_module() {
        let (orchestrator, worker) = channel();
        let mut context = WorkerContext::start(sim(), worker, &config()).unwrap();
        context.handle(init(1.0)).unwrap();
        while context.on_frame(Instant::now()).unwrap() != TickOutcome::BecameReady {}

        let list: PickList = vec![PickItem::new(12), PickItem::new(7)].into();
        orchestrator
            .post_message(WorkerMessage::Select { list: list.clone() })
            .unwrap();
        context.drain().unwrap();

        let handle = context.engine().handle().raw();
        let app = context.engine().bridge().module().app(handle).unwrap();
        assert_eq!(app.info().selection, list);
    }

    #[test]
    fn test_out_of_range_block_time_does_not_stall_render() {
        let (orchestrator, worker) = channel();
        let mut context = WorkerContext::start(sim(), worker, &config()).unwrap();
        context.handle(init(1.0)).unwrap();
        while context.on_frame(Instant::now()).unwrap() != TickOutcome::BecameReady {}

        orchestrator
            .post_message(WorkerMessage::BlockRender { block_time: 1e300 })
            .unwrap();
        orchestrator
            .post_message(WorkerMessage::MouseMove { x: 10.0, y: 20.0 })
            .unwrap();
        assert_eq!(context.drain().unwrap(), 2);

        let start = Instant::now();
        assert_eq!(context.on_frame(Instant::now()).unwrap(), TickOutcome::Rendered);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_spawned_worker_exits_on_hangup() {
        let (orchestrator, worker) = channel();
        let join = spawn_worker(sim, worker, config()).unwrap();

        let envelope = orchestrator.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(envelope.map(|e| e.message().clone()), Some(HostMessage::WorkerIsReady));
        drop(orchestrator);
        // Released before readiness is a skip, so the worker exits cleanly.
        assert_eq!(join.join().unwrap(), Ok(()));
    }
}
