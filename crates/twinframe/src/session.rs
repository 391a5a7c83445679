//! # Demo Session
//!
//! Launches both contexts over the simulated module and drives them from
//! one loop on the calling thread, the way a page would: drain the worker's
//! messages, tick the main instance, and every few ticks move the pointer
//! over both canvases.

use std::thread;
use std::time::{Duration, Instant};

use twinframe_engine::{EngineResult, Notifier, Orchestrator, TickOutcome};
use twinframe_shared::PickList;
use twinframe_sim::SimModule;

use crate::config::TwinframeConfig;

/// What a session observed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Main-thread loop ticks.
    pub ticks: u64,
    /// Main-thread renders.
    pub main_renders: u64,
    /// Worker messages handled.
    pub messages: usize,
    /// Pick board updates from either context.
    pub picks_displayed: u64,
    /// Pick board text at the end.
    pub board_text: String,
    /// Latest pick at the end.
    pub latest_pick: PickList,
}

/// Runs the scripted session and shuts everything down.
///
/// # Errors
///
/// Any startup failure (module memory, capabilities, worker), or an engine
/// error during the session.
pub fn run_session(config: &TwinframeConfig, notifier: &dyn Notifier) -> EngineResult<SessionReport> {
    let worker_module = SimModule::new(config.sim.clone())?;
    let main_module = SimModule::new(config.sim.clone())?;
    let mut orchestrator = Orchestrator::launch(
        config.orchestrator_settings(),
        &config.capabilities(),
        notifier,
        move || worker_module,
        main_module,
    )?;

    let report = drive(&mut orchestrator, config);
    let shutdown = orchestrator.shutdown();
    let report = report?;
    shutdown?;

    tracing::info!(
        ticks = report.ticks,
        renders = report.main_renders,
        picks = report.picks_displayed,
        board = %report.board_text,
        "session finished"
    );
    Ok(report)
}

fn drive(orchestrator: &mut Orchestrator<SimModule>, config: &TwinframeConfig) -> EngineResult<SessionReport> {
    let interval = config.frame_interval();
    let demo = &config.demo;
    let deadline = Instant::now() + Duration::from_millis(demo.duration_ms);
    let mut report = SessionReport::default();
    let mut step = 0usize;

    while Instant::now() < deadline {
        report.messages += orchestrator.pump_messages()?;
        if orchestrator.main_frame(Instant::now())? == TickOutcome::Rendered {
            report.main_renders += 1;
        }

        if !demo.path.is_empty() && report.ticks % u64::from(demo.step_every.max(1)) == 0 {
            if demo.click && !orchestrator.latest_pick().is_empty() {
                orchestrator.worker_click()?;
                orchestrator.main_click()?;
            }
            let (x, y) = demo.path[step % demo.path.len()];
            orchestrator.worker_pointer_move(x, y)?;
            orchestrator.main_pointer_move(x, y)?;
            step += 1;
        }

        report.ticks += 1;
        thread::sleep(interval);
    }

    report.messages += orchestrator.pump_messages()?;
    let board = orchestrator.board();
    let (text, revision) = board.snapshot();
    report.board_text = text;
    report.picks_displayed = revision;
    report.latest_pick = orchestrator.latest_pick().clone();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinframe_engine::{EngineError, LogNotifier};
    use twinframe_ffi::FfiError;

    fn quick() -> TwinframeConfig {
        let mut config = TwinframeConfig::default();
        config.engine.frame_interval_ms = 2;
        config.startup.ready_poll_interval_ms = 2;
        config.latency.worker_render_ms = 0.0;
        config.demo.duration_ms = 400;
        config.demo.step_every = 2;
        config.sim.prepare_steps = 1;
        config.sim.prepare_interval_ms = 0;
        config
    }

    #[test]
    fn test_session_produces_picks() {
        let report = run_session(&quick(), &LogNotifier).unwrap();
        assert!(report.ticks > 0);
        assert!(report.main_renders > 0);
        assert!(report.picks_displayed > 0);
        assert!(!report.board_text.is_empty());
    }

    #[test]
    fn test_session_refused_without_gpu() {
        let mut config = quick();
        config.capabilities.gpu_adapter = false;
        assert_eq!(
            run_session(&config, &LogNotifier),
            Err(EngineError::MissingCapability("gpu_adapter".into()))
        );
    }

    #[test]
    fn test_session_refused_with_bad_page_size() {
        let mut config = quick();
        config.sim.page_size = 10;
        assert_eq!(
            run_session(&config, &LogNotifier),
            Err(EngineError::Ffi(FfiError::InvalidPageSize(10)))
        );
    }
}
