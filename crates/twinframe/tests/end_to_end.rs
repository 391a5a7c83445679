//! End-to-end tests: both contexts wired together over a real port.

use std::time::{Duration, Instant};

use twinframe::{run_session, TwinframeConfig};
use twinframe_engine::{
    channel, CoordinatorState, Dispatch, LatencyHooks, LogNotifier, Orchestrator, OrchestratorSettings, TickOutcome,
    WorkerConfig, WorkerContext,
};
use twinframe_shared::{CanvasElement, PickItem, PickList, WORKER_CANVAS_ID};
use twinframe_sim::{SimApp, SimConfig, SimModule};

fn sim() -> SimModule {
    SimModule::new(SimConfig {
        prepare_steps: 2,
        prepare_interval_ms: 0,
        ..SimConfig::default()
    })
    .unwrap()
}

/// Orchestrator and worker on one thread, `init` already delivered.
fn pair(ratio: f32) -> (Orchestrator<SimModule>, WorkerContext<SimModule>) {
    let (port, worker_port) = channel();
    let config = WorkerConfig {
        render_block_ms: 0.0,
        ..WorkerConfig::default()
    };
    let worker = WorkerContext::start(sim(), worker_port, &config).unwrap();

    let settings = OrchestratorSettings {
        device_pixel_ratio: ratio,
        worker_canvas: CanvasElement::new(WORKER_CANVAS_ID, 1, (800, 600), ratio),
        latency: LatencyHooks::none(),
        ready_poll_interval: Duration::from_millis(1),
        ..OrchestratorSettings::default()
    };
    let mut orchestrator = Orchestrator::with_port(port, settings, sim());
    orchestrator.await_worker_ready().unwrap();
    (orchestrator, worker)
}

fn worker_app(worker: &WorkerContext<SimModule>) -> &SimApp {
    let engine = worker.engine();
    engine.bridge().module().app(engine.handle().raw()).unwrap()
}

fn until_ready(worker: &mut WorkerContext<SimModule>) {
    for _ in 0..100 {
        if worker.on_frame(Instant::now()).unwrap() == TickOutcome::BecameReady {
            return;
        }
    }
    panic!("worker never became ready");
}

fn list(items: &[u64]) -> PickList {
    items.iter().copied().map(PickItem::new).collect::<Vec<_>>().into()
}

#[test]
fn test_scenario_a_init_ready_resume_move() {
    let (mut orchestrator, mut worker) = pair(2.0);
    assert!(orchestrator.init_sent());

    assert_eq!(worker.drain().unwrap(), 1);
    assert_eq!(worker.engine().state(), CoordinatorState::AwaitingReadiness);
    assert_eq!(worker_app(&worker).scale_factor(), 2.0);

    until_ready(&mut worker);
    assert_eq!(worker.engine().state(), CoordinatorState::Running);

    orchestrator.stop_worker().unwrap();
    worker.drain().unwrap();
    assert_eq!(worker.on_frame(Instant::now()).unwrap(), TickOutcome::Paused);
    orchestrator.start_worker().unwrap();
    worker.drain().unwrap();
    assert_eq!(worker.engine().state(), CoordinatorState::Running);

    // A first move produces a pick so there is something to invalidate.
    orchestrator.worker_pointer_move(10.0, 20.0).unwrap();
    worker.drain().unwrap();
    worker.on_frame(Instant::now()).unwrap();
    orchestrator.pump_messages().unwrap();
    assert_eq!(orchestrator.latest_pick(), &list(&[7]));

    orchestrator.worker_pointer_move(10.0, 20.0).unwrap();
    assert!(orchestrator.latest_pick().is_empty());
    worker.drain().unwrap();
    assert_eq!(worker_app(&worker).cursor(), Some((20.0, 40.0)));
}

#[test]
fn test_scenario_b_pick_is_stored_displayed_and_hovered() {
    let (mut orchestrator, mut worker) = pair(1.0);
    worker.drain().unwrap();
    until_ready(&mut worker);

    orchestrator.worker_pointer_move(10.0, 20.0).unwrap();
    worker.drain().unwrap();
    assert_eq!(worker.on_frame(Instant::now()).unwrap(), TickOutcome::Rendered);

    assert_eq!(orchestrator.pump_messages().unwrap(), 1);
    assert_eq!(orchestrator.latest_pick(), &list(&[7]));
    assert_eq!(orchestrator.board().text(), "e7");

    assert_eq!(worker.drain().unwrap(), 1);
    assert_eq!(worker_app(&worker).info().hover, list(&[7]));
}

#[test]
fn test_scenario_c_pointer_down_without_pick_is_inert() {
    let (mut orchestrator, mut worker) = pair(1.0);
    worker.drain().unwrap();
    until_ready(&mut worker);
    let handled = worker.handled();

    assert!(orchestrator.latest_pick().is_empty());
    assert_eq!(orchestrator.worker_pointer_down(10.0, 20.0).unwrap(), Dispatch::Skipped);
    assert_eq!(orchestrator.worker_click().unwrap(), Dispatch::Skipped);
    assert_eq!(orchestrator.main_pointer_down(10.0, 20.0).unwrap(), Dispatch::Skipped);

    assert_eq!(worker.drain().unwrap(), 0);
    assert_eq!(worker.handled(), handled);
    let info = worker_app(&worker).info();
    assert_eq!(info.drag, None);
    assert!(info.selection.is_empty());
}

#[test]
fn test_click_selects_whole_list_in_both_contexts() {
    let (mut orchestrator, mut worker) = pair(1.0);
    worker.drain().unwrap();
    until_ready(&mut worker);

    // (60, 60) lies over both overlapping rectangles.
    orchestrator.worker_pointer_move(60.0, 60.0).unwrap();
    worker.drain().unwrap();
    worker.on_frame(Instant::now()).unwrap();
    orchestrator.pump_messages().unwrap();
    let picked = orchestrator.latest_pick().clone();
    assert_eq!(picked, list(&[12, 7]));

    assert!(orchestrator.worker_click().unwrap().issued());
    worker.drain().unwrap();
    assert_eq!(worker_app(&worker).info().selection, picked);

    assert!(orchestrator.worker_pointer_down(60.0, 60.0).unwrap().issued());
    worker.drain().unwrap();
    assert_eq!(worker_app(&worker).info().drag, Some(PickItem::new(12)));
}

#[test]
fn test_sample_config_runs_a_session() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../twinframe.toml");
    let mut config = TwinframeConfig::load(path).unwrap();
    assert_eq!(config.engine.device_pixel_ratio, 2.0);

    config.engine.frame_interval_ms = 2;
    config.startup.ready_poll_interval_ms = 2;
    config.demo.duration_ms = 300;
    config.demo.step_every = 2;
    let report = run_session(&config, &LogNotifier).unwrap();
    assert!(report.ticks > 0);
    assert!(report.picks_displayed > 0);
}
