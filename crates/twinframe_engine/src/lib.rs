//! # Twinframe Engine
//!
//! Runs one engine module in two contexts at once: directly on the main
//! thread, and behind a message port on a worker thread.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────── MAIN THREAD ─────────────────┐      ┌────── WORKER THREAD ──────┐
//! │ Orchestrator                                 │      │ WorkerContext             │
//! │   ├── PickState / PickBoard                  │ port │   └── EngineCoordinator   │
//! │   ├── OrchestratorPort ◄─────────────────────┼──────┼──►    + FrameThrottle     │
//! │   └── EngineCoordinator (main instance)      │      │       └── EngineBridge    │
//! │          └── EngineBridge                    │      └───────────────────────────┘
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! `Created -> Initializing -> AwaitingReadiness -> Running <-> Stopped -> Released`
//!
//! Nothing but readiness polling reaches the module until preparation is
//! complete, and nothing reaches it at all after release.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod capability;
pub mod coordinator;
pub mod error;
pub mod latency;
pub mod orchestrator;
pub mod pick;
pub mod port;
pub mod throttle;
pub mod worker;

pub use capability::{check_capabilities, LogNotifier, Notifier, PlatformCapabilities, UNSUPPORTED_PLATFORM_MESSAGE};
pub use coordinator::{CoordinatorState, Dispatch, EngineCoordinator, TickOutcome};
pub use error::{EngineError, EngineResult};
pub use latency::LatencyHooks;
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use pick::{PickBoard, PickState};
pub use port::{channel, OrchestratorPort, Port, WorkerPort};
pub use throttle::FrameThrottle;
pub use worker::{spawn_worker, WorkerConfig, WorkerContext};
