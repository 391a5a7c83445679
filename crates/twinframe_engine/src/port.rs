//! # Message Ports
//!
//! A connected pair of ports carries envelopes between the orchestrator and
//! the worker. Queues are unbounded: there is no back-pressure and no
//! acknowledgement, and each side sees the other's messages in send order.
//!
//! ```text
//! Orchestrator ── Envelope<WorkerMessage> ──► Worker
//! Orchestrator ◄── Envelope<HostMessage> ──── Worker
//! ```

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use twinframe_shared::{Envelope, HostMessage, WorkerMessage};

use crate::error::{EngineError, EngineResult};

/// One end of a connected pair. Sends `S`, receives `R`.
#[derive(Debug)]
pub struct Port<S, R> {
    outbox: Sender<Envelope<S>>,
    inbox: Receiver<Envelope<R>>,
}

/// The orchestrator's end.
pub type OrchestratorPort = Port<WorkerMessage, HostMessage>;

/// The worker's end.
pub type WorkerPort = Port<HostMessage, WorkerMessage>;

/// Creates a connected pair of ports.
#[must_use]
pub fn channel() -> (OrchestratorPort, WorkerPort) {
    let (to_worker, worker_inbox) = unbounded();
    let (to_orchestrator, orchestrator_inbox) = unbounded();
    (
        Port {
            outbox: to_worker,
            inbox: orchestrator_inbox,
        },
        Port {
            outbox: to_orchestrator,
            inbox: worker_inbox,
        },
    )
}

impl<S, R> Port<S, R> {
    /// Posts an envelope.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`] if the other end was dropped.
    #[inline]
    pub fn post(&self, envelope: Envelope<S>) -> EngineResult<()> {
        self.outbox.send(envelope).map_err(|_| EngineError::Disconnected)
    }

    /// Posts a message with nothing to transfer.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`] if the other end was dropped.
    #[inline]
    pub fn post_message(&self, message: S) -> EngineResult<()> {
        self.post(Envelope::new(message))
    }

    /// Takes the next envelope if one is queued.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`] once the queue is empty and the other
    /// end was dropped.
    pub fn try_recv(&self) -> EngineResult<Option<Envelope<R>>> {
        match self.inbox.try_recv() {
            Ok(envelope) => Ok(Some(envelope)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(EngineError::Disconnected),
        }
    }

    /// Waits up to `timeout` for the next envelope.
    ///
    /// # Errors
    ///
    /// [`EngineError::Disconnected`] once the queue is empty and the other
    /// end was dropped.
    pub fn recv_timeout(&self, timeout: Duration) -> EngineResult<Option<Envelope<R>>> {
        match self.inbox.recv_timeout(timeout) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Disconnected),
        }
    }

    /// Envelopes waiting to be received.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inbox.len()
    }

    /// The receiving side, for `select!`.
    #[inline]
    #[must_use]
    pub const fn receiver(&self) -> &Receiver<Envelope<R>> {
        &self.inbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinframe_shared::{OffscreenSurface, PickList};

    #[test]
    fn test_pair_is_crossed() {
        let (orchestrator, worker) = channel();
        orchestrator.post_message(WorkerMessage::LeftBtUp).unwrap();
        worker.post_message(HostMessage::WorkerIsReady).unwrap();

        assert_eq!(worker.pending_count(), 1);
        let envelope = worker.try_recv().unwrap().unwrap();
        assert_eq!(envelope.message(), &WorkerMessage::LeftBtUp);
        let envelope = orchestrator.try_recv().unwrap().unwrap();
        assert_eq!(envelope.message(), &HostMessage::WorkerIsReady);
        assert!(orchestrator.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_transfer_moves_with_envelope() {
        let (orchestrator, worker) = channel();
        orchestrator
            .post(Envelope::with_transfer(
                WorkerMessage::Init {
                    device_pixel_ratio: 2.0,
                },
                OffscreenSurface::new(3, 800, 600),
            ))
            .unwrap();

        let (_, surface) = worker.try_recv().unwrap().unwrap().into_parts();
        assert_eq!(surface.map(|s| s.id()), Some(3));
    }

    #[test]
    fn test_disconnect_surfaces() {
        let (orchestrator, worker) = channel();
        worker
            .post_message(HostMessage::Pick {
                list: PickList::new(),
            })
            .unwrap();
        drop(worker);

        // Queued messages are still delivered first.
        assert!(orchestrator.try_recv().unwrap().is_some());
        assert_eq!(orchestrator.try_recv().unwrap_err(), EngineError::Disconnected);
        assert_eq!(
            orchestrator.post_message(WorkerMessage::StartRunning),
            Err(EngineError::Disconnected)
        );
        assert_eq!(
            orchestrator.recv_timeout(Duration::from_millis(1)).unwrap_err(),
            EngineError::Disconnected
        );
    }
}
