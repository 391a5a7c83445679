//! # Closure Bridge
//!
//! A module-side closure is two words (`call`, `env`) plus a destructor id.
//! The host wraps them into a [`ClosureRef`] that can be stored in the heap,
//! registered on a timer and invoked many times before it is released.
//!
//! ## Lifetime
//!
//! ```text
//! wrap()            refcount = 1
//! begin_call()      refcount + 1, env cleared while the call runs
//! end_call()        refcount - 1, env restored  (or teardown at 0)
//! release()         refcount - 1                (or teardown at 0)
//! last ClosureRef dropped  -> id queued for finalization (backstop only)
//! ```
//!
//! The registry never calls into the module itself. It hands back a
//! [`Teardown`] and the bridge runs the destructor once the module is no
//! longer mid-call.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::{FfiError, FfiResult};

/// The words a destructor is invoked with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Teardown {
    /// Module destructor id.
    pub dtor: u32,
    /// Module call word.
    pub call: u32,
    /// Module environment word, as it was before any call cleared it.
    pub env: u32,
}

#[derive(Debug)]
struct ClosureState {
    call: u32,
    env: u32,
    refcount: u32,
    dtor: u32,
}

impl ClosureState {
    const fn teardown(&self, env: u32) -> Teardown {
        Teardown {
            dtor: self.dtor,
            call: self.call,
            env,
        }
    }
}

struct ClosureToken {
    id: u32,
    finalizer: Sender<u32>,
}

impl Drop for ClosureToken {
    fn drop(&mut self) {
        // The registry may already be gone.
        let _ = self.finalizer.send(self.id);
    }
}

/// Host-side callable wrapping a module closure.
///
/// Cloning is cheap. When the last clone is dropped the closure is queued
/// for finalization; an explicit [`ClosureRegistry::release`] is still the
/// primary release path.
#[derive(Clone)]
pub struct ClosureRef(Arc<ClosureToken>);

impl ClosureRef {
    /// Registry id of the wrapped closure.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u32 {
        self.0.id
    }
}

impl PartialEq for ClosureRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for ClosureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClosureRef({})", self.id())
    }
}

/// Refcount table for every live module closure.
pub struct ClosureRegistry {
    states: HashMap<u32, ClosureState>,
    next_id: u32,
    finalize_tx: Sender<u32>,
    finalize_rx: Receiver<u32>,
}

impl ClosureRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let (finalize_tx, finalize_rx) = unbounded();
        Self {
            states: HashMap::new(),
            next_id: 1,
            finalize_tx,
            finalize_rx,
        }
    }

    /// Number of closures not yet torn down.
    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.states.len()
    }

    /// Whether `id` still has registered state.
    #[inline]
    #[must_use]
    pub fn is_live(&self, id: u32) -> bool {
        self.states.contains_key(&id)
    }

    /// Current refcount of `id`, if it is live.
    #[must_use]
    pub fn refcount(&self, id: u32) -> Option<u32> {
        self.states.get(&id).map(|state| state.refcount)
    }

    /// Wraps a module closure. The refcount starts at 1.
    ///
    /// Ids are never reused, so a late finalization for a released closure
    /// can never hit a newer one.
    pub fn wrap(&mut self, call: u32, env: u32, dtor: u32) -> ClosureRef {
        let id = self.next_id;
        self.next_id += 1;
        self.states.insert(
            id,
            ClosureState {
                call,
                env,
                refcount: 1,
                dtor,
            },
        );
        tracing::trace!(id, call, env, dtor, "closure wrapped");
        ClosureRef(Arc::new(ClosureToken {
            id,
            finalizer: self.finalize_tx.clone(),
        }))
    }

    /// Starts an invocation: bumps the refcount and clears `env` so a
    /// re-entrant release cannot run the destructor underneath the call.
    ///
    /// Returns the `(call, env)` words to invoke with.
    ///
    /// # Errors
    ///
    /// [`FfiError::UnknownClosure`] if the closure was already torn down.
    pub fn begin_call(&mut self, id: u32) -> FfiResult<(u32, u32)> {
        let state = self.states.get_mut(&id).ok_or(FfiError::UnknownClosure(id))?;
        state.refcount += 1;
        let env = std::mem::take(&mut state.env);
        Ok((state.call, env))
    }

    /// Finishes an invocation started by [`Self::begin_call`].
    ///
    /// Returns the teardown to run if this was the last reference;
    /// otherwise `env` is restored for the next call.
    pub fn end_call(&mut self, id: u32, env: u32) -> Option<Teardown> {
        let state = self.states.get_mut(&id)?;
        state.refcount -= 1;
        if state.refcount == 0 {
            let teardown = state.teardown(env);
            self.states.remove(&id);
            return Some(teardown);
        }
        state.env = env;
        None
    }

    /// Drops the owner's reference.
    ///
    /// Returns the teardown when no invocation is in flight. While a call is
    /// running the teardown is deferred to its [`Self::end_call`].
    pub fn release(&mut self, id: u32) -> Option<Teardown> {
        let state = self.states.get_mut(&id)?;
        state.refcount -= 1;
        if state.refcount == 0 {
            let teardown = state.teardown(state.env);
            self.states.remove(&id);
            return Some(teardown);
        }
        None
    }

    /// Collects closures whose every [`ClosureRef`] was dropped without an
    /// explicit release.
    pub fn drain_finalized(&mut self) -> Vec<Teardown> {
        let mut teardowns = Vec::new();
        while let Ok(id) = self.finalize_rx.try_recv() {
            if let Some(state) = self.states.remove(&id) {
                tracing::warn!(id, "closure finalized without explicit release");
                teardowns.push(state.teardown(state.env));
            }
        }
        teardowns
    }
}

impl Default for ClosureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClosureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureRegistry")
            .field("live", &self.states.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destructor_once_after_last_call() {
        let mut registry = ClosureRegistry::new();
        let closure = registry.wrap(10, 20, 30);

        for _ in 0..5 {
            let (call, env) = registry.begin_call(closure.id()).unwrap();
            assert_eq!((call, env), (10, 20));
            assert!(registry.end_call(closure.id(), env).is_none());
        }
        assert_eq!(registry.refcount(closure.id()), Some(1));

        let teardown = registry.release(closure.id()).unwrap();
        assert_eq!(
            teardown,
            Teardown {
                dtor: 30,
                call: 10,
                env: 20
            }
        );
        assert!(!registry.is_live(closure.id()));
        assert!(registry.release(closure.id()).is_none());
    }

    #[test]
    fn test_release_during_call_defers_teardown() {
        let mut registry = ClosureRegistry::new();
        let closure = registry.wrap(1, 2, 3);

        let (_, env) = registry.begin_call(closure.id()).unwrap();
        assert_eq!(registry.refcount(closure.id()), Some(2));

        // Owner lets go from inside the call.
        assert!(registry.release(closure.id()).is_none());

        let teardown = registry.end_call(closure.id(), env).unwrap();
        assert_eq!(teardown.env, 2);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_env_cleared_while_in_flight() {
        let mut registry = ClosureRegistry::new();
        let closure = registry.wrap(1, 99, 3);

        let (_, outer) = registry.begin_call(closure.id()).unwrap();
        let (_, inner) = registry.begin_call(closure.id()).unwrap();
        assert_eq!(outer, 99);
        assert_eq!(inner, 0);

        registry.end_call(closure.id(), inner);
        registry.end_call(closure.id(), outer);
        assert_eq!(registry.begin_call(closure.id()).unwrap().1, 99);
    }

    #[test]
    fn test_call_after_teardown_is_unknown() {
        let mut registry = ClosureRegistry::new();
        let closure = registry.wrap(1, 2, 3);
        registry.release(closure.id());
        assert_eq!(
            registry.begin_call(closure.id()),
            Err(FfiError::UnknownClosure(closure.id()))
        );
    }

    #[test]
    fn test_finalizer_backstop() {
        let mut registry = ClosureRegistry::new();
        let closure = registry.wrap(1, 2, 3);
        let id = closure.id();
        let copy = closure.clone();

        drop(closure);
        assert!(registry.drain_finalized().is_empty());

        drop(copy);
        let teardowns = registry.drain_finalized();
        assert_eq!(teardowns.len(), 1);
        assert!(!registry.is_live(id));
    }

    #[test]
    fn test_finalizer_ignores_released() {
        let mut registry = ClosureRegistry::new();
        let closure = registry.wrap(1, 2, 3);
        assert!(registry.release(closure.id()).is_some());

        drop(closure);
        assert!(registry.drain_finalized().is_empty());
    }
}
