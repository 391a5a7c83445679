//! # Host State
//!
//! Everything the host keeps on its side of one module instance, and the
//! [`HostImports`] implementation the module re-enters through.

use std::time::{Duration, Instant};

use twinframe_shared::PickList;

use crate::closure::{ClosureRef, ClosureRegistry, Teardown};
use crate::error::{FfiError, FfiResult};
use crate::heap::HeapTable;
use crate::marshal::{array_u32, pass_string, read_string};
use crate::memory::{LinearMemory, ViewCache};
use crate::module::{HostImports, ModuleMemory};
use crate::timers::IntervalTimers;
use crate::value::HostValue;

/// Spins for `ms` milliseconds.
///
/// A deliberate busy-wait used to simulate latency. It never sleeps and
/// never yields to another context. Non-positive or non-finite durations,
/// and durations past what the clock can represent, return immediately.
pub fn block_for(ms: f64) {
    if !ms.is_finite() || ms <= 0.0 {
        return;
    }
    let Some(deadline) = Duration::try_from_secs_f64(ms / 1000.0)
        .ok()
        .and_then(|wait| Instant::now().checked_add(wait))
    else {
        tracing::warn!(ms, "block duration out of range; not blocking");
        return;
    };
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

/// Host-side state of one module instance.
#[derive(Debug)]
pub struct HostState {
    context: &'static str,
    heap: HeapTable,
    views: ViewCache,
    closures: ClosureRegistry,
    timers: IntervalTimers,
    exception: Option<u32>,
    picks: Vec<PickList>,
    render_block_ms: f64,
    pending_teardowns: Vec<Teardown>,
}

impl HostState {
    /// Creates empty host state. `context` names the owning execution
    /// context in logs.
    #[must_use]
    pub fn new(context: &'static str) -> Self {
        Self {
            context,
            heap: HeapTable::new(),
            views: ViewCache::new(),
            closures: ClosureRegistry::new(),
            timers: IntervalTimers::new(),
            exception: None,
            picks: Vec::new(),
            render_block_ms: 0.0,
            pending_teardowns: Vec::new(),
        }
    }

    /// Name of the owning context.
    #[inline]
    #[must_use]
    pub const fn context(&self) -> &'static str {
        self.context
    }

    /// The heap object table.
    #[inline]
    #[must_use]
    pub const fn heap(&self) -> &HeapTable {
        &self.heap
    }

    /// The closure registry.
    #[inline]
    #[must_use]
    pub const fn closures(&self) -> &ClosureRegistry {
        &self.closures
    }

    /// Mutable closure registry.
    #[inline]
    pub fn closures_mut(&mut self) -> &mut ClosureRegistry {
        &mut self.closures
    }

    /// The interval timers.
    #[inline]
    #[must_use]
    pub const fn timers(&self) -> &IntervalTimers {
        &self.timers
    }

    /// The memory view cache.
    #[inline]
    pub fn views_mut(&mut self) -> &mut ViewCache {
        &mut self.views
    }

    /// Busy-wait applied by the `block` import.
    #[inline]
    #[must_use]
    pub const fn render_block_ms(&self) -> f64 {
        self.render_block_ms
    }

    /// Sets the busy-wait applied by the `block` import.
    pub fn set_render_block_ms(&mut self, ms: f64) {
        self.render_block_ms = ms;
    }

    /// Pick lists published since the last call, oldest first.
    pub fn take_picks(&mut self) -> Vec<PickList> {
        std::mem::take(&mut self.picks)
    }

    /// Whether an exception is waiting for the module.
    #[inline]
    #[must_use]
    pub const fn has_exception(&self) -> bool {
        self.exception.is_some()
    }

    pub(crate) fn take_teardowns(&mut self) -> Vec<Teardown> {
        std::mem::take(&mut self.pending_teardowns)
    }

    pub(crate) fn due_timers(&mut self, now: Instant) -> Vec<(i32, ClosureRef)> {
        self.timers.due(now)
    }

    pub(crate) fn drop_timer(&mut self, id: i32) {
        self.timers.clear_interval(id);
    }

    /// Captures a host-side failure as an exception value.
    fn capture(&mut self, message: String) {
        tracing::debug!(context = self.context, %message, "exception stored for module");
        let idx = self.heap.alloc(HostValue::Error(message));
        self.store_exception(idx);
    }
}

impl HostImports for HostState {
    fn object(&self, idx: u32) -> &HostValue {
        self.heap.get(idx)
    }

    fn add_object(&mut self, value: HostValue) -> u32 {
        self.heap.alloc(value)
    }

    fn take_object(&mut self, idx: u32) -> HostValue {
        self.heap.take(idx)
    }

    fn object_clone_ref(&mut self, idx: u32) -> u32 {
        self.heap.clone_ref(idx)
    }

    fn object_drop_ref(&mut self, idx: u32) {
        self.heap.free(idx);
    }

    fn string_new(&mut self, memory: &LinearMemory, ptr: u32, len: u32) -> FfiResult<u32> {
        let text = read_string(&mut self.views, memory, ptr, len)?;
        Ok(self.heap.alloc(HostValue::String(text)))
    }

    fn array_length(&self, array: u32) -> u32 {
        match self.heap.get(array) {
            HostValue::Array(values) => u32::try_from(values.len()).unwrap_or(u32::MAX),
            _ => 0,
        }
    }

    fn array_get(&mut self, array: u32, index: u32) -> u32 {
        let value = match self.heap.get(array) {
            HostValue::Array(values) => values.get(index as usize).cloned().unwrap_or(HostValue::Undefined),
            _ => HostValue::Undefined,
        };
        self.heap.alloc(value)
    }

    fn array_push(&mut self, array: u32, value: u32) -> u32 {
        let value = self.heap.take(value);
        match self.heap.get_mut(array) {
            Some(HostValue::Array(values)) => {
                values.push(value);
                u32::try_from(values.len()).unwrap_or(u32::MAX)
            }
            _ => 0,
        }
    }

    fn bigint_to_u64(&mut self, idx: u32) -> Option<u64> {
        let value = self.heap.get(idx);
        if let Some(n) = value.to_u64() {
            return Some(n);
        }
        let message = format!("cannot convert {} to a BigInt", value.describe());
        self.capture(message);
        None
    }

    fn log(&mut self, memory: &LinearMemory, ptr: u32, len: u32) {
        match read_string(&mut self.views, memory, ptr, len) {
            Ok(message) => tracing::info!(target: "twinframe::module", context = self.context, "{message}"),
            Err(e) => tracing::warn!(context = self.context, error = %e, "module log message dropped"),
        }
    }

    fn debug_string(&mut self, space: &mut dyn ModuleMemory, idx: u32) -> FfiResult<(u32, u32)> {
        let text = self.heap.get(idx).describe();
        pass_string(space, &mut self.views, &text)
    }

    fn throw(&mut self, memory: &LinearMemory, ptr: u32, len: u32) -> FfiError {
        match read_string(&mut self.views, memory, ptr, len) {
            Ok(message) => FfiError::Thrown(message),
            Err(e) => e,
        }
    }

    fn store_exception(&mut self, idx: u32) {
        if let Some(previous) = self.exception.replace(idx) {
            self.heap.free(previous);
        }
    }

    fn take_exception(&mut self) -> Option<HostValue> {
        self.exception.take().map(|idx| self.heap.take(idx))
    }

    fn send_pick(&mut self, memory: &LinearMemory, ptr: u32, words: u32) -> FfiResult<()> {
        let list = PickList::from_words(array_u32(&mut self.views, memory, ptr, words)?);
        tracing::debug!(context = self.context, pick = %list, "pick published");
        self.picks.push(list);
        Ok(())
    }

    fn block(&mut self) {
        block_for(self.render_block_ms);
    }

    fn set_interval(&mut self, callback: u32, period_ms: u32) -> Option<i32> {
        let value = self.heap.get(callback);
        if let Some(closure) = value.as_function() {
            let closure = closure.clone();
            let period = Duration::from_millis(u64::from(period_ms));
            return Some(self.timers.set_interval(closure, period, Instant::now()));
        }
        let message = format!("{} is not a function", value.describe());
        self.capture(message);
        None
    }

    fn clear_interval(&mut self, id: i32) {
        self.timers.clear_interval(id);
    }

    fn make_closure(&mut self, call: u32, env: u32, dtor: u32) -> u32 {
        let closure = self.closures.wrap(call, env, dtor);
        self.heap.alloc(HostValue::Function(closure))
    }

    fn closure_drop(&mut self, idx: u32) -> bool {
        let value = self.heap.take(idx);
        let Some(closure) = value.as_function() else {
            return false;
        };
        match self.closures.release(closure.id()) {
            Some(teardown) => {
                self.pending_teardowns.push(teardown);
                true
            }
            None => false,
        }
    }
}
