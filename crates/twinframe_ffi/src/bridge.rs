//! # Engine Bridge
//!
//! The typed call surface over a [`ForeignModule`]. Each method marshals its
//! arguments (heap slots, strings, BigInts), makes one raw export call, and
//! then runs any closure destructors the call made due.

use std::sync::Arc;
use std::time::Instant;

use twinframe_shared::{EngineHandle, OffscreenSurface, PickItem, PickList};

use crate::closure::{ClosureRef, Teardown};
use crate::error::{FfiError, FfiResult};
use crate::host::HostState;
use crate::marshal::pass_string;
use crate::module::{ForeignModule, HostImports};
use crate::value::HostValue;

/// A module instance plus the host state it talks to.
pub struct EngineBridge<M> {
    module: M,
    host: HostState,
}

impl<M: ForeignModule> EngineBridge<M> {
    /// Wraps an instantiated module.
    ///
    /// # Arguments
    ///
    /// * `module` - The instantiated module
    /// * `context` - Name of the owning execution context, for logs
    #[must_use]
    pub fn new(module: M, context: &'static str) -> Self {
        Self {
            module,
            host: HostState::new(context),
        }
    }

    /// The wrapped module.
    #[inline]
    #[must_use]
    pub const fn module(&self) -> &M {
        &self.module
    }

    /// Host-side state.
    #[inline]
    #[must_use]
    pub const fn host(&self) -> &HostState {
        &self.host
    }

    /// Mutable host-side state.
    #[inline]
    pub fn host_mut(&mut self) -> &mut HostState {
        &mut self.host
    }

    /// Creates an engine instance.
    pub fn init_app(&mut self) -> EngineHandle {
        let raw = self.module.init_app(&mut self.host);
        self.settle();
        EngineHandle::from_raw(raw)
    }

    /// Binds a page canvas by element id.
    ///
    /// # Errors
    ///
    /// Marshalling errors while copying the id into module memory.
    pub fn create_window_by_canvas(&mut self, app: EngineHandle, element_id: &str, scale_factor: f32) -> FfiResult<()> {
        let (ptr, len) = pass_string(self.module.space(), self.host.views_mut(), element_id)?;
        self.module
            .create_window_by_canvas(&mut self.host, app.raw(), ptr, len, scale_factor);
        self.settle();
        Ok(())
    }

    /// Binds a transferred surface.
    pub fn create_window_by_offscreen_canvas(&mut self, app: EngineHandle, surface: OffscreenSurface, scale_factor: f32) {
        let canvas = self.host.add_object(HostValue::Surface(Arc::new(surface)));
        self.module
            .create_window_by_offscreen_canvas(&mut self.host, app.raw(), canvas, scale_factor);
        self.settle();
    }

    /// Whether the instance finished preparing its device.
    pub fn is_preparation_completed(&mut self, app: EngineHandle) -> bool {
        let ret = self.module.is_preparation_completed(&mut self.host, app.raw());
        self.settle();
        ret != 0
    }

    /// Advances one frame.
    pub fn enter_frame(&mut self, app: EngineHandle) {
        self.module.enter_frame(&mut self.host, app.raw());
        self.settle();
    }

    /// Pointer moved, logical coordinates.
    pub fn mouse_move(&mut self, app: EngineHandle, x: f32, y: f32) {
        self.module.mouse_move(&mut self.host, app.raw(), x, y);
        self.settle();
    }

    /// Left button pressed over `item`.
    pub fn left_bt_down(&mut self, app: EngineHandle, item: PickItem, x: f32, y: f32) {
        let obj = self.host.add_object(HostValue::BigInt(item.bits()));
        self.module.left_bt_down(&mut self.host, app.raw(), obj, x, y);
        self.settle();
    }

    /// Left button released.
    pub fn left_bt_up(&mut self, app: EngineHandle) {
        self.module.left_bt_up(&mut self.host, app.raw());
        self.settle();
    }

    /// Replaces the hover set.
    pub fn set_hover(&mut self, app: EngineHandle, list: &PickList) {
        let arr = self.host.add_object(HostValue::from_pick_list(list));
        self.module.set_hover(&mut self.host, app.raw(), arr);
        self.settle();
    }

    /// Replaces the selection.
    pub fn set_selection(&mut self, app: EngineHandle, list: &PickList) {
        let arr = self.host.add_object(HostValue::from_pick_list(list));
        self.module.set_selection(&mut self.host, app.raw(), arr);
        self.settle();
    }

    /// Toggles auto-animation.
    pub fn set_auto_animation(&mut self, app: EngineHandle, enabled: bool) {
        self.module
            .set_auto_animation(&mut self.host, app.raw(), u32::from(enabled));
        self.settle();
    }

    /// Destroys an instance.
    pub fn release_app(&mut self, app: EngineHandle) {
        self.module.release_app(&mut self.host, app.raw());
        self.settle();
    }

    /// Invokes a wrapped closure with one argument.
    ///
    /// The refcount is held across the call; if the owner released the
    /// closure meanwhile, the destructor runs once the call returns.
    ///
    /// # Errors
    ///
    /// [`FfiError::UnknownClosure`] if the closure was already torn down.
    pub fn invoke_closure(&mut self, closure: &ClosureRef, arg: HostValue) -> FfiResult<()> {
        let id = closure.id();
        let (call, env) = self.host.closures_mut().begin_call(id)?;
        let arg = self.host.add_object(arg);
        self.module.invoke_closure(&mut self.host, call, env, arg);
        if let Some(teardown) = self.host.closures_mut().end_call(id, env) {
            self.destroy(teardown);
        }
        self.settle();
        Ok(())
    }

    /// Fires due timers and runs finalizers. Returns how many timers fired.
    ///
    /// # Errors
    ///
    /// Only errors other than a torn-down timer callback, which is logged
    /// and its timer cancelled.
    pub fn pump(&mut self, now: Instant) -> FfiResult<usize> {
        let due = self.host.due_timers(now);
        let mut fired = 0;
        for (id, callback) in due {
            if !self.host.timers().contains(id) {
                continue;
            }
            match self.invoke_closure(&callback, HostValue::Undefined) {
                Ok(()) => fired += 1,
                Err(FfiError::UnknownClosure(closure)) => {
                    tracing::warn!(
                        context = self.host.context(),
                        timer = id,
                        closure,
                        "timer callback already released, cancelling timer"
                    );
                    self.host.drop_timer(id);
                }
                Err(e) => return Err(e),
            }
        }
        self.run_finalizers();
        Ok(fired)
    }

    /// Pick lists the module published since the last call.
    pub fn take_picks(&mut self) -> Vec<PickList> {
        self.host.take_picks()
    }

    /// Sets the synthetic busy-wait of the module's `block` import.
    pub fn set_render_block_ms(&mut self, ms: f64) {
        self.host.set_render_block_ms(ms);
    }

    /// Tears down closures whose every reference was dropped without an
    /// explicit release.
    pub fn run_finalizers(&mut self) {
        for teardown in self.host.closures_mut().drain_finalized() {
            self.destroy(teardown);
        }
        self.settle();
    }

    fn destroy(&mut self, teardown: Teardown) {
        self.module
            .destroy_closure(&mut self.host, teardown.dtor, teardown.call, teardown.env);
    }

    /// Runs destructors queued by imports during the last export call.
    /// A destructor may queue more.
    fn settle(&mut self) {
        loop {
            let pending = self.host.take_teardowns();
            if pending.is_empty() {
                break;
            }
            for teardown in pending {
                self.destroy(teardown);
            }
        }
    }
}

impl<M> std::fmt::Debug for EngineBridge<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBridge").field("host", &self.host).finish_non_exhaustive()
    }
}
