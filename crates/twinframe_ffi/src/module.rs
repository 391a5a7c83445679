//! # Module Boundary
//!
//! Two traits describe the boundary from each side:
//!
//! - [`ForeignModule`] is what a compiled module exports. Every export
//!   receives the host's import table so the module can re-enter the host
//!   while the call runs.
//! - [`HostImports`] is what the host gives back: heap objects, strings,
//!   logging, pick results, timers and closures.
//!
//! Only raw words cross: heap slots, pointers, lengths and the 64-bit app
//! handle. [`crate::EngineBridge`] turns these into typed calls.

use crate::error::FfiResult;
use crate::memory::LinearMemory;
use crate::value::HostValue;

/// The memory half of a module: its linear memory plus its allocator.
///
/// Split out from [`ForeignModule`] so an export can lend it to an import
/// (for example `debug_string`, which must allocate in module memory)
/// while still holding the rest of the module.
pub trait ModuleMemory {
    /// The module's linear memory.
    fn memory(&self) -> &LinearMemory;

    /// Mutable access to the module's linear memory.
    fn memory_mut(&mut self) -> &mut LinearMemory;

    /// Allocates `size` bytes aligned to `align`. May grow memory.
    ///
    /// # Errors
    ///
    /// [`crate::FfiError::OutOfMemory`] when memory cannot grow any further.
    fn malloc(&mut self, size: u32, align: u32) -> FfiResult<u32>;

    /// Resizes an allocation, preserving its prefix. May grow memory.
    ///
    /// # Errors
    ///
    /// [`crate::FfiError::OutOfMemory`] when memory cannot grow any further.
    fn realloc(&mut self, ptr: u32, old_size: u32, new_size: u32, align: u32) -> FfiResult<u32>;

    /// Releases an allocation.
    fn free(&mut self, ptr: u32, size: u32, align: u32);

    /// Whether [`Self::realloc`] is exported. Without it strings are
    /// encoded in one exact-size allocation.
    fn supports_realloc(&self) -> bool {
        true
    }
}

/// Callbacks a module may make into the host during an export call.
pub trait HostImports {
    /// Reads a heap slot. Unknown slots read as `undefined`.
    fn object(&self, idx: u32) -> &HostValue;

    /// Stores a value and returns its new slot.
    fn add_object(&mut self, value: HostValue) -> u32;

    /// Takes ownership of a slot's value, freeing the slot.
    fn take_object(&mut self, idx: u32) -> HostValue;

    /// Allocates a second slot for the same object.
    fn object_clone_ref(&mut self, idx: u32) -> u32;

    /// Frees a slot.
    fn object_drop_ref(&mut self, idx: u32);

    /// Creates a string object from UTF-8 in module memory.
    ///
    /// # Errors
    ///
    /// [`crate::FfiError::InvalidUtf8`] or a view error.
    fn string_new(&mut self, memory: &LinearMemory, ptr: u32, len: u32) -> FfiResult<u32>;

    /// Creates an empty array object.
    fn array_new(&mut self) -> u32 {
        self.add_object(HostValue::Array(Vec::new()))
    }

    /// Length of an array object, 0 for non-arrays.
    fn array_length(&self, array: u32) -> u32;

    /// Clones element `index` of an array into a new slot.
    fn array_get(&mut self, array: u32, index: u32) -> u32;

    /// Moves `value` into `array`. Returns the new length.
    fn array_push(&mut self, array: u32, value: u32) -> u32;

    /// Creates a BigInt object.
    fn bigint_from_u64(&mut self, value: u64) -> u32 {
        self.add_object(HostValue::BigInt(value))
    }

    /// Converts an object to `u64`.
    ///
    /// On failure an error value is stored for [`Self::take_exception`] and
    /// `None` is returned.
    fn bigint_to_u64(&mut self, idx: u32) -> Option<u64>;

    /// Writes a UTF-8 message from module memory to the host log.
    fn log(&mut self, memory: &LinearMemory, ptr: u32, len: u32);

    /// Renders any object as a debug string placed in module memory.
    ///
    /// # Errors
    ///
    /// Allocation or view errors from the marshaller.
    fn debug_string(&mut self, space: &mut dyn ModuleMemory, idx: u32) -> FfiResult<(u32, u32)>;

    /// Builds the error the module raises after a fatal condition.
    fn throw(&mut self, memory: &LinearMemory, ptr: u32, len: u32) -> crate::FfiError;

    /// Stores an exception object for the module to retrieve.
    fn store_exception(&mut self, idx: u32);

    /// Takes the last stored exception, if any.
    fn take_exception(&mut self) -> Option<HostValue>;

    /// Publishes a pick list laid out as `words` little-endian `u32` words
    /// (two per item) starting at `ptr`.
    ///
    /// # Errors
    ///
    /// [`crate::FfiError::Misaligned`] or a view error.
    fn send_pick(&mut self, memory: &LinearMemory, ptr: u32, words: u32) -> FfiResult<()>;

    /// Synthetic render latency.
    fn block(&mut self);

    /// Registers the function at `callback` on a repeating timer.
    ///
    /// A non-function callback stores an exception and returns `None`.
    fn set_interval(&mut self, callback: u32, period_ms: u32) -> Option<i32>;

    /// Cancels a timer. Unknown ids are ignored.
    fn clear_interval(&mut self, id: i32);

    /// Wraps a module closure and returns the slot of its function object.
    fn make_closure(&mut self, call: u32, env: u32, dtor: u32) -> u32;

    /// Takes the function at `idx` and drops the owner's reference.
    ///
    /// Returns true when the closure was torn down immediately.
    fn closure_drop(&mut self, idx: u32) -> bool;
}

/// Raw exports of a compiled engine module.
///
/// App handles are 64-bit; `0` is never a valid handle.
pub trait ForeignModule {
    /// The module's memory and allocator.
    fn space(&mut self) -> &mut dyn ModuleMemory;

    /// Creates an engine instance. Returns its handle.
    fn init_app(&mut self, host: &mut dyn HostImports) -> u64;

    /// Binds a page canvas by element id. `ptr`/`len` is a UTF-8 string the
    /// module takes ownership of.
    fn create_window_by_canvas(&mut self, host: &mut dyn HostImports, app: u64, ptr: u32, len: u32, scale_factor: f32);

    /// Binds a transferred surface held at heap slot `canvas`.
    fn create_window_by_offscreen_canvas(
        &mut self,
        host: &mut dyn HostImports,
        app: u64,
        canvas: u32,
        scale_factor: f32,
    );

    /// Returns 1 once the instance is ready to render.
    fn is_preparation_completed(&mut self, host: &mut dyn HostImports, app: u64) -> u32;

    /// Advances one frame.
    fn enter_frame(&mut self, host: &mut dyn HostImports, app: u64);

    /// Pointer moved, logical coordinates.
    fn mouse_move(&mut self, host: &mut dyn HostImports, app: u64, x: f32, y: f32);

    /// Left button pressed over the item at heap slot `item`.
    fn left_bt_down(&mut self, host: &mut dyn HostImports, app: u64, item: u32, x: f32, y: f32);

    /// Left button released.
    fn left_bt_up(&mut self, host: &mut dyn HostImports, app: u64);

    /// Replaces the hover set with the array at heap slot `list`.
    fn set_hover(&mut self, host: &mut dyn HostImports, app: u64, list: u32);

    /// Replaces the selection with the array at heap slot `list`.
    fn set_selection(&mut self, host: &mut dyn HostImports, app: u64, list: u32);

    /// Non-zero enables auto-animation.
    fn set_auto_animation(&mut self, host: &mut dyn HostImports, app: u64, needs_animate: u32);

    /// Destroys an instance. The handle is invalid afterwards.
    fn release_app(&mut self, host: &mut dyn HostImports, app: u64);

    /// Invokes a module closure with the argument at heap slot `arg`.
    fn invoke_closure(&mut self, host: &mut dyn HostImports, call: u32, env: u32, arg: u32);

    /// Runs a closure destructor.
    fn destroy_closure(&mut self, host: &mut dyn HostImports, dtor: u32, call: u32, env: u32);
}
