//! # Simulated Module
//!
//! Implements the raw export surface over a table of [`SimApp`]s.
//!
//! ```text
//! init_app ──► create_window_* ──► [timer closure fires prepare_steps times]
//!                                        │
//!                                        ▼
//!          is_preparation_completed == 1 ──► enter_frame updates the scene
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use twinframe_ffi::{FfiResult, ForeignModule, HostImports, HostValue, ModuleMemory, PAGE_SIZE};
use twinframe_shared::{PickItem, PickList};

use crate::app::{ActiveInfo, PluginsState, PrepareTimer, SimApp, WindowTarget};
use crate::scene::{demo_items, Scene, SceneItem};
use crate::space::ModuleSpace;

/// Call word of the preparation closure.
const PREPARE_CALL: u32 = 1;
/// Destructor id of the preparation closure.
const PREPARE_DTOR: u32 = 1;

/// Tunables of the simulated module.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Timer firings before the device is ready. 0 means ready on bind.
    pub prepare_steps: u32,
    /// Period of the preparation timer.
    pub prepare_interval_ms: u32,
    /// Seconds of animation per update.
    pub frame_dt: f32,
    /// Initial memory pages.
    pub initial_pages: usize,
    /// Bytes per memory page.
    pub page_size: usize,
    /// Memory growth limit in pages.
    pub max_pages: usize,
    /// Scene every new instance starts from.
    pub scene: Vec<SceneItem>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            prepare_steps: 3,
            prepare_interval_ms: 5,
            frame_dt: 1.0 / 60.0,
            initial_pages: 1,
            page_size: PAGE_SIZE,
            max_pages: 256,
            scene: demo_items(),
        }
    }
}

/// The simulated engine module.
#[derive(Debug)]
pub struct SimModule {
    config: SimConfig,
    space: ModuleSpace,
    apps: Vec<Option<SimApp>>,
    /// Closure environment word -> owning app handle.
    envs: HashMap<u32, u64>,
    next_env: u32,
    destroyed_closures: u32,
}

impl SimModule {
    /// Instantiates the module.
    ///
    /// # Errors
    ///
    /// The memory geometry in `config` is unusable.
    pub fn new(config: SimConfig) -> FfiResult<Self> {
        let space = ModuleSpace::new(config.initial_pages, config.page_size, config.max_pages)?;
        Ok(Self {
            config,
            space,
            apps: Vec::new(),
            envs: HashMap::new(),
            next_env: 1,
            destroyed_closures: 0,
        })
    }

    /// The instance behind `handle`, if it is live.
    #[must_use]
    pub fn app(&self, handle: u64) -> Option<&SimApp> {
        let index = usize::try_from(handle.checked_sub(1)?).ok()?;
        self.apps.get(index)?.as_ref()
    }

    /// Number of live instances.
    #[must_use]
    pub fn live_apps(&self) -> usize {
        self.apps.iter().filter(|slot| slot.is_some()).count()
    }

    /// Closure destructors run so far.
    #[inline]
    #[must_use]
    pub const fn destroyed_closures(&self) -> u32 {
        self.destroyed_closures
    }

    /// Closures whose destructor has not run yet.
    #[must_use]
    pub fn live_closures(&self) -> usize {
        self.envs.len()
    }

    /// The module's memory and allocator.
    #[must_use]
    pub const fn module_space(&self) -> &ModuleSpace {
        &self.space
    }

    fn log(&mut self, host: &mut dyn HostImports, message: &str) {
        match self.space.store_str(message) {
            Ok((ptr, len)) => {
                host.log(self.space.memory(), ptr, len);
                self.space.free(ptr, len, 1);
            }
            Err(e) => tracing::warn!(error = %e, "module log message not stored"),
        }
    }

    fn bind(&mut self, host: &mut dyn HostImports, handle: u64, target: WindowTarget, scale_factor: f32) {
        let is_in_worker = matches!(target, WindowTarget::Offscreen(_));
        let steps = self.config.prepare_steps;
        let Some(app) = slot_mut(&mut self.apps, handle) else {
            tracing::warn!(handle, "window bound to unknown instance");
            return;
        };
        app.window = Some(target);
        app.scale_factor = scale_factor;
        app.info = ActiveInfo::new(is_in_worker);
        app.prepare_steps = 0;

        if steps == 0 {
            app.plugins = PluginsState::Ready;
            return;
        }
        app.plugins = PluginsState::Preparing;

        // Device creation completes asynchronously on a host timer.
        let env = self.next_env;
        self.next_env += 1;
        self.envs.insert(env, handle);
        let callback = host.make_closure(PREPARE_CALL, env, PREPARE_DTOR);
        match host.set_interval(callback, self.config.prepare_interval_ms) {
            Some(interval) => app.prepare = Some(PrepareTimer { interval, callback }),
            None => {
                let reason = host.take_exception().map(|e| e.describe());
                tracing::warn!(handle, ?reason, "preparation timer refused, preparing synchronously");
                host.closure_drop(callback);
                app.plugins = PluginsState::Ready;
            }
        }
    }

    fn publish_pick(&mut self, host: &mut dyn HostImports, list: &PickList) {
        let words = list.to_words();
        let published = self.space.store_words(&words).and_then(|ptr| {
            let count = u32::try_from(words.len()).unwrap_or(u32::MAX);
            let sent = host.send_pick(self.space.memory(), ptr, count);
            self.space.free(ptr, count * 4, 4);
            sent
        });
        if let Err(e) = published {
            tracing::warn!(error = %e, pick = %list, "pick not published");
        }
    }
}

fn slot_mut(apps: &mut [Option<SimApp>], handle: u64) -> Option<&mut SimApp> {
    let index = usize::try_from(handle.checked_sub(1)?).ok()?;
    apps.get_mut(index)?.as_mut()
}

/// Reads an array of BigInts, skipping entries that are not valid `u64`.
fn read_pick_array(host: &mut dyn HostImports, array: u32) -> PickList {
    let mut items = Vec::new();
    for i in 0..host.array_length(array) {
        let entry = host.array_get(array, i);
        match host.bigint_to_u64(entry) {
            Some(bits) => items.push(PickItem::new(bits)),
            None => {
                host.take_exception();
            }
        }
        host.object_drop_ref(entry);
    }
    host.object_drop_ref(array);
    items.into()
}

impl ForeignModule for SimModule {
    fn space(&mut self) -> &mut dyn ModuleMemory {
        &mut self.space
    }

    fn init_app(&mut self, host: &mut dyn HostImports) -> u64 {
        self.apps.push(Some(SimApp::new(Scene::new(self.config.scene.clone()))));
        self.log(host, "init_app");
        self.apps.len() as u64
    }

    fn create_window_by_canvas(&mut self, host: &mut dyn HostImports, app: u64, ptr: u32, len: u32, scale_factor: f32) {
        let element_id = self.space.load_str(ptr, len);
        self.space.free(ptr, len, 1);
        match element_id {
            Ok(id) => self.bind(host, app, WindowTarget::Canvas(id), scale_factor),
            Err(e) => tracing::warn!(app, error = %e, "canvas id unreadable"),
        }
    }

    fn create_window_by_offscreen_canvas(
        &mut self,
        host: &mut dyn HostImports,
        app: u64,
        canvas: u32,
        scale_factor: f32,
    ) {
        match host.take_object(canvas) {
            HostValue::Surface(surface) => self.bind(host, app, WindowTarget::Offscreen(surface), scale_factor),
            other => tracing::warn!(app, value = %other.describe(), "offscreen canvas is not a surface"),
        }
    }

    fn is_preparation_completed(&mut self, _host: &mut dyn HostImports, app: u64) -> u32 {
        let Some(app) = slot_mut(&mut self.apps, app) else {
            return 0;
        };
        match app.plugins {
            PluginsState::Ready => {
                app.plugins = PluginsState::Cleaned;
                1
            }
            PluginsState::Cleaned => 1,
            PluginsState::Adding | PluginsState::Preparing => 0,
        }
    }

    fn enter_frame(&mut self, host: &mut dyn HostImports, app: u64) {
        let dt = self.config.frame_dt;
        let Some(state) = slot_mut(&mut self.apps, app) else {
            return;
        };
        if !state.info.auto_animate && state.info.remaining_frames == 0 {
            return;
        }
        state.info.remaining_frames = state.info.remaining_frames.saturating_sub(1);

        match state.plugins {
            PluginsState::Cleaned => {}
            PluginsState::Ready => {
                state.plugins = PluginsState::Cleaned;
                return;
            }
            PluginsState::Adding | PluginsState::Preparing => return,
        }

        host.block();
        if let Some(list) = state.update(dt) {
            self.publish_pick(host, &list);
        }
    }

    fn mouse_move(&mut self, _host: &mut dyn HostImports, app: u64, x: f32, y: f32) {
        if let Some(state) = slot_mut(&mut self.apps, app) {
            let position = state.to_physical(x, y);
            state.queue_move(position);
            state.info.touch();
        }
    }

    fn left_bt_down(&mut self, host: &mut dyn HostImports, app: u64, item: u32, x: f32, y: f32) {
        let bits = host.bigint_to_u64(item);
        host.object_drop_ref(item);
        if bits.is_none() {
            host.take_exception();
        }
        if let Some(state) = slot_mut(&mut self.apps, app) {
            if let Some(bits) = bits {
                let item = PickItem::new(bits);
                state.info.drag = Some(item);
                state.info.last_drag_pos = state.to_physical(x, y);
                // The dragged item is also the selection.
                state.info.selection = vec![item].into();
            }
            state.info.touch();
        }
    }

    fn left_bt_up(&mut self, _host: &mut dyn HostImports, app: u64) {
        if let Some(state) = slot_mut(&mut self.apps, app) {
            state.info.drag = None;
            state.info.touch();
        }
    }

    fn set_hover(&mut self, host: &mut dyn HostImports, app: u64, list: u32) {
        let hover = read_pick_array(host, list);
        if let Some(state) = slot_mut(&mut self.apps, app) {
            state.info.hover = hover;
            state.info.touch();
        }
    }

    fn set_selection(&mut self, host: &mut dyn HostImports, app: u64, list: u32) {
        let selection = read_pick_array(host, list);
        if let Some(state) = slot_mut(&mut self.apps, app) {
            state.info.selection = selection;
            state.info.touch();
        }
    }

    fn set_auto_animation(&mut self, _host: &mut dyn HostImports, app: u64, needs_animate: u32) {
        if let Some(state) = slot_mut(&mut self.apps, app) {
            state.info.auto_animate = needs_animate > 0;
        }
    }

    fn release_app(&mut self, host: &mut dyn HostImports, app: u64) {
        let dt = self.config.frame_dt;
        let Some(index) = app.checked_sub(1).and_then(|i| usize::try_from(i).ok()) else {
            return;
        };
        let Some(mut state) = self.apps.get_mut(index).and_then(Option::take) else {
            return;
        };
        if let Some(timer) = state.prepare.take() {
            host.clear_interval(timer.interval);
            host.closure_drop(timer.callback);
        }
        state.request_close();
        state.update(dt);
        self.log(host, "release_app");
    }

    fn invoke_closure(&mut self, host: &mut dyn HostImports, call: u32, env: u32, arg: u32) {
        host.object_drop_ref(arg);
        if call != PREPARE_CALL {
            tracing::warn!(call, "unknown closure call word");
            return;
        }
        let Some(&handle) = self.envs.get(&env) else {
            return;
        };
        let Some(state) = slot_mut(&mut self.apps, handle) else {
            return;
        };
        if state.plugins != PluginsState::Preparing {
            return;
        }
        state.prepare_steps += 1;
        if state.prepare_steps >= self.config.prepare_steps {
            state.plugins = PluginsState::Ready;
            if let Some(timer) = state.prepare.take() {
                host.clear_interval(timer.interval);
                host.closure_drop(timer.callback);
            }
            tracing::debug!(handle, "device prepared");
        }
    }

    fn destroy_closure(&mut self, _host: &mut dyn HostImports, dtor: u32, _call: u32, env: u32) {
        if dtor == PREPARE_DTOR {
            self.envs.remove(&env);
        }
        self.destroyed_closures += 1;
    }
}
