//! The JVMTI core: one value owning every table, with the agent-facing entry
//! points and the hooks the runtime calls.
//!
//! Entry points check their legal phases first, then the environment, then
//! capabilities, and only then touch state, so a rejected call has no side
//! effect.
//!
//! ```rust
//! use jvmti_host::{Config, JvmtiCore};
//! use jvmti_host::sys::jvmti::JVMTI_PHASE_LIVE;
//!
//! let core = JvmtiCore::new(Config::default());
//! let env = core.create_environment().unwrap();
//! let env = core.env_for(env).unwrap();
//! core.vm_start();
//! core.vm_init();
//! assert_eq!(core.get_phase(), JVMTI_PHASE_LIVE);
//! core.dispose_environment(env).unwrap();
//! ```

use std::ffi::c_void;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::boundary::guarded;
use crate::breakpoints::{BreakpointTable, MethodId};
use crate::capabilities::{self, Capability};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::env::{EnvId, EnvKind, EnvTable};
use crate::error::JvmtiResult;
use crate::events::{EventKind, EventPayload, FieldEventData, FieldScratch};
use crate::exception::{self, ExceptionSite, Frame};
use crate::heap::{Heap, ObjectRef};
use crate::heap_iter::{self, ObjectInfo, Selection, Visit};
use crate::phase::{Phase, PhaseCell, PhaseSet};
use crate::raw_monitor::RawMonitors;
use crate::safepoint::Safepoints;
use crate::sys::jni::{jclass, jint, jlong, jmethodID, jobject, jthread, jvalue};
use crate::sys::jvmti::{
    jlocation, jrawMonitorID, jvmtiCapabilities, jvmtiEnv, jvmtiError, jvmtiEventCallbacks, jvmtiHeapCallbacks,
    jvmtiHeapObjectCallback, JVMTI_VERSION,
};
use crate::threads::{current_thread, ManagedThread, Threads};
use crate::EventHandler;

#[cfg(windows)]
const PATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_SEPARATOR: &str = ":";

#[derive(Debug)]
pub struct JvmtiCore {
    config: Config,
    phase: PhaseCell,
    envs: EnvTable,
    dispatcher: Dispatcher,
    breakpoints: Mutex<BreakpointTable>,
    monitors: RawMonitors,
    heap: Heap,
    safepoints: Safepoints,
    threads: Threads,
}

fn thread_key(thread: jthread) -> Option<usize> {
    (!thread.is_null()).then_some(thread as usize)
}

impl JvmtiCore {
    pub fn new(config: Config) -> JvmtiCore {
        JvmtiCore {
            phase: PhaseCell::new(),
            envs: EnvTable::new(config.tag_capacity),
            dispatcher: Dispatcher::new(config.trace_events),
            breakpoints: Mutex::new(BreakpointTable::with_capacity(config.breakpoint_capacity)),
            monitors: RawMonitors::new(),
            heap: Heap::new(),
            safepoints: Safepoints::new(),
            threads: Threads::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub fn envs(&self) -> &EnvTable {
        &self.envs
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn safepoints(&self) -> &Safepoints {
        &self.safepoints
    }

    pub fn threads(&self) -> &Threads {
        &self.threads
    }

    fn require(&self, env: EnvId, cap: Capability) -> JvmtiResult<()> {
        if self.envs.with(env, |r| r.capabilities.has(cap))? {
            Ok(())
        } else {
            Err(jvmtiError::MUST_POSSESS_CAPABILITY)
        }
    }

    fn post(&self, payload: &EventPayload<'_>) -> usize {
        self.dispatcher.post(&self.phase, &self.envs, payload)
    }

    // =========================================================================
    // ENVIRONMENTS
    // =========================================================================

    /// Creates a native environment and returns its handle.
    pub fn create_environment(&self) -> JvmtiResult<*mut jvmtiEnv> {
        guarded("CreateEnvironment", || {
            let (_, handle) = self.envs.create(EnvKind::Native)?;
            Ok(handle)
        })
    }

    /// Binds a handle the agent side allocated.
    pub fn register_environment(&self, handle: *mut jvmtiEnv) -> JvmtiResult<EnvId> {
        guarded("RegisterEnvironment", || self.envs.register(handle, EnvKind::Native))
    }

    /// Creates an environment whose events go to `handler`.
    pub fn create_rust_environment(&self, handler: Arc<dyn EventHandler>) -> JvmtiResult<EnvId> {
        guarded("CreateRustEnvironment", || {
            let (id, _) = self.envs.create(EnvKind::Rust(handler))?;
            Ok(id)
        })
    }

    pub fn dispose_environment(&self, env: EnvId) -> JvmtiResult<()> {
        guarded("DisposeEnvironment", || {
            self.envs.dispose(env)?;
            self.dispatcher.rebuild_all(&self.envs);
            Ok(())
        })
    }

    /// Resolves an agent-supplied handle.
    pub fn env_for(&self, handle: *const jvmtiEnv) -> JvmtiResult<EnvId> {
        self.envs.lookup(handle).ok_or_else(|| {
            tracing::warn!(handle = ?handle, "rejected environment handle");
            jvmtiError::INVALID_ENVIRONMENT
        })
    }

    pub fn get_environment_local_storage(&self, env: EnvId) -> JvmtiResult<*mut c_void> {
        guarded("GetEnvironmentLocalStorage", || self.envs.with(env, |r| r.local_storage as *mut c_void))
    }

    pub fn set_environment_local_storage(&self, env: EnvId, data: *const c_void) -> JvmtiResult<()> {
        guarded("SetEnvironmentLocalStorage", || self.envs.with_mut(env, |r| r.local_storage = data as usize))
    }

    // =========================================================================
    // PHASE, VERSION, ERRORS
    // =========================================================================

    /// `GetPhase`: the externally visible phase constant.
    pub fn get_phase(&self) -> jint {
        self.phase.get().external()
    }

    pub fn get_version_number(&self) -> jint {
        JVMTI_VERSION
    }

    pub fn get_error_name(&self, code: jint) -> JvmtiResult<&'static str> {
        crate::error::get_error_name(code)
    }

    // =========================================================================
    // CAPABILITIES
    // =========================================================================

    pub fn get_potential_capabilities(&self, env: EnvId) -> JvmtiResult<jvmtiCapabilities> {
        guarded("GetPotentialCapabilities", || {
            self.phase.check(PhaseSet::ONLOAD_LIVE)?;
            self.envs.with(env, |_| capabilities::potential())
        })
    }

    pub fn get_capabilities(&self, env: EnvId) -> JvmtiResult<jvmtiCapabilities> {
        guarded("GetCapabilities", || self.envs.with(env, |r| r.capabilities))
    }

    /// `AddCapabilities`. Not atomic: capabilities before the first
    /// unavailable one stay granted.
    pub fn add_capabilities(&self, env: EnvId, requested: &jvmtiCapabilities) -> JvmtiResult<()> {
        guarded("AddCapabilities", || {
            self.phase.check(PhaseSet::ONLOAD_LIVE)?;
            self.envs.with_mut(env, |r| {
                let before = r.capabilities;
                let result = capabilities::add(&mut r.capabilities, requested);
                match result {
                    Ok(()) => tracing::debug!(env = %env, caps = ?r.capabilities, "capabilities added"),
                    Err(_) if r.capabilities != before => {
                        tracing::warn!(env = %env, caps = ?r.capabilities, "capabilities partially granted")
                    }
                    Err(_) => {}
                }
                result
            })?
        })
    }

    pub fn relinquish_capabilities(&self, env: EnvId, requested: &jvmtiCapabilities) -> JvmtiResult<()> {
        guarded("RelinquishCapabilities", || {
            self.phase.check(PhaseSet::ONLOAD_LIVE)?;
            self.envs.with_mut(env, |r| {
                capabilities::relinquish(&mut r.capabilities, requested);
                tracing::debug!(env = %env, caps = ?r.capabilities, "capabilities relinquished");
            })
        })
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// `SetEventCallbacks`; `None` clears every callback. Only native
    /// environments have a callback table.
    pub fn set_event_callbacks(&self, env: EnvId, callbacks: Option<&jvmtiEventCallbacks>) -> JvmtiResult<()> {
        guarded("SetEventCallbacks", || {
            self.phase.check(PhaseSet::ONLOAD_LIVE)?;
            self.envs.with_mut(env, |r| match r.kind {
                EnvKind::Native => {
                    r.callbacks = callbacks.copied().unwrap_or_default();
                    Ok(())
                }
                EnvKind::Rust(_) => Err(jvmtiError::ILLEGAL_ARGUMENT),
            })??;
            self.dispatcher.rebuild_all(&self.envs);
            Ok(())
        })
    }

    /// `SetEventNotificationMode`. A null `thread` sets the global mode.
    pub fn set_event_notification_mode(&self, env: EnvId, enable: bool, event_type: u32, thread: jthread) -> JvmtiResult<()> {
        guarded("SetEventNotificationMode", || {
            self.phase.check(PhaseSet::ONLOAD_LIVE)?;
            let kind = EventKind::from_id(event_type).ok_or(jvmtiError::INVALID_EVENT_TYPE)?;
            if enable {
                if let Some(cap) = kind.required_capability() {
                    self.require(env, cap)?;
                }
            }
            let thread = match thread_key(thread) {
                Some(key) => {
                    if !kind.is_thread_filterable() {
                        return Err(jvmtiError::ILLEGAL_ARGUMENT);
                    }
                    self.threads.resolve(thread)?;
                    Some(key)
                }
                None => None,
            };
            self.envs.set_event_mode(env, kind, thread, enable)?;
            self.dispatcher.rebuild(&self.envs, kind);
            tracing::debug!(env = %env, event = kind.name(), enable, thread = ?thread, "event mode set");
            Ok(())
        })
    }

    /// Whether any environment wants `kind` on the current thread in the
    /// current phase. Runtimes consult this before paying for an event.
    pub fn event_needed(&self, kind: EventKind) -> bool {
        kind.is_legal_in(self.phase.get()) && self.dispatcher.event_needed(&self.envs, kind, thread_key(current_thread()))
    }

    /// Whether code installation must be reported to agents.
    pub fn compiled_code_events_needed(&self) -> bool {
        [EventKind::CompiledMethodLoad, EventKind::CompiledMethodUnload, EventKind::DynamicCodeGenerated]
            .into_iter()
            .any(|kind| self.event_needed(kind))
    }

    // =========================================================================
    // BREAKPOINTS
    // =========================================================================

    pub fn set_breakpoint(&self, env: EnvId, method: jmethodID, location: jlocation) -> JvmtiResult<()> {
        guarded("SetBreakpoint", || {
            self.phase.check(PhaseSet::LIVE)?;
            self.require(env, Capability::GenerateBreakpointEvents)?;
            let method = MethodId::from_raw(method)?;
            self.breakpoints.lock().set(method, location)?;
            tracing::debug!(env = %env, method = method.0, location, "breakpoint set");
            Ok(())
        })
    }

    pub fn clear_breakpoint(&self, env: EnvId, method: jmethodID, location: jlocation) -> JvmtiResult<()> {
        guarded("ClearBreakpoint", || {
            self.phase.check(PhaseSet::LIVE)?;
            self.require(env, Capability::GenerateBreakpointEvents)?;
            let method = MethodId::from_raw(method)?;
            self.breakpoints.lock().clear(method, location)?;
            tracing::debug!(env = %env, method = method.0, location, "breakpoint cleared");
            Ok(())
        })
    }

    /// Locations of `method`'s breakpoints, ascending.
    pub fn get_breakpoints(&self, method: MethodId) -> Vec<jlocation> {
        self.breakpoints.lock().get_breakpoints(method)
    }

    /// Whether the compiler must keep breakpoint checks in `method`.
    pub fn has_breakpoints(&self, method: MethodId) -> bool {
        self.breakpoints.lock().has_breakpoints(method)
    }

    // =========================================================================
    // RAW MONITORS
    // =========================================================================

    pub fn create_raw_monitor(&self, env: EnvId, name: &str) -> JvmtiResult<jrawMonitorID> {
        guarded("CreateRawMonitor", || {
            self.envs.with(env, |_| ())?;
            self.monitors.create(name)
        })
    }

    pub fn destroy_raw_monitor(&self, env: EnvId, monitor: jrawMonitorID) -> JvmtiResult<()> {
        guarded("DestroyRawMonitor", || {
            self.envs.with(env, |_| ())?;
            self.monitors.destroy(monitor)
        })
    }

    /// Blocks outside managed code: a thread waiting to enter does not hold
    /// up safepoints.
    pub fn raw_monitor_enter(&self, env: EnvId, monitor: jrawMonitorID) -> JvmtiResult<()> {
        guarded("RawMonitorEnter", || {
            self.envs.with(env, |_| ())?;
            self.safepoints.blocking(|| self.monitors.enter(monitor))
        })
    }

    pub fn raw_monitor_exit(&self, env: EnvId, monitor: jrawMonitorID) -> JvmtiResult<()> {
        guarded("RawMonitorExit", || {
            self.envs.with(env, |_| ())?;
            self.monitors.exit(monitor)
        })
    }

    /// `millis <= 0` waits until notified.
    pub fn raw_monitor_wait(&self, env: EnvId, monitor: jrawMonitorID, millis: jlong) -> JvmtiResult<()> {
        guarded("RawMonitorWait", || {
            self.envs.with(env, |_| ())?;
            self.safepoints.blocking(|| self.monitors.wait(monitor, millis))
        })
    }

    pub fn raw_monitor_notify(&self, env: EnvId, monitor: jrawMonitorID) -> JvmtiResult<()> {
        guarded("RawMonitorNotify", || {
            self.envs.with(env, |_| ())?;
            self.monitors.notify(monitor)
        })
    }

    pub fn raw_monitor_notify_all(&self, env: EnvId, monitor: jrawMonitorID) -> JvmtiResult<()> {
        guarded("RawMonitorNotifyAll", || {
            self.envs.with(env, |_| ())?;
            self.monitors.notify_all(monitor)
        })
    }

    // =========================================================================
    // OBJECT TAGS
    // =========================================================================

    fn resolve_object(&self, object: jobject) -> JvmtiResult<ObjectRef> {
        if object.is_null() {
            return Err(jvmtiError::NULL_POINTER);
        }
        self.heap.resolve(object).ok_or(jvmtiError::INVALID_OBJECT)
    }

    fn resolve_class(&self, klass: jclass) -> JvmtiResult<Option<ObjectRef>> {
        if klass.is_null() {
            return Ok(None);
        }
        match self.heap.resolve(klass) {
            Some(class) if class.is_class() => Ok(Some(class)),
            _ => Err(jvmtiError::INVALID_CLASS),
        }
    }

    pub fn get_tag(&self, env: EnvId, object: jobject) -> JvmtiResult<jlong> {
        guarded("GetTag", || {
            self.phase.check(PhaseSet::START_LIVE)?;
            self.require(env, Capability::TagObjects)?;
            let object = self.resolve_object(object)?;
            self.envs.with_tags(env, |tags| tags.get(&object))
        })
    }

    pub fn set_tag(&self, env: EnvId, object: jobject, tag: jlong) -> JvmtiResult<()> {
        guarded("SetTag", || {
            self.phase.check(PhaseSet::START_LIVE)?;
            self.require(env, Capability::TagObjects)?;
            let object = self.resolve_object(object)?;
            self.envs.with_tags(env, |tags| tags.set(&object, tag))
        })
    }

    /// `GetObjectsWithTags`: live objects carrying any of `tags`, with their
    /// tag.
    pub fn get_objects_with_tags(&self, env: EnvId, tags: &[jlong]) -> JvmtiResult<Vec<(ObjectRef, jlong)>> {
        guarded("GetObjectsWithTags", || {
            self.phase.check(PhaseSet::START_LIVE)?;
            self.require(env, Capability::TagObjects)?;
            self.envs.with_tags(env, |map| map.objects_with_tags(tags))?
        })
    }

    // =========================================================================
    // HEAP ITERATION
    // =========================================================================

    fn check_heap_access(&self, env: EnvId) -> JvmtiResult<()> {
        self.phase.check(PhaseSet::LIVE)?;
        self.require(env, Capability::TagObjects)
    }

    // Callers run `check_heap_access` before validating their arguments.
    fn heap_walk<R>(&self, env: EnvId, entry: &'static str, f: impl FnOnce(&mut crate::tags::TagMap) -> JvmtiResult<R>) -> JvmtiResult<R> {
        guarded(entry, || self.safepoints.run_at_safepoint(|| self.envs.with_tags(env, f))?)
    }

    /// `IterateThroughHeap`. Callbacks must not call back into this
    /// environment's tag functions; the walk holds its tag map.
    pub fn iterate_through_heap(
        &self,
        env: EnvId,
        heap_filter: jint,
        klass: jclass,
        callbacks: &jvmtiHeapCallbacks,
        user_data: *mut c_void,
    ) -> JvmtiResult<()> {
        self.check_heap_access(env)?;
        let klass = self.resolve_class(klass)?;
        let selection = Selection { filter: heap_filter, klass: klass.as_ref(), include_internal: self.config.vm_classes };
        self.heap_walk(env, "IterateThroughHeap", |tags| {
            heap_iter::iterate_through_heap(&self.heap, tags, selection, callbacks, user_data)
        })
        .map(|_| ())
    }

    pub fn iterate_over_heap(
        &self,
        env: EnvId,
        object_filter: jint,
        callback: jvmtiHeapObjectCallback,
        user_data: *mut c_void,
    ) -> JvmtiResult<()> {
        self.iterate_legacy(env, "IterateOverHeap", object_filter, None, callback, user_data)
    }

    pub fn iterate_over_instances_of_class(
        &self,
        env: EnvId,
        klass: jclass,
        object_filter: jint,
        callback: jvmtiHeapObjectCallback,
        user_data: *mut c_void,
    ) -> JvmtiResult<()> {
        self.check_heap_access(env)?;
        if klass.is_null() {
            return Err(jvmtiError::INVALID_CLASS);
        }
        let klass = self.resolve_class(klass)?;
        self.iterate_legacy(env, "IterateOverInstancesOfClass", object_filter, klass.as_ref(), callback, user_data)
    }

    fn iterate_legacy(
        &self,
        env: EnvId,
        entry: &'static str,
        object_filter: jint,
        klass: Option<&ObjectRef>,
        callback: jvmtiHeapObjectCallback,
        user_data: *mut c_void,
    ) -> JvmtiResult<()> {
        self.check_heap_access(env)?;
        let filter = heap_iter::legacy_filter(object_filter)?;
        let selection = Selection { filter, klass, include_internal: self.config.vm_classes };
        self.heap_walk(env, entry, |tags| heap_iter::iterate_over_heap(&self.heap, tags, selection, callback, user_data))
            .map(|_| ())
    }

    /// Heap walk for in-process agents. Same rules as
    /// [`iterate_through_heap`](Self::iterate_through_heap); returns the
    /// number of objects visited.
    pub fn walk_heap(
        &self,
        env: EnvId,
        heap_filter: jint,
        klass: Option<&ObjectRef>,
        visit: impl FnMut(&ObjectRef, ObjectInfo, &mut jlong) -> Visit,
    ) -> JvmtiResult<usize> {
        self.check_heap_access(env)?;
        let selection = Selection { filter: heap_filter, klass, include_internal: self.config.vm_classes };
        self.heap_walk(env, "walk_heap", |tags| heap_iter::walk(&self.heap, tags, selection, visit))
    }

    // =========================================================================
    // BOOT CLASS PATH
    // =========================================================================

    pub fn add_to_bootstrap_class_loader_search(&self, env: EnvId, segment: &str) -> JvmtiResult<()> {
        guarded("AddToBootstrapClassLoaderSearch", || {
            self.phase.check(PhaseSet::ONLOAD_LIVE)?;
            if segment.is_empty() {
                return Err(jvmtiError::ILLEGAL_ARGUMENT);
            }
            self.envs.add_boot_class_path(env, segment)?;
            tracing::debug!(env = %env, segment, "boot class path extended");
            Ok(())
        })
    }

    /// Every environment's additions, joined with the platform separator.
    pub fn added_boot_class_path(&self) -> String {
        self.envs.boot_class_path().join(PATH_SEPARATOR)
    }

    // =========================================================================
    // THREADS
    // =========================================================================

    pub fn suspend_thread(&self, env: EnvId, thread: jthread) -> JvmtiResult<()> {
        guarded("SuspendThread", || {
            self.phase.check(PhaseSet::LIVE)?;
            self.require(env, Capability::Suspend)?;
            let record = self.threads.resolve(thread)?;
            self.safepoints.suspend(record.os_id())?;
            tracing::debug!(env = %env, thread = record.name(), "thread suspended");
            Ok(())
        })
    }

    pub fn resume_thread(&self, env: EnvId, thread: jthread) -> JvmtiResult<()> {
        guarded("ResumeThread", || {
            self.phase.check(PhaseSet::LIVE)?;
            self.require(env, Capability::Suspend)?;
            let record = self.threads.resolve(thread)?;
            self.safepoints.resume(record.os_id())?;
            tracing::debug!(env = %env, thread = record.name(), "thread resumed");
            Ok(())
        })
    }

    /// Suspends every listed thread in one safepoint operation. The outer
    /// result reports precondition failures; the inner ones each thread.
    pub fn suspend_thread_list(&self, env: EnvId, threads: &[jthread]) -> JvmtiResult<Vec<JvmtiResult<()>>> {
        guarded("SuspendThreadList", || {
            self.phase.check(PhaseSet::LIVE)?;
            self.require(env, Capability::Suspend)?;
            Ok(self.safepoints.run_at_safepoint(|| {
                threads
                    .iter()
                    .map(|t| self.threads.resolve(*t).and_then(|r| self.safepoints.suspend(r.os_id())))
                    .collect()
            }))
        })
    }

    pub fn resume_thread_list(&self, env: EnvId, threads: &[jthread]) -> JvmtiResult<Vec<JvmtiResult<()>>> {
        guarded("ResumeThreadList", || {
            self.phase.check(PhaseSet::LIVE)?;
            self.require(env, Capability::Suspend)?;
            Ok(self.safepoints.run_at_safepoint(|| {
                threads
                    .iter()
                    .map(|t| self.threads.resolve(*t).and_then(|r| self.safepoints.resume(r.os_id())))
                    .collect()
            }))
        })
    }

    /// Attaches the calling OS thread as a managed thread and posts
    /// THREAD_START on it. The thread detaches when the guard drops.
    pub fn attach_current_thread(&self, name: &str) -> JvmtiResult<ManagedThread<'_>> {
        let handle = self.threads.attach_current(name)?;
        self.safepoints.attach();
        self.thread_start(handle);
        Ok(ManagedThread::new(self, handle))
    }

    pub(crate) fn detach_current_thread(&self) {
        let handle = current_thread();
        if handle.is_null() {
            return;
        }
        self.thread_end(handle);
        self.envs.forget_thread(handle as usize);
        self.dispatcher.rebuild_all(&self.envs);
        self.safepoints.detach();
        self.threads.detach_current();
    }

    /// Starts a managed thread running `f`.
    pub fn spawn_thread<F, R>(self: &Arc<Self>, name: &str, f: F) -> io::Result<JoinHandle<JvmtiResult<R>>>
    where
        F: FnOnce(&ManagedThread<'_>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let core = Arc::clone(self);
        let thread_name = name.to_string();
        thread::Builder::new().name(thread_name.clone()).spawn(move || {
            let thread = core.attach_current_thread(&thread_name)?;
            Ok(f(&thread))
        })
    }

    // =========================================================================
    // RUNTIME HOOKS
    // =========================================================================

    /// Agent loading is over; ONLOAD-only entry points are refused from now
    /// on.
    pub fn end_onload(&self) {
        if self.phase.get() == Phase::OnLoad {
            self.phase.advance(Phase::Primordial);
        }
    }

    /// The VM has started: leaves ONLOAD if still there and posts VM_START.
    pub fn vm_start(&self) -> usize {
        self.end_onload();
        self.post(&EventPayload::VmStart)
    }

    pub fn vm_init(&self) -> usize {
        self.post(&EventPayload::VmInit { thread: current_thread() })
    }

    pub fn vm_death(&self) -> usize {
        self.post(&EventPayload::VmDeath)
    }

    pub fn thread_start(&self, thread: jthread) -> usize {
        self.post(&EventPayload::ThreadStart { thread })
    }

    pub fn thread_end(&self, thread: jthread) -> usize {
        self.post(&EventPayload::ThreadEnd { thread })
    }

    pub fn class_load(&self, klass: &ObjectRef) -> usize {
        self.post(&EventPayload::ClassLoad { thread: current_thread(), klass })
    }

    pub fn class_prepare(&self, klass: &ObjectRef) -> usize {
        self.post(&EventPayload::ClassPrepare { thread: current_thread(), klass })
    }

    pub fn gc_start(&self) -> usize {
        self.post(&EventPayload::GarbageCollectionStart)
    }

    pub fn gc_finish(&self) -> usize {
        self.post(&EventPayload::GarbageCollectionFinish)
    }

    /// Runs a collection at a safepoint between the two GC events. Returns
    /// the number of objects freed.
    pub fn collect_garbage(&self) -> usize {
        self.gc_start();
        let freed = self.safepoints.run_at_safepoint(|| self.heap.collect());
        self.gc_finish();
        freed
    }

    pub fn method_entry(&self, method: MethodId) -> usize {
        self.post(&EventPayload::MethodEntry { thread: current_thread(), method })
    }

    pub fn method_exit(&self, method: MethodId, was_popped_by_exception: bool, return_value: jvalue) -> usize {
        self.post(&EventPayload::MethodExit { thread: current_thread(), method, was_popped_by_exception, return_value })
    }

    /// The interpreter reached `location`; posts BREAKPOINT if one is set
    /// there.
    pub fn breakpoint_hit(&self, method: MethodId, location: jlocation) -> usize {
        if !self.breakpoints.lock().contains(method, location) {
            return 0;
        }
        self.post(&EventPayload::Breakpoint { thread: current_thread(), method, location })
    }

    pub fn single_step(&self, method: MethodId, location: jlocation) -> usize {
        self.post(&EventPayload::SingleStep { thread: current_thread(), method, location })
    }

    pub fn frame_pop(&self, method: MethodId, location: jlocation, was_popped_by_exception: bool) -> usize {
        self.post(&EventPayload::FramePop { thread: current_thread(), method, location, was_popped_by_exception })
    }

    pub fn field_access(&self, method: MethodId, location: jlocation, field: FieldEventData) -> usize {
        FieldScratch::staged(field, || {
            self.post(&EventPayload::FieldAccess { thread: current_thread(), method, location })
        })
    }

    pub fn field_modification(&self, method: MethodId, location: jlocation, field: FieldEventData) -> usize {
        FieldScratch::staged(field, || {
            self.post(&EventPayload::FieldModification { thread: current_thread(), method, location })
        })
    }

    /// An exception is being thrown with `stack` (innermost first) on the
    /// current thread. Resolves the throw and catch sites with the stack
    /// held stable and posts EXCEPTION. Returns the sites if anyone wanted
    /// the event.
    pub fn exception_thrown(&self, stack: &[Frame], exception: &ObjectRef) -> Option<ExceptionSite> {
        if !self.event_needed(EventKind::Exception) {
            return None;
        }
        let _stable = self.safepoints.disable();
        let site = exception::resolve(stack)?;
        self.post(&EventPayload::Exception {
            thread: current_thread(),
            method: site.method,
            location: site.location,
            exception,
            catch: site.catch,
        });
        Some(site)
    }

    pub fn exception_caught(&self, method: MethodId, location: jlocation, exception: &ObjectRef) -> usize {
        self.post(&EventPayload::ExceptionCatch { thread: current_thread(), method, location, exception })
    }
}
