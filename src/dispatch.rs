//! Event dispatch.
//!
//! For every event kind the dispatcher keeps a route list: the environments,
//! in table order, that have both a receiver for the kind and the kind
//! enabled somewhere. Route lists are rebuilt whenever an environment's
//! callbacks or enablement change and are swapped in whole, so posting only
//! clones an `Arc` and never holds a lock while agent code runs. Agents may
//! therefore call back into the core from inside a callback.
//!
//! Per-thread enablement and disposal are re-checked against the
//! environment table at delivery time.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::boundary::{panic_message, unwind_protected};
use crate::env::{EnvId, EnvKind, EnvTable};
use crate::events::{EventKind, EventPayload, FieldScratch, EVENT_SLOTS};
use crate::heap::{handle_of, handle_of_opt};
use crate::phase::{Phase, PhaseCell};
use crate::sys::jni::{jboolean, JNIEnv, JNI_FALSE, JNI_TRUE};
use crate::sys::jvmti::{jvmtiEnv, jvmtiEventCallbacks};
use crate::threads::current_jni_env;
use crate::EventHandler;

macro_rules! event_log {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::debug!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    };
}

#[derive(Clone)]
enum Sink {
    Native(jvmtiEventCallbacks),
    Rust(Arc<dyn EventHandler>),
}

#[derive(Clone)]
struct Route {
    env: EnvId,
    handle: usize,
    sink: Sink,
}

pub struct Dispatcher {
    routes: RwLock<Vec<Arc<[Route]>>>,
    trace_events: bool,
}

impl Dispatcher {
    pub fn new(trace_events: bool) -> Dispatcher {
        Dispatcher {
            routes: RwLock::new(vec![Arc::from(Vec::new()); EVENT_SLOTS]),
            trace_events,
        }
    }

    /// Recomputes the route list of one kind from the environment table.
    pub fn rebuild(&self, envs: &EnvTable, kind: EventKind) {
        let mut routes = self.routes.write();
        let list: Vec<Route> = envs
            .ids()
            .into_iter()
            .filter(|id| envs.is_enabled_anywhere(*id, kind))
            .filter_map(|id| {
                let handle = envs.handle(id).ok()? as usize;
                let sink = envs
                    .with(id, |record| match &record.kind {
                        EnvKind::Rust(handler) => Some(Sink::Rust(Arc::clone(handler))),
                        EnvKind::Native if record.callbacks.is_set(kind.id()) => Some(Sink::Native(record.callbacks)),
                        EnvKind::Native => None,
                    })
                    .ok()
                    .flatten()?;
                Some(Route { env: id, handle, sink })
            })
            .collect();
        routes[kind.slot()] = Arc::from(list);
    }

    pub fn rebuild_all(&self, envs: &EnvTable) {
        for kind in EventKind::ALL {
            self.rebuild(envs, *kind);
        }
    }

    fn routes(&self, kind: EventKind) -> Arc<[Route]> {
        Arc::clone(&self.routes.read()[kind.slot()])
    }

    /// Whether any environment would receive `kind` on `thread`.
    pub fn event_needed(&self, envs: &EnvTable, kind: EventKind, thread: Option<usize>) -> bool {
        self.routes(kind).iter().any(|r| envs.is_enabled(r.env, kind, thread))
    }

    /// Posts one event. Returns how many environments received it.
    ///
    /// Events outside their legal phases are dropped. Lifecycle events move
    /// the phase: VM_START to START and VM_INIT to LIVE before delivery,
    /// VM_DEATH to DEAD after it. The phase moves even when no environment
    /// is bound; only delivery is skipped.
    pub fn post(&self, phase: &PhaseCell, envs: &EnvTable, payload: &EventPayload<'_>) -> usize {
        let kind = payload.kind();
        let current = phase.get();
        if !kind.is_legal_in(current) {
            event_log!(self.trace_events, event = kind.name(), phase = current.name(), "event ignored: wrong phase");
            return 0;
        }

        match kind {
            EventKind::VmStart => {
                phase.advance(Phase::Start);
            }
            EventKind::VmInit => {
                phase.advance(Phase::Live);
            }
            _ => {}
        }

        let delivered = if envs.active() == 0 {
            event_log!(self.trace_events, event = kind.name(), "event ignored: no environments");
            0
        } else {
            self.deliver(envs, kind, payload)
        };

        if kind == EventKind::VmDeath {
            phase.advance(Phase::Dead);
        }
        delivered
    }

    fn deliver(&self, envs: &EnvTable, kind: EventKind, payload: &EventPayload<'_>) -> usize {
        let thread = payload.thread().map(|t| t as usize);
        let mut delivered = 0;
        for route in self.routes(kind).iter() {
            if !envs.is_enabled(route.env, kind, thread) {
                continue;
            }
            event_log!(self.trace_events, event = kind.name(), env = %route.env, "event posted");
            match &route.sink {
                Sink::Native(callbacks) => {
                    // SAFETY: the agent registered these callbacks for this
                    // environment with the standard signatures.
                    unsafe { invoke_native(callbacks, route.handle as *mut jvmtiEnv, payload) }
                }
                Sink::Rust(handler) => {
                    if let Err(panic) = unwind_protected(|| invoke_rust(handler.as_ref(), route.env, payload)) {
                        tracing::error!(
                            event = kind.name(),
                            env = %route.env,
                            panic = panic_message(panic.as_ref()),
                            "event handler panicked"
                        );
                    }
                }
            }
            delivered += 1;
        }
        delivered
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes = self.routes.read();
        let counts: Vec<(&str, usize)> = EventKind::ALL
            .iter()
            .map(|k| (k.name(), routes[k.slot()].len()))
            .filter(|(_, n)| *n > 0)
            .collect();
        f.debug_struct("Dispatcher").field("routes", &counts).finish()
    }
}

fn flag(value: bool) -> jboolean {
    if value {
        JNI_TRUE
    } else {
        JNI_FALSE
    }
}

unsafe fn invoke_native(cb: &jvmtiEventCallbacks, env: *mut jvmtiEnv, payload: &EventPayload<'_>) {
    let jni: *mut JNIEnv = current_jni_env();
    match *payload {
        EventPayload::VmStart => {
            if let Some(f) = cb.VMStart {
                f(env, jni)
            }
        }
        EventPayload::VmInit { thread } => {
            if let Some(f) = cb.VMInit {
                f(env, jni, thread)
            }
        }
        EventPayload::VmDeath => {
            if let Some(f) = cb.VMDeath {
                f(env, jni)
            }
        }
        EventPayload::ThreadStart { thread } => {
            if let Some(f) = cb.ThreadStart {
                f(env, jni, thread)
            }
        }
        EventPayload::ThreadEnd { thread } => {
            if let Some(f) = cb.ThreadEnd {
                f(env, jni, thread)
            }
        }
        EventPayload::ClassLoad { thread, klass } => {
            if let Some(f) = cb.ClassLoad {
                f(env, jni, thread, handle_of(klass))
            }
        }
        EventPayload::ClassPrepare { thread, klass } => {
            if let Some(f) = cb.ClassPrepare {
                f(env, jni, thread, handle_of(klass))
            }
        }
        EventPayload::Exception { thread, method, location, exception, catch } => {
            if let Some(f) = cb.Exception {
                let (catch_method, catch_location) = match catch {
                    Some((m, l)) => (m.as_raw(), l),
                    None => (std::ptr::null_mut(), 0),
                };
                f(env, jni, thread, method.as_raw(), location, handle_of(exception), catch_method, catch_location)
            }
        }
        EventPayload::ExceptionCatch { thread, method, location, exception } => {
            if let Some(f) = cb.ExceptionCatch {
                f(env, jni, thread, method.as_raw(), location, handle_of(exception))
            }
        }
        EventPayload::SingleStep { thread, method, location } => {
            if let Some(f) = cb.SingleStep {
                f(env, jni, thread, method.as_raw(), location)
            }
        }
        EventPayload::Breakpoint { thread, method, location } => {
            if let Some(f) = cb.Breakpoint {
                f(env, jni, thread, method.as_raw(), location)
            }
        }
        EventPayload::FramePop { thread, method, was_popped_by_exception, .. } => {
            if let Some(f) = cb.FramePop {
                f(env, jni, thread, method.as_raw(), flag(was_popped_by_exception))
            }
        }
        EventPayload::FieldAccess { thread, method, location } => {
            if let Some(f) = cb.FieldAccess {
                FieldScratch::with(|data| {
                    if let Some(d) = data {
                        f(
                            env,
                            jni,
                            thread,
                            method.as_raw(),
                            location,
                            handle_of(&d.field_class),
                            handle_of_opt(d.object.as_ref()),
                            d.field,
                        )
                    }
                })
            }
        }
        EventPayload::FieldModification { thread, method, location } => {
            if let Some(f) = cb.FieldModification {
                FieldScratch::with(|data| {
                    if let Some(d) = data {
                        f(
                            env,
                            jni,
                            thread,
                            method.as_raw(),
                            location,
                            handle_of(&d.field_class),
                            handle_of_opt(d.object.as_ref()),
                            d.field,
                            d.value.signature_type(),
                            d.value.to_jvalue(),
                        )
                    }
                })
            }
        }
        EventPayload::MethodEntry { thread, method } => {
            if let Some(f) = cb.MethodEntry {
                f(env, jni, thread, method.as_raw())
            }
        }
        EventPayload::MethodExit { thread, method, was_popped_by_exception, return_value } => {
            if let Some(f) = cb.MethodExit {
                f(env, jni, thread, method.as_raw(), flag(was_popped_by_exception), return_value)
            }
        }
        EventPayload::GarbageCollectionStart => {
            if let Some(f) = cb.GarbageCollectionStart {
                f(env)
            }
        }
        EventPayload::GarbageCollectionFinish => {
            if let Some(f) = cb.GarbageCollectionFinish {
                f(env)
            }
        }
    }
}

fn invoke_rust(handler: &dyn EventHandler, env: EnvId, payload: &EventPayload<'_>) {
    match *payload {
        EventPayload::VmStart => handler.vm_start(env),
        EventPayload::VmInit { thread } => handler.vm_init(env, thread),
        EventPayload::VmDeath => handler.vm_death(env),
        EventPayload::ThreadStart { thread } => handler.thread_start(env, thread),
        EventPayload::ThreadEnd { thread } => handler.thread_end(env, thread),
        EventPayload::ClassLoad { thread, klass } => handler.class_load(env, thread, klass),
        EventPayload::ClassPrepare { thread, klass } => handler.class_prepare(env, thread, klass),
        EventPayload::Exception { thread, method, location, exception, catch } => {
            handler.exception(env, thread, method, location, exception, catch)
        }
        EventPayload::ExceptionCatch { thread, method, location, exception } => {
            handler.exception_catch(env, thread, method, location, exception)
        }
        EventPayload::SingleStep { thread, method, location } => handler.single_step(env, thread, method, location),
        EventPayload::Breakpoint { thread, method, location } => handler.breakpoint(env, thread, method, location),
        EventPayload::FramePop { thread, method, location, was_popped_by_exception } => {
            handler.frame_pop(env, thread, method, location, was_popped_by_exception)
        }
        EventPayload::FieldAccess { thread, method, location } => FieldScratch::with(|data| {
            if let Some(d) = data {
                handler.field_access(env, thread, method, location, d)
            }
        }),
        EventPayload::FieldModification { thread, method, location } => FieldScratch::with(|data| {
            if let Some(d) = data {
                handler.field_modification(env, thread, method, location, d)
            }
        }),
        EventPayload::MethodEntry { thread, method } => handler.method_entry(env, thread, method),
        EventPayload::MethodExit { thread, method, was_popped_by_exception, return_value } => {
            handler.method_exit(env, thread, method, was_popped_by_exception, return_value)
        }
        EventPayload::GarbageCollectionStart => handler.garbage_collection_start(env),
        EventPayload::GarbageCollectionFinish => handler.garbage_collection_finish(env),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        starts: AtomicUsize,
        deaths: AtomicUsize,
    }

    impl EventHandler for Counter {
        fn thread_start(&self, _env: EnvId, _thread: crate::sys::jni::jthread) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn vm_death(&self, _env: EnvId) {
            self.deaths.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn live(phase: &PhaseCell) {
        phase.advance(Phase::Live);
    }

    #[test]
    fn only_enabled_environments_receive_events() {
        let phase = PhaseCell::new();
        live(&phase);
        let envs = EnvTable::new(8);
        let dispatcher = Dispatcher::new(false);
        let a = Arc::new(Counter::default());
        let b = Arc::new(Counter::default());
        let (ea, _) = envs.create(EnvKind::Rust(a.clone())).unwrap();
        envs.create(EnvKind::Rust(b.clone())).unwrap();
        envs.set_event_mode(ea, EventKind::ThreadStart, None, true).unwrap();
        dispatcher.rebuild(&envs, EventKind::ThreadStart);

        assert!(dispatcher.event_needed(&envs, EventKind::ThreadStart, None));
        assert!(!dispatcher.event_needed(&envs, EventKind::ThreadEnd, None));
        let thread = 0x1000 as crate::sys::jni::jthread;
        assert_eq!(dispatcher.post(&phase, &envs, &EventPayload::ThreadStart { thread }), 1);
        assert_eq!(a.starts.load(Ordering::SeqCst), 1);
        assert_eq!(b.starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn vm_death_is_seen_while_live_then_kills_the_phase() {
        let phase = PhaseCell::new();
        live(&phase);
        let envs = EnvTable::new(8);
        let dispatcher = Dispatcher::new(true);
        let handler = Arc::new(Counter::default());
        let (id, _) = envs.create(EnvKind::Rust(handler.clone())).unwrap();
        envs.set_event_mode(id, EventKind::VmDeath, None, true).unwrap();
        dispatcher.rebuild_all(&envs);

        assert_eq!(dispatcher.post(&phase, &envs, &EventPayload::VmDeath), 1);
        assert_eq!(phase.get(), Phase::Dead);
        assert_eq!(dispatcher.post(&phase, &envs, &EventPayload::VmDeath), 0);
        assert_eq!(handler.deaths.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wrong_phase_events_are_dropped() {
        let phase = PhaseCell::new();
        let envs = EnvTable::new(8);
        let dispatcher = Dispatcher::new(false);
        assert_eq!(dispatcher.post(&phase, &envs, &EventPayload::VmInit { thread: std::ptr::null_mut() }), 0);
        assert_eq!(phase.get(), Phase::OnLoad);
    }

    #[test]
    fn lifecycle_events_move_the_phase_with_no_environments() {
        let phase = PhaseCell::new();
        phase.advance(Phase::Primordial);
        let envs = EnvTable::new(8);
        let dispatcher = Dispatcher::new(false);
        assert_eq!(dispatcher.post(&phase, &envs, &EventPayload::VmStart), 0);
        assert_eq!(phase.get(), Phase::Start);
        assert_eq!(dispatcher.post(&phase, &envs, &EventPayload::VmInit { thread: std::ptr::null_mut() }), 0);
        assert_eq!(phase.get(), Phase::Live);

        // An environment created afterwards sees the phase the VM is in.
        let handler = Arc::new(Counter::default());
        let (id, _) = envs.create(EnvKind::Rust(handler.clone())).unwrap();
        envs.set_event_mode(id, EventKind::VmDeath, None, true).unwrap();
        dispatcher.rebuild_all(&envs);
        assert_eq!(dispatcher.post(&phase, &envs, &EventPayload::VmDeath), 1);
        assert_eq!(phase.get(), Phase::Dead);
    }

    #[test]
    fn native_environment_without_callback_gets_no_route() {
        let phase = PhaseCell::new();
        live(&phase);
        let envs = EnvTable::new(8);
        let dispatcher = Dispatcher::new(false);
        let (id, _) = envs.create(EnvKind::Native).unwrap();
        envs.set_event_mode(id, EventKind::GarbageCollectionStart, None, true).unwrap();
        dispatcher.rebuild_all(&envs);
        assert!(!dispatcher.event_needed(&envs, EventKind::GarbageCollectionStart, None));
        assert_eq!(dispatcher.post(&phase, &envs, &EventPayload::GarbageCollectionStart), 0);
    }
}
