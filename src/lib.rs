//! # jvmti-host
//!
//! The VM side of JVMTI for runtimes written in Rust.
//!
//! Agents attach to a [`JvmtiCore`], negotiate capabilities, enable events
//! and receive callbacks while the managed program runs. They can tag and
//! walk live objects, set breakpoints, suspend threads and synchronize on
//! raw monitors. The runtime embedding the core calls its hooks at thread
//! transitions, class loading, garbage collection, exceptions, field access
//! and breakpoints.
//!
//! Two kinds of agent are supported side by side:
//! - native agents, through a `jvmtiEnv*` handle and a
//!   [`jvmtiEventCallbacks`](sys::jvmti::jvmtiEventCallbacks) table
//! - in-process agents implementing [`EventHandler`]
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! use jvmti_host::prelude::*;
//!
//! #[derive(Default)]
//! struct ThreadCounter {
//!     started: AtomicUsize,
//! }
//!
//! impl EventHandler for ThreadCounter {
//!     fn thread_start(&self, _env: EnvId, _thread: jni::jthread) {
//!         self.started.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//!
//! let core = Arc::new(JvmtiCore::new(Config::default()));
//! let counter = Arc::new(ThreadCounter::default());
//! let env = core.create_rust_environment(counter.clone()).unwrap();
//! core.set_event_notification_mode(env, true, EventKind::ThreadStart.id(), std::ptr::null_mut())
//!     .unwrap();
//!
//! core.vm_start();
//! core.vm_init();
//! core.spawn_thread("worker", |_thread| ()).unwrap().join().unwrap().unwrap();
//! assert_eq!(counter.started.load(Ordering::Relaxed), 1);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │               Agents (native or EventHandler)            │
//! ├─────────────────────────────────────────────────────────┤
//! │                   JvmtiCore (core)                       │
//! │   entry points: phase, env and capability checks         │
//! │   runtime hooks: vm_init, thread_start, gc_start, ...    │
//! ├──────────────┬──────────────┬───────────────────────────┤
//! │  env         │  dispatch    │  breakpoints, raw_monitor  │
//! │  phase       │  events      │  tags, heap_iter           │
//! │  capabilities│  exception   │  safepoint, threads, heap  │
//! ├──────────────┴──────────────┴───────────────────────────┤
//! │              Raw interface types (sys module)            │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`sys::jni`], [`sys::jvmti`] | Raw JNI/JVMTI types, constants, callback tables |
//! | [`core`] | **The facade** - start here |
//! | [`env`] | Fixed-capacity environment table |
//! | [`phase`] | Phase state machine and legal-phase sets |
//! | [`capabilities`] | Capability registry and negotiation |
//! | [`events`], [`dispatch`] | Event kinds, payloads and dispatch |
//! | [`breakpoints`] | Breakpoint identity table |
//! | [`raw_monitor`] | Agent-owned monitors |
//! | [`tags`] | Per-environment object tag maps |
//! | [`heap`], [`heap_iter`] | Object space and allocation-free heap walks |
//! | [`safepoint`], [`threads`] | Stop-the-world coordination and managed threads |
//! | [`exception`] | Throw-site and catch-site resolution |
//! | [`boundary`] | Panic containment at the agent boundary |
//! | `agent` | Loading native agent libraries (feature `agents`) |
//!
//! ## Logging
//!
//! Everything is reported through `tracing`. Posted and ignored events log
//! at `trace` (or `debug` with [`Config::trace_events`]); environment,
//! capability, breakpoint, monitor and safepoint changes at `debug`;
//! rejected handles and partial capability grants at `warn`.

pub mod sys;

pub mod boundary;
pub mod breakpoints;
pub mod capabilities;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod events;
pub mod exception;
pub mod heap;
pub mod heap_iter;
pub mod phase;
pub mod prelude;
pub mod raw_monitor;
pub mod safepoint;
pub mod tags;
pub mod threads;

#[cfg(feature = "agents")]
pub mod agent;

pub use crate::breakpoints::MethodId;
pub use crate::capabilities::Capability;
pub use crate::config::Config;
pub use crate::core::JvmtiCore;
pub use crate::env::EnvId;
pub use crate::error::JvmtiResult;
pub use crate::events::{EventKind, FieldEventData, FieldValue};
pub use crate::heap::ObjectRef;
pub use crate::phase::Phase;
pub use crate::sys::jni;
pub use crate::sys::jvmti::jvmtiError;
pub use crate::threads::ManagedThread;

use crate::sys::jni::{jthread, jvalue};
use crate::sys::jvmti::jlocation;

/// Receiver of events for an in-process agent.
///
/// Every method has a no-op default, so implement only the events you
/// enable. Methods run synchronously on the thread the event happened on,
/// in environment-table order with any other environments.
///
/// # Thread Safety
///
/// Events fire from any managed thread, so handlers must be `Send + Sync`.
/// A panicking handler is caught and logged; later environments still
/// receive the event.
pub trait EventHandler: Send + Sync {
    // =========================================================================
    // VM LIFECYCLE EVENTS
    // =========================================================================

    /// The VM has started; phase is START.
    fn vm_start(&self, _env: EnvId) {}

    /// The VM is initialized; phase is LIVE. `thread` is the initializing
    /// thread, null if it is not managed.
    fn vm_init(&self, _env: EnvId, _thread: jthread) {}

    /// Last event. Phase becomes DEAD once every handler returns.
    fn vm_death(&self, _env: EnvId) {}

    // =========================================================================
    // THREAD EVENTS
    // =========================================================================

    /// Delivered on the new thread before it runs any managed code.
    fn thread_start(&self, _env: EnvId, _thread: jthread) {}

    /// Delivered on the ending thread while it is still attached.
    fn thread_end(&self, _env: EnvId, _thread: jthread) {}

    // =========================================================================
    // CLASS EVENTS
    // =========================================================================

    fn class_load(&self, _env: EnvId, _thread: jthread, _klass: &ObjectRef) {}

    fn class_prepare(&self, _env: EnvId, _thread: jthread, _klass: &ObjectRef) {}

    // =========================================================================
    // EXCEPTION EVENTS
    // =========================================================================

    /// An exception was thrown at `method`/`location`. `catch` is where it
    /// will be caught, `None` if uncaught.
    ///
    /// Requires `can_generate_exception_events`.
    fn exception(
        &self,
        _env: EnvId,
        _thread: jthread,
        _method: MethodId,
        _location: jlocation,
        _exception: &ObjectRef,
        _catch: Option<(MethodId, jlocation)>,
    ) {
    }

    fn exception_catch(&self, _env: EnvId, _thread: jthread, _method: MethodId, _location: jlocation, _exception: &ObjectRef) {}

    // =========================================================================
    // DEBUGGING EVENTS
    // =========================================================================

    /// Requires `can_generate_single_step_events`.
    fn single_step(&self, _env: EnvId, _thread: jthread, _method: MethodId, _location: jlocation) {}

    /// Requires `can_generate_breakpoint_events`.
    fn breakpoint(&self, _env: EnvId, _thread: jthread, _method: MethodId, _location: jlocation) {}

    /// Requires `can_generate_frame_pop_events`.
    fn frame_pop(&self, _env: EnvId, _thread: jthread, _method: MethodId, _location: jlocation, _was_popped_by_exception: bool) {}

    // =========================================================================
    // FIELD EVENTS (WATCHPOINTS)
    // =========================================================================

    /// `field` is only valid for the duration of the call.
    ///
    /// Requires `can_generate_field_access_events`.
    fn field_access(&self, _env: EnvId, _thread: jthread, _method: MethodId, _location: jlocation, _field: &FieldEventData) {}

    /// `field.value` holds the value about to be stored.
    ///
    /// Requires `can_generate_field_modification_events`.
    fn field_modification(&self, _env: EnvId, _thread: jthread, _method: MethodId, _location: jlocation, _field: &FieldEventData) {}

    // =========================================================================
    // METHOD EVENTS
    // =========================================================================

    /// **Warning**: fires for every call. Requires
    /// `can_generate_method_entry_events`.
    fn method_entry(&self, _env: EnvId, _thread: jthread, _method: MethodId) {}

    /// Requires `can_generate_method_exit_events`.
    fn method_exit(&self, _env: EnvId, _thread: jthread, _method: MethodId, _was_popped_by_exception: bool, _return_value: jvalue) {}

    // =========================================================================
    // GARBAGE COLLECTION EVENTS
    // =========================================================================

    /// Delivered at a safepoint boundary. Requires
    /// `can_generate_garbage_collection_events`.
    fn garbage_collection_start(&self, _env: EnvId) {}

    fn garbage_collection_finish(&self, _env: EnvId) {}
}
