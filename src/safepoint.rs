//! Stop-the-world coordination.
//!
//! Mutator threads attach to a [`Safepoints`] coordinator and call
//! [`Safepoints::poll`] regularly. The fast path of a poll is one atomic
//! load. When an operation is requested through
//! [`Safepoints::run_at_safepoint`], every other attached thread parks at its
//! next poll; the operation runs once all of them are parked, then they are
//! released.
//!
//! Threads that block outside managed code (joins, sleeps, native waits)
//! wrap the blocking call in [`Safepoints::blocking`] so they count as parked
//! for its duration.
//!
//! Suspension rides on the same mechanism: a suspended thread parks at its
//! next poll and stays parked until resumed.

use std::cell::Cell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::JvmtiResult;
use crate::sys::jvmti::jvmtiError;

#[derive(Debug, Default)]
struct Mutator {
    parked: bool,
    suspended: bool,
}

#[derive(Debug, Default)]
struct State {
    mutators: HashMap<ThreadId, Mutator>,
    // Thread running a safepoint operation, if any.
    active: Option<ThreadId>,
    operations: u64,
}

impl State {
    fn others_parked(&self, me: ThreadId) -> bool {
        self.mutators.iter().all(|(id, m)| *id == me || m.parked)
    }
}

thread_local! {
    static SAFEPOINT_DISABLED: Cell<u32> = Cell::new(0);
}

#[derive(Debug, Default)]
pub struct Safepoints {
    // Fast-path flag: a safepoint is pending or some thread is suspended.
    requested: AtomicBool,
    suspensions: AtomicUsize,
    state: Mutex<State>,
    changed: Condvar,
}

impl Safepoints {
    pub fn new() -> Safepoints {
        Safepoints::default()
    }

    /// Registers the current thread as a mutator. A thread attaching while
    /// another thread's operation runs parks until that operation ends.
    pub fn attach(&self) {
        let mut state = self.state.lock();
        state.mutators.entry(thread::current().id()).or_default();
        self.changed.notify_all();
        drop(self.park(state));
    }

    pub fn detach(&self) {
        let mut state = self.state.lock();
        if let Some(m) = state.mutators.remove(&thread::current().id()) {
            if m.suspended {
                self.suspensions.fetch_sub(1, Ordering::AcqRel);
            }
        }
        self.changed.notify_all();
    }

    pub fn is_attached(&self, thread: ThreadId) -> bool {
        self.state.lock().mutators.contains_key(&thread)
    }

    pub fn attached_count(&self) -> usize {
        self.state.lock().mutators.len()
    }

    /// Number of completed safepoint operations.
    pub fn operations(&self) -> u64 {
        self.state.lock().operations
    }

    /// Safepoint poll. Parks while an operation started by another thread
    /// runs or while the current thread is suspended.
    pub fn poll(&self) {
        if !self.requested.load(Ordering::Acquire) && self.suspensions.load(Ordering::Acquire) == 0 {
            return;
        }
        if SAFEPOINT_DISABLED.with(|d| d.get() > 0) {
            return;
        }
        let state = self.state.lock();
        drop(self.park(state));
    }

    fn must_park(state: &State, me: ThreadId) -> bool {
        let foreign_operation = matches!(state.active, Some(owner) if owner != me);
        let suspended = state.mutators.get(&me).map_or(false, |m| m.suspended);
        foreign_operation || suspended
    }

    fn set_parked(state: &mut State, me: ThreadId, parked: bool) {
        if let Some(m) = state.mutators.get_mut(&me) {
            m.parked = parked;
        }
    }

    fn park<'a>(&'a self, mut state: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
        let me = thread::current().id();
        if !Safepoints::must_park(&state, me) {
            return state;
        }
        Safepoints::set_parked(&mut state, me, true);
        self.changed.notify_all();
        while Safepoints::must_park(&state, me) {
            self.changed.wait(&mut state);
        }
        Safepoints::set_parked(&mut state, me, false);
        state
    }

    /// Runs `f` with the current thread counted as parked.
    pub fn blocking<R>(&self, f: impl FnOnce() -> R) -> R {
        let me = thread::current().id();
        {
            let mut state = self.state.lock();
            Safepoints::set_parked(&mut state, me, true);
            self.changed.notify_all();
        }
        let result = f();
        let mut state = self.state.lock();
        // Do not resume managed code while someone else's operation runs.
        while Safepoints::must_park(&state, me) {
            self.changed.wait(&mut state);
        }
        Safepoints::set_parked(&mut state, me, false);
        result
    }

    /// Brings every other attached thread to a halt, runs `op`, releases
    /// them. Concurrent requests are serialized; a requester waiting for its
    /// turn counts as parked.
    pub fn run_at_safepoint<R>(&self, op: impl FnOnce() -> R) -> R {
        let me = thread::current().id();
        let mut state = self.state.lock();
        while state.active.is_some() {
            Safepoints::set_parked(&mut state, me, true);
            self.changed.notify_all();
            self.changed.wait(&mut state);
        }
        Safepoints::set_parked(&mut state, me, false);
        state.active = Some(me);
        self.requested.store(true, Ordering::Release);
        while !state.others_parked(me) {
            self.changed.wait(&mut state);
        }
        tracing::debug!(threads = state.mutators.len(), "safepoint begin");
        drop(state);

        let result = crate::boundary::unwind_protected(op);

        let mut state = self.state.lock();
        state.active = None;
        state.operations += 1;
        self.requested.store(false, Ordering::Release);
        self.changed.notify_all();
        tracing::debug!("safepoint end");
        drop(state);
        match result {
            Ok(value) => value,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Marks `thread` suspended; it parks at its next poll.
    pub fn suspend(&self, thread: ThreadId) -> JvmtiResult<()> {
        let mut state = self.state.lock();
        let m = state.mutators.get_mut(&thread).ok_or(jvmtiError::THREAD_NOT_ALIVE)?;
        if m.suspended {
            return Err(jvmtiError::THREAD_SUSPENDED);
        }
        m.suspended = true;
        self.suspensions.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn resume(&self, thread: ThreadId) -> JvmtiResult<()> {
        let mut state = self.state.lock();
        let m = state.mutators.get_mut(&thread).ok_or(jvmtiError::THREAD_NOT_ALIVE)?;
        if !m.suspended {
            return Err(jvmtiError::THREAD_NOT_SUSPENDED);
        }
        m.suspended = false;
        self.suspensions.fetch_sub(1, Ordering::AcqRel);
        self.changed.notify_all();
        Ok(())
    }

    pub fn is_suspended(&self, thread: ThreadId) -> bool {
        self.state.lock().mutators.get(&thread).map_or(false, |m| m.suspended)
    }

    /// Whether `thread` is currently parked (at a poll or in a blocking
    /// region).
    pub fn is_parked(&self, thread: ThreadId) -> bool {
        self.state.lock().mutators.get(&thread).map_or(false, |m| m.parked)
    }

    /// Keeps the current thread from parking at polls until the guard drops.
    /// The stack stays stable for walks made under it.
    pub fn disable(&self) -> SafepointDisabled<'_> {
        SAFEPOINT_DISABLED.with(|d| d.set(d.get() + 1));
        SafepointDisabled {
            safepoints: self,
            _not_send: PhantomData,
        }
    }
}

pub struct SafepointDisabled<'a> {
    safepoints: &'a Safepoints,
    _not_send: PhantomData<*const ()>,
}

impl Drop for SafepointDisabled<'_> {
    fn drop(&mut self) {
        let depth = SAFEPOINT_DISABLED.with(|d| {
            let depth = d.get().saturating_sub(1);
            d.set(depth);
            depth
        });
        if depth == 0 {
            self.safepoints.poll();
        }
    }
}

pub fn safepoints_disabled() -> bool {
    SAFEPOINT_DISABLED.with(|d| d.get() > 0)
}
