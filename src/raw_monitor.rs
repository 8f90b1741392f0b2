//! Raw monitors: agent-owned re-entrant locks with a wait set.
//!
//! Raw monitors are independent of managed object locks and of the heap, so
//! they work from `Agent_OnLoad` onwards. Ownership is per OS thread.
//!
//! A `jrawMonitorID` is the address of the monitor block. Handles are
//! validated against the live registry before anything behind them is read,
//! and a block only becomes valid once its magic word is written, which
//! happens last in [`RawMonitors::create`].

use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::JvmtiResult;
use crate::sys::jni::jlong;
use crate::sys::jvmti::{jrawMonitorID, jvmtiError};

const MAGIC: u32 = 0x524d_4f4e;

#[derive(Debug, Default)]
struct MonitorState {
    owner: Option<ThreadId>,
    recursions: u32,
    waiting: u32,
    signals: u32,
}

#[derive(Debug)]
pub struct RawMonitor {
    magic: AtomicU32,
    name: String,
    state: Mutex<MonitorState>,
    entry: Condvar,
    waiters: Condvar,
}

impl RawMonitor {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_valid(&self) -> bool {
        self.magic.load(Ordering::Acquire) == MAGIC
    }

    pub fn enter(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner == Some(me) {
            state.recursions += 1;
            return;
        }
        while state.owner.is_some() {
            self.entry.wait(&mut state);
        }
        state.owner = Some(me);
        state.recursions = 1;
    }

    pub fn exit(&self) -> JvmtiResult<()> {
        let mut state = self.state.lock();
        check_owner(&state)?;
        state.recursions -= 1;
        if state.recursions == 0 {
            state.owner = None;
            self.entry.notify_one();
        }
        Ok(())
    }

    /// Releases the monitor fully, waits for a notification or for `millis`
    /// to pass (`millis <= 0` waits indefinitely), then re-acquires it with
    /// the previous recursion count. Returns whether the wait timed out.
    pub fn wait(&self, millis: jlong) -> JvmtiResult<bool> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        check_owner(&state)?;
        let recursions = state.recursions;
        state.owner = None;
        state.recursions = 0;
        state.waiting += 1;
        self.entry.notify_one();

        let deadline = (millis > 0).then(|| Instant::now() + Duration::from_millis(millis as u64));
        let mut timed_out = false;
        while state.signals == 0 {
            match deadline {
                Some(deadline) => {
                    if self.waiters.wait_until(&mut state, deadline).timed_out() {
                        timed_out = state.signals == 0;
                        break;
                    }
                }
                None => self.waiters.wait(&mut state),
            }
        }
        if !timed_out {
            state.signals -= 1;
        }
        state.waiting -= 1;

        while state.owner.is_some() {
            self.entry.wait(&mut state);
        }
        state.owner = Some(me);
        state.recursions = recursions;
        Ok(timed_out)
    }

    pub fn notify(&self) -> JvmtiResult<()> {
        let mut state = self.state.lock();
        check_owner(&state)?;
        if state.waiting > state.signals {
            state.signals += 1;
            self.waiters.notify_one();
        }
        Ok(())
    }

    pub fn notify_all(&self) -> JvmtiResult<()> {
        let mut state = self.state.lock();
        check_owner(&state)?;
        if state.waiting > state.signals {
            state.signals = state.waiting;
            self.waiters.notify_all();
        }
        Ok(())
    }

    /// Whether the current thread owns the monitor.
    pub fn is_owned_by_current(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }
}

fn check_owner(state: &MonitorState) -> JvmtiResult<()> {
    if state.owner == Some(thread::current().id()) {
        Ok(())
    } else {
        Err(jvmtiError::NOT_MONITOR_OWNER)
    }
}

/// Registry of live raw monitors.
#[derive(Debug, Default)]
pub struct RawMonitors {
    live: Mutex<HashMap<usize, Arc<RawMonitor>>>,
}

impl RawMonitors {
    pub fn new() -> RawMonitors {
        RawMonitors::default()
    }

    /// `CreateRawMonitor`. The name is copied.
    pub fn create(&self, name: &str) -> JvmtiResult<jrawMonitorID> {
        let mut copy = String::new();
        copy.try_reserve_exact(name.len()).map_err(|_| jvmtiError::OUT_OF_MEMORY)?;
        copy.push_str(name);

        let mut live = self.live.lock();
        live.try_reserve(1).map_err(|_| jvmtiError::OUT_OF_MEMORY)?;
        let monitor = Arc::new(RawMonitor {
            magic: AtomicU32::new(0),
            name: copy,
            state: Mutex::new(MonitorState::default()),
            entry: Condvar::new(),
            waiters: Condvar::new(),
        });
        monitor.magic.store(MAGIC, Ordering::Release);
        let id = Arc::as_ptr(&monitor) as *mut c_void;
        live.insert(id as usize, monitor);
        tracing::debug!(monitor = name, id = ?id, "raw monitor created");
        Ok(id)
    }

    fn lookup(&self, id: jrawMonitorID) -> JvmtiResult<Arc<RawMonitor>> {
        if id.is_null() {
            return Err(jvmtiError::INVALID_MONITOR);
        }
        match self.live.lock().get(&(id as usize)) {
            Some(monitor) if monitor.is_valid() => Ok(Arc::clone(monitor)),
            _ => {
                tracing::warn!(id = ?id, "rejected raw monitor handle");
                Err(jvmtiError::INVALID_MONITOR)
            }
        }
    }

    /// `DestroyRawMonitor`. The monitor need not be free: threads still
    /// blocked in it keep their own reference and see it through.
    pub fn destroy(&self, id: jrawMonitorID) -> JvmtiResult<()> {
        let monitor = {
            let mut live = self.live.lock();
            live.remove(&(id as usize)).ok_or(jvmtiError::INVALID_MONITOR)?
        };
        monitor.magic.store(0, Ordering::Release);
        tracing::debug!(monitor = monitor.name(), "raw monitor destroyed");
        Ok(())
    }

    pub fn enter(&self, id: jrawMonitorID) -> JvmtiResult<()> {
        self.lookup(id)?.enter();
        Ok(())
    }

    pub fn exit(&self, id: jrawMonitorID) -> JvmtiResult<()> {
        self.lookup(id)?.exit()
    }

    pub fn wait(&self, id: jrawMonitorID, millis: jlong) -> JvmtiResult<()> {
        // -1 has historically been passed to mean "no timeout".
        let millis = if millis == -1 { 0 } else { millis };
        self.lookup(id)?.wait(millis).map(|_| ())
    }

    pub fn notify(&self, id: jrawMonitorID) -> JvmtiResult<()> {
        self.lookup(id)?.notify()
    }

    pub fn notify_all(&self, id: jrawMonitorID) -> JvmtiResult<()> {
        self.lookup(id)?.notify_all()
    }

    pub fn get(&self, id: jrawMonitorID) -> JvmtiResult<Arc<RawMonitor>> {
        self.lookup(id)
    }

    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn enter_exit_and_recursion() {
        let monitors = RawMonitors::new();
        let id = monitors.create("lock").unwrap();
        monitors.enter(id).unwrap();
        monitors.enter(id).unwrap();
        monitors.exit(id).unwrap();
        assert!(monitors.get(id).unwrap().is_owned_by_current());
        monitors.exit(id).unwrap();
        assert!(!monitors.get(id).unwrap().is_owned_by_current());
        assert_eq!(monitors.exit(id), Err(jvmtiError::NOT_MONITOR_OWNER));
    }

    #[test]
    fn notify_and_wait_require_ownership() {
        let monitors = RawMonitors::new();
        let id = monitors.create("cv").unwrap();
        assert_eq!(monitors.notify(id), Err(jvmtiError::NOT_MONITOR_OWNER));
        assert_eq!(monitors.notify_all(id), Err(jvmtiError::NOT_MONITOR_OWNER));
        assert_eq!(monitors.wait(id, 1), Err(jvmtiError::NOT_MONITOR_OWNER));
    }

    #[test]
    fn destroyed_and_bogus_handles_are_invalid() {
        let monitors = RawMonitors::new();
        let id = monitors.create("gone").unwrap();
        monitors.destroy(id).unwrap();
        assert_eq!(monitors.enter(id), Err(jvmtiError::INVALID_MONITOR));
        assert_eq!(monitors.destroy(id), Err(jvmtiError::INVALID_MONITOR));
        assert_eq!(monitors.enter(std::ptr::null_mut()), Err(jvmtiError::INVALID_MONITOR));
        assert_eq!(monitors.enter(0x10 as jrawMonitorID), Err(jvmtiError::INVALID_MONITOR));
    }

    #[test]
    fn timed_wait_returns_with_the_monitor_held() {
        let monitors = RawMonitors::new();
        let id = monitors.create("timer").unwrap();
        let monitor = monitors.get(id).unwrap();
        monitor.enter();
        monitor.enter();
        assert_eq!(monitor.wait(5), Ok(true));
        monitor.exit().unwrap();
        assert!(monitor.is_owned_by_current());
        monitor.exit().unwrap();
    }

    #[test]
    fn notify_wakes_a_waiter() {
        let monitors = Arc::new(RawMonitors::new());
        let id = monitors.create("handoff").unwrap() as usize;
        let (ready_tx, ready_rx) = mpsc::channel();

        let waiter = {
            let monitors = Arc::clone(&monitors);
            thread::spawn(move || {
                let id = id as jrawMonitorID;
                monitors.enter(id).unwrap();
                ready_tx.send(()).unwrap();
                monitors.wait(id, 0).unwrap();
                monitors.exit(id).unwrap();
            })
        };

        ready_rx.recv().unwrap();
        let id = id as jrawMonitorID;
        // Entering only succeeds once the waiter has released the monitor
        // inside wait, so the notification cannot be lost.
        monitors.enter(id).unwrap();
        monitors.notify(id).unwrap();
        monitors.exit(id).unwrap();
        waiter.join().unwrap();
    }
}
