//! Managed threads.
//!
//! A managed thread is an OS thread attached to the core. Its `jthread`
//! handle is the address of its [`ThreadRecord`]. Attaching registers the
//! thread with the safepoint coordinator and posts THREAD_START on the new
//! thread; detaching posts THREAD_END first.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::core::JvmtiCore;
use crate::error::JvmtiResult;
use crate::sys::jni::{jthread, JNIEnv};
use crate::sys::jvmti::jvmtiError;

#[derive(Debug)]
pub struct ThreadRecord {
    name: String,
    os_id: ThreadId,
}

impl ThreadRecord {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn os_id(&self) -> ThreadId {
        self.os_id
    }

    pub fn handle(self: &Arc<Self>) -> jthread {
        Arc::as_ptr(self) as *mut c_void
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<ThreadRecord>>> = RefCell::new(None);
    static JNI_ENV: Cell<*mut JNIEnv> = Cell::new(std::ptr::null_mut());
}

/// The current thread's handle, null if it is not attached.
pub fn current_thread() -> jthread {
    CURRENT.with(|c| c.borrow().as_ref().map_or(std::ptr::null_mut(), ThreadRecord::handle))
}

/// JNI environment handed to native callbacks on this thread.
pub fn current_jni_env() -> *mut JNIEnv {
    JNI_ENV.with(Cell::get)
}

/// Sets the JNI environment passed to native callbacks on this thread.
pub fn set_current_jni_env(env: *mut JNIEnv) {
    JNI_ENV.with(|e| e.set(env));
}

/// Registry of attached threads.
#[derive(Debug, Default)]
pub struct Threads {
    live: Mutex<HashMap<usize, Arc<ThreadRecord>>>,
}

impl Threads {
    pub fn new() -> Threads {
        Threads::default()
    }

    pub(crate) fn attach_current(&self, name: &str) -> JvmtiResult<jthread> {
        if !current_thread().is_null() {
            return Err(jvmtiError::ILLEGAL_ARGUMENT);
        }
        let record = Arc::new(ThreadRecord {
            name: name.to_string(),
            os_id: thread::current().id(),
        });
        let handle = record.handle();
        self.live.lock().insert(handle as usize, Arc::clone(&record));
        CURRENT.with(|c| *c.borrow_mut() = Some(record));
        tracing::debug!(thread = name, "thread attached");
        Ok(handle)
    }

    pub(crate) fn detach_current(&self) -> Option<jthread> {
        let record = CURRENT.with(|c| c.borrow_mut().take())?;
        let handle = record.handle();
        self.live.lock().remove(&(handle as usize));
        tracing::debug!(thread = record.name(), "thread detached");
        Some(handle)
    }

    /// Resolves a thread handle; null means the current thread.
    pub fn resolve(&self, thread: jthread) -> JvmtiResult<Arc<ThreadRecord>> {
        let key = if thread.is_null() {
            let current = current_thread();
            if current.is_null() {
                return Err(jvmtiError::UNATTACHED_THREAD);
            }
            current as usize
        } else {
            thread as usize
        };
        self.live.lock().get(&key).cloned().ok_or(jvmtiError::INVALID_THREAD)
    }

    /// Handles of every attached thread.
    pub fn all(&self) -> Vec<jthread> {
        self.live.lock().values().map(ThreadRecord::handle).collect()
    }

    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A thread attached to a core. Detaches (posting THREAD_END) on drop.
pub struct ManagedThread<'a> {
    core: &'a JvmtiCore,
    handle: jthread,
}

impl<'a> ManagedThread<'a> {
    pub(crate) fn new(core: &'a JvmtiCore, handle: jthread) -> ManagedThread<'a> {
        ManagedThread { core, handle }
    }

    pub fn handle(&self) -> jthread {
        self.handle
    }

    pub fn core(&self) -> &'a JvmtiCore {
        self.core
    }

    /// Safepoint poll; parks here while the thread is suspended or another
    /// thread runs a safepoint operation.
    pub fn poll(&self) {
        self.core.safepoints().poll();
    }

    /// Runs a blocking call with this thread counted as parked.
    pub fn blocking<R>(&self, f: impl FnOnce() -> R) -> R {
        self.core.safepoints().blocking(f)
    }
}

impl Drop for ManagedThread<'_> {
    fn drop(&mut self) {
        self.core.detach_current_thread();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_resolve_detach() {
        let threads = Threads::new();
        assert!(current_thread().is_null());
        assert_eq!(threads.resolve(std::ptr::null_mut()).unwrap_err(), jvmtiError::UNATTACHED_THREAD);
        let handle = threads.attach_current("main").unwrap();
        assert_eq!(current_thread(), handle);
        assert_eq!(threads.attach_current("again").unwrap_err(), jvmtiError::ILLEGAL_ARGUMENT);
        assert_eq!(threads.resolve(std::ptr::null_mut()).unwrap().name(), "main");
        assert_eq!(threads.resolve(handle).unwrap().os_id(), thread::current().id());
        assert_eq!(threads.detach_current(), Some(handle));
        assert_eq!(threads.resolve(handle).unwrap_err(), jvmtiError::INVALID_THREAD);
        assert!(threads.is_empty());
    }
}
