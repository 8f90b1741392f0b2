//! The environment table.
//!
//! One slot per attached agent, fixed at [`MAX_ENVS`]. A slot is free while
//! its handle is null. Binding writes the record first and publishes the
//! handle last, so the lock-free handle scan in [`EnvTable::lookup`] never
//! sees a half-built environment; disposal clears the handle first.
//!
//! Registration and disposal serialize on one table-wide lock. Everything
//! else locks only the slot it touches.
//!
//! [`EnvId`] carries the slot's generation, so an id kept past disposal is
//! rejected with `INVALID_ENVIRONMENT` even after the slot is reused.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::JvmtiResult;
use crate::events::EventKind;
use crate::sys::jvmti::{jvmtiCapabilities, jvmtiEnv, jvmtiError, jvmtiEventCallbacks};
use crate::tags::TagMap;
use crate::EventHandler;

pub const MAX_ENVS: usize = 8;
pub const MAX_BOOT_CLASS_PATH_ENTRIES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId {
    slot: u8,
    generation: u32,
}

impl EnvId {
    pub fn slot(self) -> usize {
        usize::from(self.slot)
    }
}

impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env#{}.{}", self.slot, self.generation)
    }
}

/// Who receives an environment's events.
#[derive(Clone)]
pub enum EnvKind {
    /// A native agent, through its `jvmtiEventCallbacks`.
    Native,
    /// An in-process handler.
    Rust(Arc<dyn EventHandler>),
}

impl fmt::Debug for EnvKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvKind::Native => f.write_str("Native"),
            EnvKind::Rust(_) => f.write_str("Rust"),
        }
    }
}

#[derive(Debug)]
pub struct EnvRecord {
    generation: u32,
    pub capabilities: jvmtiCapabilities,
    pub callbacks: jvmtiEventCallbacks,
    pub kind: EnvKind,
    /// Per-thread enable bits, keyed by thread handle.
    pub thread_masks: HashMap<usize, u64>,
    pub local_storage: usize,
    pub boot_class_path: Vec<String>,
}

#[derive(Default)]
struct Slot {
    handle: AtomicPtr<jvmtiEnv>,
    generation: AtomicU32,
    global_mask: AtomicU64,
    // Union of every per-thread mask, for the lock-free fast path.
    thread_mask_union: AtomicU64,
    record: RwLock<Option<EnvRecord>>,
    tags: Mutex<Option<TagMap>>,
    owned: Mutex<Option<Box<jvmtiEnv>>>,
}

pub struct EnvTable {
    slots: [Slot; MAX_ENVS],
    registry: Mutex<()>,
    active: AtomicUsize,
    tag_capacity: usize,
}

impl EnvTable {
    pub fn new(tag_capacity: usize) -> EnvTable {
        EnvTable {
            slots: std::array::from_fn(|_| Slot::default()),
            registry: Mutex::new(()),
            active: AtomicUsize::new(0),
            tag_capacity,
        }
    }

    /// Number of bound environments.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Binds an agent-supplied handle to a free slot.
    pub fn register(&self, handle: *mut jvmtiEnv, kind: EnvKind) -> JvmtiResult<EnvId> {
        self.bind(handle, kind, None)
    }

    /// Allocates a handle owned by the table and binds it.
    pub fn create(&self, kind: EnvKind) -> JvmtiResult<(EnvId, *mut jvmtiEnv)> {
        let mut owned = Box::new(jvmtiEnv::detached());
        let handle: *mut jvmtiEnv = &mut *owned;
        let id = self.bind(handle, kind, Some(owned))?;
        Ok((id, handle))
    }

    fn bind(&self, handle: *mut jvmtiEnv, kind: EnvKind, owned: Option<Box<jvmtiEnv>>) -> JvmtiResult<EnvId> {
        if handle.is_null() {
            return Err(jvmtiError::NULL_POINTER);
        }
        let _registry = self.registry.lock();
        if self.slots.iter().any(|s| s.handle.load(Ordering::Acquire) == handle) {
            return Err(jvmtiError::DUPLICATE);
        }
        let Some(index) = self.slots.iter().position(|s| s.handle.load(Ordering::Acquire).is_null()) else {
            tracing::warn!(capacity = MAX_ENVS, "environment table full");
            return Err(jvmtiError::OUT_OF_MEMORY);
        };
        let slot = &self.slots[index];
        let generation = slot.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        *slot.record.write() = Some(EnvRecord {
            generation,
            capabilities: jvmtiCapabilities::default(),
            callbacks: jvmtiEventCallbacks::default(),
            kind,
            thread_masks: HashMap::new(),
            local_storage: 0,
            boot_class_path: Vec::new(),
        });
        slot.global_mask.store(0, Ordering::Release);
        slot.thread_mask_union.store(0, Ordering::Release);
        *slot.owned.lock() = owned;
        slot.handle.store(handle, Ordering::Release);
        self.active.fetch_add(1, Ordering::AcqRel);

        let id = EnvId { slot: index as u8, generation };
        tracing::debug!(env = %id, handle = ?handle, "environment registered");
        Ok(id)
    }

    /// Releases the environment's slot and everything it holds.
    pub fn dispose(&self, id: EnvId) -> JvmtiResult<()> {
        let _registry = self.registry.lock();
        let slot = self.slot(id)?;
        slot.handle.store(std::ptr::null_mut(), Ordering::Release);
        slot.global_mask.store(0, Ordering::Release);
        slot.thread_mask_union.store(0, Ordering::Release);
        slot.record.write().take();
        slot.tags.lock().take();
        slot.owned.lock().take();
        self.active.fetch_sub(1, Ordering::AcqRel);
        tracing::debug!(env = %id, "environment disposed");
        Ok(())
    }

    fn slot(&self, id: EnvId) -> JvmtiResult<&Slot> {
        let slot = self.slots.get(id.slot()).ok_or(jvmtiError::INVALID_ENVIRONMENT)?;
        if slot.handle.load(Ordering::Acquire).is_null() || slot.generation.load(Ordering::Acquire) != id.generation {
            return Err(jvmtiError::INVALID_ENVIRONMENT);
        }
        Ok(slot)
    }

    /// Finds the environment bound to `handle`. Safe with no environments
    /// bound and against concurrent disposal.
    pub fn lookup(&self, handle: *const jvmtiEnv) -> Option<EnvId> {
        if handle.is_null() {
            return None;
        }
        self.slots.iter().enumerate().find_map(|(i, slot)| {
            (slot.handle.load(Ordering::Acquire) as *const jvmtiEnv == handle).then(|| EnvId {
                slot: i as u8,
                generation: slot.generation.load(Ordering::Acquire),
            })
        })
    }

    pub fn handle(&self, id: EnvId) -> JvmtiResult<*mut jvmtiEnv> {
        Ok(self.slot(id)?.handle.load(Ordering::Acquire))
    }

    /// Bound environments in table order.
    pub fn ids(&self) -> Vec<EnvId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.handle.load(Ordering::Acquire).is_null())
            .map(|(i, s)| EnvId {
                slot: i as u8,
                generation: s.generation.load(Ordering::Acquire),
            })
            .collect()
    }

    pub fn with<R>(&self, id: EnvId, f: impl FnOnce(&EnvRecord) -> R) -> JvmtiResult<R> {
        let slot = self.slot(id)?;
        let record = slot.record.read();
        match record.as_ref() {
            Some(r) if r.generation == id.generation => Ok(f(r)),
            _ => Err(jvmtiError::INVALID_ENVIRONMENT),
        }
    }

    pub fn with_mut<R>(&self, id: EnvId, f: impl FnOnce(&mut EnvRecord) -> R) -> JvmtiResult<R> {
        let slot = self.slot(id)?;
        let mut record = slot.record.write();
        match record.as_mut() {
            Some(r) if r.generation == id.generation => Ok(f(r)),
            _ => Err(jvmtiError::INVALID_ENVIRONMENT),
        }
    }

    /// Enables or disables `kind` globally (`thread == None`) or for one
    /// thread.
    pub fn set_event_mode(&self, id: EnvId, kind: EventKind, thread: Option<usize>, enable: bool) -> JvmtiResult<()> {
        let slot = self.slot(id)?;
        match thread {
            None => {
                if enable {
                    slot.global_mask.fetch_or(kind.mask(), Ordering::AcqRel);
                } else {
                    slot.global_mask.fetch_and(!kind.mask(), Ordering::AcqRel);
                }
            }
            Some(thread) => {
                self.with_mut(id, |record| {
                    let mask = record.thread_masks.entry(thread).or_insert(0);
                    if enable {
                        *mask |= kind.mask();
                    } else {
                        *mask &= !kind.mask();
                    }
                    if *mask == 0 {
                        record.thread_masks.remove(&thread);
                    }
                    let union = record.thread_masks.values().fold(0, |acc, m| acc | m);
                    slot.thread_mask_union.store(union, Ordering::Release);
                })?;
            }
        }
        Ok(())
    }

    /// Whether `kind` is enabled for `thread` (globally or for that thread).
    pub fn is_enabled(&self, id: EnvId, kind: EventKind, thread: Option<usize>) -> bool {
        let Ok(slot) = self.slot(id) else {
            return false;
        };
        if slot.global_mask.load(Ordering::Acquire) & kind.mask() != 0 {
            return true;
        }
        let Some(thread) = thread else {
            return false;
        };
        if slot.thread_mask_union.load(Ordering::Acquire) & kind.mask() == 0 {
            return false;
        }
        self.with(id, |r| r.thread_masks.get(&thread).map_or(false, |m| m & kind.mask() != 0))
            .unwrap_or(false)
    }

    /// Whether `kind` is enabled globally or for any thread.
    pub fn is_enabled_anywhere(&self, id: EnvId, kind: EventKind) -> bool {
        self.slot(id).map_or(false, |slot| {
            (slot.global_mask.load(Ordering::Acquire) | slot.thread_mask_union.load(Ordering::Acquire)) & kind.mask() != 0
        })
    }

    /// Drops per-thread settings of a thread that has ended.
    pub fn forget_thread(&self, thread: usize) {
        for id in self.ids() {
            let Ok(slot) = self.slot(id) else { continue };
            let _ = self.with_mut(id, |record| {
                if record.thread_masks.remove(&thread).is_some() {
                    let union = record.thread_masks.values().fold(0, |acc, m| acc | m);
                    slot.thread_mask_union.store(union, Ordering::Release);
                }
            });
        }
    }

    /// Runs `f` on the environment's tag map, creating it on first use.
    /// Calls on one environment are serialized.
    pub fn with_tags<R>(&self, id: EnvId, f: impl FnOnce(&mut TagMap) -> R) -> JvmtiResult<R> {
        let slot = self.slot(id)?;
        let mut tags = slot.tags.lock();
        let map = tags.get_or_insert_with(|| TagMap::with_capacity(self.tag_capacity));
        Ok(f(map))
    }

    pub fn add_boot_class_path(&self, id: EnvId, segment: &str) -> JvmtiResult<()> {
        self.with_mut(id, |record| {
            if record.boot_class_path.len() >= MAX_BOOT_CLASS_PATH_ENTRIES {
                return Err(jvmtiError::OUT_OF_MEMORY);
            }
            record.boot_class_path.push(segment.to_string());
            Ok(())
        })?
    }

    /// Boot class path additions of every environment, in table order.
    pub fn boot_class_path(&self) -> Vec<String> {
        self.ids()
            .into_iter()
            .filter_map(|id| self.with(id, |r| r.boot_class_path.clone()).ok())
            .flatten()
            .collect()
    }
}

impl fmt::Debug for EnvTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvTable")
            .field("active", &self.active())
            .field("ids", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_on_an_empty_table() {
        let table = EnvTable::new(8);
        let env = jvmtiEnv::detached();
        assert_eq!(table.lookup(&env), None);
        assert_eq!(table.lookup(std::ptr::null()), None);
        assert_eq!(table.active(), 0);
    }

    #[test]
    fn register_lookup_dispose() {
        let table = EnvTable::new(8);
        let mut env = jvmtiEnv::detached();
        let id = table.register(&mut env, EnvKind::Native).unwrap();
        assert_eq!(table.lookup(&env), Some(id));
        assert_eq!(table.register(&mut env, EnvKind::Native), Err(jvmtiError::DUPLICATE));
        table.dispose(id).unwrap();
        assert_eq!(table.lookup(&env), None);
        assert_eq!(table.dispose(id), Err(jvmtiError::INVALID_ENVIRONMENT));
        assert_eq!(table.active(), 0);
    }

    #[test]
    fn stale_ids_are_rejected_after_slot_reuse() {
        let table = EnvTable::new(8);
        let (first, _) = table.create(EnvKind::Native).unwrap();
        table.dispose(first).unwrap();
        let (second, _) = table.create(EnvKind::Native).unwrap();
        assert_eq!(first.slot(), second.slot());
        assert_eq!(table.with(first, |_| ()), Err(jvmtiError::INVALID_ENVIRONMENT));
        assert!(table.with(second, |_| ()).is_ok());
    }

    #[test]
    fn table_capacity_is_fixed() {
        let table = EnvTable::new(8);
        for _ in 0..MAX_ENVS {
            table.create(EnvKind::Native).unwrap();
        }
        assert_eq!(table.create(EnvKind::Native).unwrap_err(), jvmtiError::OUT_OF_MEMORY);
    }

    #[test]
    fn per_thread_enable_is_scoped() {
        let table = EnvTable::new(8);
        let (id, _) = table.create(EnvKind::Native).unwrap();
        table.set_event_mode(id, EventKind::ThreadEnd, Some(0x100), true).unwrap();
        assert!(table.is_enabled(id, EventKind::ThreadEnd, Some(0x100)));
        assert!(!table.is_enabled(id, EventKind::ThreadEnd, Some(0x200)));
        assert!(table.is_enabled_anywhere(id, EventKind::ThreadEnd));
        table.forget_thread(0x100);
        assert!(!table.is_enabled_anywhere(id, EventKind::ThreadEnd));

        table.set_event_mode(id, EventKind::ThreadStart, None, true).unwrap();
        assert!(table.is_enabled(id, EventKind::ThreadStart, Some(0x200)));
        table.set_event_mode(id, EventKind::ThreadStart, None, false).unwrap();
        assert!(!table.is_enabled(id, EventKind::ThreadStart, None));
    }

    #[test]
    fn boot_class_path_is_bounded() {
        let table = EnvTable::new(8);
        let (id, _) = table.create(EnvKind::Native).unwrap();
        for i in 0..MAX_BOOT_CLASS_PATH_ENTRIES {
            table.add_boot_class_path(id, &format!("lib{i}.jar")).unwrap();
        }
        assert_eq!(table.add_boot_class_path(id, "extra.jar"), Err(jvmtiError::OUT_OF_MEMORY));
        assert_eq!(table.boot_class_path().len(), MAX_BOOT_CLASS_PATH_ENTRIES);
    }
}
