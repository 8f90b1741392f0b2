//! The managed object space.
//!
//! Objects are reference counted. The heap itself keeps one strong reference
//! to every object it allocated; a collection drops the heap's reference to
//! any object nothing else holds, so weak references elsewhere (tag maps)
//! die with it. Class mirrors are roots and are never collected.
//!
//! Each object has a stable allocation-order serial and an identity hash
//! derived from it once, at allocation. JNI-style handles are object
//! addresses and resolve back to the object while it is alive.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::HeapError;
use crate::sys::jni::jobject;

pub type ObjectRef = Arc<Object>;

#[derive(Debug, PartialEq)]
pub enum ObjectKind {
    Class { name: String, internal: bool },
    Instance,
}

#[derive(Debug, PartialEq)]
pub struct Object {
    serial: u64,
    hash: u32,
    class: Option<ObjectRef>,
    size: u64,
    array_length: Option<i32>,
    kind: ObjectKind,
}

impl Object {
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Identity hash, fixed at allocation.
    pub fn identity_hash(&self) -> u32 {
        self.hash
    }

    /// The object's class, `None` for class mirrors.
    pub fn class(&self) -> Option<&ObjectRef> {
        self.class.as_ref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn array_length(&self) -> Option<i32> {
        self.array_length
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, ObjectKind::Class { .. })
    }

    pub fn class_name(&self) -> Option<&str> {
        match &self.kind {
            ObjectKind::Class { name, .. } => Some(name),
            ObjectKind::Instance => None,
        }
    }

    /// Whether this object is, or is an instance of, a runtime-internal class.
    pub fn is_internal(&self) -> bool {
        match (&self.kind, &self.class) {
            (ObjectKind::Class { internal, .. }, _) => *internal,
            (ObjectKind::Instance, Some(class)) => class.is_internal(),
            (ObjectKind::Instance, None) => false,
        }
    }

    /// Whether `self` and `other` are the same object. Never consults
    /// anything but the address.
    pub fn same(a: &ObjectRef, b: &ObjectRef) -> bool {
        Arc::ptr_eq(a, b)
    }
}

/// JNI-style handle for an object: its address.
pub fn handle_of(object: &ObjectRef) -> jobject {
    Arc::as_ptr(object) as *mut c_void
}

/// Handle for an optional object, null for `None`.
pub fn handle_of_opt(object: Option<&ObjectRef>) -> jobject {
    object.map_or(std::ptr::null_mut(), handle_of)
}

// Fibonacci hashing of the serial; spreads consecutive serials across buckets.
fn mix(serial: u64) -> u32 {
    (serial.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 32) as u32
}

thread_local! {
    static ALLOCATION_DISABLED: Cell<u32> = Cell::new(0);
}

/// While alive, allocation on the current thread fails.
pub struct NoAllocation {
    _not_send: PhantomData<*const ()>,
}

impl NoAllocation {
    pub fn enter() -> NoAllocation {
        ALLOCATION_DISABLED.with(|d| d.set(d.get() + 1));
        NoAllocation { _not_send: PhantomData }
    }
}

impl Drop for NoAllocation {
    fn drop(&mut self) {
        ALLOCATION_DISABLED.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

pub fn allocation_disabled() -> bool {
    ALLOCATION_DISABLED.with(|d| d.get() > 0)
}

#[derive(Debug, Default)]
pub struct Heap {
    next_serial: AtomicU64,
    // Keyed by address: walk order is address order.
    objects: RwLock<BTreeMap<usize, ObjectRef>>,
    classes: RwLock<Vec<ObjectRef>>,
}

impl Heap {
    pub fn new() -> Heap {
        Heap::default()
    }

    fn insert(&self, object: Object) -> Result<ObjectRef, HeapError> {
        if allocation_disabled() {
            return Err(HeapError::AllocationDisabled);
        }
        let object = Arc::new(object);
        self.objects.write().insert(Arc::as_ptr(&object) as usize, Arc::clone(&object));
        Ok(object)
    }

    fn serial(&self) -> u64 {
        self.next_serial.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Defines a class mirror. `internal` marks runtime-private classes.
    pub fn define_class(&self, name: &str, internal: bool) -> Result<ObjectRef, HeapError> {
        if allocation_disabled() {
            return Err(HeapError::AllocationDisabled);
        }
        let serial = self.serial();
        let class = self.insert(Object {
            serial,
            hash: mix(serial),
            class: None,
            size: 64 + name.len() as u64,
            array_length: None,
            kind: ObjectKind::Class { name: name.to_string(), internal },
        })?;
        self.classes.write().push(Arc::clone(&class));
        tracing::trace!(class = name, internal, "class defined");
        Ok(class)
    }

    pub fn allocate(&self, class: &ObjectRef, size: u64) -> Result<ObjectRef, HeapError> {
        self.allocate_inner(class, size, None)
    }

    pub fn allocate_array(&self, class: &ObjectRef, length: i32, size: u64) -> Result<ObjectRef, HeapError> {
        self.allocate_inner(class, size, Some(length))
    }

    fn allocate_inner(&self, class: &ObjectRef, size: u64, array_length: Option<i32>) -> Result<ObjectRef, HeapError> {
        if !class.is_class() {
            return Err(HeapError::NotAClass(class.serial()));
        }
        let serial = self.serial();
        self.insert(Object {
            serial,
            hash: mix(serial),
            class: Some(Arc::clone(class)),
            size,
            array_length,
            kind: ObjectKind::Instance,
        })
    }

    /// Drops every object only the heap still references. Returns how many
    /// were freed.
    pub fn collect(&self) -> usize {
        let mut objects = self.objects.write();
        let before = objects.len();
        objects.retain(|_, object| object.is_class() || Arc::strong_count(object) > 1);
        let freed = before - objects.len();
        tracing::debug!(freed, live = objects.len(), "heap collected");
        freed
    }

    /// Resolves a handle to its object, if the object is still alive.
    pub fn resolve(&self, handle: jobject) -> Option<ObjectRef> {
        if handle.is_null() {
            return None;
        }
        self.objects.read().get(&(handle as usize)).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits every live object once, in address order, until `visit`
    /// returns `false`. The heap stays read-locked for the whole walk.
    pub fn walk(&self, mut visit: impl FnMut(&ObjectRef) -> bool) {
        let objects = self.objects.read();
        for object in objects.values() {
            if !visit(object) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_resolve_while_alive() {
        let heap = Heap::new();
        let class = heap.define_class("demo/Point", false).unwrap();
        let point = heap.allocate(&class, 24).unwrap();
        let handle = handle_of(&point);
        assert!(Object::same(&heap.resolve(handle).unwrap(), &point));
        drop(point);
        assert_eq!(heap.collect(), 1);
        assert!(heap.resolve(handle).is_none());
    }

    #[test]
    fn collect_keeps_referenced_objects_and_classes() {
        let heap = Heap::new();
        let class = heap.define_class("demo/Point", false).unwrap();
        let kept = heap.allocate(&class, 24).unwrap();
        heap.allocate(&class, 24).unwrap();
        assert_eq!(heap.collect(), 1);
        assert_eq!(heap.len(), 2);
        assert!(heap.resolve(handle_of(&kept)).is_some());
    }

    #[test]
    fn allocation_is_refused_while_disabled() {
        let heap = Heap::new();
        let class = heap.define_class("demo/Point", false).unwrap();
        {
            let _guard = NoAllocation::enter();
            assert_eq!(heap.allocate(&class, 8).unwrap_err(), HeapError::AllocationDisabled);
        }
        assert!(heap.allocate(&class, 8).is_ok());
    }

    #[test]
    fn identity_hash_is_stable_and_spread() {
        let heap = Heap::new();
        let class = heap.define_class("demo/Point", false).unwrap();
        let a = heap.allocate(&class, 8).unwrap();
        let b = heap.allocate(&class, 8).unwrap();
        assert_eq!(a.identity_hash(), a.identity_hash());
        assert_ne!(a.identity_hash(), b.identity_hash());
    }

    #[test]
    fn instances_of_internal_classes_are_internal() {
        let heap = Heap::new();
        let internal = heap.define_class("vm/Frame", true).unwrap();
        let object = heap.allocate(&internal, 8).unwrap();
        assert!(object.is_internal());
        assert!(heap.allocate(&object, 8).is_err());
    }
}
