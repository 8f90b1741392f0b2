//! Heap iteration.
//!
//! Every walk visits each live object once and may rewrite the object's tag
//! through the slot it is handed. Allocation is disabled on the walking
//! thread for the whole walk; callers run walks at a safepoint so no other
//! mutator can allocate either.

use std::ffi::c_void;

use crate::error::JvmtiResult;
use crate::heap::{Heap, NoAllocation, Object, ObjectRef};
use crate::sys::jni::{jint, jlong};
use crate::sys::jvmti::{
    jvmtiError, jvmtiHeapCallbacks, jvmtiHeapObjectCallback, JVMTI_HEAP_FILTER_CLASS_TAGGED,
    JVMTI_HEAP_FILTER_CLASS_UNTAGGED, JVMTI_HEAP_FILTER_TAGGED, JVMTI_HEAP_FILTER_UNTAGGED, JVMTI_HEAP_OBJECT_EITHER,
    JVMTI_HEAP_OBJECT_TAGGED, JVMTI_HEAP_OBJECT_UNTAGGED, JVMTI_ITERATION_ABORT, JVMTI_VISIT_ABORT,
};
use crate::tags::TagMap;

const KNOWN_FILTER_BITS: jint = JVMTI_HEAP_FILTER_TAGGED
    | JVMTI_HEAP_FILTER_UNTAGGED
    | JVMTI_HEAP_FILTER_CLASS_TAGGED
    | JVMTI_HEAP_FILTER_CLASS_UNTAGGED;

/// What a visitor learns about an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    pub class_tag: jlong,
    pub size: jlong,
    /// Element count for arrays, -1 otherwise.
    pub length: jint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    Abort,
}

/// Which objects a walk reports.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    /// `JVMTI_HEAP_FILTER_*` bits; a set bit filters matching objects out.
    pub filter: jint,
    /// Only instances of exactly this class.
    pub klass: Option<&'a ObjectRef>,
    pub include_internal: bool,
}

impl Selection<'_> {
    fn admits(&self, object: &ObjectRef, tag: jlong, class_tag: jlong) -> bool {
        if !self.include_internal && object.is_internal() {
            return false;
        }
        if let Some(klass) = self.klass {
            if !object.class().map_or(false, |c| Object::same(c, klass)) {
                return false;
            }
        }
        let excluded = |bit: jint, hit: bool| self.filter & bit != 0 && hit;
        !(excluded(JVMTI_HEAP_FILTER_TAGGED, tag != 0)
            || excluded(JVMTI_HEAP_FILTER_UNTAGGED, tag == 0)
            || excluded(JVMTI_HEAP_FILTER_CLASS_TAGGED, class_tag != 0)
            || excluded(JVMTI_HEAP_FILTER_CLASS_UNTAGGED, class_tag == 0))
    }
}

/// Walks the heap, handing each selected object and its tag slot to
/// `visit`. Returns the number of objects visited.
///
/// Retagging and untagging take effect immediately. Tags given to objects
/// that had none are held in a buffer reserved before the walk and land in
/// the map once it ends, so class tags reported during a walk reflect the
/// map as it was when the walk started.
pub fn walk(
    heap: &Heap,
    tags: &mut TagMap,
    selection: Selection<'_>,
    mut visit: impl FnMut(&ObjectRef, ObjectInfo, &mut jlong) -> Visit,
) -> JvmtiResult<usize> {
    if selection.filter & !KNOWN_FILTER_BITS != 0 {
        return Err(jvmtiError::ILLEGAL_ARGUMENT);
    }
    if let Some(klass) = selection.klass {
        if !klass.is_class() {
            return Err(jvmtiError::INVALID_CLASS);
        }
    }
    let mut fresh: Vec<(ObjectRef, jlong)> = Vec::new();
    fresh.try_reserve_exact(heap.len()).map_err(|_| jvmtiError::OUT_OF_MEMORY)?;
    let mut visited = 0;
    {
        let _no_allocation = NoAllocation::enter();
        heap.walk(|object| {
            let tag = tags.get(object);
            let class_tag = object.class().map_or(0, |c| tags.get(c));
            if !selection.admits(object, tag, class_tag) {
                return true;
            }
            let info = ObjectInfo {
                class_tag,
                size: object.size() as jlong,
                length: object.array_length().unwrap_or(-1),
            };
            let mut slot = tag;
            let verdict = visit(object, info, &mut slot);
            if slot != tag {
                if tag == 0 {
                    fresh.push((object.clone(), slot));
                } else {
                    tags.set(object, slot);
                }
            }
            visited += 1;
            verdict == Visit::Continue
        });
    }
    for (object, tag) in &fresh {
        tags.set(object, *tag);
    }
    tracing::debug!(visited, tagged = fresh.len(), filter = selection.filter, "heap walk finished");
    Ok(visited)
}

/// `IterateThroughHeap` with a native callback table.
pub fn iterate_through_heap(
    heap: &Heap,
    tags: &mut TagMap,
    selection: Selection<'_>,
    callbacks: &jvmtiHeapCallbacks,
    user_data: *mut c_void,
) -> JvmtiResult<usize> {
    let callback = callbacks.heap_iteration_callback;
    walk(heap, tags, selection, |_, info, slot| match callback {
        Some(cb) => {
            // SAFETY: the agent supplied `cb` for exactly this signature;
            // `slot` outlives the call.
            let flags = unsafe { cb(info.class_tag, info.size, slot, info.length, user_data) };
            if flags & JVMTI_VISIT_ABORT != 0 {
                Visit::Abort
            } else {
                Visit::Continue
            }
        }
        None => Visit::Continue,
    })
}

/// Translates a legacy object filter into `JVMTI_HEAP_FILTER_*` bits.
pub fn legacy_filter(object_filter: jint) -> JvmtiResult<jint> {
    match object_filter {
        JVMTI_HEAP_OBJECT_TAGGED => Ok(JVMTI_HEAP_FILTER_UNTAGGED),
        JVMTI_HEAP_OBJECT_UNTAGGED => Ok(JVMTI_HEAP_FILTER_TAGGED),
        JVMTI_HEAP_OBJECT_EITHER => Ok(0),
        _ => Err(jvmtiError::ILLEGAL_ARGUMENT),
    }
}

/// `IterateOverHeap` and `IterateOverInstancesOfClass`: the legacy callback
/// shape, without array lengths.
pub fn iterate_over_heap(
    heap: &Heap,
    tags: &mut TagMap,
    selection: Selection<'_>,
    callback: jvmtiHeapObjectCallback,
    user_data: *mut c_void,
) -> JvmtiResult<usize> {
    walk(heap, tags, selection, |_, info, slot| {
        // SAFETY: as in `iterate_through_heap`.
        let control = unsafe { callback(info.class_tag, info.size, slot, user_data) };
        if control == JVMTI_ITERATION_ABORT {
            Visit::Abort
        } else {
            Visit::Continue
        }
    })
}

#[cfg(test)]
mod tests {
    use std::alloc::{GlobalAlloc, Layout, System};
    use std::cell::Cell;

    use super::*;

    struct CountingAllocator;

    thread_local! {
        static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
    }

    unsafe impl GlobalAlloc for CountingAllocator {
        unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
            let _ = ALLOCATIONS.try_with(|a| a.set(a.get() + 1));
            System.alloc(layout)
        }

        unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
            System.dealloc(ptr, layout)
        }
    }

    #[global_allocator]
    static ALLOCATOR: CountingAllocator = CountingAllocator;

    fn allocations() -> usize {
        ALLOCATIONS.with(Cell::get)
    }

    fn fixture() -> (Heap, ObjectRef, Vec<ObjectRef>) {
        let heap = Heap::new();
        let class = heap.define_class("demo/Item", false).unwrap();
        let objects = (0..4).map(|i| heap.allocate(&class, 16 + i).unwrap()).collect();
        (heap, class, objects)
    }

    fn all() -> Selection<'static> {
        Selection { filter: 0, klass: None, include_internal: false }
    }

    #[test]
    fn visits_each_object_once() {
        let (heap, _class, _objects) = fixture();
        let mut tags = TagMap::with_capacity(8);
        let mut seen = Vec::new();
        let visited = walk(&heap, &mut tags, all(), |o, _, _| {
            seen.push(o.serial());
            Visit::Continue
        })
        .unwrap();
        assert_eq!(visited, 5);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn visitor_can_retag_and_abort() {
        let (heap, class, objects) = fixture();
        let mut tags = TagMap::with_capacity(8);
        let selection = Selection { klass: Some(&class), ..all() };
        let visited = walk(&heap, &mut tags, selection, |_, _, slot| {
            *slot = 5;
            Visit::Abort
        })
        .unwrap();
        assert_eq!(visited, 1);
        let tagged = objects.iter().filter(|o| tags.get(o) == 5).count();
        assert_eq!(tagged, 1);
    }

    #[test]
    fn tag_filters_exclude() {
        let (heap, class, objects) = fixture();
        let mut tags = TagMap::with_capacity(8);
        tags.set(&objects[0], 1);
        let count = |tags: &mut TagMap, filter| walk(&heap, tags, Selection { filter, ..all() }, |_, _, _| Visit::Continue).unwrap();
        assert_eq!(count(&mut tags, JVMTI_HEAP_FILTER_UNTAGGED), 1);
        assert_eq!(count(&mut tags, JVMTI_HEAP_FILTER_TAGGED), 4);
        tags.set(&class, 9);
        // the class mirror itself has no class, so it counts as class-untagged
        assert_eq!(count(&mut tags, JVMTI_HEAP_FILTER_CLASS_UNTAGGED), 4);
        assert_eq!(count(&mut tags, JVMTI_HEAP_FILTER_CLASS_TAGGED), 1);
        assert_eq!(walk(&heap, &mut tags, Selection { filter: 0x1, ..all() }, |_, _, _| Visit::Continue), Err(jvmtiError::ILLEGAL_ARGUMENT));
    }

    #[test]
    fn allocation_fails_inside_the_walk() {
        let (heap, class, _objects) = fixture();
        let mut tags = TagMap::with_capacity(8);
        let mut refused = 0;
        walk(&heap, &mut tags, Selection { klass: Some(&class), ..all() }, |_, _, _| {
            if heap.allocate(&class, 8).is_err() {
                refused += 1;
            }
            Visit::Continue
        })
        .unwrap();
        assert_eq!(refused, 4);
        assert!(heap.allocate(&class, 8).is_ok());
    }

    #[test]
    fn tagging_during_a_walk_does_not_allocate() {
        let heap = Heap::new();
        let class = heap.define_class("demo/Leaf", false).unwrap();
        let objects: Vec<_> = (0..64).map(|_| heap.allocate(&class, 8).unwrap()).collect();
        let mut tags = TagMap::with_capacity(1);
        tags.set(&objects[0], 3);
        let selection = Selection { klass: Some(&class), ..all() };
        let mut first = None;
        let mut last = 0;
        let visited = walk(&heap, &mut tags, selection, |_, _, slot| {
            let now = allocations();
            first.get_or_insert(now);
            last = now;
            *slot = if *slot == 3 { 0 } else { 8 };
            Visit::Continue
        })
        .unwrap();
        assert_eq!(visited, 64);
        assert_eq!(first, Some(last));
        assert_eq!(tags.get(&objects[0]), 0);
        assert!(objects[1..].iter().all(|o| tags.get(o) == 8));
        assert_eq!(tags.len(), 63);
    }

    #[test]
    fn arrays_report_their_length() {
        let heap = Heap::new();
        let class = heap.define_class("[I", false).unwrap();
        heap.allocate_array(&class, 7, 44).unwrap();
        let mut tags = TagMap::with_capacity(8);
        let mut lengths = Vec::new();
        walk(&heap, &mut tags, all(), |_, info, _| {
            lengths.push(info.length);
            Visit::Continue
        })
        .unwrap();
        lengths.sort_unstable();
        assert_eq!(lengths, vec![-1, 7]);
    }

    #[test]
    fn internal_objects_are_hidden_unless_requested() {
        let heap = Heap::new();
        let internal = heap.define_class("vm/Stub", true).unwrap();
        heap.allocate(&internal, 8).unwrap();
        let mut tags = TagMap::with_capacity(8);
        let hidden = walk(&heap, &mut tags, all(), |_, _, _| Visit::Continue).unwrap();
        let shown = walk(&heap, &mut tags, Selection { include_internal: true, ..all() }, |_, _, _| Visit::Continue).unwrap();
        assert_eq!((hidden, shown), (0, 2));
    }

    #[test]
    fn legacy_filters_translate() {
        assert_eq!(legacy_filter(JVMTI_HEAP_OBJECT_TAGGED), Ok(JVMTI_HEAP_FILTER_UNTAGGED));
        assert_eq!(legacy_filter(JVMTI_HEAP_OBJECT_EITHER), Ok(0));
        assert_eq!(legacy_filter(0), Err(jvmtiError::ILLEGAL_ARGUMENT));
    }
}
