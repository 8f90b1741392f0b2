use proptest::prelude::*;

use jvmti_host::breakpoints::{self, BreakpointTable, MethodId};
use jvmti_host::capabilities::{self, Capability};
use jvmti_host::heap::Heap;
use jvmti_host::sys::jvmti::{jvmtiCapabilities, jvmtiError};
use jvmti_host::tags::TagMap;

fn capability() -> impl Strategy<Value = Capability> {
    (0..Capability::ALL.len()).prop_map(|i| Capability::ALL[i])
}

proptest! {
    #[test]
    fn encoded_breakpoints_decode_to_their_parts(method in 1u32.., location in 0i64..=u32::MAX as i64) {
        let encoded = breakpoints::encode(MethodId(method), location).unwrap();
        prop_assert_eq!(breakpoints::decode_method(encoded), MethodId(method));
        prop_assert_eq!(breakpoints::decode_location(encoded), location);
    }

    #[test]
    fn breakpoints_enumerate_in_location_order(
        locations in prop::collection::hash_set(0i64..10_000, 0..40),
        noise in prop::collection::hash_set(0i64..10_000, 0..10),
    ) {
        let mut table = BreakpointTable::with_capacity(2);
        let mine = MethodId(5);
        for l in &locations {
            table.set(mine, *l).unwrap();
        }
        for l in &noise {
            table.set(MethodId(6), *l).unwrap();
        }
        let mut expected: Vec<_> = locations.iter().copied().collect();
        expected.sort_unstable();
        prop_assert_eq!(table.get_breakpoints(mine), expected);
    }

    #[test]
    fn duplicate_breakpoints_leave_the_table_unchanged(locations in prop::collection::vec(0i64..64, 1..30)) {
        let mut table = BreakpointTable::default();
        let method = MethodId(9);
        for l in &locations {
            let len = table.len();
            let fresh = !table.contains(method, *l);
            let result = table.set(method, *l);
            if fresh {
                prop_assert_eq!(result, Ok(()));
                prop_assert_eq!(table.len(), len + 1);
            } else {
                prop_assert_eq!(result, Err(jvmtiError::DUPLICATE));
                prop_assert_eq!(table.len(), len);
            }
        }
    }

    #[test]
    fn single_capabilities_are_granted_iff_implementable(cap in capability()) {
        let mut granted = jvmtiCapabilities::default();
        let result = capabilities::add(&mut granted, &jvmtiCapabilities::of(&[cap]));
        prop_assert_eq!(result.is_ok(), cap.is_implementable());
        prop_assert_eq!(granted.has(cap), cap.is_implementable());
    }

    #[test]
    fn relinquishing_a_grant_restores_the_previous_set(
        held in prop::collection::vec(capability(), 0..10),
        extra in capability(),
    ) {
        let held: Vec<_> = held.into_iter().filter(|c| c.is_implementable()).collect();
        prop_assume!(extra.is_implementable() && !held.contains(&extra));
        let mut granted = jvmtiCapabilities::of(&held);
        let before = granted;
        let request = jvmtiCapabilities::of(&[extra]);
        capabilities::add(&mut granted, &request).unwrap();
        capabilities::relinquish(&mut granted, &request);
        prop_assert_eq!(granted, before);
    }

    #[test]
    fn tags_read_back_what_was_last_set(ops in prop::collection::vec((0usize..16, -3i64..4), 1..80)) {
        let heap = Heap::new();
        let class = heap.define_class("prop/Obj", false).unwrap();
        let objects: Vec<_> = (0..16).map(|_| heap.allocate(&class, 8).unwrap()).collect();
        let hashes: Vec<_> = objects.iter().map(|o| o.identity_hash()).collect();
        let mut tags = TagMap::with_capacity(2);
        let mut model = [0i64; 16];
        for (index, tag) in ops {
            tags.set(&objects[index], tag);
            model[index] = tag;
        }
        for (object, expected) in objects.iter().zip(model) {
            prop_assert_eq!(tags.get(object), expected);
        }
        prop_assert_eq!(tags.len(), model.iter().filter(|t| **t != 0).count());
        let after: Vec<_> = objects.iter().map(|o| o.identity_hash()).collect();
        prop_assert_eq!(after, hashes);
    }
}
