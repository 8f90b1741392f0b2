use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jvmti_host::heap::handle_of;
use jvmti_host::prelude::*;
use jvmti_host::sys::jvmti::jvmtiCapabilities;

struct Quiet;

impl EventHandler for Quiet {}

fn live_core() -> JvmtiCore {
    let core = JvmtiCore::new(Config::default());
    core.vm_start();
    core.vm_init();
    core
}

fn bench_breakpoints(c: &mut Criterion) {
    let core = live_core();
    let env = core.create_rust_environment(Arc::new(Quiet)).unwrap();
    core.add_capabilities(env, &jvmtiCapabilities::of(&[Capability::GenerateBreakpointEvents]))
        .unwrap();
    for method in 1..64u32 {
        for location in (0..32).map(|l| l * 4) {
            core.set_breakpoint(env, MethodId(method).as_raw(), location).unwrap();
        }
    }
    c.bench_function("breakpoint_set_clear", |b| {
        let method = MethodId(100).as_raw();
        b.iter(|| {
            core.set_breakpoint(env, method, black_box(7)).unwrap();
            core.clear_breakpoint(env, method, black_box(7)).unwrap();
        })
    });
    c.bench_function("breakpoint_enumerate", |b| b.iter(|| core.get_breakpoints(black_box(MethodId(31)))));
}

fn bench_tags(c: &mut Criterion) {
    let core = live_core();
    let env = core.create_rust_environment(Arc::new(Quiet)).unwrap();
    core.add_capabilities(env, &jvmtiCapabilities::of(&[Capability::TagObjects])).unwrap();
    let class = core.heap().define_class("bench/Node", false).unwrap();
    let objects: Vec<_> = (0..4096).map(|_| core.heap().allocate(&class, 24).unwrap()).collect();
    for (i, object) in objects.iter().enumerate() {
        core.set_tag(env, handle_of(object), i as i64 + 1).unwrap();
    }
    let probe = handle_of(&objects[2048]);
    c.bench_function("tag_get", |b| b.iter(|| core.get_tag(env, black_box(probe)).unwrap()));
    c.bench_function("tag_set", |b| b.iter(|| core.set_tag(env, black_box(probe), 77).unwrap()));
}

fn bench_dispatch(c: &mut Criterion) {
    let core = live_core();
    c.bench_function("method_entry_unwatched", |b| b.iter(|| core.method_entry(black_box(MethodId(3)))));

    let env = core.create_rust_environment(Arc::new(Quiet)).unwrap();
    core.add_capabilities(env, &jvmtiCapabilities::of(&[Capability::GenerateMethodEntryEvents]))
        .unwrap();
    core.set_event_notification_mode(env, true, EventKind::MethodEntry.id(), std::ptr::null_mut())
        .unwrap();
    c.bench_function("method_entry_one_env", |b| b.iter(|| core.method_entry(black_box(MethodId(3)))));
}

criterion_group!(benches, bench_breakpoints, bench_tags, bench_dispatch);
criterion_main!(benches);
