//! Allocation-freedom of the audio path
//!
//! Wraps the system allocator with counters and asserts that `process()`
//! performs zero allocations and zero deallocations, with structural
//! commands pending in both directions.

mod common;

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use common::{engine_params, ManualHost, SharedIo};
use manifold_core::{combine_copy, Engine, Item, ItemResult, ListId, ParameterMap, Selection};

struct CountingAllocator;

static TRACKING: AtomicBool = AtomicBool::new(false);
static ALLOCATIONS: AtomicUsize = AtomicUsize::new(0);
static DEALLOCATIONS: AtomicUsize = AtomicUsize::new(0);

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if TRACKING.load(Ordering::Relaxed) {
            ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        }
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if TRACKING.load(Ordering::Relaxed) {
            DEALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        }
        System.dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if TRACKING.load(Ordering::Relaxed) {
            ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        }
        System.realloc(ptr, layout, new_size)
    }
}

#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator;

struct Noop;

impl Item for Noop {
    fn process(&mut self) -> ItemResult {
        Ok(())
    }
}

#[test]
fn process_never_touches_the_allocator() {
    let io = SharedIo::new(64);
    let mut engine = Engine::new(ManualHost::new(io.clone()), engine_params(64, 4)).unwrap();

    let mut sources = Vec::new();
    for _ in 0..4 {
        sources.push(engine.add_input(&ParameterMap::new()).unwrap().source());
    }
    for _ in 0..2 {
        let sources = sources.clone();
        engine
            .add_output(&ParameterMap::new(), move |block: &mut [f32]| {
                combine_copy(sources.iter(), block, |_| Selection::Take);
            })
            .unwrap();
    }

    assert!(engine.activate());
    io.set_input(0, &[0.25; 64]);

    // Warm-up: the first barriers park every thread at least once (lazy
    // per-thread state in the parking primitives), ports touch their
    // locks.
    for _ in 0..8 {
        engine.host_mut().cycle();
    }

    // Structural churn, pre-allocated on this (control) thread: the
    // tracked cycles must link and unlink these without the allocator.
    let mut handles = Vec::new();
    for _ in 0..16 {
        handles.push(engine.add_item(ListId::Input, Box::new(Noop)));
    }
    for handle in &handles {
        engine.remove(handle).unwrap();
    }

    ALLOCATIONS.store(0, Ordering::SeqCst);
    DEALLOCATIONS.store(0, Ordering::SeqCst);
    TRACKING.store(true, Ordering::SeqCst);

    for _ in 0..4 {
        engine.host_mut().cycle();
    }

    TRACKING.store(false, Ordering::SeqCst);

    assert_eq!(
        ALLOCATIONS.load(Ordering::SeqCst),
        0,
        "process() allocated on the audio path"
    );
    assert_eq!(
        DEALLOCATIONS.load(Ordering::SeqCst),
        0,
        "process() freed memory on the audio path"
    );

    // The deferred frees happen here, on the control thread.
    engine.cleanup_commands();
    engine.deactivate().unwrap();
}
