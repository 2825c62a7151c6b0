//! Control-thread mutation against a live audio thread

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use common::{engine_params, ManualHost, SharedIo, ThreadedHost};
use manifold_core::{Engine, Item, ItemResult, ListId, ParameterMap, Query};

/// Item recording how often it was processed and on which thread it was
/// dropped.
struct Probe {
    processed: Arc<AtomicUsize>,
    dropped_on: Arc<Mutex<Option<ThreadId>>>,
}

impl Item for Probe {
    fn process(&mut self) -> ItemResult {
        self.processed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        *self.dropped_on.lock().unwrap() = Some(std::thread::current().id());
    }
}

#[test]
fn added_items_are_processed_after_one_command_round_trip() {
    let io = SharedIo::new(8);
    let mut engine = Engine::new(ThreadedHost::new(io), engine_params(8, 2)).unwrap();
    assert!(engine.activate());

    let processed = Arc::new(AtomicUsize::new(0));
    let dropped_on = Arc::new(Mutex::new(None));
    let handle = engine.add_item(
        ListId::Input,
        Box::new(Probe {
            processed: Arc::clone(&processed),
            dropped_on: Arc::clone(&dropped_on),
        }),
    );

    // The sentinel returns once the add has been executed; give the
    // following cycles a bounded window to run the list.
    engine.wait_for_rt_thread();
    let mut rounds = 0;
    while processed.load(Ordering::Relaxed) == 0 && rounds < 1000 {
        engine.wait_for_rt_thread();
        rounds += 1;
    }
    assert!(processed.load(Ordering::Relaxed) >= 1);

    engine.remove(&handle).unwrap();
    engine.wait_for_rt_thread();
    let after_remove = processed.load(Ordering::Relaxed);
    engine.wait_for_rt_thread();
    engine.wait_for_rt_thread();
    // Removed items stop being processed
    assert_eq!(processed.load(Ordering::Relaxed), after_remove);

    engine.cleanup_commands();
    let control = std::thread::current().id();
    assert_eq!(*dropped_on.lock().unwrap(), Some(control));

    engine.deactivate().unwrap();
}

#[test]
fn add_remove_back_to_back_destroys_on_control_thread() {
    let io = SharedIo::new(8);
    let mut engine = Engine::new(ThreadedHost::new(io), engine_params(8, 1)).unwrap();
    assert!(engine.activate());

    let processed = Arc::new(AtomicUsize::new(0));
    let dropped_on = Arc::new(Mutex::new(None));
    let handle = engine.add_item(
        ListId::Input,
        Box::new(Probe {
            processed: Arc::clone(&processed),
            dropped_on: Arc::clone(&dropped_on),
        }),
    );
    engine.remove(&handle).unwrap();

    engine.wait_for_rt_thread();
    engine.cleanup_commands();

    // The item may have been processed zero or one time, but its
    // destructor ran here, not on the audio thread.
    assert!(processed.load(Ordering::Relaxed) <= 1);
    assert_eq!(
        *dropped_on.lock().unwrap(),
        Some(std::thread::current().id())
    );

    engine.deactivate().unwrap();
}

#[test]
fn deactivate_reclaims_commands_a_stalled_host_never_executed() {
    // ManualHost never cycles unless asked: 100 adds stay in the
    // inbound ring until the deactivation drain runs them on the
    // control thread.
    let io = SharedIo::new(8);
    let mut engine = Engine::new(ManualHost::new(io), engine_params(8, 1)).unwrap();
    assert!(engine.activate());

    let dropped = Arc::new(AtomicUsize::new(0));

    struct CountDrop(Arc<AtomicUsize>);
    impl Item for CountDrop {
        fn process(&mut self) -> ItemResult {
            Ok(())
        }
    }
    impl Drop for CountDrop {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    let mut handles = Vec::new();
    for _ in 0..100 {
        handles.push(engine.add_item(
            ListId::Input,
            Box::new(CountDrop(Arc::clone(&dropped))),
        ));
    }
    assert_eq!(dropped.load(Ordering::Relaxed), 0);

    assert!(engine.deactivate().unwrap());

    // The adds executed during the drain; the items now live in the list
    // and are destroyed (on this thread) when the engine goes away.
    assert_eq!(engine.processor().unwrap().input_count(), 100);
    drop(engine);
    assert_eq!(dropped.load(Ordering::Relaxed), 100);
}

#[test]
fn queries_capture_on_audio_and_publish_on_control() {
    let io = SharedIo::new(8);
    let mut engine = Engine::new(ThreadedHost::new(io), engine_params(8, 1)).unwrap();
    assert!(engine.activate());

    struct CycleCounter {
        captured: Arc<AtomicUsize>,
        published: Arc<AtomicUsize>,
    }
    impl Query for CycleCounter {
        fn capture(&mut self) {
            self.captured.fetch_add(1, Ordering::Relaxed);
        }
        fn publish(&mut self) -> bool {
            self.published.fetch_add(1, Ordering::Relaxed);
            self.published.load(Ordering::Relaxed) < 3
        }
    }

    let captured = Arc::new(AtomicUsize::new(0));
    let published = Arc::new(AtomicUsize::new(0));
    engine.new_query(Box::new(CycleCounter {
        captured: Arc::clone(&captured),
        published: Arc::clone(&published),
    }));

    let mut rounds = 0;
    while published.load(Ordering::Relaxed) < 3 && rounds < 1000 {
        engine.wait_for_rt_thread();
        engine.pump_queries();
        rounds += 1;
    }

    assert_eq!(published.load(Ordering::Relaxed), 3);
    assert_eq!(captured.load(Ordering::Relaxed), 3);

    engine.deactivate().unwrap();
}

#[test]
fn repeated_activation_cycles_preserve_the_graph() {
    let io = SharedIo::new(4);
    let mut engine = Engine::new(ManualHost::new(io.clone()), engine_params(4, 1)).unwrap();

    let source = engine.add_input(&ParameterMap::new()).unwrap().source();
    engine
        .add_output(&ParameterMap::new(), move |block: &mut [f32]| {
            manifold_core::combine_copy(
                [&source].into_iter(),
                block,
                |_| manifold_core::Selection::Take,
            );
        })
        .unwrap();

    for round in 0..3 {
        assert!(engine.activate());
        io.set_input(0, &[round as f32; 4]);
        engine.host_mut().cycle();
        assert_eq!(io.output(0), [round as f32; 4]);
        assert!(engine.deactivate().unwrap());
    }
}
