//! Worker-pool scheduler
//!
//! One main audio thread (the host's) plus `threads - 1` long-lived
//! workers. Each worker owns two counting semaphores: `resume` (main →
//! worker) and `done` (worker → main). A stage barrier over a list posts
//! every `resume`, runs slice 0 on the main thread, then waits on every
//! `done`. Worker `k` processes the items whose zero-based list position
//! satisfies `position % threads == k`: deterministic assignment with no
//! stealing, and a total cost bounded by the slowest slice.
//!
//! A panic escaping any slice (an item reporting a fatal contract
//! violation) is caught at the barrier: the failing thread still answers
//! `done`, the failure is re-raised as a panic on the main audio thread
//! once the barrier completes, and the pool refuses every later barrier.
//! Letting the panic kill a worker instead would leave the audio thread
//! blocked on that worker's `done` post forever.

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::error::ItemError;
use crate::item::BoxedItem;
use crate::rtlist::RtList;
use crate::thread_priority::{self, PriorityResult};

/// Counting semaphore built on a mutex and condvar.
pub struct Semaphore {
    count: Mutex<usize>,
    cond: Condvar,
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl Semaphore {
    pub fn new() -> Self {
        Self {
            count: Mutex::new(0),
            cond: Condvar::new(),
        }
    }

    pub fn post(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.cond.notify_one();
    }

    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.cond.wait(&mut count);
        }
        *count -= 1;
    }
}

struct WorkerSlot {
    resume: Semaphore,
    done: Semaphore,
}

struct PoolShared {
    slots: Box<[WorkerSlot]>,
    /// List currently under the barrier, published by the main thread
    /// before the `resume` posts.
    current: AtomicPtr<RtList<BoxedItem>>,
    stop: AtomicBool,
    /// Sticky flag set when a slice panicked; the pool is unusable.
    fatal: AtomicBool,
    threads: usize,
    realtime: bool,
}

/// The worker threads plus the barrier entry point used by the processor.
pub(crate) struct WorkerPool {
    shared: Arc<PoolShared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads - 1` workers. `threads` counts the main thread.
    pub(crate) fn new(threads: usize, realtime: bool) -> std::io::Result<Self> {
        debug_assert!(threads >= 1);
        let slots = (1..threads)
            .map(|_| WorkerSlot {
                resume: Semaphore::new(),
                done: Semaphore::new(),
            })
            .collect();
        let shared = Arc::new(PoolShared {
            slots,
            current: AtomicPtr::new(std::ptr::null_mut()),
            stop: AtomicBool::new(false),
            fatal: AtomicBool::new(false),
            threads,
            realtime,
        });

        let mut handles = Vec::with_capacity(threads - 1);
        for index in 1..threads {
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("manifold-worker-{index}"))
                .spawn(move || worker_main(shared, index))?;
            handles.push(handle);
        }

        Ok(Self { shared, handles })
    }

    /// Run one barrier stage over `list` on the calling (audio) thread.
    ///
    /// Panics if any slice panicked (a fatal item failure): the barrier
    /// still completes first so no thread is left mid-handshake, then
    /// the failure aborts processing on this thread. Once that has
    /// happened the pool refuses further barriers instead of blocking.
    pub(crate) fn process_list(&self, list: &mut RtList<BoxedItem>) {
        if self.shared.fatal.load(Ordering::Acquire) {
            panic!("worker pool unusable after fatal item failure");
        }
        if list.is_empty() {
            return;
        }

        let threads = self.shared.threads;
        let list: *mut RtList<BoxedItem> = list;
        self.shared.current.store(list, Ordering::Release);

        for slot in self.shared.slots.iter() {
            slot.resume.post();
        }

        // SAFETY: slice 0 is reserved for this thread; workers touch
        // disjoint positions and are quiescent again after the `done`
        // waits below.
        let slice0 = catch_unwind(AssertUnwindSafe(|| unsafe {
            process_slice(list, 0, threads)
        }));

        // Complete the barrier even on failure; every worker answers.
        for slot in self.shared.slots.iter() {
            slot.done.wait();
        }

        match slice0 {
            Err(payload) => {
                self.shared.fatal.store(true, Ordering::Release);
                resume_unwind(payload);
            }
            Ok(()) => {
                if self.shared.fatal.load(Ordering::Acquire) {
                    panic!("fatal item failure in a worker slice; processing aborted");
                }
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        for slot in self.shared.slots.iter() {
            slot.resume.post();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_main(shared: Arc<PoolShared>, index: usize) {
    if shared.realtime {
        match thread_priority::promote_current_thread() {
            PriorityResult::Failed => {
                log::warn!("worker {index}: real-time priority unavailable, running at default")
            }
            PriorityResult::Unsupported => {
                log::debug!("worker {index}: real-time priority not supported on this platform")
            }
            PriorityResult::Success => {}
        }
    }

    let slot = &shared.slots[index - 1];
    loop {
        slot.resume.wait();
        if shared.stop.load(Ordering::Acquire) {
            break;
        }
        let list = shared.current.load(Ordering::Acquire);
        // SAFETY: the main thread published `list` before posting
        // `resume` and will not unpublish it until our `done` post; our
        // slice is disjoint from every other thread's.
        let result = catch_unwind(AssertUnwindSafe(|| unsafe {
            process_slice(list, index, shared.threads)
        }));
        if result.is_err() {
            // The main thread re-raises this once the barrier completes;
            // dying here instead would leave it blocked on our `done`
            // post forever.
            shared.fatal.store(true, Ordering::Release);
        }
        slot.done.post();
    }
}

/// Process the items of one slice of `list`.
///
/// # Safety
///
/// `list` must stay valid and structurally unchanged for the duration of
/// the call, and no other thread may process positions with
/// `position % stride == worker` concurrently.
unsafe fn process_slice(list: *mut RtList<BoxedItem>, worker: usize, stride: usize) {
    let mut pos = 0usize;
    let mut cur = (*list).head_ptr();
    while !cur.is_null() {
        if pos % stride == worker {
            let item = &mut (*cur).elem;
            match item.process() {
                Ok(()) => {}
                Err(ItemError::Recoverable(msg)) => {
                    // Not RT-safe, but per-item failures are rare and the
                    // operator needs to see them.
                    log::warn!("item failed, continuing cycle: {msg}");
                }
                Err(ItemError::Fatal(msg)) => {
                    panic!("fatal item failure on audio thread: {msg}");
                }
            }
        }
        cur = (*cur).next;
        pos += 1;
    }
}
