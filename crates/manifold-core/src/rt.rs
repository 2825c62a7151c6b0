//! The real-time half of the engine
//!
//! An [`RtProcessor`] is everything the audio thread touches: the two
//! processing lists, the audio-side ends of the command and query
//! channels, and the worker pool. The host policy owns it while the
//! engine is active and calls [`RtProcessor::process`] once per block;
//! on deactivation it hands the processor back to the control thread,
//! which may then drain and mutate it directly.

use crate::query::QueryRt;
use crate::queue::{EngineLists, RtQueue};
use crate::workers::WorkerPool;

/// Middle-pass hook, run on the main audio thread between the input and
/// output stages.
pub(crate) type MiddlePass = Box<dyn FnMut() + Send>;

/// Audio-side processor driven by the host callback.
pub struct RtProcessor {
    queue: RtQueue,
    lists: EngineLists,
    pool: WorkerPool,
    middle: Option<MiddlePass>,
    queries: QueryRt,
}

impl RtProcessor {
    pub(crate) fn new(queue: RtQueue, pool: WorkerPool, queries: QueryRt) -> Self {
        Self {
            queue,
            lists: EngineLists::new(),
            pool,
            middle: None,
            queries,
        }
    }

    /// Run one cycle. Called by the host once per block on its audio
    /// thread; performs no heap allocation.
    ///
    /// Order within the cycle: pending commands are applied first, so a
    /// mutation pushed before the cycle started is visible to the whole
    /// cycle; then the input stage barrier, the main-thread middle pass,
    /// the output stage barrier, and finally the query captures. Between
    /// the command drain and the end of the cycle the lists do not
    /// change, so every stage sees the same snapshot.
    pub fn process(&mut self) {
        self.queue.process_commands(&mut self.lists);
        self.pool.process_list(&mut self.lists.inputs);
        if let Some(middle) = &mut self.middle {
            middle();
        }
        self.pool.process_list(&mut self.lists.outputs);
        self.queries.process_queries();
    }

    /// Apply pending commands outside a cycle. Only sound while no audio
    /// thread is running; used by the deactivation drain, where the
    /// control thread owns `self` again.
    pub(crate) fn drain_commands(&mut self) -> usize {
        self.queue.process_commands(&mut self.lists)
    }

    /// Capture pending queries outside a cycle (deactivation path).
    pub(crate) fn drain_queries(&mut self) {
        self.queries.process_queries();
    }

    /// Direct list access for synchronous command execution while the
    /// engine is inactive.
    pub(crate) fn lists_mut(&mut self) -> &mut EngineLists {
        &mut self.lists
    }

    pub(crate) fn set_middle(&mut self, middle: MiddlePass) {
        self.middle = Some(middle);
    }

    /// Number of items currently in the input list.
    pub fn input_count(&self) -> usize {
        self.lists.inputs.len()
    }

    /// Number of items currently in the output list.
    pub fn output_count(&self) -> usize {
        self.lists.outputs.len()
    }
}
