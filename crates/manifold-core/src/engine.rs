//! Control-side engine
//!
//! The [`Engine`] is what the non-realtime world holds: it validates the
//! parameter map, owns the host policy and the control ends of the
//! command and query channels, and hands the real-time half to the host
//! on [`activate`](Engine::activate). While the engine is inactive it
//! still owns the [`RtProcessor`], so structural changes execute
//! synchronously on the calling thread; construction-time setup shares
//! one code path with run-time mutation.

use std::sync::Arc;

use crate::block::SourceRef;
use crate::error::{ConfigError, EngineError};
use crate::fade::CrossfadeWindow;
use crate::host::HostPolicy;
use crate::item::{BoxedItem, Input, Item, Output, Render};
use crate::params::{EngineConfig, ParameterMap};
use crate::query::{query_channel, Query, QueryControl};
use crate::queue::{
    command_channel, AddCommand, BoxedCommand, ClearCommand, ControlQueue, NotifyCommand,
    RemoveCommand, SpliceCommand,
};
use crate::rt::RtProcessor;
use crate::rtlist::{Node, RtList};
use crate::types::{ItemId, ListId, Sample};
use crate::workers::{Semaphore, WorkerPool};

/// A non-owning reference to an installed item.
pub trait Handle {
    fn id(&self) -> ItemId;
    fn list(&self) -> ListId;
}

/// Handle to an installed input; carries the shareable read end of the
/// input's block for wiring combiners.
pub struct InputHandle<S> {
    id: ItemId,
    source: SourceRef<S>,
}

impl<S> Clone for InputHandle<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            source: self.source.clone(),
        }
    }
}

impl<S> InputHandle<S> {
    /// Read handle to the input's block.
    pub fn source(&self) -> SourceRef<S> {
        self.source.clone()
    }
}

impl<S> Handle for InputHandle<S> {
    fn id(&self) -> ItemId {
        self.id
    }
    fn list(&self) -> ListId {
        ListId::Input
    }
}

/// Handle to an installed output.
#[derive(Clone)]
pub struct OutputHandle {
    id: ItemId,
}

impl Handle for OutputHandle {
    fn id(&self) -> ItemId {
        self.id
    }
    fn list(&self) -> ListId {
        ListId::Output
    }
}

/// Handle to an item installed with [`Engine::add_item`] or
/// [`Engine::splice`].
#[derive(Clone, Copy)]
pub struct ItemHandle {
    id: ItemId,
    list: ListId,
}

impl Handle for ItemHandle {
    fn id(&self) -> ItemId {
        self.id
    }
    fn list(&self) -> ListId {
        self.list
    }
}

/// Control-side root of a processor.
///
/// Generic over the sample type and the host policy; multiple engines
/// coexist freely in one process (there is no global state).
pub struct Engine<S: Sample, H: HostPolicy<S>> {
    host: H,
    rt: Option<RtProcessor>,
    queue: ControlQueue,
    queries: QueryControl,
    window: Arc<CrossfadeWindow<S>>,
    config: EngineConfig,
    params: ParameterMap,
    next_id: u64,
}

impl<S: Sample, H: HostPolicy<S>> Engine<S, H> {
    /// Validate `params` and build an inactive engine.
    ///
    /// Worker threads are spawned here (and parked); the command queue
    /// starts inactive so every mutation before [`activate`](Self::activate)
    /// runs synchronously in non-realtime context.
    pub fn new(host: H, params: ParameterMap) -> Result<Self, ConfigError> {
        let config = EngineConfig::from_params(&params)?;

        let (queue, rt_queue) = command_channel(config.fifo_size);
        let (queries, rt_queries) = query_channel(config.fifo_size);
        let pool = WorkerPool::new(config.threads, config.realtime_workers).map_err(|e| {
            ConfigError::Invalid {
                key: "threads",
                reason: format!("failed to spawn worker threads: {e}"),
            }
        })?;

        Ok(Self {
            host,
            rt: Some(RtProcessor::new(rt_queue, pool, rt_queries)),
            queue,
            queries,
            window: Arc::new(CrossfadeWindow::new(config.block_size)),
            config,
            params,
            next_id: 0,
        })
    }

    pub fn params(&self) -> &ParameterMap {
        &self.params
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// The raised-cosine window shared by all crossfade combiners of
    /// this engine.
    pub fn window(&self) -> Arc<CrossfadeWindow<S>> {
        Arc::clone(&self.window)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Is the host currently driving cycles?
    pub fn is_active(&self) -> bool {
        self.rt.is_none()
    }

    /// The real-time half, accessible while inactive.
    pub fn processor(&self) -> Option<&RtProcessor> {
        self.rt.as_ref()
    }

    fn alloc_id(&mut self) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Route a command: enqueue while active, execute synchronously
    /// while inactive. Either way, finished commands are reclaimed.
    fn submit(&mut self, cmd: BoxedCommand) {
        self.queue.cleanup_commands();
        match self.rt.as_mut() {
            Some(rt) => {
                let mut cmd = cmd;
                cmd.execute(rt.lists_mut());
                cmd.cleanup();
            }
            None => self.queue.push(cmd),
        }
    }

    /// Install an input. Its block becomes readable through the returned
    /// handle's [`SourceRef`] from the next cycle on.
    pub fn add_input(&mut self, port_params: &ParameterMap) -> Result<InputHandle<S>, EngineError> {
        let port = self
            .host
            .make_source(port_params)
            .map_err(EngineError::Host)?;
        let input = Input::new(self.config.block_size, port);
        let source = input.source();
        let id = self.alloc_id();
        self.submit(Box::new(AddCommand::new(ListId::Input, id, Box::new(input))));
        Ok(InputHandle { id, source })
    }

    /// Install an input with a render step run after the host fetch.
    pub fn add_input_with(
        &mut self,
        port_params: &ParameterMap,
        render: impl Render<S> + 'static,
    ) -> Result<InputHandle<S>, EngineError> {
        let port = self
            .host
            .make_source(port_params)
            .map_err(EngineError::Host)?;
        let input = Input::new(self.config.block_size, port).with_render(render);
        let source = input.source();
        let id = self.alloc_id();
        self.submit(Box::new(AddCommand::new(ListId::Input, id, Box::new(input))));
        Ok(InputHandle { id, source })
    }

    /// Install an output whose `render` fills its block each cycle
    /// (usually by running one of the combining kernels over input
    /// sources).
    pub fn add_output(
        &mut self,
        port_params: &ParameterMap,
        render: impl Render<S> + 'static,
    ) -> Result<OutputHandle, EngineError> {
        let port = self
            .host
            .make_sink(port_params)
            .map_err(EngineError::Host)?;
        let output = Output::new(self.config.block_size, port, render);
        let id = self.alloc_id();
        self.submit(Box::new(AddCommand::new(
            ListId::Output,
            id,
            Box::new(output),
        )));
        Ok(OutputHandle { id })
    }

    /// Install an arbitrary item into one of the lists.
    pub fn add_item(&mut self, list: ListId, item: Box<dyn Item>) -> ItemHandle {
        let id = self.alloc_id();
        self.submit(Box::new(AddCommand::new(list, id, item)));
        ItemHandle { id, list }
    }

    /// Install a batch of items that must become visible in the same
    /// cycle. O(1) on the audio thread regardless of batch size.
    pub fn splice(&mut self, list: ListId, items: Vec<BoxedItem>) -> Vec<ItemHandle> {
        let mut batch = RtList::new();
        let mut handles = Vec::with_capacity(items.len());
        for item in items {
            let id = self.alloc_id();
            batch.link_back(Node::new(id, item));
            handles.push(ItemHandle { id, list });
        }
        self.submit(Box::new(SpliceCommand::new(list, batch)));
        handles
    }

    /// Remove an item. The item is destroyed on the control thread when
    /// the spent command is reclaimed, never on the audio thread.
    ///
    /// While inactive, a stale handle is reported as
    /// [`EngineError::NotFound`]; while active, the removal is deferred
    /// and a stale handle is logged when the command executes.
    pub fn remove(&mut self, handle: &impl Handle) -> Result<(), EngineError> {
        if let Some(rt) = self.rt.as_mut() {
            if !rt.lists_mut().list_mut(handle.list()).contains(handle.id()) {
                return Err(EngineError::NotFound(handle.id()));
            }
        }
        self.submit(Box::new(RemoveCommand::new(handle.list(), handle.id())));
        Ok(())
    }

    /// Remove every item of a list.
    pub fn clear(&mut self, list: ListId) {
        self.submit(Box::new(ClearCommand::new(list)));
    }

    /// Reactivate the command queue and start host callbacks.
    /// Returns `false` if the host refused.
    pub fn activate(&mut self) -> bool {
        let Some(rt) = self.rt.take() else {
            return true;
        };
        self.queue.reactivate();
        match self.host.activate(rt) {
            Ok(()) => true,
            Err(rt) => {
                self.rt = Some(rt);
                self.queue.deactivate();
                false
            }
        }
    }

    /// Stop host callbacks and drain the command queue.
    ///
    /// After this returns `Ok(true)`, both rings are empty, every pushed
    /// command has been executed and cleaned up, and the lists can be
    /// mutated synchronously again. Idempotent.
    pub fn deactivate(&mut self) -> Result<bool, EngineError> {
        if self.rt.is_some() {
            return Ok(true);
        }

        let mut rt = self.host.deactivate().ok_or_else(|| {
            EngineError::Host("host reported inactive while the engine was active".into())
        })?;

        // No audio thread is running past this point; the drain below
        // executes exceptionally on this thread.
        self.queue.begin_drain();
        loop {
            rt.drain_commands();
            self.queue.cleanup_commands();
            if !self.queue.commands_available() && !self.queue.inbound_pending() {
                break;
            }
        }

        let drained = self.queue.deactivate();

        // Flush pending queries; nothing re-arms across a deactivation.
        rt.drain_queries();
        self.queries.pump_discard();

        self.rt = Some(rt);
        if !drained {
            return Err(EngineError::QueueNotDrained);
        }
        Ok(true)
    }

    /// Block until the audio thread has started a cycle after this call
    /// (and therefore observed every previously pushed command).
    pub fn wait_for_rt_thread(&mut self) {
        let sem = Arc::new(Semaphore::new());
        self.submit(Box::new(NotifyCommand::new(Arc::clone(&sem))));
        sem.wait();
    }

    /// Reclaim executed commands: run their `cleanup` and free them.
    /// Called opportunistically by every mutation as well.
    pub fn cleanup_commands(&mut self) -> usize {
        self.queue.cleanup_commands()
    }

    /// Are executed commands awaiting [`cleanup_commands`](Self::cleanup_commands)?
    pub fn commands_available(&self) -> bool {
        self.queue.commands_available()
    }

    /// Install the middle pass, run on the main audio thread between the
    /// input and output stages. Must be installed while inactive.
    pub fn set_middle_pass(
        &mut self,
        middle: impl FnMut() + Send + 'static,
    ) -> Result<(), EngineError> {
        match self.rt.as_mut() {
            Some(rt) => {
                rt.set_middle(Box::new(middle));
                Ok(())
            }
            None => Err(EngineError::Active(
                "install the middle pass before activate()",
            )),
        }
    }

    /// Arm a query; it captures at the end of the next cycle.
    pub fn new_query(&mut self, query: Box<dyn Query>) {
        self.queries.push(query);
    }

    /// Publish completed queries, re-arming the recurring ones.
    pub fn pump_queries(&mut self) -> usize {
        self.queries.pump()
    }
}

impl<S: Sample, H: HostPolicy<S>> Drop for Engine<S, H> {
    fn drop(&mut self) {
        if let Err(e) = self.deactivate() {
            log::warn!("engine dropped while deactivation failed: {e}");
        }
        // The processing lists drop with the RtProcessor, here on the
        // control thread.
    }
}
