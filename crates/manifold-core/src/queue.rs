//! Lock-free command queue
//!
//! Structural changes travel from the control thread to the audio thread
//! as two-phase [`Command`]s over a pair of bounded SPSC rings: the
//! inbound ring carries commands to the audio thread, which calls
//! [`Command::execute`] (allocation-free) and forwards the spent command
//! to the outbound ring, where the control thread calls
//! [`Command::cleanup`] and drops it. Every allocation made while
//! building a command is therefore freed on the control thread.
//!
//! The queue is tri-state. While `Active`, pushes enqueue; while
//! `Inactive` (before activation and after the deactivation drain), the
//! engine executes submissions synchronously on the control thread, so
//! the same code path serves non-realtime initialization.
//! `Deactivating` marks the drain window in between.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::item::BoxedItem;
use crate::rtlist::{Node, RtList};
use crate::types::{ItemId, ListId};
use crate::workers::Semaphore;

/// A deferred mutation of the engine's processing lists.
///
/// `execute` runs on the audio thread and must not allocate, free or
/// block; `cleanup` runs on the control thread and may do both.
pub trait Command: Send {
    fn execute(&mut self, lists: &mut EngineLists);
    fn cleanup(&mut self) {}
}

pub(crate) type BoxedCommand = Box<dyn Command>;

/// The two processing lists, as seen by executing commands.
pub struct EngineLists {
    pub inputs: RtList<BoxedItem>,
    pub outputs: RtList<BoxedItem>,
}

impl EngineLists {
    pub(crate) fn new() -> Self {
        Self {
            inputs: RtList::new(),
            outputs: RtList::new(),
        }
    }

    pub fn list_mut(&mut self, id: ListId) -> &mut RtList<BoxedItem> {
        match id {
            ListId::Input => &mut self.inputs,
            ListId::Output => &mut self.outputs,
        }
    }
}

/// Queue lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum QueueState {
    Active = 0,
    Deactivating = 1,
    Inactive = 2,
}

struct SharedState(AtomicU8);

impl SharedState {
    fn get(&self) -> QueueState {
        match self.0.load(Ordering::Acquire) {
            0 => QueueState::Active,
            1 => QueueState::Deactivating,
            _ => QueueState::Inactive,
        }
    }

    fn set(&self, state: QueueState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Create a command queue of `capacity` slots per direction.
///
/// The queue starts `Inactive` so construction-time mutations run
/// synchronously in non-realtime context.
pub(crate) fn command_channel(capacity: usize) -> (ControlQueue, RtQueue) {
    let (to_rt, from_ctl) = rtrb::RingBuffer::new(capacity);
    let (to_ctl, from_rt) = rtrb::RingBuffer::new(capacity);
    let state = Arc::new(SharedState(AtomicU8::new(QueueState::Inactive as u8)));
    (
        ControlQueue {
            to_rt,
            from_rt,
            state: Arc::clone(&state),
            capacity,
        },
        RtQueue { from_ctl, to_ctl },
    )
}

/// Control-thread half: push, cleanup, lifecycle.
pub struct ControlQueue {
    to_rt: rtrb::Producer<BoxedCommand>,
    from_rt: rtrb::Consumer<BoxedCommand>,
    state: Arc<SharedState>,
    capacity: usize,
}

impl ControlQueue {
    pub fn state(&self) -> QueueState {
        self.state.get()
    }

    /// Enqueue a command for the audio thread.
    ///
    /// A full ring means the queue was sized below the control thread's
    /// burst rate, a configuration bug. We spin rather than drop the
    /// command; size `fifo_size` to the peak burst instead.
    pub(crate) fn push(&mut self, cmd: BoxedCommand) {
        debug_assert_ne!(self.state.get(), QueueState::Inactive);
        let mut cmd = cmd;
        loop {
            match self.to_rt.push(cmd) {
                Ok(()) => return,
                Err(rtrb::PushError::Full(rejected)) => {
                    cmd = rejected;
                    std::hint::spin_loop();
                }
            }
        }
    }

    /// Run `cleanup` on (and drop) every executed command the audio
    /// thread has returned. Returns how many were reclaimed.
    pub fn cleanup_commands(&mut self) -> usize {
        let mut reclaimed = 0;
        while let Ok(mut cmd) = self.from_rt.pop() {
            cmd.cleanup();
            drop(cmd);
            reclaimed += 1;
        }
        reclaimed
    }

    /// Cheap check for executed commands awaiting cleanup.
    pub fn commands_available(&self) -> bool {
        !self.from_rt.is_empty()
    }

    /// Are there commands the audio thread has not yet consumed?
    pub(crate) fn inbound_pending(&self) -> bool {
        self.to_rt.slots() < self.capacity
    }

    /// Flip to `Active`.
    pub(crate) fn reactivate(&self) {
        self.state.set(QueueState::Active);
    }

    /// Enter the drain window preceding deactivation.
    pub(crate) fn begin_drain(&self) {
        self.state.set(QueueState::Deactivating);
    }

    /// Flip to `Inactive`. Returns `true` iff both rings are empty; a
    /// non-empty ring after a drain means a command was lost.
    pub(crate) fn deactivate(&mut self) -> bool {
        self.state.set(QueueState::Inactive);
        !self.inbound_pending() && self.from_rt.is_empty()
    }
}

/// Audio-thread half: drains the inbound ring once per cycle.
pub struct RtQueue {
    from_ctl: rtrb::Consumer<BoxedCommand>,
    to_ctl: rtrb::Producer<BoxedCommand>,
}

impl RtQueue {
    /// Execute every currently visible command, in push order, and
    /// forward each to the outbound ring. Does not allocate.
    pub fn process_commands(&mut self, lists: &mut EngineLists) -> usize {
        let mut executed = 0;
        while let Ok(mut cmd) = self.from_ctl.pop() {
            cmd.execute(lists);
            executed += 1;
            loop {
                match self.to_ctl.push(cmd) {
                    Ok(()) => break,
                    Err(rtrb::PushError::Full(rejected)) => {
                        // Rings are sized identically, so this only
                        // happens if the control thread stopped draining.
                        cmd = rejected;
                        std::hint::spin_loop();
                    }
                }
            }
        }
        executed
    }
}

// ─────────────────────────────────────────────────────────────────────
// Built-in commands
// ─────────────────────────────────────────────────────────────────────

/// Link a pre-allocated item at the tail of a list.
pub(crate) struct AddCommand {
    list: ListId,
    node: Option<Box<Node<BoxedItem>>>,
}

impl AddCommand {
    pub(crate) fn new(list: ListId, id: ItemId, item: BoxedItem) -> Self {
        Self {
            list,
            node: Some(Node::new(id, item)),
        }
    }
}

impl Command for AddCommand {
    fn execute(&mut self, lists: &mut EngineLists) {
        if let Some(node) = self.node.take() {
            lists.list_mut(self.list).link_back(node);
        }
    }
    // Ownership moved into the list; nothing to clean up.
}

/// Unlink an item; its allocation rides back in the command and is
/// dropped by `cleanup` on the control thread.
pub(crate) struct RemoveCommand {
    list: ListId,
    id: ItemId,
    unlinked: Option<Box<Node<BoxedItem>>>,
}

impl RemoveCommand {
    pub(crate) fn new(list: ListId, id: ItemId) -> Self {
        Self {
            list,
            id,
            unlinked: None,
        }
    }
}

impl Command for RemoveCommand {
    fn execute(&mut self, lists: &mut EngineLists) {
        self.unlinked = lists.list_mut(self.list).unlink(self.id);
        if self.unlinked.is_none() {
            // Not RT-safe; a stale handle is a caller bug worth surfacing.
            log::warn!("remove: item {:?} not present in {:?} list", self.id, self.list);
        }
    }

    fn cleanup(&mut self) {
        self.unlinked = None;
    }
}

/// Unlink every item of a list. The whole node chain is spliced into the
/// command (O(1), no allocation) and dropped by `cleanup`.
pub(crate) struct ClearCommand {
    list: ListId,
    drained: RtList<BoxedItem>,
}

impl ClearCommand {
    pub(crate) fn new(list: ListId) -> Self {
        Self {
            list,
            drained: RtList::new(),
        }
    }
}

impl Command for ClearCommand {
    fn execute(&mut self, lists: &mut EngineLists) {
        self.drained.append(lists.list_mut(self.list));
    }

    fn cleanup(&mut self) {
        self.drained = RtList::new();
    }
}

/// Splice a control-side built list to the tail of a live list. All items
/// become visible together at the start of the next cycle.
pub(crate) struct SpliceCommand {
    list: ListId,
    src: RtList<BoxedItem>,
}

impl SpliceCommand {
    pub(crate) fn new(list: ListId, src: RtList<BoxedItem>) -> Self {
        Self { list, src }
    }
}

impl Command for SpliceCommand {
    fn execute(&mut self, lists: &mut EngineLists) {
        lists.list_mut(self.list).append(&mut self.src);
    }
}

/// Sentinel used by `wait_for_rt_thread`: executing it proves the audio
/// thread has started a cycle after the push.
pub(crate) struct NotifyCommand {
    sem: Arc<Semaphore>,
}

impl NotifyCommand {
    pub(crate) fn new(sem: Arc<Semaphore>) -> Self {
        Self { sem }
    }
}

impl Command for NotifyCommand {
    fn execute(&mut self, _lists: &mut EngineLists) {
        self.sem.post();
    }
}
