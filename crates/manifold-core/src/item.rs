//! Items: the units of work scheduled on the audio threads
//!
//! Everything in a processing list is a boxed [`Item`]. The engine ships
//! two built-in kinds, [`Input`] (fetch a block from the host, then run
//! the user render) and [`Output`] (run the user render, then publish the
//! block to the host), plus [`ProcessItem`] for arbitrary intermediate
//! nodes. User code lives in a [`Render`] strategy; plain closures
//! implement it.

use crate::block::{SourceBlock, SourceRef};
use crate::error::{ItemError, ItemResult};
use crate::host::{SinkPort, SourcePort};
use crate::types::Sample;

/// A scheduled unit of work. `process` runs on an audio thread, assigned
/// by list position to one of the worker slices.
pub trait Item: Send {
    fn process(&mut self) -> ItemResult;
}

pub type BoxedItem = Box<dyn Item>;

/// User processing applied to one block.
///
/// Implemented for any `FnMut(&mut [S])` closure; implement the trait
/// directly when the step can fail or carries state worth naming.
pub trait Render<S>: Send {
    fn render(&mut self, block: &mut [S]) -> ItemResult;
}

impl<S, F> Render<S> for F
where
    F: FnMut(&mut [S]) + Send,
{
    fn render(&mut self, block: &mut [S]) -> ItemResult {
        self(block);
        Ok(())
    }
}

/// Input node: fetches its block from the host, then runs the user render
/// in place. Downstream items read the result through [`SourceRef`]s.
pub struct Input<S> {
    port: Box<dyn SourcePort<S>>,
    block: SourceBlock<S>,
    render: Option<Box<dyn Render<S>>>,
}

impl<S: Sample> Input<S> {
    pub fn new(block_size: usize, port: Box<dyn SourcePort<S>>) -> Self {
        Self {
            port,
            block: SourceBlock::new(block_size),
            render: None,
        }
    }

    /// Attach a render step running after the host fetch.
    pub fn with_render(mut self, render: impl Render<S> + 'static) -> Self {
        self.render = Some(Box::new(render));
        self
    }

    /// Read handle to this input's block, for wiring into combiners.
    pub fn source(&self) -> SourceRef<S> {
        self.block.share()
    }
}

impl<S: Sample> Item for Input<S> {
    fn process(&mut self) -> ItemResult {
        let block = self.block.write();
        self.port.fetch(block);
        if let Some(render) = &mut self.render {
            render.render(block)?;
        }
        Ok(())
    }
}

/// Output node: runs the user render into its own block, then publishes
/// the block to the host. If the render fails recoverably, the host still
/// receives a well-defined (silent) block for this cycle.
pub struct Output<S> {
    port: Box<dyn SinkPort<S>>,
    block: Box<[S]>,
    render: Box<dyn Render<S>>,
}

impl<S: Sample> Output<S> {
    pub fn new(
        block_size: usize,
        port: Box<dyn SinkPort<S>>,
        render: impl Render<S> + 'static,
    ) -> Self {
        Self {
            port,
            block: vec![S::zero(); block_size].into_boxed_slice(),
            render: Box::new(render),
        }
    }
}

impl<S: Sample> Item for Output<S> {
    fn process(&mut self) -> ItemResult {
        let result = self.render.render(&mut self.block);
        match &result {
            Err(ItemError::Fatal(_)) => return result,
            Err(ItemError::Recoverable(_)) => self.block.fill(S::zero()),
            Ok(()) => {}
        }
        self.port.publish(&self.block);
        result
    }
}

/// Intermediate node wrapping a user closure or fallible step.
///
/// Use for per-item work that belongs between inputs and outputs but
/// should still be sliced across the worker threads (the middle pass hook
/// runs on the main thread only).
pub struct ProcessItem<F>(pub F);

impl<F> Item for ProcessItem<F>
where
    F: FnMut() -> ItemResult + Send,
{
    fn process(&mut self) -> ItemResult {
        (self.0)()
    }
}
