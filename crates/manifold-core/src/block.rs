//! Shared audio blocks
//!
//! Every input (and any intermediate producer) owns a [`SourceBlock`]: one
//! block of samples written once per cycle during its own process step.
//! Any number of [`SourceRef`] clones of that block can be held by items
//! downstream, typically by the combining rules of outputs.
//!
//! There is no lock. Safety comes from the cycle structure: the input
//! stage (which writes) finishes at a barrier before the middle pass and
//! the output stage (which read) begin, and the writing item holds the
//! only [`SourceBlock`]. Readers must only call [`SourceRef::read`] once
//! the owning item's process step cannot be running anymore, i.e. from
//! the middle pass or a later stage of the same cycle.

use std::cell::UnsafeCell;
use std::sync::Arc;

use crate::types::Sample;

struct BlockCell<S> {
    data: UnsafeCell<Box<[S]>>,
}

// SAFETY: concurrent access is governed by the stage barriers described in
// the module docs; the cell itself is just storage.
unsafe impl<S: Send> Send for BlockCell<S> {}
unsafe impl<S: Send + Sync> Sync for BlockCell<S> {}

/// Writing end of a shared block. Exactly one exists per block.
pub struct SourceBlock<S> {
    cell: Arc<BlockCell<S>>,
}

impl<S: Sample> SourceBlock<S> {
    /// Allocate a silent block of `block_size` samples.
    pub fn new(block_size: usize) -> Self {
        Self {
            cell: Arc::new(BlockCell {
                data: UnsafeCell::new(vec![S::zero(); block_size].into_boxed_slice()),
            }),
        }
    }

    /// Create a read handle to this block.
    pub fn share(&self) -> SourceRef<S> {
        SourceRef {
            cell: Arc::clone(&self.cell),
        }
    }

    /// Number of samples in the block.
    pub fn len(&self) -> usize {
        // SAFETY: the length of the boxed slice never changes.
        unsafe { (&*self.cell.data.get()).len() }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutable access for the owning item's process step.
    ///
    /// Must only be called while no [`SourceRef::read`] of the same block
    /// can run, i.e. from the process step of the item that owns this
    /// block (stage discipline, see module docs).
    pub fn write(&mut self) -> &mut [S] {
        // SAFETY: `&mut self` makes this the only writer; readers are
        // excluded by the stage barrier.
        unsafe { &mut *self.cell.data.get() }
    }
}

/// Read handle to a [`SourceBlock`]. Cheap to clone.
pub struct SourceRef<S> {
    cell: Arc<BlockCell<S>>,
}

impl<S> Clone for SourceRef<S> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<S: Sample> SourceRef<S> {
    /// The block as written by the owning item this cycle.
    ///
    /// Must only be called after the input stage of the current cycle has
    /// completed (middle pass or output stage).
    pub fn read(&self) -> &[S] {
        // SAFETY: stage discipline guarantees the writer is quiescent.
        unsafe { &*self.cell.data.get() }
    }

    /// Number of samples in the block.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Copy `src` into `dst` on the first contribution, add on later ones.
///
/// This is the write discipline of all combining kernels: the destination
/// is never pre-zeroed, the first contributor overwrites whatever was
/// there and flips `accumulated`.
#[inline]
pub fn write_or_mix<S: Sample>(dst: &mut [S], src: &[S], accumulated: &mut bool) {
    debug_assert_eq!(dst.len(), src.len());
    if *accumulated {
        for (d, s) in dst.iter_mut().zip(src) {
            *d += *s;
        }
    } else {
        dst.copy_from_slice(src);
        *accumulated = true;
    }
}

/// Like [`write_or_mix`] but mapping each sample through `f` first.
#[inline]
pub fn write_or_mix_with<S: Sample>(
    dst: &mut [S],
    src: &[S],
    accumulated: &mut bool,
    mut f: impl FnMut(S) -> S,
) {
    debug_assert_eq!(dst.len(), src.len());
    if *accumulated {
        for (d, s) in dst.iter_mut().zip(src) {
            *d += f(*s);
        }
    } else {
        for (d, s) in dst.iter_mut().zip(src) {
            *d = f(*s);
        }
        *accumulated = true;
    }
}

/// Like [`write_or_mix_with`] but `f` also receives the sample index.
#[inline]
pub fn write_or_mix_indexed<S: Sample>(
    dst: &mut [S],
    src: &[S],
    accumulated: &mut bool,
    mut f: impl FnMut(S, usize) -> S,
) {
    debug_assert_eq!(dst.len(), src.len());
    if *accumulated {
        for (n, (d, s)) in dst.iter_mut().zip(src).enumerate() {
            *d += f(*s, n);
        }
    } else {
        for (n, (d, s)) in dst.iter_mut().zip(src).enumerate() {
            *d = f(*s, n);
        }
        *accumulated = true;
    }
}
