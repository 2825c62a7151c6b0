//! Channel-combining kernels
//!
//! A combiner reduces many source blocks into one destination block. A
//! user rule classifies every source, every cycle:
//!
//! - [`Selection::Skip`]: contributes nothing this cycle
//! - [`Selection::Take`]: contributes its current block
//! - [`Selection::Blend`]: contributes through a transition
//!   (interpolation or one-block crossfade, depending on the kernel)
//!
//! The destination is never pre-zeroed: the first contributor overwrites,
//! later ones add, and only if nothing contributed at all is the
//! destination zero-filled in a single pass. Silent outputs cost one
//! zeroing pass; busy outputs cost none.
//!
//! All transforms are fused into the accumulation loops, so the inner
//! loop is one multiply-add per sample.

use std::sync::Arc;

use crate::block::{write_or_mix, write_or_mix_indexed, write_or_mix_with, SourceRef};
use crate::fade::CrossfadeWindow;
use crate::types::Sample;

/// Per-source, per-cycle classification returned by a combine rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Skip,
    Take,
    Blend,
}

/// Anything a combiner can read one block from.
pub trait CombineSource<S> {
    fn block(&self) -> &[S];
}

impl<S: Sample> CombineSource<S> for SourceRef<S> {
    fn block(&self) -> &[S] {
        self.read()
    }
}

/// A source whose state can jump between two blocks within one cycle.
///
/// The crossfade kernel captures the block *before* calling `update` for
/// the fade-out half and *after* for the fade-in half; that is the
/// mechanism realizing a one-block crossfade across a discontinuous
/// parameter change.
pub trait CrossfadeSource<S>: CombineSource<S> {
    fn update(&mut self);
}

/// User policy driving the transform kernels: classify each source and
/// map each contributed sample.
pub trait CombineRule<Src: ?Sized, S> {
    fn select(&mut self, src: &Src) -> Selection;

    /// Per-sample transform; identity by default.
    fn map(&mut self, x: S) -> S {
        x
    }

    /// Index-aware transform used by the interpolating kernel.
    fn map_indexed(&mut self, x: S, n: usize) -> S {
        let _ = n;
        self.map(x)
    }

    /// Transform applied while capturing the fading-out (pre-update)
    /// state of a crossfading source. Defaults to [`map`](Self::map).
    fn map_fading_out(&mut self, x: S) -> S {
        self.map(x)
    }
}

/// Plain accumulate: copy the first contributor, add the rest.
///
/// Panics if the rule returns [`Selection::Blend`]; this kernel has no
/// transition path.
pub fn combine_copy<'a, S, Src, I, F>(sources: I, out: &mut [S], mut select: F)
where
    S: Sample,
    Src: CombineSource<S> + ?Sized + 'a,
    I: IntoIterator<Item = &'a Src>,
    F: FnMut(&Src) -> Selection,
{
    let mut accumulated = false;
    for src in sources {
        match select(src) {
            Selection::Skip => {}
            Selection::Take => write_or_mix(out, src.block(), &mut accumulated),
            Selection::Blend => panic!("copy combiner has no blend path"),
        }
    }
    if !accumulated {
        out.fill(S::zero());
    }
}

/// Transform-and-accumulate: map every contributed sample through the
/// rule's transform.
///
/// Panics if the rule returns [`Selection::Blend`].
pub fn combine_transform<'a, S, Src, I, R>(sources: I, out: &mut [S], rule: &mut R)
where
    S: Sample,
    Src: CombineSource<S> + ?Sized + 'a,
    I: IntoIterator<Item = &'a Src>,
    R: CombineRule<Src, S>,
{
    let mut accumulated = false;
    for src in sources {
        match rule.select(src) {
            Selection::Skip => {}
            Selection::Take => {
                write_or_mix_with(out, src.block(), &mut accumulated, |x| rule.map(x))
            }
            Selection::Blend => panic!("transform combiner has no blend path"),
        }
    }
    if !accumulated {
        out.fill(S::zero());
    }
}

/// Interpolate-and-accumulate: the index-aware transform applies to both
/// `Take` and `Blend` sources (a `Blend` source typically interpolates
/// between states inside its transform).
pub fn combine_interpolate<'a, S, Src, I, R>(sources: I, out: &mut [S], rule: &mut R)
where
    S: Sample,
    Src: CombineSource<S> + ?Sized + 'a,
    I: IntoIterator<Item = &'a Src>,
    R: CombineRule<Src, S>,
{
    let mut accumulated = false;
    for src in sources {
        match rule.select(src) {
            Selection::Skip => {}
            Selection::Take | Selection::Blend => {
                write_or_mix_indexed(out, src.block(), &mut accumulated, |x, n| {
                    rule.map_indexed(x, n)
                })
            }
        }
    }
    if !accumulated {
        out.fill(S::zero());
    }
}

/// Crossfade-and-accumulate.
///
/// `Take` sources contribute their transformed block directly. For a
/// `Blend` source the kernel captures the transformed pre-update block
/// into a fade-out scratch buffer, calls [`CrossfadeSource::update`],
/// captures the post-update block into a fade-in buffer, and at the end
/// of the reduction multiplies both by the shared raised-cosine ramps and
/// accumulates them. Multiple `Blend` sources share the two scratch
/// buffers, so the ramp multiply happens once per cycle, not per source.
pub struct CombineCrossfade<S> {
    window: Arc<CrossfadeWindow<S>>,
    fade_out: Box<[S]>,
    fade_in: Box<[S]>,
}

impl<S: Sample> CombineCrossfade<S> {
    pub fn new(window: Arc<CrossfadeWindow<S>>) -> Self {
        let block_size = window.block_size();
        Self {
            window,
            fade_out: vec![S::zero(); block_size].into_boxed_slice(),
            fade_in: vec![S::zero(); block_size].into_boxed_slice(),
        }
    }

    pub fn process<'a, Src, I, R>(&mut self, sources: I, out: &mut [S], rule: &mut R)
    where
        Src: CrossfadeSource<S> + ?Sized + 'a,
        I: IntoIterator<Item = &'a mut Src>,
        R: CombineRule<Src, S>,
    {
        let mut accumulated = false;
        let mut fading = false;

        for src in sources {
            match rule.select(src) {
                Selection::Skip => {}
                Selection::Take => {
                    write_or_mix_with(out, src.block(), &mut accumulated, |x| rule.map(x))
                }
                Selection::Blend => {
                    // Old state into the fade-out buffer, then advance the
                    // source, then new state into the fade-in buffer. The
                    // scratch buffers overwrite on the first blending
                    // source and accumulate on later ones.
                    let mut flag = fading;
                    write_or_mix_with(&mut self.fade_out, src.block(), &mut flag, |x| {
                        rule.map_fading_out(x)
                    });
                    src.update();
                    let mut flag = fading;
                    write_or_mix_with(&mut self.fade_in, src.block(), &mut flag, |x| rule.map(x));
                    fading = true;
                }
            }
        }

        if fading {
            let ramp_out = self.window.fade_out();
            if accumulated {
                for ((d, s), w) in out.iter_mut().zip(self.fade_out.iter()).zip(ramp_out) {
                    *d += *s * *w;
                }
            } else {
                for ((d, s), w) in out.iter_mut().zip(self.fade_out.iter()).zip(ramp_out) {
                    *d = *s * *w;
                }
                accumulated = true;
            }
            // Fade-in is always accumulated
            for ((d, s), w) in out
                .iter_mut()
                .zip(self.fade_in.iter())
                .zip(self.window.fade_in())
            {
                *d += *s * w;
            }
        }

        if !accumulated {
            out.fill(S::zero());
        }
    }
}
