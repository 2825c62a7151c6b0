//! Precomputed raised-cosine crossfade window
//!
//! One window is computed per engine and shared (read-only) by every
//! crossfade combiner. The curve holds `block_size + 1` points of
//! `0.5 · (1 + cos(π·n / block_size))`, descending from exactly 1 to
//! exactly 0. Traversed forward it is the fade-out ramp, traversed in
//! reverse the fade-in ramp; the two sum to 1 at every sample, giving a
//! constant-sum one-block crossfade.

use std::f64::consts::PI;

use crate::types::Sample;

/// Raised-cosine ramp pair for one-block crossfades
pub struct CrossfadeWindow<S> {
    curve: Box<[S]>,
}

impl<S: Sample> CrossfadeWindow<S> {
    /// Precompute the window for blocks of `block_size` samples.
    pub fn new(block_size: usize) -> Self {
        let denom = block_size.max(1) as f64;
        let curve = (0..=block_size)
            .map(|n| S::from_f64(0.5 * (1.0 + (PI * n as f64 / denom).cos())))
            .collect();
        Self { curve }
    }

    /// Block size this window was computed for.
    pub fn block_size(&self) -> usize {
        self.curve.len() - 1
    }

    /// Fade-out ramp: `block_size` samples descending from 1.
    pub fn fade_out(&self) -> &[S] {
        &self.curve[..self.curve.len() - 1]
    }

    /// Fade-in ramp: `block_size` samples ascending from 0.
    pub fn fade_in(&self) -> impl Iterator<Item = S> + '_ {
        self.curve[1..].iter().rev().copied()
    }

    /// Fade-out weight at `n`, for `n` in `0..=block_size`.
    pub fn fade_out_at(&self, n: usize) -> S {
        self.curve[n]
    }

    /// Fade-in weight at `n`, for `n` in `0..=block_size`.
    pub fn fade_in_at(&self, n: usize) -> S {
        self.curve[self.curve.len() - 1 - n]
    }
}
