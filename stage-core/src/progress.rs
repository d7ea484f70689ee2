//! Simulated download progress.
//!
//! Pure value generator; the timer that paces it lives in the staging driver.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const COMPLETE: f32 = 100.0;

/// Smallest step that still moves an `f32` near [`COMPLETE`] reliably.
pub const MIN_STEP: f32 = 0.01;

pub struct ProgressGenerator {
    value: f32,
    min_increment: f32,
    max_increment: f32,
    rng: StdRng,
    done: bool,
}

impl ProgressGenerator {
    /// Increments are drawn uniformly from `[min_increment, max_increment]`.
    /// `min_increment` is raised to [`MIN_STEP`], which bounds the number of ticks.
    pub fn new(min_increment: f32, max_increment: f32) -> Self {
        Self::with_rng(min_increment, max_increment, StdRng::from_entropy())
    }

    pub fn seeded(min_increment: f32, max_increment: f32, seed: u64) -> Self {
        Self::with_rng(min_increment, max_increment, StdRng::seed_from_u64(seed))
    }

    fn with_rng(min_increment: f32, max_increment: f32, rng: StdRng) -> Self {
        let min_increment = min_increment.max(MIN_STEP);
        Self {
            value: 0.0,
            min_increment,
            max_increment: max_increment.max(min_increment),
            rng,
            done: false,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn is_complete(&self) -> bool {
        self.done
    }

    /// Worst-case number of ticks to reach [`COMPLETE`].
    pub fn max_ticks(&self) -> usize {
        (COMPLETE / self.min_increment).ceil() as usize
    }
}

impl Iterator for ProgressGenerator {
    type Item = f32;

    /// Next value; the last one yielded is exactly [`COMPLETE`].
    fn next(&mut self) -> Option<f32> {
        if self.done {
            return None;
        }
        let step = self.rng.gen_range(self.min_increment..=self.max_increment);
        self.value += step;
        if self.value >= COMPLETE {
            self.value = COMPLETE;
            self.done = true;
        }
        Some(self.value)
    }
}
