//! Random number generator abstraction for determinism.
//!
//! In production, this wraps a real RNG. In tests, a seeded or scripted
//! implementation is injected.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Abstraction over random number generation.
pub trait DeterministicRng: Send + Sync {
    /// Generate a random `u32` in the range `[min, max]` inclusive.
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32;

    /// Generate a random `f64` in `[0.0, 1.0)`.
    fn next_f64(&mut self) -> f64;
}

/// Picks `count` distinct indices out of `0..len` (partial Fisher-Yates).
///
/// Returns every index when `count >= len`.
pub fn sample_indices(rng: &mut dyn DeterministicRng, len: usize, count: usize) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..len).collect();
    let take = count.min(len);
    for i in 0..take {
        let last = u32::try_from(len - 1).unwrap_or(u32::MAX);
        let lo = u32::try_from(i).unwrap_or(u32::MAX);
        let j = rng.next_u32_range(lo, last) as usize;
        pool.swap(i, j.clamp(i, len - 1));
    }
    pool.truncate(take);
    pool
}

/// Production RNG seeded from the operating system.
#[derive(Debug)]
pub struct OsSeededRng(StdRng);

impl OsSeededRng {
    /// Creates a new RNG seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self(StdRng::from_os_rng())
    }
}

impl Default for OsSeededRng {
    fn default() -> Self {
        Self::new()
    }
}

impl DeterministicRng for OsSeededRng {
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        self.0.random_range(min..=max)
    }

    fn next_f64(&mut self) -> f64 {
        self.0.random::<f64>()
    }
}
