//! Test RNG — deterministic `DeterministicRng` implementations for tests.

use rally_core::rng::DeterministicRng;

/// A no-op RNG that always returns `min` for `next_u32_range` and `0.0` for
/// `next_f64`. Every positive probability roll succeeds.
#[derive(Debug)]
pub struct MockRng;

impl DeterministicRng for MockRng {
    fn next_u32_range(&mut self, min: u32, _max: u32) -> u32 {
        min
    }

    fn next_f64(&mut self) -> f64 {
        0.0
    }
}

/// An RNG that returns values from predetermined sequences. Panics if a
/// scripted sequence is exhausted. When no floats are scripted,
/// `next_f64` returns `0.0`.
#[derive(Debug)]
pub struct SequenceRng {
    values: Vec<u32>,
    index: usize,
    floats: Vec<f64>,
    float_index: usize,
}

impl SequenceRng {
    /// Create a new `SequenceRng` with the given integer values.
    #[must_use]
    pub fn new(values: Vec<u32>) -> Self {
        Self {
            values,
            index: 0,
            floats: Vec::new(),
            float_index: 0,
        }
    }

    /// Script the values returned by `next_f64`, in order.
    #[must_use]
    pub fn with_floats(mut self, floats: Vec<f64>) -> Self {
        self.floats = floats;
        self
    }
}

impl DeterministicRng for SequenceRng {
    fn next_u32_range(&mut self, _min: u32, _max: u32) -> u32 {
        let val = self.values[self.index];
        self.index += 1;
        val
    }

    fn next_f64(&mut self) -> f64 {
        if self.floats.is_empty() {
            return 0.0;
        }
        let val = self.floats[self.float_index];
        self.float_index += 1;
        val
    }
}
