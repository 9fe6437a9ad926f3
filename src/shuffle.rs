use rand::{Rng, RngCore};

/// Draws indices in `0..len` without replacement, uniformly among the ones
/// still left. Once every index has been drawn the bag is spent and the next
/// pass needs a fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleBag {
    remaining: Vec<usize>,
}

impl ShuffleBag {
    pub fn new(len: usize) -> Self {
        Self {
            remaining: (0..len).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn draw(&mut self, rng: &mut dyn RngCore) -> Option<usize> {
        if self.remaining.is_empty() {
            return None;
        }
        let slot = rng.random_range(0..self.remaining.len());
        Some(self.remaining.swap_remove(slot))
    }
}
