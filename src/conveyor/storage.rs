//! In-memory belt storage.

use std::collections::VecDeque;

use crate::brick::Brick;
use crate::core::{BeltStorage, Result};

/// A belt backed by a `VecDeque`; never fails.
#[derive(Debug, Default)]
pub struct MemoryBelt {
    slots: VecDeque<Brick>,
}

impl MemoryBelt {
    /// Create an empty belt
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty belt with room for `capacity` bricks
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: VecDeque::with_capacity(capacity),
        }
    }
}

impl BeltStorage for MemoryBelt {
    fn push(&mut self, brick: Brick) -> Result<()> {
        self.slots.push_back(brick);
        Ok(())
    }

    fn pop(&mut self) -> Result<Option<Brick>> {
        Ok(self.slots.pop_front())
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_belt_is_fifo() {
        let mut belt = MemoryBelt::with_capacity(4);
        for weight in [3, 1, 2] {
            belt.push(Brick::new(weight).unwrap()).unwrap();
        }
        assert_eq!(belt.len(), 3);

        let mut weights = Vec::new();
        while let Some(brick) = belt.pop().unwrap() {
            weights.push(brick.weight());
        }
        assert_eq!(weights, vec![3, 1, 2]);
        assert!(belt.is_empty());
    }
}
