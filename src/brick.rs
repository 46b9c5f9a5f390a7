//! Bricks and the identities of the units that move them.

use std::fmt;

use crate::core::{Error, Result};

/// One unit of work: an immutable brick with a positive weight.
///
/// Weight zero is reserved to mean "no brick", so it can never be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Brick {
    weight: u32,
}

impl Brick {
    /// Create a brick of the given weight
    pub fn new(weight: u32) -> Result<Self> {
        if weight == 0 {
            return Err(Error::InvalidBrick);
        }
        Ok(Self { weight })
    }

    /// The brick's weight
    pub fn weight(&self) -> u32 {
        self.weight
    }
}

impl TryFrom<u32> for Brick {
    type Error = Error;

    fn try_from(weight: u32) -> Result<Self> {
        Brick::new(weight)
    }
}

impl fmt::Display for Brick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "brick({})", self.weight)
    }
}

/// Identity of a worker (producer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Identity of a truck (consumer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TruckId(pub u32);

impl fmt::Display for TruckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}
