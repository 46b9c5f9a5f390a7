//! Core traits for the conveyor system.
//!
//! Two seams: the storage a conveyor keeps its bricks in, and the sink a
//! truck delivers its loads to.

use crate::brick::Brick;
use crate::core::error::Result;
use async_trait::async_trait;

/// FIFO storage behind a conveyor.
///
/// The conveyor calls these methods while holding its state lock and only
/// updates its counters after a call succeeds, so a failing backend never
/// leaves the counters out of step with what is actually stored.
///
/// # Examples
///
/// ```rust
/// use std::collections::VecDeque;
/// use brickyard::brick::Brick;
/// use brickyard::core::{BeltStorage, Result};
///
/// struct TapeBelt {
///     slots: VecDeque<Brick>,
/// }
///
/// impl BeltStorage for TapeBelt {
///     fn push(&mut self, brick: Brick) -> Result<()> {
///         self.slots.push_back(brick);
///         Ok(())
///     }
///
///     fn pop(&mut self) -> Result<Option<Brick>> {
///         Ok(self.slots.pop_front())
///     }
///
///     fn len(&self) -> usize {
///         self.slots.len()
///     }
/// }
/// ```
pub trait BeltStorage: Send {
    /// Append a brick at the back of the belt.
    fn push(&mut self, brick: Brick) -> Result<()>;

    /// Take the brick at the front of the belt, or None if the belt is empty.
    fn pop(&mut self) -> Result<Option<Brick>>;

    /// Number of bricks currently stored.
    fn len(&self) -> usize;

    /// Whether the belt holds no bricks.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A sink receives items from upstream with batch-first design.
///
/// Trucks write one batch per delivery; the sink never feeds back into the
/// conveyor.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use brickyard::core::{Result, Sink};
///
/// struct LogSink;
///
/// #[async_trait]
/// impl Sink for LogSink {
///     type Item = String;
///
///     async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()> {
///         for item in items {
///             println!("Logged: {}", item);
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Sink {
    /// The type of items this sink accepts
    type Item: Send + 'static;

    /// Write a batch of items (primary method).
    async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()>;

    /// Write a single item (convenience method).
    async fn write(&mut self, item: Self::Item) -> Result<()> {
        self.write_batch(vec![item]).await
    }

    /// Called when the upstream is exhausted.
    ///
    /// This allows sinks to perform cleanup or flush any buffered state.
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
