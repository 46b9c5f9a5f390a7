//! Core traits and types for the brickyard library.
//!
//! This module contains the error type and the two traits the rest of the
//! crate is built around: conveyor storage and delivery sinks.

pub mod error;
pub mod traits;

// Re-export core items
pub use error::{Error, IntoStorageError, Result};
pub use traits::{BeltStorage, Sink};
