//! Error types for the conveyor system.

use std::sync::Arc;

use crate::brick::{TruckId, WorkerId};

/// The main error type for the conveyor system.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A configuration parameter is outside its accepted range
    #[error("Invalid configuration for `{field}`: {reason}")]
    Config { field: &'static str, reason: String },

    /// A brick was built with the reserved zero weight
    #[error("Brick weight must be at least 1")]
    InvalidBrick,

    /// The storage behind the conveyor failed to write or read a brick
    #[error("Storage error: {0}")]
    Storage(Arc<dyn std::error::Error + Send + Sync>),

    /// A truck acted on the loading dock without holding the reservation
    #[error("Truck {truck} does not hold the reservation (holder: {})", holder_display(.holder))]
    NotReserved {
        truck: TruckId,
        holder: Option<TruckId>,
    },

    /// A worker id was never registered with the shutdown coordinator
    #[error("Worker {0} is not registered")]
    UnknownWorker(WorkerId),

    /// The exchange protocol was violated by a caller
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// A worker or truck task could not be started
    #[error("Failed to spawn {unit}: {reason}")]
    Spawn { unit: String, reason: String },

    /// A task was shut down before it could finish (panic or abort)
    #[error("Task was shut down: {0}")]
    Shutdown(String),

    /// Multiple errors occurred (e.g., several units failed)
    #[error("Multiple errors occurred: {}", join_errors(.0))]
    Multiple(Vec<Error>),
}

fn holder_display(holder: &Option<TruckId>) -> String {
    match holder {
        Some(id) => id.to_string(),
        None => "none".to_string(),
    }
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| format!("[{}]", e))
        .collect::<Vec<_>>()
        .join(", ")
}

// Convenience constructors
impl Error {
    /// Create a storage error from any error type
    pub fn storage<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Storage(Arc::new(error))
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(field: &'static str, reason: S) -> Self {
        Error::Config {
            field,
            reason: reason.into(),
        }
    }

    /// Create a protocol violation with a message
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Error::Protocol(message.into())
    }

    /// Collapse a list of errors: none is `Ok`, one is itself, more is `Multiple`
    pub fn collect(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple(errors)),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::storage(e)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Shutdown(e.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Helper trait for converting foreign errors into storage errors
pub trait IntoStorageError<T> {
    fn into_storage_error(self) -> Result<T>;
}

impl<T, E> IntoStorageError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_storage_error(self) -> Result<T> {
        self.map_err(Error::storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_errors() {
        assert!(Error::collect(vec![]).is_ok());

        let single = Error::collect(vec![Error::InvalidBrick]).unwrap_err();
        assert!(matches!(single, Error::InvalidBrick));

        let many = Error::collect(vec![Error::InvalidBrick, Error::protocol("x")]).unwrap_err();
        match many {
            Error::Multiple(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected Multiple, got {other:?}"),
        }
    }

    #[test]
    fn test_into_storage_error() {
        let failed: std::result::Result<(), std::fmt::Error> = Err(std::fmt::Error);
        assert!(matches!(failed.into_storage_error(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_not_reserved_display() {
        let err = Error::NotReserved {
            truck: TruckId(2),
            holder: Some(TruckId(1)),
        };
        assert_eq!(
            err.to_string(),
            "Truck C2 does not hold the reservation (holder: C1)"
        );

        let err = Error::NotReserved {
            truck: TruckId(2),
            holder: None,
        };
        assert!(err.to_string().ends_with("(holder: none)"));
    }
}
