//! Delivery sinks.
//!
//! A truck hands every completed load to a sink. Sinks that are shared
//! between trucks are cheap `Clone` handles over the same state.

use async_trait::async_trait;
use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::info;

use crate::core::{Result, Sink};
use crate::telemetry;
use crate::truck::Load;

/// A sink that logs every item through `tracing`.
pub struct LogSink<T> {
    /// The prefix to log before each item
    prefix: Option<String>,
    _phantom: PhantomData<T>,
}

impl<T> LogSink<T> {
    /// Create a new log sink
    pub fn new() -> Self {
        Self {
            prefix: None,
            _phantom: PhantomData,
        }
    }

    /// Create a new log sink with a prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Send + 'static + Display> Sink for LogSink<T> {
    type Item = T;

    async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()> {
        for item in items {
            match &self.prefix {
                Some(prefix) => info!("{}: {}", prefix, item),
                None => info!("{}", item),
            }
        }
        Ok(())
    }
}

impl<T> Default for LogSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for LogSink<T> {
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            _phantom: PhantomData,
        }
    }
}

/// A sink that collects items into a vector.
pub struct CollectSink<T> {
    /// The vector to collect items into
    items: Arc<TokioMutex<Vec<T>>>,
}

impl<T: Send + 'static + Clone> CollectSink<T> {
    /// Create a new collect sink
    pub fn new() -> Self {
        Self {
            items: Arc::new(TokioMutex::new(Vec::new())),
        }
    }

    /// Get the collected items
    pub async fn into_items(self) -> Vec<T> {
        self.items.lock().await.clone()
    }

    /// Get a clone of the items Arc for external access
    pub fn items(&self) -> Arc<TokioMutex<Vec<T>>> {
        self.items.clone()
    }
}

#[async_trait]
impl<T: Send + 'static + Clone> Sink for CollectSink<T> {
    type Item = T;

    async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()> {
        let mut collected = self.items.lock().await;
        collected.extend(items);
        Ok(())
    }
}

impl<T: Send + 'static + Clone> Default for CollectSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CollectSink<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

/// Running totals kept by a [`TallySink`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tally {
    pub loads: usize,
    pub bricks: usize,
    pub mass: u64,
}

/// A sink that only keeps load, brick and mass totals
#[derive(Clone, Default)]
pub struct TallySink {
    tally: Arc<TokioMutex<Tally>>,
}

impl TallySink {
    /// Create a new tally sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current totals
    pub async fn tally(&self) -> Tally {
        *self.tally.lock().await
    }
}

#[async_trait]
impl Sink for TallySink {
    type Item = Load;

    async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()> {
        let mut tally = self.tally.lock().await;
        for load in items {
            tally.loads += 1;
            tally.bricks += load.len();
            tally.mass += load.mass();
            telemetry::record_delivery(load.len(), load.mass());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brick::{Brick, TruckId};

    fn load(truck: u32, weights: &[u32]) -> Load {
        Load::new(
            TruckId(truck),
            weights.iter().map(|&w| Brick::new(w).unwrap()).collect(),
        )
    }

    #[tokio::test]
    async fn test_collect_sink_shares_state_between_clones() {
        let sink = CollectSink::new();
        let mut first = sink.clone();
        let mut second = sink.clone();

        first.write(load(1, &[1, 2])).await.unwrap();
        second.write(load(2, &[3])).await.unwrap();

        let items = sink.into_items().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].truck, TruckId(1));
        assert_eq!(items[1].mass(), 3);
    }

    #[tokio::test]
    async fn test_tally_sink() {
        let mut sink = TallySink::new();
        sink.write_batch(vec![load(1, &[1, 2, 3]), load(2, &[2, 2])])
            .await
            .unwrap();

        assert_eq!(
            sink.tally().await,
            Tally {
                loads: 2,
                bricks: 5,
                mass: 10
            }
        );
    }

    #[tokio::test]
    async fn test_log_sink_accepts_loads() {
        let mut sink = LogSink::with_prefix("depot");
        sink.write(load(1, &[1])).await.unwrap();
        sink.finish().await.unwrap();
    }
}
