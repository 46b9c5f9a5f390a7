//! Workers: the producers that put bricks on the conveyor.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::brick::{Brick, WorkerId};
use crate::conveyor::Conveyor;
use crate::core::Result;

/// What a worker did before it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkerReport {
    pub id: WorkerId,
    pub weight: u32,
    pub bricks: usize,
    pub mass: u64,
}

/// A producer of bricks of one fixed weight.
///
/// The stop token is checked once per brick, never while an offer is
/// waiting for space, so stopping is not immediate.
pub struct Worker {
    id: WorkerId,
    brick: Brick,
    conveyor: Arc<Conveyor>,
    interval: Duration,
}

impl Worker {
    /// Create a worker producing bricks of `weight`
    pub fn new(id: WorkerId, weight: u32, conveyor: Arc<Conveyor>) -> Result<Self> {
        Ok(Self {
            id,
            brick: Brick::new(weight)?,
            conveyor,
            interval: Duration::ZERO,
        })
    }

    /// Pause between two bricks
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Produce until `stop` is cancelled, then report completion exactly once.
    ///
    /// Completion is also reported when an offer fails, so the rest of the
    /// yard can still wind down; the error is returned afterwards.
    pub async fn run(self, stop: CancellationToken) -> Result<WorkerReport> {
        info!(worker = %self.id, weight = self.brick.weight(), "worker started");

        let mut report = WorkerReport {
            id: self.id,
            weight: self.brick.weight(),
            bricks: 0,
            mass: 0,
        };

        let outcome = self.produce(&stop, &mut report).await;
        if let Err(e) = &outcome {
            error!(worker = %self.id, error = %e, "worker failed");
        }

        self.conveyor.coordinator().mark_finished(self.id)?;
        info!(
            worker = %self.id,
            bricks = report.bricks,
            mass = report.mass,
            "worker finished"
        );

        outcome.map(|()| report)
    }

    async fn produce(&self, stop: &CancellationToken, report: &mut WorkerReport) -> Result<()> {
        while !stop.is_cancelled() {
            self.conveyor.offer(self.brick).await?;
            report.bricks += 1;
            report.mass += u64::from(self.brick.weight());
            debug!(worker = %self.id, weight = self.brick.weight(), "worker insert");

            if !self.interval.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = stop.cancelled() => {}
                }
            }
        }
        Ok(())
    }
}
