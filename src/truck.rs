//! Trucks: the consumers that drain the conveyor in bulk.
//!
//! A truck cycles through
//!
//! ```text
//! Idle -> Reserving -> Draining -> Delivering -> Idle
//!              \           \
//!               `-----------`--> Stopped
//! ```
//!
//! While draining it holds the loading dock, so no other truck can take
//! bricks until it leaves, even if it has to wait for new bricks to arrive.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::brick::{Brick, TruckId};
use crate::conveyor::{Conveyor, Removal};
use crate::core::{Error, Result, Sink};

/// Bricks a truck carried away in one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Load {
    pub truck: TruckId,
    pub bricks: Vec<Brick>,
}

impl Load {
    pub fn new(truck: TruckId, bricks: Vec<Brick>) -> Self {
        Self { truck, bricks }
    }

    /// Total weight of the load
    pub fn mass(&self) -> u64 {
        self.bricks.iter().map(|b| u64::from(b.weight())).sum()
    }

    pub fn len(&self) -> usize {
        self.bricks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bricks.is_empty()
    }
}

impl fmt::Display for Load {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} delivered {} bricks of total mass {}",
            self.truck,
            self.len(),
            self.mass()
        )
    }
}

/// Where a truck is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruckState {
    Idle,
    Reserving,
    Draining,
    Delivering,
    Stopped,
}

/// Operator request for a truck to leave with what it has.
///
/// Observed between two removals, never during one, and cleared once observed.
#[derive(Debug, Clone, Default)]
pub struct LeaveEarly(Arc<AtomicBool>);

impl LeaveEarly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the truck to leave at its next check
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// What a truck carried before it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TruckReport {
    pub id: TruckId,
    pub loads: usize,
    pub bricks: usize,
    pub mass: u64,
}

/// How a drain session ended
enum Departure {
    /// Left with a load (possibly empty) and will come back
    Leave(Vec<Brick>),
    /// Conveyor is drained and production is over
    Stop(Vec<Brick>),
}

/// A consumer with a fixed mass capacity that delivers loads to a sink.
pub struct Truck<S> {
    id: TruckId,
    capacity: u64,
    delivery_interval: Duration,
    retry_backoff: Duration,
    conveyor: Arc<Conveyor>,
    sink: S,
    leave_early: LeaveEarly,
    state: TruckState,
    report: TruckReport,
}

impl<S> Truck<S>
where
    S: Sink<Item = Load> + Send,
{
    /// Create a truck; `capacity` must be non-zero
    pub fn new(id: TruckId, capacity: u64, conveyor: Arc<Conveyor>, sink: S) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config("truck_capacity", "must be at least 1"));
        }
        Ok(Self {
            id,
            capacity,
            delivery_interval: Duration::from_secs(1),
            retry_backoff: Duration::from_millis(10),
            conveyor,
            sink,
            leave_early: LeaveEarly::new(),
            state: TruckState::Idle,
            report: TruckReport {
                id,
                loads: 0,
                bricks: 0,
                mass: 0,
            },
        })
    }

    /// Time spent off-line delivering a non-empty load
    pub fn delivery_interval(mut self, interval: Duration) -> Self {
        self.delivery_interval = interval;
        self
    }

    /// Pause before reserving again after leaving empty
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Use an externally held early-leave flag
    pub fn leave_early(mut self, signal: LeaveEarly) -> Self {
        self.leave_early = signal;
        self
    }

    pub fn id(&self) -> TruckId {
        self.id
    }

    pub fn state(&self) -> TruckState {
        self.state
    }

    /// A handle to this truck's early-leave flag
    pub fn leave_early_handle(&self) -> LeaveEarly {
        self.leave_early.clone()
    }

    /// Run reserve/drain/deliver cycles until the conveyor reports end-of-stream.
    pub async fn run(mut self) -> Result<TruckReport> {
        info!(
            truck = %self.id,
            capacity = self.capacity,
            delivery_interval_ms = self.delivery_interval.as_millis() as u64,
            "truck started"
        );

        loop {
            self.transition(TruckState::Reserving);
            self.conveyor.reserve(self.id).await?;
            debug!(truck = %self.id, "truck reserved the conveyor, loading");

            self.transition(TruckState::Draining);
            let departure = self.drain().await;
            // The dock is given back even if draining failed
            let released = self.conveyor.release(self.id);
            let departure = match departure {
                Ok(departure) => departure,
                Err(e) => {
                    error!(truck = %self.id, error = %e, "truck failed while loading");
                    return Err(e);
                }
            };
            released?;

            match departure {
                Departure::Leave(bricks) => {
                    self.transition(TruckState::Delivering);
                    self.deliver(bricks).await?;
                    self.transition(TruckState::Idle);
                }
                Departure::Stop(bricks) => {
                    if !bricks.is_empty() {
                        self.transition(TruckState::Delivering);
                        self.deliver(bricks).await?;
                    }
                    self.transition(TruckState::Stopped);
                    self.sink.finish().await?;
                    info!(
                        truck = %self.id,
                        loads = self.report.loads,
                        bricks = self.report.bricks,
                        mass = self.report.mass,
                        "truck finishing work, no more bricks"
                    );
                    return Ok(self.report);
                }
            }
        }
    }

    async fn drain(&mut self) -> Result<Departure> {
        let mut remaining = self.capacity;
        let mut bricks = Vec::new();

        loop {
            if self.leave_early.take() {
                info!(truck = %self.id, loaded = bricks.len(), "truck leaving early");
                return Ok(Departure::Leave(bricks));
            }
            if remaining == 0 {
                debug!(truck = %self.id, "truck full, leaving");
                return Ok(Departure::Leave(bricks));
            }

            trace!(
                truck = %self.id,
                remaining,
                capacity = self.capacity,
                "truck attempting to remove next brick"
            );

            match self.conveyor.remove_reserved(self.id, remaining).await? {
                Removal::Brick(brick) => {
                    let weight = u64::from(brick.weight());
                    if weight > remaining {
                        return Err(Error::protocol(format!(
                            "truck {} received a brick of mass {} exceeding its remaining capacity {}",
                            self.id, weight, remaining
                        )));
                    }
                    remaining -= weight;
                    bricks.push(brick);
                    debug!(
                        truck = %self.id,
                        weight,
                        remaining,
                        "truck removal"
                    );
                }
                Removal::TooHeavy { weight } => {
                    debug!(truck = %self.id, weight, remaining, "next brick too heavy, leaving");
                    return Ok(Departure::Leave(bricks));
                }
                Removal::EndOfStream => return Ok(Departure::Stop(bricks)),
            }
        }
    }

    async fn deliver(&mut self, bricks: Vec<Brick>) -> Result<()> {
        if bricks.is_empty() {
            trace!(truck = %self.id, "left empty, retrying after backoff");
            tokio::time::sleep(self.retry_backoff).await;
            return Ok(());
        }

        let load = Load::new(self.id, bricks);
        self.report.loads += 1;
        self.report.bricks += load.len();
        self.report.mass += load.mass();
        info!(truck = %self.id, bricks = load.len(), mass = load.mass(), "truck delivering");

        tokio::time::sleep(self.delivery_interval).await;
        if let Err(e) = self.sink.write(load).await {
            warn!(truck = %self.id, error = %e, "delivery sink rejected load");
            return Err(e);
        }
        Ok(())
    }

    fn transition(&mut self, next: TruckState) {
        trace!(truck = %self.id, from = ?self.state, to = ?next, "truck state");
        self.state = next;
    }
}
