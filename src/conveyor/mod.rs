//! The conveyor: a bounded exchange limited by brick count and total mass.
//!
//! Workers [`offer`](Conveyor::offer) bricks and wait while the conveyor is
//! full. Trucks reserve the [`LoadingDock`], then [`remove`](Conveyor::remove)
//! bricks one at a time against their remaining capacity. The next brick to
//! hand out sits in a single hand-off slot: a brick that does not fit the
//! asking truck stays there for the next request, so no brick is skipped or
//! reordered.
//!
//! Lock order: the state lock may take the coordinator lock (inside
//! `remove`), never the reverse. The dock lock is never held together with
//! the state lock.

pub mod dock;
pub mod storage;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::brick::{Brick, TruckId};
use crate::core::{BeltStorage, Error, Result};
use crate::shutdown::ShutdownCoordinator;
use crate::telemetry;

pub use dock::LoadingDock;
pub use storage::MemoryBelt;

/// Outcome of a single [`Conveyor::remove`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The next brick fit and was taken off the conveyor
    Brick(Brick),
    /// The next brick is heavier than the requested capacity; it stays in place
    TooHeavy { weight: u32 },
    /// The conveyor is empty and every worker has finished
    EndOfStream,
}

/// Fixed limits of a conveyor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConveyorLimits {
    pub max_count: usize,
    pub max_mass: u64,
}

/// Point-in-time view of the conveyor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConveyorSnapshot {
    pub count: usize,
    pub mass: u64,
    pub max_count: usize,
    pub max_mass: u64,
    /// Weight of the brick in the hand-off slot, if one was already read
    pub pending: Option<u32>,
    /// Bricks still in storage (excludes the hand-off slot)
    pub stored: usize,
    pub holder: Option<TruckId>,
}

struct BeltState {
    count: usize,
    mass: u64,
    pending: Option<Brick>,
    storage: Box<dyn BeltStorage>,
}

/// The shared bounded exchange between workers and trucks.
pub struct Conveyor {
    limits: ConveyorLimits,
    state: Mutex<BeltState>,
    space_freed: Notify,
    brick_arrived: Notify,
    dock: LoadingDock,
    coordinator: Arc<ShutdownCoordinator>,
}

impl Conveyor {
    /// Create a conveyor backed by an in-memory belt
    pub fn new(
        max_count: usize,
        max_mass: u64,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> Result<Self> {
        Self::with_storage(
            max_count,
            max_mass,
            coordinator,
            MemoryBelt::with_capacity(max_count),
        )
    }

    /// Create a conveyor over a custom storage backend, which must start empty
    pub fn with_storage<S>(
        max_count: usize,
        max_mass: u64,
        coordinator: Arc<ShutdownCoordinator>,
        storage: S,
    ) -> Result<Self>
    where
        S: BeltStorage + 'static,
    {
        if max_count == 0 {
            return Err(Error::config("max_count", "must be at least 1"));
        }
        if max_mass == 0 {
            return Err(Error::config("max_mass", "must be at least 1"));
        }
        if !storage.is_empty() {
            return Err(Error::config("storage", "must start empty"));
        }

        debug!(max_count, max_mass, "conveyor created");

        Ok(Self {
            limits: ConveyorLimits {
                max_count,
                max_mass,
            },
            state: Mutex::new(BeltState {
                count: 0,
                mass: 0,
                pending: None,
                storage: Box::new(storage),
            }),
            space_freed: Notify::new(),
            brick_arrived: Notify::new(),
            dock: LoadingDock::new(),
            coordinator,
        })
    }

    /// Place a brick on the conveyor, waiting while there is no room for it.
    ///
    /// Fails only if the storage write fails, in which case the counters are
    /// left unchanged.
    pub async fn offer(&self, brick: Brick) -> Result<()> {
        loop {
            let space_freed = self.space_freed.notified();
            if self.try_offer(brick)? {
                return Ok(());
            }
            trace!(weight = brick.weight(), "conveyor full, waiting for space");
            space_freed.await;
        }
    }

    /// Place a brick on the conveyor if it fits right now.
    pub fn try_offer(&self, brick: Brick) -> Result<bool> {
        let (count, mass) = {
            let mut state = self.lock();
            if !self.has_space(&state, brick) {
                return Ok(false);
            }
            state.storage.push(brick)?;
            state.count += 1;
            state.mass += u64::from(brick.weight());
            (state.count, state.mass)
        };

        debug!(weight = brick.weight(), count, mass, "brick inserted");
        telemetry::record_offered(count, mass);
        self.brick_arrived.notify_waiters();
        Ok(true)
    }

    /// Take the next brick if it weighs at most `capacity`.
    ///
    /// Waits while the conveyor is empty and production has not finished.
    pub async fn remove(&self, capacity: u64) -> Result<Removal> {
        loop {
            let brick_arrived = self.brick_arrived.notified();
            let finished = self.coordinator.finished_notified();
            if let Some(removal) = self.try_remove(capacity)? {
                return Ok(removal);
            }
            trace!(capacity, "conveyor empty, waiting for bricks");
            tokio::select! {
                _ = brick_arrived => {}
                _ = finished => {}
            }
        }
    }

    /// Like [`remove`](Self::remove) but returns `None` instead of waiting
    /// when the conveyor is empty and production is still running.
    pub fn try_remove(&self, capacity: u64) -> Result<Option<Removal>> {
        let (brick, count, mass) = {
            let mut state = self.lock();
            if Self::is_empty(&state) {
                if self.coordinator.all_finished() {
                    return Ok(Some(Removal::EndOfStream));
                }
                return Ok(None);
            }

            let brick = match state.pending {
                Some(brick) => brick,
                None => {
                    let brick = state.storage.pop()?.ok_or_else(|| {
                        Error::protocol("conveyor counted bricks but storage is empty")
                    })?;
                    state.pending = Some(brick);
                    brick
                }
            };

            if u64::from(brick.weight()) > capacity {
                return Ok(Some(Removal::TooHeavy {
                    weight: brick.weight(),
                }));
            }

            state.pending = None;
            state.count -= 1;
            state.mass -= u64::from(brick.weight());
            (brick, state.count, state.mass)
        };

        debug!(weight = brick.weight(), count, mass, "brick removed");
        telemetry::record_removed(count, mass);
        self.space_freed.notify_waiters();
        Ok(Some(Removal::Brick(brick)))
    }

    /// Remove on behalf of `truck`, which must hold the loading dock.
    pub async fn remove_reserved(&self, truck: TruckId, capacity: u64) -> Result<Removal> {
        self.dock.ensure_held_by(truck)?;
        self.remove(capacity).await
    }

    /// Wait for exclusive drain rights.
    pub async fn reserve(&self, truck: TruckId) -> Result<()> {
        self.dock.reserve(truck).await
    }

    /// Give up drain rights held by `truck`.
    pub fn release(&self, truck: TruckId) -> Result<()> {
        self.dock.release(truck)
    }

    pub fn dock(&self) -> &LoadingDock {
        &self.dock
    }

    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.coordinator
    }

    pub fn limits(&self) -> ConveyorLimits {
        self.limits
    }

    /// True when no brick is on the conveyor (the hand-off slot included)
    pub fn empty(&self) -> bool {
        Self::is_empty(&self.lock())
    }

    /// Whether a brick would be accepted right now
    pub fn fits(&self, brick: Brick) -> bool {
        self.has_space(&self.lock(), brick)
    }

    pub fn snapshot(&self) -> ConveyorSnapshot {
        let (count, mass, pending, stored) = {
            let state = self.lock();
            (
                state.count,
                state.mass,
                state.pending.map(|b| b.weight()),
                state.storage.len(),
            )
        };
        ConveyorSnapshot {
            count,
            mass,
            max_count: self.limits.max_count,
            max_mass: self.limits.max_mass,
            pending,
            stored,
            holder: self.dock.holder(),
        }
    }

    fn has_space(&self, state: &BeltState, brick: Brick) -> bool {
        state.count < self.limits.max_count
            && state.mass + u64::from(brick.weight()) <= self.limits.max_mass
    }

    fn is_empty(state: &BeltState) -> bool {
        state.count == 0
    }

    fn lock(&self) -> MutexGuard<'_, BeltState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Conveyor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("Conveyor")
            .field("count", &snapshot.count)
            .field("mass", &snapshot.mass)
            .field("max_count", &snapshot.max_count)
            .field("max_mass", &snapshot.max_mass)
            .field("pending", &snapshot.pending)
            .field("holder", &snapshot.holder)
            .finish()
    }
}
