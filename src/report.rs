//! End-of-run report.

use std::fmt;

use crate::conveyor::ConveyorSnapshot;
use crate::core::{Error, Result};
use crate::truck::TruckReport;
use crate::worker::WorkerReport;

/// Everything the workers and trucks did, plus the conveyor's final state.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub workers: Vec<WorkerReport>,
    pub trucks: Vec<TruckReport>,
    pub conveyor: ConveyorSnapshot,
    /// Errors of units that terminated abnormally
    pub failures: Vec<Error>,
}

impl SimulationReport {
    /// Total mass put on the conveyor
    pub fn produced_mass(&self) -> u64 {
        self.workers.iter().map(|w| w.mass).sum()
    }

    /// Total mass carried away by trucks
    pub fn delivered_mass(&self) -> u64 {
        self.trucks.iter().map(|t| t.mass).sum()
    }

    pub fn produced_bricks(&self) -> usize {
        self.workers.iter().map(|w| w.bricks).sum()
    }

    pub fn delivered_bricks(&self) -> usize {
        self.trucks.iter().map(|t| t.bricks).sum()
    }

    /// Every produced brick is either delivered or still on the conveyor
    pub fn is_balanced(&self) -> bool {
        self.produced_mass() == self.delivered_mass() + self.conveyor.mass
            && self.produced_bricks() == self.delivered_bricks() + self.conveyor.count
    }

    /// True when no unit failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn recorded failures into an error, keeping the report otherwise
    pub fn into_result(mut self) -> Result<Self> {
        Error::collect(std::mem::take(&mut self.failures))?;
        Ok(self)
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for w in &self.workers {
            writeln!(
                f,
                "Worker {} (weight {}) put {} bricks on the conveyor, total mass {}",
                w.id, w.weight, w.bricks, w.mass
            )?;
        }
        for t in &self.trucks {
            writeln!(
                f,
                "Truck {} made {} deliveries, {} bricks, total mass {}",
                t.id, t.loads, t.bricks, t.mass
            )?;
        }
        writeln!(
            f,
            "Left on conveyor: {} bricks, mass {}",
            self.conveyor.count, self.conveyor.mass
        )?;
        for e in &self.failures {
            writeln!(f, "Failure: {}", e)?;
        }
        write!(
            f,
            "{}",
            if self.is_balanced() {
                "SUM OF MASS IS CORRECT"
            } else {
                "MASS MISMATCH"
            }
        )
    }
}
