//! # A bounded brick exchange between workers and trucks
//!
//! Workers put bricks of a fixed weight on a [`Conveyor`](conveyor::Conveyor)
//! limited by both brick count and total mass. Trucks take the conveyor one
//! at a time, load bricks in arrival order until their capacity is used up,
//! and drive off to deliver. Once every worker has stopped and the conveyor
//! is empty, trucks observe end-of-stream and stop as well.
//!
//! ## Core Concepts
//!
//! - **Conveyor**: bounded FIFO exchange with a single hand-off slot
//! - **LoadingDock**: FIFO exclusive reservation held by one truck at a time
//! - **ShutdownCoordinator**: tracks which workers have finished
//! - **Brickyard**: starts and supervises workers and trucks as tokio tasks
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use brickyard::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SimulationConfig::new()
//!         .max_bricks(10)
//!         .max_mass(20)
//!         .truck_capacity(8)
//!         .truck_count(3);
//!
//!     let report = Brickyard::new(config)?
//!         .run_for(Duration::from_secs(5))
//!         .await?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

pub mod brick;
pub mod config;
pub mod conveyor;
pub mod core;
pub mod report;
pub mod shutdown;
pub mod sinks;
pub mod supervisor;
pub mod truck;
pub mod worker;

mod telemetry;

// Re-export commonly used items
pub mod prelude {
    pub use crate::brick::{Brick, TruckId, WorkerId};
    pub use crate::config::SimulationConfig;
    pub use crate::conveyor::{Conveyor, ConveyorSnapshot, LoadingDock, MemoryBelt, Removal};
    pub use crate::core::{BeltStorage, Error, Result, Sink};
    pub use crate::report::SimulationReport;
    pub use crate::shutdown::ShutdownCoordinator;
    pub use crate::sinks::{CollectSink, LogSink, Tally, TallySink};
    pub use crate::supervisor::Brickyard;
    pub use crate::truck::{LeaveEarly, Load, Truck, TruckReport, TruckState};
    pub use crate::worker::{Worker, WorkerReport};
}

pub use crate::core::{Error, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
