//! The supervised pool of workers and trucks around one conveyor.
//!
//! [`Brickyard`] owns every task it starts. If starting fails part way, one
//! rollback routine stops production and aborts whatever is already running.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::brick::{TruckId, WorkerId};
use crate::config::SimulationConfig;
use crate::conveyor::Conveyor;
use crate::core::{Error, Result, Sink};
use crate::report::SimulationReport;
use crate::shutdown::ShutdownCoordinator;
use crate::sinks::TallySink;
use crate::truck::{LeaveEarly, Load, Truck, TruckReport};
use crate::worker::{Worker, WorkerReport};

/// A conveyor with its workers and trucks, run as tokio tasks.
pub struct Brickyard<S = TallySink> {
    config: SimulationConfig,
    conveyor: Arc<Conveyor>,
    stop: CancellationToken,
    sink: S,
    leave_flags: Vec<(TruckId, LeaveEarly)>,
    workers: Vec<JoinHandle<Result<WorkerReport>>>,
    trucks: Vec<JoinHandle<Result<TruckReport>>>,
}

impl Brickyard<TallySink> {
    /// Build a yard whose trucks deliver into a [`TallySink`]
    pub fn new(config: SimulationConfig) -> Result<Self> {
        Self::with_sink(config, TallySink::new())
    }
}

impl<S> Brickyard<S>
where
    S: Sink<Item = Load> + Clone + Send + 'static,
{
    /// Validate `config` and create the conveyor; nothing runs until [`start`](Self::start).
    ///
    /// Every truck gets its own clone of `sink`.
    pub fn with_sink(config: SimulationConfig, sink: S) -> Result<Self> {
        config.validate()?;

        let worker_ids = (1..=config.worker_weights.len() as u32).map(WorkerId);
        let coordinator = Arc::new(ShutdownCoordinator::with_workers(worker_ids));
        let conveyor = Arc::new(Conveyor::new(
            config.max_bricks,
            config.max_mass,
            coordinator,
        )?);

        Ok(Self {
            config,
            conveyor,
            stop: CancellationToken::new(),
            sink,
            leave_flags: Vec::new(),
            workers: Vec::new(),
            trucks: Vec::new(),
        })
    }

    /// Spawn every worker, then every truck.
    pub fn start(&mut self) -> Result<()> {
        if self.running() > 0 {
            return Err(Error::protocol("brickyard already started"));
        }

        if let Err(e) = self.spawn_all() {
            self.rollback();
            return Err(e);
        }

        info!(
            workers = self.workers.len(),
            trucks = self.trucks.len(),
            max_bricks = self.config.max_bricks,
            max_mass = self.config.max_mass,
            "brickyard started"
        );
        Ok(())
    }

    fn spawn_all(&mut self) -> Result<()> {
        let runtime = Handle::try_current().map_err(|e| Error::Spawn {
            unit: "brickyard".to_string(),
            reason: e.to_string(),
        })?;

        for (index, &weight) in self.config.worker_weights.iter().enumerate() {
            let id = WorkerId(index as u32 + 1);
            let worker = Worker::new(id, weight, self.conveyor.clone())
                .map_err(|e| spawn_error(id, e))?
                .with_interval(self.config.production_interval);
            self.workers.push(runtime.spawn(worker.run(self.stop.clone())));
        }

        for index in 0..self.config.truck_count {
            let id = TruckId(index as u32 + 1);
            let signal = LeaveEarly::new();
            let truck = Truck::new(
                id,
                self.config.truck_capacity,
                self.conveyor.clone(),
                self.sink.clone(),
            )
            .map_err(|e| spawn_error(id, e))?
            .delivery_interval(self.config.delivery_interval)
            .retry_backoff(self.config.retry_backoff)
            .leave_early(signal.clone());
            self.leave_flags.push((id, signal));
            self.trucks.push(runtime.spawn(truck.run()));
        }

        Ok(())
    }

    fn rollback(&mut self) {
        warn!(
            workers = self.workers.len(),
            trucks = self.trucks.len(),
            "startup failed, terminating started units"
        );
        self.stop.cancel();
        for handle in self.workers.drain(..) {
            handle.abort();
        }
        for handle in self.trucks.drain(..) {
            handle.abort();
        }
        self.leave_flags.clear();
    }

    /// Request that production stops. Workers finish their current brick first.
    pub fn stop(&self) {
        info!("stop requested");
        self.stop.cancel();
    }

    /// The token that stops production when cancelled
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Ask one truck to leave at its next check. False if no such truck runs.
    pub fn leave_early(&self, truck: TruckId) -> bool {
        match self.leave_flags.iter().find(|(id, _)| *id == truck) {
            Some((_, signal)) => {
                signal.raise();
                true
            }
            None => false,
        }
    }

    /// Ask every truck to leave at its next check
    pub fn leave_early_all(&self) {
        for (_, signal) in &self.leave_flags {
            signal.raise();
        }
    }

    /// Number of started units
    pub fn running(&self) -> usize {
        self.workers.len() + self.trucks.len()
    }

    pub fn conveyor(&self) -> &Arc<Conveyor> {
        &self.conveyor
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Wait for every unit to exit and collect the report.
    ///
    /// Trucks only exit on their own once production has stopped and the
    /// conveyor is drained, so call [`stop`](Self::stop) first (or from
    /// another task). If every truck exits while workers are still expected
    /// to produce, nothing can drain the conveyor any more and the workers
    /// are aborted.
    pub async fn join(self) -> SimulationReport {
        let Brickyard {
            conveyor,
            workers,
            trucks,
            ..
        } = self;

        let coordinator = conveyor.coordinator().clone();
        let worker_aborts: Vec<AbortHandle> =
            workers.iter().map(JoinHandle::abort_handle).collect();

        let trucks_done = async {
            let results = join_all(trucks).await;
            if !coordinator.all_finished() {
                warn!("all trucks stopped while production is running, aborting workers");
                for handle in &worker_aborts {
                    handle.abort();
                }
            }
            results
        };
        let (worker_results, truck_results) = tokio::join!(join_all(workers), trucks_done);

        let mut failures = Vec::new();
        let workers = collect_reports(worker_results, &mut failures);
        let trucks = collect_reports(truck_results, &mut failures);

        let report = SimulationReport {
            workers,
            trucks,
            conveyor: conveyor.snapshot(),
            failures,
        };
        info!(
            produced = report.produced_mass(),
            delivered = report.delivered_mass(),
            balanced = report.is_balanced(),
            "brickyard finished"
        );
        report
    }

    /// Start, let the yard run for `duration`, stop it and wait for it to wind down.
    pub async fn run_for(mut self, duration: Duration) -> Result<SimulationReport> {
        self.start()?;
        tokio::time::sleep(duration).await;
        self.stop();
        Ok(self.join().await)
    }
}

fn collect_reports<T>(
    results: Vec<std::result::Result<Result<T>, tokio::task::JoinError>>,
    failures: &mut Vec<Error>,
) -> Vec<T> {
    let mut reports = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(Ok(report)) => reports.push(report),
            Ok(Err(e)) => failures.push(e),
            Err(e) => failures.push(e.into()),
        }
    }
    reports
}

fn spawn_error(unit: impl ToString, error: Error) -> Error {
    Error::Spawn {
        unit: unit.to_string(),
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::CollectSink;

    fn quick_config() -> SimulationConfig {
        SimulationConfig::new()
            .max_bricks(10)
            .max_mass(20)
            .truck_capacity(6)
            .truck_count(2)
            .delivery_interval(Duration::from_millis(5))
            .production_interval(Duration::from_millis(1))
            .retry_backoff(Duration::from_millis(1))
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Brickyard::new(SimulationConfig::new().truck_count(0));
        assert!(matches!(result, Err(Error::Config { field: "truck_count", .. })));
    }

    #[test]
    fn test_start_outside_runtime_fails_cleanly() {
        let mut yard = Brickyard::new(quick_config()).unwrap();
        let err = yard.start().unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
        assert_eq!(yard.running(), 0);
        assert!(yard.stop_handle().is_cancelled());
    }

    #[tokio::test]
    async fn test_failed_truck_spawn_rolls_back_workers() {
        let mut yard = Brickyard::new(quick_config()).unwrap();
        // Bypass validation to make the first truck fail to build
        yard.config.truck_capacity = 0;

        let err = yard.start().unwrap_err();
        assert!(matches!(err, Error::Spawn { ref unit, .. } if unit == "C1"));
        assert_eq!(yard.running(), 0);
        assert!(yard.stop_handle().is_cancelled());
        assert!(!yard.leave_early(TruckId(1)));
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let mut yard = Brickyard::new(quick_config()).unwrap();
        yard.start().unwrap();
        assert!(matches!(yard.start(), Err(Error::Protocol(_))));

        yard.stop();
        let report = yard.join().await;
        assert!(report.is_clean());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_for_balances_mass() {
        let sink = CollectSink::new();
        let yard = Brickyard::with_sink(quick_config(), sink.clone()).unwrap();
        let report = yard.run_for(Duration::from_millis(100)).await.unwrap();

        assert!(report.is_clean(), "failures: {:?}", report.failures);
        assert_eq!(report.workers.len(), 3);
        assert_eq!(report.trucks.len(), 2);
        assert!(report.produced_bricks() > 0);
        assert_eq!(report.conveyor.count, 0);
        assert!(report.is_balanced());

        let loads = sink.into_items().await;
        let delivered: u64 = loads.iter().map(|l| l.mass()).sum();
        assert_eq!(delivered, report.produced_mass());
        assert!(loads.iter().all(|l| l.mass() <= 6));
    }
}
