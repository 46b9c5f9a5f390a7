//! Shutdown coordination between workers and the conveyor.
//!
//! Every worker is registered up front. When a worker stops it reports
//! completion exactly once; once every registered worker has reported, the
//! conveyor starts answering end-of-stream to trucks as soon as it runs empty.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::brick::WorkerId;
use crate::core::{Error, Result};

/// Aggregates per-worker stop reports into a single "production finished" predicate.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    workers: Mutex<HashMap<WorkerId, bool>>,
    all_finished: Notify,
}

impl ShutdownCoordinator {
    /// Create a coordinator with no registered workers
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a coordinator with the given workers registered
    pub fn with_workers<I>(workers: I) -> Self
    where
        I: IntoIterator<Item = WorkerId>,
    {
        let coordinator = Self::new();
        for id in workers {
            coordinator.register(id);
        }
        coordinator
    }

    /// Register a worker. Registering an id twice keeps its current flag.
    pub fn register(&self, worker: WorkerId) {
        self.lock().entry(worker).or_insert(false);
    }

    /// Record that a worker has stopped producing.
    ///
    /// Idempotent: returns `Ok(true)` only for the call that flipped the flag.
    pub fn mark_finished(&self, worker: WorkerId) -> Result<bool> {
        let (changed, all_done) = {
            let mut workers = self.lock();
            let flag = workers
                .get_mut(&worker)
                .ok_or(Error::UnknownWorker(worker))?;
            let changed = !*flag;
            *flag = true;
            (changed, workers.values().all(|&done| done))
        };

        if changed {
            debug!(worker = %worker, "worker finished");
            if all_done {
                info!("all workers finished, production stopped");
                self.all_finished.notify_waiters();
            }
        }

        Ok(changed)
    }

    /// True iff every registered worker has reported completion.
    ///
    /// Vacuously true when no worker is registered.
    pub fn all_finished(&self) -> bool {
        self.lock().values().all(|&done| done)
    }

    /// Whether a given worker has finished, or None if it is not registered
    pub fn is_finished(&self, worker: WorkerId) -> Option<bool> {
        self.lock().get(&worker).copied()
    }

    /// Number of registered workers
    pub fn registered(&self) -> usize {
        self.lock().len()
    }

    /// Future resolved the next time production becomes finished.
    ///
    /// Must be created before checking `all_finished` so the wakeup cannot be missed.
    pub(crate) fn finished_notified(&self) -> Notified<'_> {
        self.all_finished.notified()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<WorkerId, bool>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_vacuously_finished() {
        let coordinator = ShutdownCoordinator::new();
        assert!(coordinator.all_finished());
        assert_eq!(coordinator.registered(), 0);
    }

    #[test]
    fn test_mark_finished_is_idempotent() {
        let coordinator = ShutdownCoordinator::with_workers([WorkerId(1), WorkerId(2)]);
        assert!(!coordinator.all_finished());

        assert!(coordinator.mark_finished(WorkerId(1)).unwrap());
        assert!(!coordinator.mark_finished(WorkerId(1)).unwrap());
        assert_eq!(coordinator.is_finished(WorkerId(1)), Some(true));
        assert_eq!(coordinator.is_finished(WorkerId(2)), Some(false));
        assert!(!coordinator.all_finished());

        assert!(coordinator.mark_finished(WorkerId(2)).unwrap());
        assert!(coordinator.all_finished());
    }

    #[test]
    fn test_unknown_worker() {
        let coordinator = ShutdownCoordinator::with_workers([WorkerId(1)]);
        let err = coordinator.mark_finished(WorkerId(9)).unwrap_err();
        assert!(matches!(err, Error::UnknownWorker(WorkerId(9))));
        assert_eq!(coordinator.is_finished(WorkerId(9)), None);
    }

    #[test]
    fn test_register_twice_keeps_flag() {
        let coordinator = ShutdownCoordinator::with_workers([WorkerId(1)]);
        coordinator.mark_finished(WorkerId(1)).unwrap();
        coordinator.register(WorkerId(1));
        assert_eq!(coordinator.registered(), 1);
        assert!(coordinator.all_finished());
    }

    #[tokio::test]
    async fn test_waiter_woken_when_last_worker_finishes() {
        let coordinator = Arc::new(ShutdownCoordinator::with_workers([WorkerId(1), WorkerId(2)]));

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                loop {
                    let notified = coordinator.finished_notified();
                    if coordinator.all_finished() {
                        return;
                    }
                    notified.await;
                }
            })
        };

        coordinator.mark_finished(WorkerId(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        coordinator.mark_finished(WorkerId(2)).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
