//! The loading dock: the reservation that lets one truck drain at a time.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Semaphore;
use tracing::debug;

use crate::brick::TruckId;
use crate::core::{Error, Result};

/// Mutual-exclusion token for drain sessions.
///
/// Waiting trucks are granted the dock in the order they asked for it.
#[derive(Debug)]
pub struct LoadingDock {
    permit: Semaphore,
    holder: Mutex<Option<TruckId>>,
}

impl LoadingDock {
    /// Create a free dock
    pub fn new() -> Self {
        Self {
            permit: Semaphore::new(1),
            holder: Mutex::new(None),
        }
    }

    /// Wait until the dock is free, then hold it as `truck`.
    pub async fn reserve(&self, truck: TruckId) -> Result<()> {
        if *self.lock() == Some(truck) {
            return Err(Error::protocol(format!(
                "truck {truck} tried to reserve the dock it already holds"
            )));
        }

        let permit = self
            .permit
            .acquire()
            .await
            .map_err(|_| Error::Shutdown("loading dock closed".to_string()))?;
        permit.forget();
        *self.lock() = Some(truck);

        debug!(truck = %truck, "dock reserved");
        Ok(())
    }

    /// Take the dock if it is free right now.
    pub fn try_reserve(&self, truck: TruckId) -> bool {
        match self.permit.try_acquire() {
            Ok(permit) => {
                permit.forget();
                *self.lock() = Some(truck);
                true
            }
            Err(_) => false,
        }
    }

    /// Give the dock back. Only the current holder may release it.
    pub fn release(&self, truck: TruckId) -> Result<()> {
        {
            let mut holder = self.lock();
            if *holder != Some(truck) {
                return Err(Error::NotReserved {
                    truck,
                    holder: *holder,
                });
            }
            *holder = None;
        }
        self.permit.add_permits(1);

        debug!(truck = %truck, "dock released");
        Ok(())
    }

    /// The truck currently holding the dock
    pub fn holder(&self) -> Option<TruckId> {
        *self.lock()
    }

    /// Fail with `NotReserved` unless `truck` holds the dock
    pub fn ensure_held_by(&self, truck: TruckId) -> Result<()> {
        let holder = self.holder();
        if holder == Some(truck) {
            Ok(())
        } else {
            Err(Error::NotReserved { truck, holder })
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<TruckId>> {
        self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LoadingDock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_reserve_and_release() {
        let dock = LoadingDock::new();
        dock.reserve(TruckId(1)).await.unwrap();
        assert_eq!(dock.holder(), Some(TruckId(1)));
        assert!(!dock.try_reserve(TruckId(2)));

        dock.release(TruckId(1)).unwrap();
        assert_eq!(dock.holder(), None);
        assert!(dock.try_reserve(TruckId(2)));
    }

    #[test]
    fn test_waiting_trucks_are_served_in_order() {
        use tokio_test::{assert_pending, assert_ready_ok, task};

        let dock = LoadingDock::new();
        assert!(dock.try_reserve(TruckId(1)));

        let mut second = task::spawn(dock.reserve(TruckId(2)));
        let mut third = task::spawn(dock.reserve(TruckId(3)));
        assert_pending!(second.poll());
        assert_pending!(third.poll());

        dock.release(TruckId(1)).unwrap();
        assert_pending!(third.poll());
        assert!(second.is_woken());
        assert_ready_ok!(second.poll());
        assert_eq!(dock.holder(), Some(TruckId(2)));

        dock.release(TruckId(2)).unwrap();
        assert_ready_ok!(third.poll());
        assert_eq!(dock.holder(), Some(TruckId(3)));
    }

    #[tokio::test]
    async fn test_release_by_non_holder_is_rejected() {
        let dock = LoadingDock::new();
        assert!(matches!(
            dock.release(TruckId(1)),
            Err(Error::NotReserved { holder: None, .. })
        ));

        dock.reserve(TruckId(1)).await.unwrap();
        let err = dock.release(TruckId(2)).unwrap_err();
        assert!(matches!(
            err,
            Error::NotReserved {
                truck: TruckId(2),
                holder: Some(TruckId(1))
            }
        ));
        // The real holder is untouched
        assert_eq!(dock.holder(), Some(TruckId(1)));
    }

    #[tokio::test]
    async fn test_double_reserve_is_protocol_error() {
        let dock = LoadingDock::new();
        dock.reserve(TruckId(1)).await.unwrap();
        assert!(matches!(
            dock.reserve(TruckId(1)).await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_second_truck_waits_for_release() {
        let dock = Arc::new(LoadingDock::new());
        dock.reserve(TruckId(1)).await.unwrap();

        let waiting = {
            let dock = dock.clone();
            tokio::spawn(async move { dock.reserve(TruckId(2)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());
        assert_eq!(dock.holder(), Some(TruckId(1)));

        dock.release(TruckId(1)).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("second truck should get the dock")
            .unwrap()
            .unwrap();
        assert_eq!(dock.holder(), Some(TruckId(2)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sessions_never_overlap() {
        let dock = Arc::new(LoadingDock::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for id in 1..=4 {
            let dock = dock.clone();
            let inside = inside.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..25 {
                    dock.reserve(TruckId(id)).await.unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    tokio::task::yield_now().await;
                    assert_eq!(inside.fetch_sub(1, Ordering::SeqCst), 1);
                    dock.release(TruckId(id)).unwrap();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(dock.holder(), None);
    }
}
