//! Metric recording hooks.
//!
//! With the `metrics` feature these forward to the `metrics` facade; without
//! it they compile to nothing.

#[cfg(feature = "metrics")]
mod imp {
    use metrics::{counter, gauge};

    pub fn record_offered(count: usize, mass: u64) {
        counter!("brickyard_bricks_offered_total").increment(1);
        record_level(count, mass);
    }

    pub fn record_removed(count: usize, mass: u64) {
        counter!("brickyard_bricks_removed_total").increment(1);
        record_level(count, mass);
    }

    pub fn record_delivery(bricks: usize, mass: u64) {
        counter!("brickyard_deliveries_total").increment(1);
        counter!("brickyard_delivered_mass_total").increment(mass);
        counter!("brickyard_delivered_bricks_total").increment(bricks as u64);
    }

    fn record_level(count: usize, mass: u64) {
        gauge!("brickyard_conveyor_count").set(count as f64);
        gauge!("brickyard_conveyor_mass").set(mass as f64);
    }
}

#[cfg(not(feature = "metrics"))]
mod imp {
    #[inline(always)]
    pub fn record_offered(_count: usize, _mass: u64) {}

    #[inline(always)]
    pub fn record_removed(_count: usize, _mass: u64) {}

    #[inline(always)]
    pub fn record_delivery(_bricks: usize, _mass: u64) {}
}

pub(crate) use imp::{record_delivery, record_offered, record_removed};
