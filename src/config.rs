//! Simulation configuration.

use std::time::Duration;

use crate::core::{Error, Result};

/// Parameters of a brickyard run.
///
/// Accepted ranges:
/// K in 3..=5000, M in 6..=3K-1, C in 3..=500, N in 1..=20.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulationConfig {
    /// Maximum number of bricks on the conveyor (K)
    pub max_bricks: usize,
    /// Maximum total mass on the conveyor (M)
    pub max_mass: u64,
    /// Mass a single truck can carry (C)
    pub truck_capacity: u64,
    /// Number of trucks (N)
    pub truck_count: usize,
    /// Time a truck is away delivering a load (Ti)
    pub delivery_interval: Duration,
    /// One worker per entry, producing bricks of that weight
    pub worker_weights: Vec<u32>,
    /// Pause a worker takes between two bricks
    pub production_interval: Duration,
    /// Pause a truck takes after leaving the conveyor empty-handed
    pub retry_backoff: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_bricks: 10,
            max_mass: 20,
            truck_capacity: 8,
            truck_count: 3,
            delivery_interval: Duration::from_secs(1),
            worker_weights: vec![1, 2, 3],
            production_interval: Duration::from_millis(100),
            retry_backoff: Duration::from_millis(10),
        }
    }
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the conveyor brick limit (K)
    pub fn max_bricks(mut self, max: usize) -> Self {
        self.max_bricks = max;
        self
    }

    /// Set the conveyor mass limit (M)
    pub fn max_mass(mut self, max: u64) -> Self {
        self.max_mass = max;
        self
    }

    /// Set the truck capacity (C)
    pub fn truck_capacity(mut self, capacity: u64) -> Self {
        self.truck_capacity = capacity;
        self
    }

    /// Set the number of trucks (N)
    pub fn truck_count(mut self, count: usize) -> Self {
        self.truck_count = count;
        self
    }

    /// Set the delivery interval (Ti)
    pub fn delivery_interval(mut self, interval: Duration) -> Self {
        self.delivery_interval = interval;
        self
    }

    /// Set the workers, one brick weight each
    pub fn worker_weights(mut self, weights: impl Into<Vec<u32>>) -> Self {
        self.worker_weights = weights.into();
        self
    }

    /// Set the pause between bricks
    pub fn production_interval(mut self, interval: Duration) -> Self {
        self.production_interval = interval;
        self
    }

    /// Set the truck retry backoff
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Weight of the heaviest brick any worker produces
    pub fn heaviest_brick(&self) -> u32 {
        self.worker_weights.iter().copied().max().unwrap_or(0)
    }

    /// Check every parameter; the first violation is returned.
    pub fn validate(&self) -> Result<()> {
        check_range("max_bricks", self.max_bricks as u64, 3, 5000)?;

        let mass_ceiling = 3 * self.max_bricks as u64 - 1;
        check_range("max_mass", self.max_mass, 6, mass_ceiling)?;
        check_range("truck_capacity", self.truck_capacity, 3, 500)?;
        check_range("truck_count", self.truck_count as u64, 1, 20)?;

        if self.delivery_interval.is_zero() {
            return Err(Error::config("delivery_interval", "must be greater than zero"));
        }

        if self.worker_weights.is_empty() {
            return Err(Error::config("worker_weights", "at least one worker is required"));
        }
        if self.worker_weights.contains(&0) {
            return Err(Error::config("worker_weights", "brick weights must be at least 1"));
        }

        let heaviest = u64::from(self.heaviest_brick());
        if heaviest > self.max_mass {
            return Err(Error::config(
                "max_mass",
                format!("{} cannot hold a single brick of weight {}", self.max_mass, heaviest),
            ));
        }
        if heaviest > self.truck_capacity {
            return Err(Error::config(
                "truck_capacity",
                format!(
                    "{} cannot carry a single brick of weight {}",
                    self.truck_capacity, heaviest
                ),
            ));
        }

        Ok(())
    }
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        return Err(Error::config(
            field,
            format!("{} is outside the range <{}, {}>", value, min, max),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: Result<()>) -> &'static str {
        match result {
            Err(Error::Config { field, .. }) => field,
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_is_valid() {
        SimulationConfig::default().validate().unwrap();
        assert_eq!(SimulationConfig::default().heaviest_brick(), 3);
    }

    #[test]
    fn test_count_range() {
        let config = SimulationConfig::new().max_bricks(2);
        assert_eq!(field_of(config.validate()), "max_bricks");
        let config = SimulationConfig::new().max_bricks(5001);
        assert_eq!(field_of(config.validate()), "max_bricks");
    }

    #[test]
    fn test_mass_must_stay_below_three_times_count() {
        let config = SimulationConfig::new().max_bricks(10).max_mass(30);
        assert_eq!(field_of(config.validate()), "max_mass");
        SimulationConfig::new()
            .max_bricks(10)
            .max_mass(29)
            .validate()
            .unwrap();
    }

    #[test]
    fn test_heaviest_brick_must_fit_everywhere() {
        let config = SimulationConfig::new().worker_weights(vec![1, 9]).max_mass(25);
        assert_eq!(field_of(config.validate()), "truck_capacity");

        let config = SimulationConfig::new()
            .worker_weights(vec![7])
            .max_mass(6)
            .truck_capacity(10);
        assert_eq!(field_of(config.validate()), "max_mass");
    }

    #[test]
    fn test_workers_and_trucks_required() {
        let config = SimulationConfig::new().worker_weights(Vec::new());
        assert_eq!(field_of(config.validate()), "worker_weights");
        let config = SimulationConfig::new().worker_weights(vec![1, 0]);
        assert_eq!(field_of(config.validate()), "worker_weights");
        let config = SimulationConfig::new().truck_count(0);
        assert_eq!(field_of(config.validate()), "truck_count");
        let config = SimulationConfig::new().delivery_interval(Duration::ZERO);
        assert_eq!(field_of(config.validate()), "delivery_interval");
    }
}
