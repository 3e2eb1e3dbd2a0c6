//! Delay policies between starting virtual users.
//!
//! A [`LoadTest`](crate::load::LoadTest) asks its [`Timer`] for a delay once
//! per admitted user and sleeps that long before admitting the next one.

use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::error::ConfigError;

/// A strategy producing the delay between two user admissions.
pub trait Timer: Send + Sync {
    fn delay(&self) -> Duration;
}

/// Always the same delay. A zero delay starts all users at once.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConstantTimer {
    delay: Duration,
}

impl ConstantTimer {
    pub const fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
        }
    }
}

impl From<Duration> for ConstantTimer {
    fn from(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Timer for ConstantTimer {
    fn delay(&self) -> Duration {
        self.delay
    }
}

/// A delay uniformly distributed over `[delay, delay + variation)` milliseconds.
///
/// The sum is taken by absolute value, so a negative `variation` never yields
/// a negative delay.
#[derive(Debug)]
pub struct RandomTimer {
    delay_ms: f64,
    variation: f64,
    rng: Mutex<StdRng>,
}

impl RandomTimer {
    pub fn new(delay_ms: u64, variation: f64) -> Result<Self, ConfigError> {
        if !variation.is_finite() {
            return Err(ConfigError::InvalidVariation(variation));
        }

        Ok(Self {
            delay_ms: delay_ms as f64,
            variation,
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Make the produced delays reproducible.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }
}

impl Timer for RandomTimer {
    fn delay(&self) -> Duration {
        let sample: f64 = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0.0..1.0);
        let delay_ms = (sample * self.variation + self.delay_ms).abs();
        Duration::from_millis(delay_ms as u64)
    }
}
