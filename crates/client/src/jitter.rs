use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Source of the randomized delays that stagger replay and navigation, so
/// followers do not act in observable lockstep with the master.
///
/// Injected rather than called inline so tests can substitute a
/// deterministic or zero delay.
pub trait Jitter: Send + Sync {
    /// A delay drawn uniformly from `[0, max_ms)` milliseconds.
    fn delay(&self, max_ms: u64) -> Duration;
}

/// Uniform jitter over a seedable RNG.
pub struct UniformJitter {
    rng: Mutex<SmallRng>,
}

impl UniformJitter {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }

    /// Fixed-seed variant for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }
}

impl Default for UniformJitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Jitter for UniformJitter {
    fn delay(&self, max_ms: u64) -> Duration {
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let ms = self.rng.lock().unwrap().gen_range(0..max_ms);
        Duration::from_millis(ms)
    }
}

/// No delay at all; used by tests.
pub struct ZeroJitter;

impl Jitter for ZeroJitter {
    fn delay(&self, _max_ms: u64) -> Duration {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_stays_below_bound() {
        let jitter = UniformJitter::seeded(7);
        for _ in 0..1000 {
            assert!(jitter.delay(500) < Duration::from_millis(500));
        }
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let a = UniformJitter::seeded(42);
        let b = UniformJitter::seeded(42);
        for _ in 0..16 {
            assert_eq!(a.delay(7000), b.delay(7000));
        }
    }

    #[test]
    fn test_zero_bound() {
        assert_eq!(UniformJitter::seeded(1).delay(0), Duration::ZERO);
        assert_eq!(ZeroJitter.delay(10_000), Duration::ZERO);
    }
}
