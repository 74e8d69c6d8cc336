//! Jitter strategies to keep retrying clients from synchronizing.
//!
//! - `None`: deterministic delays, for tests.
//! - `Full`: uniform in `[0, delay]`, the default; spreads load widest.
//! - `Equal`: uniform in `[delay/2, delay]`, keeps a floor under the delay.
//!
//! Millisecond conversions saturate on very large durations.

use rand::{rng, Rng};
use std::time::Duration;

/// Randomization applied to backoff delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    None,
    Full,
    Equal,
}

impl Jitter {
    /// Apply jitter to a delay using the thread-local RNG.
    pub fn apply(&self, delay: Duration) -> Duration {
        let mut rng = rng();
        self.apply_with_rng(delay, &mut rng)
    }

    /// Apply jitter with a caller-supplied RNG (deterministic in tests).
    pub fn apply_with_rng<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        let millis = as_millis_saturated(delay);
        match self {
            Jitter::None => delay,
            Jitter::Full => {
                if millis == 0 {
                    return Duration::ZERO;
                }
                Duration::from_millis(rng.random_range(0..=millis))
            }
            Jitter::Equal => {
                if millis == 0 {
                    return Duration::ZERO;
                }
                Duration::from_millis(rng.random_range(millis / 2..=millis))
            }
        }
    }
}

fn as_millis_saturated(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}
