//! Backoff strategies for delivery retries.
//!
//! Attempt semantics: attempt `0` is the initial send (no delay); retries
//! start at attempt `1`. All arithmetic saturates at [`MAX_BACKOFF`] so very
//! large attempts or bases never overflow.

use std::time::Duration;

/// Delay ceiling applied when calculations would overflow (1 hour).
pub const MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);

/// Errors returned by backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackoffError {
    #[error("with_max is only valid for linear or exponential backoff")]
    ConstantDoesNotSupportMax,
    #[error("max must be greater than zero")]
    MaxMustBePositive,
    #[error("max ({max:?}) must be >= base ({base:?})")]
    MaxLessThanBase { base: Duration, max: Duration },
}

/// Retry delay strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Constant { delay: Duration },
    /// `base * attempt`, optionally capped.
    Linear { base: Duration, max: Option<Duration> },
    /// `base * 2^(attempt - 1)`, optionally capped.
    Exponential { base: Duration, max: Option<Duration> },
}

impl Backoff {
    pub fn constant(delay: Duration) -> Self {
        Backoff::Constant { delay }
    }

    pub fn linear(base: Duration) -> Self {
        Backoff::Linear { base, max: None }
    }

    pub fn exponential(base: Duration) -> Self {
        Backoff::Exponential { base, max: None }
    }

    /// Cap the delay for linear or exponential strategies.
    pub fn with_max(self, cap: Duration) -> Result<Self, BackoffError> {
        if cap.is_zero() {
            return Err(BackoffError::MaxMustBePositive);
        }
        match self {
            Backoff::Linear { base, .. } => {
                if cap < base {
                    return Err(BackoffError::MaxLessThanBase { base, max: cap });
                }
                Ok(Backoff::Linear { base, max: Some(cap) })
            }
            Backoff::Exponential { base, .. } => {
                if cap < base {
                    return Err(BackoffError::MaxLessThanBase { base, max: cap });
                }
                Ok(Backoff::Exponential { base, max: Some(cap) })
            }
            Backoff::Constant { .. } => Err(BackoffError::ConstantDoesNotSupportMax),
        }
    }

    /// Delay before the given attempt (0-based; 0 = initial send, no delay).
    pub fn delay(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        match self {
            Backoff::Constant { delay } => *delay,
            Backoff::Linear { base, max } => {
                let factor = attempt.min(u32::MAX as usize) as u32;
                let raw = base.checked_mul(factor).unwrap_or(MAX_BACKOFF);
                cap(raw, *max)
            }
            Backoff::Exponential { base, max } => {
                let exponent = attempt.saturating_sub(1).min(u32::MAX as usize) as u32;
                let multiplier = 2u128.saturating_pow(exponent);
                let nanos = base.as_nanos().saturating_mul(multiplier);
                let raw = Duration::from_nanos(nanos.min(MAX_BACKOFF.as_nanos()) as u64);
                cap(raw, *max)
            }
        }
    }
}

fn cap(delay: Duration, max: Option<Duration>) -> Duration {
    max.map(|m| delay.min(m)).unwrap_or(delay).min(MAX_BACKOFF)
}
