//! Reconnection backoff policies.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

/// Computes the delay before a reconnect attempt from the attempt count.
pub type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Delay policy between reconnect attempts.
///
/// The attempt count starts at 0 for the first retry after a drop and is
/// reset whenever a connection is established.
#[derive(Clone, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ReconnectDelay {
    /// Same delay before every attempt.
    Fixed {
        /// Delay in milliseconds.
        delay_ms: u64,
    },

    /// Doubling delay, capped at a maximum.
    Exponential {
        /// Delay before the first attempt, in milliseconds.
        initial_ms: u64,
        /// Upper bound, in milliseconds.
        max_ms: u64,
    },

    /// Caller-supplied function of the attempt count.
    #[serde(skip)]
    Custom(DelayFn),
}

impl ReconnectDelay {
    /// Fixed delay policy.
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        ReconnectDelay::Fixed {
            delay_ms: delay.as_millis() as u64,
        }
    }

    /// Capped exponential policy.
    #[must_use]
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        ReconnectDelay::Exponential {
            initial_ms: initial.as_millis() as u64,
            max_ms: max.as_millis() as u64,
        }
    }

    /// Policy computed by a caller-supplied function.
    #[must_use]
    pub fn custom(f: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        ReconnectDelay::Custom(Arc::new(f))
    }

    /// Delay before the given attempt.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            ReconnectDelay::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            ReconnectDelay::Exponential { initial_ms, max_ms } => {
                let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
                Duration::from_millis(initial_ms.saturating_mul(factor).min(*max_ms))
            }
            ReconnectDelay::Custom(f) => f(attempt),
        }
    }
}

impl Default for ReconnectDelay {
    fn default() -> Self {
        ReconnectDelay::Exponential {
            initial_ms: 500,
            max_ms: 30_000,
        }
    }
}

impl fmt::Debug for ReconnectDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconnectDelay::Fixed { delay_ms } => {
                f.debug_struct("Fixed").field("delay_ms", delay_ms).finish()
            }
            ReconnectDelay::Exponential { initial_ms, max_ms } => f
                .debug_struct("Exponential")
                .field("initial_ms", initial_ms)
                .field("max_ms", max_ms)
                .finish(),
            ReconnectDelay::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
