//! Retry backoff and auto-action policies.

use std::time::Duration;

/// Delay schedule applied after a failed cycle.
///
/// The delay depends only on the configured interval and the number of
/// consecutive failures; a successful cycle resets the count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backoff {
    /// Always wait one interval, failure or not.
    #[default]
    Fixed,
    /// Double the wait on each consecutive failure, never exceeding `max`
    /// (and never going below one interval).
    Exponential { max: Duration },
}

impl Backoff {
    /// Delay before the next cycle after `consecutive_failures` failures in a
    /// row (`0` after a success).
    pub fn delay(&self, interval: Duration, consecutive_failures: u32) -> Duration {
        match *self {
            Backoff::Fixed => interval,
            Backoff::Exponential { max } => {
                if consecutive_failures == 0 {
                    return interval;
                }
                let factor = 1u32
                    .checked_shl(consecutive_failures - 1)
                    .unwrap_or(u32::MAX);
                interval.saturating_mul(factor).min(max.max(interval))
            }
        }
    }
}

/// Actions the engine performs on its own after dispatching a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutoActions {
    #[default]
    None,
    /// Upvote every item that was dispatched to the handler.
    UpvoteMatches,
}
