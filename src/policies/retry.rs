//! # Two-phase retry policy.
//!
//! [`RetryPolicy`] paces the supervisor's dial attempts:
//!
//! ```text
//! attempt 1..=N      fast phase   no delay
//! attempt N+1..=2N   slow phase   wait `slow_delay` first
//! attempt > 2N       give up      (MaxRetriesExceeded)
//!
//! N = 0: attempts 1..=5 are fast, every later attempt waits `slow_delay`
//!        and proceeds; the loop never gives up on its own.
//! ```
//!
//! ## Rules
//! - `next()` only computes the decision; the supervisor performs the wait
//!   under the cancellation token, so cancellation interrupts a slow wait
//!   within one scheduling step.
//! - `reset()` is called on every successful Connected transition; the very
//!   next failure starts over in the fast phase.

use std::time::Duration;

use crate::config::ClientConfig;

/// Which half of the progression an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    /// Immediate retry, no delay.
    Fast,
    /// Delayed retry.
    Slow,
}

impl RetryPhase {
    pub fn as_label(&self) -> &'static str {
        match self {
            RetryPhase::Fast => "fast",
            RetryPhase::Slow => "slow",
        }
    }
}

impl std::fmt::Display for RetryPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Outcome of one policy query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Dial now (after sleeping `delay`, which is zero in the fast phase).
    Proceed {
        /// 1-based attempt number.
        attempt: u32,
        phase: RetryPhase,
        delay: Duration,
    },
    /// The progression is exhausted.
    GiveUp {
        /// Attempts actually performed.
        attempts: u32,
    },
}

/// Counter-backed two-phase retry progression.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Configured fast-retry count N (0 = unlimited slow phase).
    max_retries: u32,
    /// Delay inserted before each slow-phase attempt.
    slow_delay: Duration,
    /// Attempts handed out since the last reset.
    attempt: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, slow_delay: Duration) -> Self {
        Self {
            max_retries,
            slow_delay,
            attempt: 0,
        }
    }

    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self::new(cfg.max_retries, cfg.retry_delay)
    }

    /// Advances the progression and returns the decision for the next dial.
    pub fn next(&mut self) -> RetryDecision {
        let fast_limit = if self.max_retries == 0 {
            crate::config::DEFAULT_MAX_RETRIES
        } else {
            self.max_retries
        };

        if self.max_retries > 0 && self.attempt >= self.max_retries * 2 {
            return RetryDecision::GiveUp {
                attempts: self.attempt,
            };
        }

        self.attempt += 1;
        if self.attempt <= fast_limit {
            RetryDecision::Proceed {
                attempt: self.attempt,
                phase: RetryPhase::Fast,
                delay: Duration::ZERO,
            }
        } else {
            RetryDecision::Proceed {
                attempt: self.attempt,
                phase: RetryPhase::Slow,
                delay: self.slow_delay,
            }
        }
    }

    /// Attempts handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Total attempt ceiling (0 = unlimited).
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_mul(2)
    }

    /// Restarts the progression. Called on every Connected transition.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phases(policy: &mut RetryPolicy, n: usize) -> Vec<(u32, RetryPhase, Duration)> {
        (0..n)
            .map(|_| match policy.next() {
                RetryDecision::Proceed {
                    attempt,
                    phase,
                    delay,
                } => (attempt, phase, delay),
                RetryDecision::GiveUp { .. } => panic!("gave up early"),
            })
            .collect()
    }

    #[test]
    fn exactly_n_fast_then_n_slow_then_give_up() {
        let delay = Duration::from_secs(3);
        let mut policy = RetryPolicy::new(2, delay);

        let seen = phases(&mut policy, 4);
        assert_eq!(
            seen,
            vec![
                (1, RetryPhase::Fast, Duration::ZERO),
                (2, RetryPhase::Fast, Duration::ZERO),
                (3, RetryPhase::Slow, delay),
                (4, RetryPhase::Slow, delay),
            ]
        );
        assert_eq!(policy.next(), RetryDecision::GiveUp { attempts: 4 });
        // Give-up is stable on repeated queries.
        assert_eq!(policy.next(), RetryDecision::GiveUp { attempts: 4 });
    }

    #[test]
    fn zero_means_five_fast_then_unlimited_slow() {
        let delay = Duration::from_secs(1);
        let mut policy = RetryPolicy::new(0, delay);

        for expected in 1..=5u32 {
            match policy.next() {
                RetryDecision::Proceed {
                    attempt,
                    phase,
                    delay: d,
                } => {
                    assert_eq!(attempt, expected);
                    assert_eq!(phase, RetryPhase::Fast);
                    assert_eq!(d, Duration::ZERO);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        // Far past the fast phase it still proceeds, slowly.
        for _ in 0..100 {
            match policy.next() {
                RetryDecision::Proceed { phase, delay: d, .. } => {
                    assert_eq!(phase, RetryPhase::Slow);
                    assert_eq!(d, delay);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn reset_restarts_the_fast_phase() {
        let mut policy = RetryPolicy::new(1, Duration::from_secs(3));
        policy.next();
        policy.next();
        assert_eq!(policy.attempt(), 2);
        policy.reset();
        assert_eq!(policy.attempt(), 0);
        match policy.next() {
            RetryDecision::Proceed { attempt, phase, .. } => {
                assert_eq!(attempt, 1);
                assert_eq!(phase, RetryPhase::Fast);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
