//! Retry budget and wait schedule for one `maintain` call.

use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::config::{ReconnectPolicy, WaitPolicy};

const MIN_SLEEP_MS: u64 = 10;

/// Tracks reconnection attempts and produces jittered delays.
pub struct RetryState {
    policy: ReconnectPolicy,
    attempts: u32,
    started: Instant,
    current: Duration,
    rng: StdRng,
}

impl RetryState {
    /// Start a fresh budget at `now`.
    pub fn new(policy: ReconnectPolicy, now: Instant, seed: Option<u64>) -> Self {
        let current = match policy.wait {
            WaitPolicy::Exponential { base, .. } => base,
            _ => Duration::ZERO,
        };
        Self {
            policy,
            attempts: 0,
            started: now,
            current,
            rng: seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
        }
    }

    /// Number of attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Count another connection attempt.
    ///
    /// Returns `false` once the attempt limit or the deadline is reached.
    pub fn begin_attempt(&mut self, now: Instant) -> bool {
        if self
            .policy
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
        {
            return false;
        }
        if self
            .policy
            .deadline
            .is_some_and(|deadline| now.duration_since(self.started) >= deadline)
        {
            return false;
        }
        self.attempts += 1;
        true
    }

    /// Sleep to apply before the attempt just begun, if any.
    pub fn next_sleep(&mut self) -> Option<Duration> {
        match self.policy.wait {
            WaitPolicy::None => None,
            WaitPolicy::Uniform { min, max } => {
                let min_ms = duration_ms(min);
                let max_ms = duration_ms(max).max(min_ms);
                Some(Duration::from_millis(self.rng.gen_range(min_ms..=max_ms)))
            }
            WaitPolicy::Exponential { cap, .. } => {
                if self.attempts > 1 {
                    self.current = self.current.saturating_mul(2).min(cap);
                }
                let max_ms = duration_ms(self.current);
                let sleep_ms = match max_ms {
                    0 => MIN_SLEEP_MS,
                    1..=MIN_SLEEP_MS => max_ms,
                    _ => self.rng.gen_range(MIN_SLEEP_MS..=max_ms),
                };
                Some(Duration::from_millis(sleep_ms))
            }
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}
