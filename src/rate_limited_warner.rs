use std::time::{Duration, Instant};

/// Helper that rate limits warnings about failed flushes.
///
/// The caller increments the failure counter via [`record_failure`]. The next
/// call to [`warn_if_due`] emits a warning using the provided callback if the
/// configured interval has elapsed. [`flush`] emits a warning immediately if
/// any failures have been recorded since the last emission.
///
/// The warner belongs to a single client and is only touched through
/// `&mut self`.
///
/// [`record_failure`]: Self::record_failure
/// [`warn_if_due`]: Self::warn_if_due
/// [`flush`]: Self::flush
#[derive(Debug)]
pub struct RateLimitedWarner {
    interval: Duration,
    last_warn: Option<Instant>,
    failures: u64,
}

impl RateLimitedWarner {
    /// Create a new [`RateLimitedWarner`]. The first warning can be emitted
    /// immediately.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_warn: None,
            failures: 0,
        }
    }

    /// Increment the failure counter.
    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    /// Emit a warning if the rate limit interval has elapsed.
    pub fn warn_if_due(&mut self, warn: impl FnMut(u64)) {
        self.warn_if_due_at(Instant::now(), warn);
    }

    fn warn_if_due_at(&mut self, now: Instant, mut warn: impl FnMut(u64)) {
        let due = self
            .last_warn
            .is_none_or(|prev| now.saturating_duration_since(prev) >= self.interval);
        if !due {
            return;
        }
        let count = std::mem::take(&mut self.failures);
        if count > 0 {
            warn(count);
        }
        self.last_warn = Some(now);
    }

    /// Immediately warn about any recorded failures.
    pub fn flush(&mut self, mut warn: impl FnMut(u64)) {
        let count = std::mem::take(&mut self.failures);
        if count > 0 {
            warn(count);
            self.last_warn = Some(Instant::now());
        }
    }
}
