/// Failed-attempt limiting for credential checks
///
/// Password comparison and verification-code matching are guessable if they
/// can be retried freely. [`AttemptLimiter`] counts failures per key (for
/// example `signin:ada@example.com`) inside a fixed window; once a key hits
/// `max_failures` it is locked until the window that started with its first
/// failure ends. A success resets the key.
///
/// Handlers call [`AttemptLimiter::try_acquire`] before the credential check.
/// It counts the attempt under the same lock that checks the limit, so
/// concurrent requests cannot all slip past a key with one attempt left.
/// A successful check then calls [`AttemptLimiter::reset`].
///
/// State is in-process. Running several replicas multiplies the effective
/// limit by the replica count.
///
/// # Example
///
/// ```
/// use securewrap_shared::auth::attempts::{AttemptDecision, AttemptLimiter};
/// use std::time::Duration;
///
/// let limiter = AttemptLimiter::new(2, Duration::from_secs(60));
/// limiter.record_failure("signin:ada@example.com");
/// limiter.record_failure("signin:ada@example.com");
///
/// assert!(matches!(
///     limiter.check("signin:ada@example.com"),
///     AttemptDecision::Locked { .. }
/// ));
/// assert_eq!(limiter.check("signin:bob@example.com"), AttemptDecision::Allowed);
/// ```

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of an attempt check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptDecision {
    /// The caller may proceed with the credential check
    Allowed,

    /// Too many recent failures
    Locked {
        /// Seconds until the key unlocks (at least 1)
        retry_after: u64,
    },
}

#[derive(Debug, Clone, Copy)]
struct FailureWindow {
    failures: u32,
    started: Instant,
}

/// In-memory fixed-window failure counter
#[derive(Debug)]
pub struct AttemptLimiter {
    max_failures: u32,
    window: Duration,
    entries: Mutex<HashMap<String, FailureWindow>>,
}

impl AttemptLimiter {
    /// Creates a limiter allowing `max_failures` failures per `window`
    ///
    /// A `max_failures` of 0 disables limiting.
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            max_failures,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Maximum failures per window
    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    /// Window length
    pub fn window(&self) -> Duration {
        self.window
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, FailureWindow>> {
        // A panic while holding the lock leaves the map in a usable state.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Checks whether `key` may attempt a credential check now
    pub fn check(&self, key: &str) -> AttemptDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> AttemptDecision {
        if self.max_failures == 0 {
            return AttemptDecision::Allowed;
        }

        let mut entries = self.entries();
        let Some(entry) = entries.get(key).copied() else {
            return AttemptDecision::Allowed;
        };

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            entries.remove(key);
            return AttemptDecision::Allowed;
        }

        if entry.failures >= self.max_failures {
            AttemptDecision::Locked {
                retry_after: retry_after_secs(self.window - elapsed),
            }
        } else {
            AttemptDecision::Allowed
        }
    }

    /// Checks `key` and, when allowed, counts this attempt as a failure
    ///
    /// The attempt stays counted unless the caller resets the key after a
    /// successful credential check.
    pub fn try_acquire(&self, key: &str) -> AttemptDecision {
        self.try_acquire_at(key, Instant::now())
    }

    fn try_acquire_at(&self, key: &str, now: Instant) -> AttemptDecision {
        if self.max_failures == 0 {
            return AttemptDecision::Allowed;
        }

        let mut entries = self.entries();
        let window = self.window;
        let entry = entries.entry(key.to_string()).or_insert(FailureWindow {
            failures: 0,
            started: now,
        });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= window {
            entry.failures = 0;
            entry.started = now;
        } else if entry.failures >= self.max_failures {
            return AttemptDecision::Locked {
                retry_after: retry_after_secs(window - elapsed),
            };
        }

        entry.failures += 1;
        AttemptDecision::Allowed
    }

    /// Records a failed attempt for `key`
    ///
    /// Returns the number of failures in the current window.
    pub fn record_failure(&self, key: &str) -> u32 {
        self.record_failure_at(key, Instant::now())
    }

    fn record_failure_at(&self, key: &str, now: Instant) -> u32 {
        let mut entries = self.entries();
        let window = self.window;

        let entry = entries.entry(key.to_string()).or_insert(FailureWindow {
            failures: 0,
            started: now,
        });

        if now.saturating_duration_since(entry.started) >= window {
            entry.failures = 0;
            entry.started = now;
        }

        entry.failures = entry.failures.saturating_add(1);
        entry.failures
    }

    /// Forgets all failures for `key`
    pub fn reset(&self, key: &str) {
        self.entries().remove(key);
    }

    /// Drops entries whose window has ended
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let window = self.window;
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.started) < window);
        before - entries.len()
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.entries().len()
    }
}

/// Whole seconds until `remaining` has passed, at least 1
fn retry_after_secs(remaining: Duration) -> u64 {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    secs.max(1)
}
