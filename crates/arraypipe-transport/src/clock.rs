//! Monotonic time and the session deadline.

use std::time::{Duration, Instant};

/// Current monotonic instant.
pub fn now() -> Instant {
    Instant::now()
}

/// An absolute expiry instant bounding a multi-step operation.
///
/// Fixed at construction. Every blocking step asks for [`Deadline::remaining`]
/// and fails once it reports `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    start: Instant,
    expires: Instant,
}

impl Deadline {
    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        let start = now();
        Self {
            start,
            expires: start + budget,
        }
    }

    /// Deadline at an explicit instant.
    pub fn at(expires: Instant) -> Self {
        Self {
            start: now(),
            expires,
        }
    }

    /// The expiry instant.
    pub fn instant(&self) -> Instant {
        self.expires
    }

    /// Time elapsed since the deadline was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Budget left, or `None` once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires
            .checked_duration_since(now())
            .filter(|left| !left.is_zero())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }

    /// The earlier of this deadline and `bound` from now.
    pub fn capped(&self, bound: Duration) -> Self {
        let other = now() + bound;
        Self {
            start: self.start,
            expires: self.expires.min(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonic() {
        let a = now();
        let b = now();
        assert!(b >= a);
    }

    #[test]
    fn zero_budget_is_expired() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), None);
    }

    #[test]
    fn remaining_shrinks() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let first = deadline.remaining().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let second = deadline.remaining().unwrap();
        assert!(second < first);
        assert!(deadline.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn capped_takes_earlier_expiry() {
        let deadline = Deadline::after(Duration::from_secs(60));
        let capped = deadline.capped(Duration::from_millis(10));
        assert!(capped.instant() < deadline.instant());

        let short = Deadline::after(Duration::from_millis(10));
        let widened = short.capped(Duration::from_secs(60));
        assert_eq!(widened.instant(), short.instant());
    }
}
