use std::time::Duration;

use backoff::backoff::Backoff;

/// Linear retry schedule: the n-th retry waits `n × unit`.
///
/// Yields at most `max_attempts - 1` delays, one between each pair of
/// attempts, then `None`.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    unit: Duration,
    max_attempts: usize,
    retries: usize,
}

impl LinearBackoff {
    pub const fn new(unit: Duration, max_attempts: usize) -> Self {
        Self {
            unit,
            max_attempts,
            retries: 0,
        }
    }
}

impl Backoff for LinearBackoff {
    fn reset(&mut self) {
        self.retries = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries + 1 >= self.max_attempts {
            return None;
        }
        self.retries += 1;
        let factor = u32::try_from(self.retries).unwrap_or(u32::MAX);
        Some(self.unit.saturating_mul(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::LinearBackoff;
    use backoff::backoff::Backoff;
    use std::time::Duration;

    #[test]
    fn three_attempts_yield_two_growing_delays() {
        let mut backoff = LinearBackoff::new(Duration::from_secs(1), 3);
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(1)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(2)));
        assert_eq!(backoff.next_backoff(), None);
    }

    #[test]
    fn single_attempt_never_waits() {
        let mut backoff = LinearBackoff::new(Duration::from_secs(1), 1);
        assert_eq!(backoff.next_backoff(), None);
    }

    #[test]
    fn reset_restarts_the_schedule() {
        let mut backoff = LinearBackoff::new(Duration::from_millis(10), 2);
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(10)));
        assert_eq!(backoff.next_backoff(), None);
        backoff.reset();
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(10)));
    }
}
