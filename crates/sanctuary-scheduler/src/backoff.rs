use std::time::Duration;

/// Exponential back-off with a 60 s cap (§4.7), reset to baseline on any
/// success. Not thread-shared; each job loop owns one.
pub struct Backoff {
    baseline: Duration,
    cap: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(baseline: Duration) -> Self {
        Self {
            baseline,
            cap: Duration::from_secs(60),
            current: baseline,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Double the delay (capped at 60 s) after a rate-limit signal.
    pub fn bump(&mut self) -> Duration {
        self.current = (self.current * 2).min(self.cap);
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.baseline;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bumps_double_up_to_the_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(1));
        assert_eq!(backoff.bump(), Duration::from_secs(2));
        assert_eq!(backoff.bump(), Duration::from_secs(4));
        for _ in 0..10 {
            backoff.bump();
        }
        assert_eq!(backoff.current(), Duration::from_secs(60));
    }

    #[test]
    fn reset_returns_to_baseline() {
        let mut backoff = Backoff::new(Duration::from_millis(500));
        backoff.bump();
        backoff.bump();
        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_millis(500));
    }
}
