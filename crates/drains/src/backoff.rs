//! Reconnect backoff - exponential with jitter
//!
//! The delay starts at the base, doubles per consecutive failure, and
//! caps at the ceiling; each delay is jittered by +/-50% so a fleet of
//! writers does not reconnect in lockstep. Any successful write resets
//! the run.

use std::time::Duration;

use rand::Rng;

/// Jitter range applied to every delay (multiplicative +/-50%).
const JITTER: f64 = 0.5;

/// Exponential backoff state for one writer.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    consecutive_failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            consecutive_failures: 0,
        }
    }

    /// Number of consecutive failures so far.
    pub fn failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Record a failure and return the delay to wait before the next
    /// attempt.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.consecutive_failures.min(30);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let unjittered = self
            .base
            .saturating_mul(1u32 << exponent.min(16))
            .min(self.cap);

        let factor = rand::thread_rng().gen_range(1.0 - JITTER..=1.0 + JITTER);
        unjittered.mul_f64(factor).min(self.cap.mul_f64(1.0 + JITTER))
    }

    /// A successful write ends the failure run.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> Backoff {
        Backoff::new(Duration::from_secs(1), Duration::from_secs(60))
    }

    fn within_jitter(actual: Duration, nominal: Duration) -> bool {
        actual >= nominal.mul_f64(1.0 - JITTER) && actual <= nominal.mul_f64(1.0 + JITTER)
    }

    #[test]
    fn test_delays_double_per_failure() {
        let mut b = backoff();
        assert!(within_jitter(b.next_delay(), Duration::from_secs(1)));
        assert!(within_jitter(b.next_delay(), Duration::from_secs(2)));
        assert!(within_jitter(b.next_delay(), Duration::from_secs(4)));
        assert!(within_jitter(b.next_delay(), Duration::from_secs(8)));
        assert_eq!(b.failures(), 4);
    }

    #[test]
    fn test_delay_caps_at_ceiling() {
        let mut b = backoff();
        for _ in 0..20 {
            b.next_delay();
        }
        let delay = b.next_delay();
        assert!(delay <= Duration::from_secs(60).mul_f64(1.0 + JITTER));
        assert!(delay >= Duration::from_secs(60).mul_f64(1.0 - JITTER));
    }

    #[test]
    fn test_success_resets_run() {
        let mut b = backoff();
        b.next_delay();
        b.next_delay();
        b.reset();
        assert_eq!(b.failures(), 0);
        assert!(within_jitter(b.next_delay(), Duration::from_secs(1)));
    }

    #[test]
    fn test_no_overflow_at_large_failure_counts() {
        let mut b = Backoff::new(Duration::from_millis(1), Duration::from_secs(60));
        for _ in 0..1_000 {
            let delay = b.next_delay();
            assert!(delay <= Duration::from_secs(60).mul_f64(1.0 + JITTER));
        }
    }
}
