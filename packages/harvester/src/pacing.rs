//! Fixed-delay request pacing.

use std::thread;
use std::time::{Duration, Instant};

/// Enforces a minimum delay between consecutive network-bound operations.
///
/// The first call to [`RequestPacer::wait`] returns immediately; every later
/// call blocks until `delay` has passed since the previous one returned.
#[derive(Debug)]
pub struct RequestPacer {
    delay: Duration,
    last: Option<Instant>,
}

impl RequestPacer {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay, last: None }
    }

    /// Block until the next request may be sent.
    pub fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                let remaining = self.delay - elapsed;
                tracing::debug!(delay_ms = remaining.as_millis() as u64, "Pacing request");
                thread::sleep(remaining);
            }
        }
        self.last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_wait_is_immediate() {
        let mut pacer = RequestPacer::new(Duration::from_secs(60));
        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_consecutive_waits_are_spaced() {
        let mut pacer = RequestPacer::new(Duration::from_millis(30));
        let start = Instant::now();
        pacer.wait();
        pacer.wait();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_zero_delay_never_sleeps() {
        let mut pacer = RequestPacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..100 {
            pacer.wait();
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
