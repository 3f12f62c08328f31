//! Reconnect policies for station disconnects
//!
//! A disconnected station is always retried; the policy only decides how long
//! the dispatch context waits before asking the driver again.

use std::time::Duration;

/// Pacing for station reconnects.
///
/// The delay is slept on the context that delivers the disconnect event. On
/// ESP-IDF that is the system event task, so no other Wi-Fi or IP event is
/// handled until the delay ends. Keep delays short there.
pub trait ReconnectPolicy: Send {
    /// Delay before the next reconnect attempt, `None` to retry immediately
    fn next_delay(&mut self) -> Option<Duration>;

    /// Called once the station has an address again
    fn reset(&mut self);
}

/// Retry as soon as the disconnect is reported
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl ReconnectPolicy for Immediate {
    fn next_delay(&mut self) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}
}

/// Doubling delay starting at `initial`, capped at `max`
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            next: initial,
        }
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        Some(delay)
    }

    fn reset(&mut self) {
        self.next = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_never_waits() {
        let mut policy = Immediate;
        for _ in 0..100 {
            assert_eq!(policy.next_delay(), None);
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut policy = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60));
        let delays: Vec<u64> = (0..8)
            .map(|_| policy.next_delay().unwrap().as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60]);

        policy.reset();
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
    }
}
