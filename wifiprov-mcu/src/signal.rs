//! Two-bit event signal used to hand connection results from the event
//! context to a blocked caller.
//!
//! Bits are set from the dispatch context and consumed by the waiter: a
//! successful [`EventSignal::wait`] clears the bits it observed, so one `set`
//! releases at most one waiter.

use std::ops::BitOrAssign;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalBits(u8);

impl SignalBits {
    /// Station got an address
    pub const CONNECTED: SignalBits = SignalBits(1 << 0);
    /// Connection attempt gave up
    pub const FAILED: SignalBits = SignalBits(1 << 1);
    pub const ALL: SignalBits = SignalBits(Self::CONNECTED.0 | Self::FAILED.0);

    pub fn contains(self, other: SignalBits) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn without(self, other: SignalBits) -> SignalBits {
        SignalBits(self.0 & !other.0)
    }
}

impl BitOrAssign for SignalBits {
    fn bitor_assign(&mut self, rhs: SignalBits) {
        self.0 |= rhs.0;
    }
}

#[derive(Debug, Default)]
pub struct EventSignal {
    bits: Mutex<SignalBits>,
    changed: Condvar,
}

impl EventSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `bits` and wake waiters
    pub fn set(&self, bits: SignalBits) {
        let mut current = self.lock();
        *current |= bits;
        self.changed.notify_all();
    }

    pub fn clear(&self, bits: SignalBits) {
        let mut current = self.lock();
        *current = current.without(bits);
    }

    /// Current bits, without consuming them
    pub fn peek(&self) -> SignalBits {
        *self.lock()
    }

    /// Block until all of `bits` are set, then clear them.
    ///
    /// `None` waits forever. Returns `false` if the timeout elapsed first.
    pub fn wait(&self, bits: SignalBits, timeout: Option<Duration>) -> bool {
        let mut current = self.lock();
        match timeout {
            None => {
                while !current.contains(bits) {
                    current = self
                        .changed
                        .wait(current)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while !current.contains(bits) {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    current = self
                        .changed
                        .wait_timeout(current, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }

        *current = current.without(bits);
        true
    }

    fn lock(&self) -> MutexGuard<'_, SignalBits> {
        self.bits.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_returns_after_set_and_clears() {
        let signal = Arc::new(EventSignal::new());
        let setter = Arc::clone(&signal);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set(SignalBits::CONNECTED);
        });

        assert!(signal.wait(SignalBits::CONNECTED, Some(Duration::from_secs(5))));
        assert!(signal.peek().is_empty());
        handle.join().unwrap();
    }

    #[test]
    fn wait_times_out() {
        let signal = EventSignal::new();
        assert!(!signal.wait(SignalBits::CONNECTED, Some(Duration::from_millis(30))));
    }

    #[test]
    fn bits_are_independent() {
        let signal = EventSignal::new();
        signal.set(SignalBits::FAILED);

        assert!(!signal.wait(SignalBits::CONNECTED, Some(Duration::from_millis(10))));
        // The failed bit was not requested, so it is still set
        assert!(signal.peek().contains(SignalBits::FAILED));

        assert!(signal.wait(SignalBits::FAILED, Some(Duration::ZERO)));
        assert!(signal.peek().is_empty());
    }

    #[test]
    fn wait_needs_every_bit() {
        let signal = EventSignal::new();
        signal.set(SignalBits::CONNECTED);
        assert!(!signal.wait(SignalBits::ALL, Some(Duration::from_millis(10))));
        signal.set(SignalBits::FAILED);
        assert!(signal.wait(SignalBits::ALL, None));
        assert!(signal.peek().is_empty());
    }

    #[test]
    fn one_set_releases_one_waiter() {
        let signal = Arc::new(EventSignal::new());
        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let signal = Arc::clone(&signal);
                thread::spawn(move || {
                    signal.wait(SignalBits::CONNECTED, Some(Duration::from_millis(300)))
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        signal.set(SignalBits::CONNECTED);

        let released = waiters
            .into_iter()
            .map(|w| w.join().unwrap())
            .filter(|released| *released)
            .count();
        assert_eq!(released, 1);
    }

    #[test]
    fn clear_drops_stale_bits() {
        let signal = EventSignal::new();
        signal.set(SignalBits::CONNECTED);
        signal.clear(SignalBits::CONNECTED);
        assert!(!signal.wait(SignalBits::CONNECTED, Some(Duration::from_millis(10))));
    }
}
