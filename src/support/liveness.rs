//! Liveness signalling.
//!
//! Long crawls watch for wedged network stacks; every settled fetch pulses
//! this signal so the watchdog knows outbound traffic still completes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Receives a pulse whenever a fetch settles end to end.
pub trait LivenessSignal: Send + Sync {
    /// Records one completed fetch.
    fn it_worked(&self);
}

/// Signal that discards pulses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLiveness;

impl LivenessSignal for NoopLiveness {
    fn it_worked(&self) {}
}

/// Signal that counts pulses.
#[derive(Debug, Default)]
pub struct CountingLiveness {
    pulses: AtomicU64,
}

impl CountingLiveness {
    /// Creates a zeroed counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulses received so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.pulses.load(Ordering::Relaxed)
    }
}

impl LivenessSignal for CountingLiveness {
    fn it_worked(&self) {
        self.pulses.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_liveness_accumulates() {
        let signal = CountingLiveness::new();
        assert_eq!(signal.count(), 0);
        signal.it_worked();
        signal.it_worked();
        assert_eq!(signal.count(), 2);
    }
}
