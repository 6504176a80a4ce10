//! Manually-stepped clock for deterministic sim runs.

use std::cell::Cell;
use std::rc::Rc;

use aus1_core::Clock;

/// Millisecond clock advanced explicitly by the sim loop. Clones share the
/// same time source.
#[derive(Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_time() {
        let clock = SimClock::new();
        let other = clock.clone();
        clock.advance(7);
        assert_eq!(other.now_ms(), 7);
    }
}
