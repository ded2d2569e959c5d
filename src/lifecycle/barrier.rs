//! Phase counters.
//!
//! A [`PhaseCounter`] is the join point of one lifecycle phase on one
//! coordinating controller: every participant that may finish late enters
//! before it starts and leaves when it is done, and exactly one `leave` call
//! observes the count reaching zero.

use std::cell::Cell;

#[derive(Debug, Default)]
pub struct PhaseCounter {
    count: Cell<u32>,
}

impl PhaseCounter {
    pub const fn new() -> Self {
        Self { count: Cell::new(0) }
    }

    pub fn enter(&self) {
        self.count.set(self.count.get() + 1);
    }

    /// Returns `true` for the call that brings the counter to zero.
    pub fn leave(&self) -> bool {
        match self.count.get() {
            0 => {
                tracing::warn!("phase counter left more often than entered");
                false
            }
            n => {
                self.count.set(n - 1);
                n == 1
            }
        }
    }

    pub fn count(&self) -> u32 {
        self.count.get()
    }

    /// Drop any leftover entries from an abandoned wave.
    pub fn reset(&self) {
        self.count.set(0);
    }
}
