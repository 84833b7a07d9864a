// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Tick count shared between the timer ISR and the main loop.
///
/// The ISR is the only writer of `value`. `is_new` is published after
/// `value` and consumed with a swap, so a change that lands while the main
/// loop is printing stays flagged for the next poll.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU32,
    is_new: AtomicBool,
}

impl Counter {
    pub const fn new() -> Self {
        Self {
            value: AtomicU32::new(0),
            is_new: AtomicBool::new(false),
        }
    }

    /// Adds one tick, flags the change and returns the new value.
    pub fn increment(&self) -> u32 {
        let value = self.value.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        self.is_new.store(true, Ordering::Release);
        value
    }

    pub fn value(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }

    pub fn is_new(&self) -> bool {
        self.is_new.load(Ordering::Acquire)
    }

    /// Clears the change flag, returning whether it was set.
    pub fn take_new(&self) -> bool {
        self.is_new.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_flags_every_change() {
        let counter = Counter::new();
        assert_eq!(counter.value(), 0);
        assert!(!counter.is_new());

        for n in 1..=25 {
            assert_eq!(counter.increment(), n);
            assert!(counter.is_new());
            assert_eq!(counter.value(), n);
        }
    }

    #[test]
    fn test_take_new_consumes_once() {
        let counter = Counter::new();
        counter.increment();
        counter.increment();

        assert!(counter.take_new());
        assert!(!counter.take_new());
        assert!(!counter.is_new());
        assert_eq!(counter.value(), 2, "clearing the flag leaves the value alone");
    }
}
