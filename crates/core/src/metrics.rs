// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimulationObserver;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug)]
pub struct PerformanceMetrics {
    cycle_count: AtomicU64,
    io_reads: AtomicU64,
    io_writes: AtomicU64,
    irq_count: AtomicU64,
    irq_cycles: AtomicU64,
    start_time: Mutex<Instant>,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            cycle_count: AtomicU64::new(0),
            io_reads: AtomicU64::new(0),
            io_writes: AtomicU64::new(0),
            irq_count: AtomicU64::new(0),
            irq_cycles: AtomicU64::new(0),
            start_time: Mutex::new(Instant::now()),
        }
    }

    pub fn reset(&self) {
        self.cycle_count.store(0, Ordering::SeqCst);
        self.io_reads.store(0, Ordering::SeqCst);
        self.io_writes.store(0, Ordering::SeqCst);
        self.irq_count.store(0, Ordering::SeqCst);
        self.irq_cycles.store(0, Ordering::SeqCst);
    }

    pub fn get_cycles(&self) -> u64 {
        self.cycle_count.load(Ordering::SeqCst)
    }

    pub fn get_io_reads(&self) -> u64 {
        self.io_reads.load(Ordering::SeqCst)
    }

    pub fn get_io_writes(&self) -> u64 {
        self.io_writes.load(Ordering::SeqCst)
    }

    /// Number of handler invocations.
    pub fn get_interrupts(&self) -> u64 {
        self.irq_count.load(Ordering::SeqCst)
    }

    /// Cycles spent between interrupt entry and return, entry/exit overhead included.
    pub fn get_irq_cycles(&self) -> u64 {
        self.irq_cycles.load(Ordering::SeqCst)
    }

    pub fn get_avg_irq_cycles(&self) -> f64 {
        let n = self.get_interrupts();
        if n > 0 {
            self.get_irq_cycles() as f64 / n as f64
        } else {
            0.0
        }
    }

    /// Simulated cycles per host second since the last start.
    pub fn get_cycles_per_sec(&self) -> f64 {
        let elapsed = self
            .start_time
            .lock()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        if elapsed > 0.0 {
            self.get_cycles() as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl SimulationObserver for PerformanceMetrics {
    fn on_simulation_start(&self) {
        if let Ok(mut t) = self.start_time.lock() {
            *t = Instant::now();
        }
    }

    fn on_cycles(&self, cycles: u32) {
        self.cycle_count.fetch_add(cycles as u64, Ordering::SeqCst);
    }

    fn on_io_access(&self, _addr: u64, is_write: bool) {
        if is_write {
            self.io_writes.fetch_add(1, Ordering::SeqCst);
        } else {
            self.io_reads.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_irq_enter(&self, _irq: u32) {
        self.irq_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_irq_exit(&self, _irq: u32, cycles: u64) {
        self.irq_cycles.fetch_add(cycles, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irq_average() {
        let m = PerformanceMetrics::new();
        assert_eq!(m.get_avg_irq_cycles(), 0.0);

        m.on_irq_enter(0);
        m.on_irq_exit(0, 30);
        m.on_irq_enter(0);
        m.on_irq_exit(0, 50);
        assert_eq!(m.get_interrupts(), 2);
        assert_eq!(m.get_avg_irq_cycles(), 40.0);

        m.reset();
        assert_eq!(m.get_irq_cycles(), 0);
    }

    #[test]
    fn test_io_direction_split() {
        let m = PerformanceMetrics::new();
        m.on_io_access(0x10, true);
        m.on_io_access(0x10, false);
        m.on_io_access(0x14, false);
        m.on_cycles(7);
        assert_eq!(m.get_io_writes(), 1);
        assert_eq!(m.get_io_reads(), 2);
        assert_eq!(m.get_cycles(), 7);
    }
}
