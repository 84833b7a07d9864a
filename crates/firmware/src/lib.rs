// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Timer interrupt demo for the Nios II lab board.
//!
//! The interval timer fires every millisecond; its handler bumps a shared
//! [`Counter`], mirrors the low byte on the LEDs and is timed by segment 1
//! of the performance counter. `main` prints every new count until
//! [`COUNT_MAX`] and then the performance counter report.

pub mod control;
pub mod counter;
pub mod isr;
pub mod leds;
pub mod system;

#[cfg(test)]
mod mock_hal;

use irqlab_core::hal::Hal;
use irqlab_core::SimResult;

pub use control::{ControlLoop, Phase};
pub use counter::Counter;
pub use isr::TimerIsr;

/// Written to the timer status register to acknowledge a timeout.
pub const CLEAR_IRQ: u16 = 0x0000;
/// Number of timer ticks to count before reporting.
pub const COUNT_MAX: u32 = 1000;
pub const PERFORMANCE_COUNTER_SEG_ISR: u32 = 1;

pub fn main(hal: &mut dyn Hal) -> SimResult<()> {
    ControlLoop::new().run(hal)
}
