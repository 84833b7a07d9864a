// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! The demo's `main()`: set the board up, count timer ticks to
//! [`COUNT_MAX`], then print the performance counter report.

use std::sync::Arc;

use irqlab_core::drivers::perf;
use irqlab_core::hal::{Hal, IrqContext};
use irqlab_core::hal_print;
use irqlab_core::peripherals::timer::{TimerControl, CONTROL_REG, STATUS_REG};
use irqlab_core::SimResult;

use crate::counter::Counter;
use crate::isr::TimerIsr;
use crate::leds::init_pio_leds;
use crate::system::{PERFORMANCE_COUNTER_0_BASE, TIMER_0_BASE, TIMER_0_IRQ};
use crate::{CLEAR_IRQ, COUNT_MAX};

/// Report label of each user segment, starting at segment 1 (the ISR).
const PERF_SECTION_LABELS: [&str; 1] = ["ISR"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    /// Timer running, interrupts still masked; holds the state to restore.
    Armed(IrqContext),
    Running,
    Reporting,
    Done,
}

pub struct ControlLoop {
    phase: Phase,
    counter: Arc<Counter>,
}

impl Default for ControlLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlLoop {
    pub fn new() -> Self {
        Self {
            phase: Phase::Setup,
            counter: Arc::new(Counter::new()),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn counter(&self) -> &Arc<Counter> {
        &self.counter
    }

    /// Runs until the report has been printed.
    pub fn run(&mut self, hal: &mut dyn Hal) -> SimResult<()> {
        while self.phase != Phase::Done {
            self.step(hal)?;
        }
        Ok(())
    }

    /// Performs one unit of work. In `Running` that is a single poll of the
    /// counter.
    pub fn step(&mut self, hal: &mut dyn Hal) -> SimResult<Phase> {
        let next = match self.phase {
            Phase::Setup => Phase::Armed(self.setup(hal)?),
            Phase::Armed(saved) => {
                hal.puts("Start measuring with performance counter")?;
                perf::perf_start_measuring(hal, PERFORMANCE_COUNTER_0_BASE)?;

                hal.puts("Enable all IRQs")?;
                hal.irq_enable_all(saved)?;
                Phase::Running
            }
            Phase::Running => self.poll(hal)?,
            Phase::Reporting => {
                hal.puts("Stop measuring with performance counter")?;
                perf::perf_stop_measuring(hal, PERFORMANCE_COUNTER_0_BASE)?;

                let clock_hz = hal.cpu_freq();
                perf::perf_print_formatted_report(
                    hal,
                    PERFORMANCE_COUNTER_0_BASE,
                    clock_hz,
                    &PERF_SECTION_LABELS,
                )?;
                Phase::Done
            }
            Phase::Done => Phase::Done,
        };

        if next != self.phase {
            tracing::debug!("Demo phase {:?} -> {:?}", self.phase, next);
            self.phase = next;
        }
        Ok(next)
    }

    fn setup(&mut self, hal: &mut dyn Hal) -> SimResult<IrqContext> {
        hal.puts("Reset performance counter")?;
        perf::perf_reset(hal, PERFORMANCE_COUNTER_0_BASE)?;

        hal.puts("IRQs disabled.")?;
        let saved = hal.irq_disable_all();

        hal.puts("Register timer IRQ handler...")?;
        let isr = TimerIsr::new(self.counter.clone());
        hal.irq_register(TIMER_0_IRQ, Some(Box::new(isr)))?;

        hal.puts("Clear pending timer IRQs...")?;
        hal.write_u16(TIMER_0_BASE + STATUS_REG, CLEAR_IRQ)?;

        hal.puts("Init PIO LEDs")?;
        init_pio_leds(hal)?;

        hal.puts("Configure timer...")?;
        let ctl = TimerControl::ITO | TimerControl::CONT | TimerControl::START;
        hal.write_u16(TIMER_0_BASE + CONTROL_REG, ctl.bits())?;

        hal.puts("Timer initialised and started!")?;
        Ok(saved)
    }

    fn poll(&mut self, hal: &mut dyn Hal) -> SimResult<Phase> {
        if self.counter.value() >= COUNT_MAX {
            // A tick that reached the threshold after the last poll is still
            // reported once.
            if self.counter.take_new() {
                self.report_value(hal)?;
            }
            return Ok(Phase::Reporting);
        }

        if self.counter.take_new() {
            self.report_value(hal)?;
        } else {
            hal.nop()?;
        }
        Ok(Phase::Running)
    }

    fn report_value(&self, hal: &mut dyn Hal) -> SimResult<()> {
        hal_print!(hal, "New counter value: {}\n", self.counter.value())
    }
}
