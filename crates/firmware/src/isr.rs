// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::sync::Arc;

use irqlab_core::drivers::perf::{perf_begin, perf_end};
use irqlab_core::hal::{Hal, IsrHandler};
use irqlab_core::hal_print;
use irqlab_core::peripherals::pio::{DATA_REG, PINS_REG};
use irqlab_core::peripherals::timer::STATUS_REG;
use irqlab_core::SimResult;

use crate::counter::Counter;
use crate::system::{MYPIO_LEDS_BASE, PERFORMANCE_COUNTER_0_BASE, TIMER_0_BASE};
use crate::{CLEAR_IRQ, PERFORMANCE_COUNTER_SEG_ISR};

/// Timer tick handler. Owns a reference to the main loop's [`Counter`].
pub struct TimerIsr {
    counter: Arc<Counter>,
}

impl TimerIsr {
    pub fn new(counter: Arc<Counter>) -> Self {
        Self { counter }
    }
}

impl IsrHandler for TimerIsr {
    fn handle(&mut self, hal: &mut dyn Hal, _id: u32) -> SimResult<()> {
        perf_begin(hal, PERFORMANCE_COUNTER_0_BASE, PERFORMANCE_COUNTER_SEG_ISR)?;

        let value = self.counter.increment();

        // LEDs show the low byte of the tick count.
        hal.write_u8(MYPIO_LEDS_BASE + DATA_REG, value as u8)?;
        let pins = hal.read_u8(MYPIO_LEDS_BASE + PINS_REG)?;
        hal_print!(hal, "New pin value: {}\r\n", pins)?;

        hal.write_u16(TIMER_0_BASE + STATUS_REG, CLEAR_IRQ)?;
        perf_end(hal, PERFORMANCE_COUNTER_0_BASE, PERFORMANCE_COUNTER_SEG_ISR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leds::init_pio_leds;
    use crate::mock_hal::{MockHal, Op};
    use crate::system::TIMER_0_IRQ;

    const SEG_ISR: u64 = PERFORMANCE_COUNTER_0_BASE + 0x10;

    #[test]
    fn test_handler_sequence() {
        let mut hal = MockHal::new();
        init_pio_leds(&mut hal).unwrap();
        hal.ops.clear();

        let counter = Arc::new(Counter::new());
        let mut isr = TimerIsr::new(counter.clone());
        isr.handle(&mut hal, TIMER_0_IRQ).unwrap();

        assert_eq!(
            hal.ops,
            vec![
                Op::Write(SEG_ISR + 4, 0),
                Op::Write(MYPIO_LEDS_BASE + DATA_REG, 1),
                Op::Read(MYPIO_LEDS_BASE + PINS_REG),
                Op::Write(TIMER_0_BASE + STATUS_REG, CLEAR_IRQ as u32),
                Op::Write(SEG_ISR, 0),
            ]
        );
        assert_eq!(hal.console, "New pin value: 1\r\n");
    }

    #[test]
    fn test_each_firing_adds_exactly_one() {
        let mut hal = MockHal::new();
        let counter = Arc::new(Counter::new());
        hal.irq_register(TIMER_0_IRQ, Some(Box::new(TimerIsr::new(counter.clone()))))
            .unwrap();

        for n in 1..=300u32 {
            assert!(hal.fire(TIMER_0_IRQ).unwrap());
            assert_eq!(counter.value(), n);
            assert!(counter.is_new());
        }
    }

    #[test]
    fn test_leds_carry_low_byte() {
        let mut hal = MockHal::new();
        init_pio_leds(&mut hal).unwrap();
        let counter = Arc::new(Counter::new());
        let mut isr = TimerIsr::new(counter.clone());

        for _ in 0..1000 {
            isr.handle(&mut hal, TIMER_0_IRQ).unwrap();
        }

        assert_eq!(hal.reg(MYPIO_LEDS_BASE + DATA_REG), (1000 % 256) as u8);
        assert!(hal.console.ends_with("New pin value: 232\r\n"));
    }
}
