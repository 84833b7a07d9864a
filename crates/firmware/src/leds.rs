// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use irqlab_core::hal::Hal;
use irqlab_core::peripherals::pio::{DATA_REG, DIRECTION_REG};
use irqlab_core::SimResult;

use crate::system::MYPIO_LEDS_BASE;

/// Drives every LED pin as an output and switches them all off.
pub fn init_pio_leds(hal: &mut dyn Hal) -> SimResult<()> {
    hal.write_u8(MYPIO_LEDS_BASE + DIRECTION_REG, 0xFF)?;
    hal.write_u8(MYPIO_LEDS_BASE + DATA_REG, 0x00)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_hal::{MockHal, Op};

    #[test]
    fn test_init_sets_outputs_then_clears_latch() {
        let mut hal = MockHal::new();
        init_pio_leds(&mut hal).unwrap();

        assert_eq!(
            hal.ops,
            vec![
                Op::Write(MYPIO_LEDS_BASE + DIRECTION_REG, 0xFF),
                Op::Write(MYPIO_LEDS_BASE + DATA_REG, 0x00),
            ]
        );
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut hal = MockHal::new();
        hal.write_u8(MYPIO_LEDS_BASE + DATA_REG, 0x5A).unwrap();

        init_pio_leds(&mut hal).unwrap();
        let once = (
            hal.reg(MYPIO_LEDS_BASE + DIRECTION_REG),
            hal.reg(MYPIO_LEDS_BASE + DATA_REG),
        );
        init_pio_leds(&mut hal).unwrap();
        let twice = (
            hal.reg(MYPIO_LEDS_BASE + DIRECTION_REG),
            hal.reg(MYPIO_LEDS_BASE + DATA_REG),
        );

        assert_eq!(once, (0xFF, 0x00));
        assert_eq!(once, twice);
    }
}
