// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use bitflags::bitflags;

pub const STATUS_REG: u64 = 0x00;
pub const CONTROL_REG: u64 = 0x04;
pub const PERIODL_REG: u64 = 0x08;
pub const PERIODH_REG: u64 = 0x0C;
pub const SNAPL_REG: u64 = 0x10;
pub const SNAPH_REG: u64 = 0x14;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TimerStatus: u16 {
        /// Timeout: the counter reached zero. Any write to STATUS clears it.
        const TO = 1 << 0;
        const RUN = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TimerControl: u16 {
        /// Raise the IRQ line while TO is set.
        const ITO = 1 << 0;
        /// Reload and keep running after a timeout.
        const CONT = 1 << 1;
        const START = 1 << 2;
        const STOP = 1 << 3;
    }
}

/// Avalon-style interval timer with 16-bit registers on a 4-byte stride.
///
/// The counter runs down from `period` once per cycle; a timeout therefore
/// happens every `period + 1` cycles.
#[derive(Debug)]
pub struct Timer {
    status: TimerStatus,
    control: TimerControl,
    period: u32,
    counter: u32,
    snap: u32,
}

impl Timer {
    pub fn new(period: u32) -> Self {
        Self {
            status: TimerStatus::empty(),
            control: TimerControl::empty(),
            period,
            counter: period,
            snap: 0,
        }
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn control(&self) -> TimerControl {
        self.control
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    fn read_reg(&self, offset: u64) -> u16 {
        match offset {
            STATUS_REG => self.status.bits(),
            CONTROL_REG => self.control.bits(),
            PERIODL_REG => (self.period & 0xFFFF) as u16,
            PERIODH_REG => (self.period >> 16) as u16,
            SNAPL_REG => (self.snap & 0xFFFF) as u16,
            SNAPH_REG => (self.snap >> 16) as u16,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u64, value: u16) {
        match offset {
            STATUS_REG => self.status.remove(TimerStatus::TO),
            CONTROL_REG => {
                let ctl = TimerControl::from_bits_truncate(value);
                if ctl.contains(TimerControl::START) {
                    self.status.insert(TimerStatus::RUN);
                }
                if ctl.contains(TimerControl::STOP) {
                    self.status.remove(TimerStatus::RUN);
                }
                // START/STOP are strobes and read back as zero.
                self.control = ctl & (TimerControl::ITO | TimerControl::CONT);
            }
            // Writing either period half stops the timer and reloads the counter.
            PERIODL_REG => {
                self.period = (self.period & 0xFFFF_0000) | value as u32;
                self.counter = self.period;
                self.status.remove(TimerStatus::RUN);
            }
            PERIODH_REG => {
                self.period = (self.period & 0x0000_FFFF) | ((value as u32) << 16);
                self.counter = self.period;
                self.status.remove(TimerStatus::RUN);
            }
            SNAPL_REG | SNAPH_REG => self.snap = self.counter,
            _ => {}
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new(0xFFFF_FFFF)
    }
}

impl crate::Peripheral for Timer {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let reg_offset = offset & !3;
        let byte_offset = (offset % 4) as u32;
        if byte_offset > 1 {
            return Ok(0);
        }
        let reg_val = self.read_reg(reg_offset);
        Ok(((reg_val >> (byte_offset * 8)) & 0xFF) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let reg_offset = offset & !3;
        let byte_offset = (offset % 4) as u32;
        if byte_offset > 1 {
            return Ok(());
        }
        let mut reg_val = self.read_reg(reg_offset);

        let mask: u16 = 0xFF << (byte_offset * 8);
        reg_val &= !mask;
        reg_val |= (value as u16) << (byte_offset * 8);

        self.write_reg(reg_offset, reg_val);
        Ok(())
    }

    fn tick(&mut self) -> crate::PeripheralTickResult {
        if self.status.contains(TimerStatus::RUN) {
            if self.counter == 0 {
                self.counter = self.period;
                self.status.insert(TimerStatus::TO);
                if !self.control.contains(TimerControl::CONT) {
                    self.status.remove(TimerStatus::RUN);
                }
            } else {
                self.counter -= 1;
            }
        }

        // Level-sensitive: the line stays high until software clears TO.
        crate::PeripheralTickResult {
            irq: self.status.contains(TimerStatus::TO) && self.control.contains(TimerControl::ITO),
        }
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status.bits(),
            "control": self.control.bits(),
            "period": self.period,
            "counter": self.counter,
            "snap": self.snap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Peripheral;

    fn write16(tim: &mut Timer, offset: u64, value: u16) {
        tim.write(offset, (value & 0xFF) as u8).unwrap();
        tim.write(offset + 1, (value >> 8) as u8).unwrap();
    }

    fn start_continuous(tim: &mut Timer) {
        let ctl = TimerControl::ITO | TimerControl::CONT | TimerControl::START;
        write16(tim, CONTROL_REG, ctl.bits());
    }

    #[test]
    fn test_timeout_every_period_plus_one_cycles() {
        let mut tim = Timer::new(3);
        start_continuous(&mut tim);

        let fired: Vec<bool> = (0..8).map(|_| tim.tick().irq).collect();
        // Line stays asserted once TO latches because nobody clears it.
        assert_eq!(fired, [false, false, false, true, true, true, true, true]);
        assert!(tim.status().contains(TimerStatus::RUN));
    }

    #[test]
    fn test_status_write_clears_to_and_drops_irq() {
        let mut tim = Timer::new(0);
        start_continuous(&mut tim);
        assert!(tim.tick().irq);

        write16(&mut tim, STATUS_REG, 0x0000);
        assert_eq!(tim.read(STATUS_REG).unwrap() & 0x1, 0);
        assert_eq!(tim.read(STATUS_REG).unwrap() & 0x2, 0x2, "RUN survives the ack");
    }

    #[test]
    fn test_one_shot_stops_after_timeout() {
        let mut tim = Timer::new(1);
        write16(&mut tim, CONTROL_REG, (TimerControl::ITO | TimerControl::START).bits());
        tim.tick();
        assert!(tim.tick().irq);
        assert!(!tim.status().contains(TimerStatus::RUN));
    }

    #[test]
    fn test_irq_masked_without_ito() {
        let mut tim = Timer::new(0);
        write16(&mut tim, CONTROL_REG, (TimerControl::CONT | TimerControl::START).bits());
        assert!(!tim.tick().irq);
        assert!(tim.status().contains(TimerStatus::TO));
    }

    #[test]
    fn test_control_strobes_read_back_as_zero() {
        let mut tim = Timer::default();
        start_continuous(&mut tim);
        let ctl = tim.read(CONTROL_REG).unwrap() as u16;
        assert_eq!(ctl, (TimerControl::ITO | TimerControl::CONT).bits());

        write16(&mut tim, CONTROL_REG, TimerControl::STOP.bits());
        assert!(!tim.status().contains(TimerStatus::RUN));
    }

    #[test]
    fn test_period_write_stops_and_reloads() {
        let mut tim = Timer::new(100);
        start_continuous(&mut tim);
        tim.tick();

        write16(&mut tim, PERIODL_REG, 0x0010);
        write16(&mut tim, PERIODH_REG, 0x0001);
        assert_eq!(tim.period(), 0x0001_0010);
        assert!(!tim.status().contains(TimerStatus::RUN));

        write16(&mut tim, SNAPL_REG, 0);
        let lo = tim.read(SNAPL_REG).unwrap() as u32 | (tim.read(SNAPL_REG + 1).unwrap() as u32) << 8;
        let hi = tim.read(SNAPH_REG).unwrap() as u32 | (tim.read(SNAPH_REG + 1).unwrap() as u32) << 8;
        assert_eq!(lo | (hi << 16), 0x0001_0010);
    }
}
