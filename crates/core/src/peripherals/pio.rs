// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::signals::DigitalLevel;
use crate::SimResult;

/// Direction register: a set bit drives the pin as an output.
pub const DIRECTION_REG: u64 = 0x00;
/// Pin read port: output pins show the latch, input pins the external level.
pub const PINS_REG: u64 = 0x01;
/// Output data latch.
pub const DATA_REG: u64 = 0x02;

/// Byte-wide parallel I/O port as used for the board's LED bank.
#[derive(Debug, Default, serde::Serialize)]
pub struct ParallelIo {
    width: u8,
    direction: u8,
    data: u8,
    input: u8,
}

impl ParallelIo {
    pub fn new(width: u8) -> Self {
        Self {
            width: width.clamp(1, 8),
            ..Default::default()
        }
    }

    fn mask(&self) -> u8 {
        if self.width >= 8 {
            0xFF
        } else {
            (1u8 << self.width) - 1
        }
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn direction(&self) -> u8 {
        self.direction
    }

    pub fn data(&self) -> u8 {
        self.data
    }

    /// Drives the external side of the input pins.
    pub fn set_input(&mut self, levels: u8) {
        self.input = levels & self.mask();
    }

    pub fn pins(&self) -> u8 {
        ((self.data & self.direction) | (self.input & !self.direction)) & self.mask()
    }

    /// Pattern currently driven onto the output pins.
    pub fn output_pattern(&self) -> u8 {
        self.data & self.direction & self.mask()
    }

    pub fn pin_level(&self, pin: u8) -> DigitalLevel {
        if pin >= self.width {
            return DigitalLevel::Low;
        }
        DigitalLevel::from((self.pins() >> pin) & 1 != 0)
    }
}

impl crate::Peripheral for ParallelIo {
    fn read(&self, offset: u64) -> SimResult<u8> {
        Ok(match offset {
            DIRECTION_REG => self.direction,
            PINS_REG => self.pins(),
            DATA_REG => self.data,
            _ => 0,
        })
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        match offset {
            DIRECTION_REG => self.direction = value & self.mask(),
            DATA_REG => self.data = value & self.mask(),
            PINS_REG => tracing::trace!("PIO: write to read-only pin port ignored ({:#04x})", value),
            _ => {}
        }
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
