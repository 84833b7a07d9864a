// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::collections::{HashMap, VecDeque};

use irqlab_core::hal::{Hal, IrqContext, IsrHandler};
use irqlab_core::peripherals::pio::{DATA_REG, DIRECTION_REG, PINS_REG};
use irqlab_core::SimResult;

use crate::system::{MYPIO_LEDS_BASE, TIMER_0_IRQ};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read(u64),
    Write(u64, u32),
}

/// Register-file HAL with interrupts fired on demand or from `nop`.
pub struct MockHal {
    regs: HashMap<u64, u8>,
    handlers: HashMap<u32, Box<dyn IsrHandler>>,
    pie: bool,
    pub ops: Vec<Op>,
    pub console: String,
    pub nops: u64,
    /// Timer interrupts to raise on each successive `nop`.
    pub schedule: VecDeque<u32>,
    /// Interrupts to raise on a `nop` once `schedule` is exhausted.
    pub per_nop: u32,
}

impl MockHal {
    pub fn new() -> Self {
        Self {
            regs: HashMap::new(),
            handlers: HashMap::new(),
            pie: true,
            ops: Vec::new(),
            console: String::new(),
            nops: 0,
            schedule: VecDeque::new(),
            per_nop: 0,
        }
    }

    pub fn reg(&self, addr: u64) -> u8 {
        self.regs.get(&addr).copied().unwrap_or(0)
    }

    pub fn has_handler(&self, id: u32) -> bool {
        self.handlers.contains_key(&id)
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.pie
    }

    /// Runs the handler for `id` the way the dispatcher would.
    pub fn fire(&mut self, id: u32) -> SimResult<bool> {
        if !self.pie {
            return Ok(false);
        }
        let Some(mut handler) = self.handlers.remove(&id) else {
            return Ok(false);
        };
        self.pie = false;
        let res = handler.handle(self, id);
        self.pie = true;
        self.handlers.entry(id).or_insert(handler);
        res.map(|()| true)
    }

    /// Values printed by the main loop, in order.
    pub fn reported_values(&self) -> Vec<u32> {
        self.console
            .lines()
            .filter_map(|l| l.strip_prefix("New counter value: "))
            .filter_map(|v| v.trim().parse().ok())
            .collect()
    }

    fn store(&mut self, addr: u64, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            self.regs.insert(addr + i as u64, *b);
        }
    }

    fn load(&self, addr: u64) -> u8 {
        // The LED port reads back its latch on output pins.
        if addr == MYPIO_LEDS_BASE + PINS_REG {
            return self.reg(MYPIO_LEDS_BASE + DATA_REG) & self.reg(MYPIO_LEDS_BASE + DIRECTION_REG);
        }
        self.reg(addr)
    }

    fn load_le(&mut self, addr: u64, len: u64) -> u32 {
        self.ops.push(Op::Read(addr));
        (0..len).fold(0, |acc, i| acc | (self.load(addr + i) as u32) << (8 * i))
    }

    fn store_le(&mut self, addr: u64, value: u32, len: usize) {
        self.ops.push(Op::Write(addr, value));
        let bytes = value.to_le_bytes();
        self.store(addr, &bytes[..len]);
    }
}

impl Hal for MockHal {
    fn read_u8(&mut self, addr: u64) -> SimResult<u8> {
        Ok(self.load_le(addr, 1) as u8)
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        self.store_le(addr, value as u32, 1);
        Ok(())
    }

    fn read_u16(&mut self, addr: u64) -> SimResult<u16> {
        Ok(self.load_le(addr, 2) as u16)
    }

    fn write_u16(&mut self, addr: u64, value: u16) -> SimResult<()> {
        self.store_le(addr, value as u32, 2);
        Ok(())
    }

    fn read_u32(&mut self, addr: u64) -> SimResult<u32> {
        Ok(self.load_le(addr, 4))
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        self.store_le(addr, value, 4);
        Ok(())
    }

    fn irq_disable_all(&mut self) -> IrqContext {
        let prev = if self.pie {
            IrqContext::ENABLED
        } else {
            IrqContext::DISABLED
        };
        self.pie = false;
        prev
    }

    fn irq_enable_all(&mut self, context: IrqContext) -> SimResult<()> {
        self.pie = context.interrupts_enabled();
        Ok(())
    }

    fn irq_register(&mut self, id: u32, handler: Option<Box<dyn IsrHandler>>) -> SimResult<()> {
        match handler {
            Some(h) => {
                self.handlers.insert(id, h);
            }
            None => {
                self.handlers.remove(&id);
            }
        }
        Ok(())
    }

    fn nop(&mut self) -> SimResult<()> {
        self.nops += 1;
        let n = self.schedule.pop_front().unwrap_or(self.per_nop);
        for _ in 0..n {
            self.fire(TIMER_0_IRQ)?;
        }
        Ok(())
    }

    fn cpu_freq(&self) -> u32 {
        50_000_000
    }

    fn write_console(&mut self, bytes: &[u8]) -> SimResult<()> {
        self.console.push_str(&String::from_utf8_lossy(bytes));
        Ok(())
    }
}
