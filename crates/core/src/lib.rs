// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod drivers;
pub mod hal;
pub mod interrupt;
pub mod metrics;
pub mod peripherals;
pub mod signals;
pub mod snapshot;
pub mod system;

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hal::{Hal, IsrHandler};
use interrupt::{InternalInterruptController, InterruptController, IrqContext, IRQ_LINES};
use irqlab_config::TimingConfig;


/// Default Nios II/e clock of the lab board.
pub const DEFAULT_CPU_FREQ_HZ: u32 = 50_000_000;

/// Wall-clock checks are amortized over this many simulated cycles.
const WALL_CHECK_INTERVAL: u64 = 4096;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Interrupt line {0} out of range")]
    InvalidIrq(u32),
    #[error("Cycle limit reached ({0} cycles)")]
    CycleLimit(u64),
    #[error("Console output limit reached ({0} bytes)")]
    ConsoleLimit(u64),
    #[error("Wall-time limit reached ({0} ms)")]
    WallTime(u64),
}

pub type SimResult<T> = Result<T, SimulationError>;

#[derive(Debug, Clone, Copy, Default)]
pub struct PeripheralTickResult {
    /// Level of the peripheral's interrupt output after this cycle.
    pub irq: bool,
}

/// Trait for observing simulation events in a modular way.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_simulation_start(&self) {}
    fn on_simulation_stop(&self) {}
    fn on_cycles(&self, _cycles: u32) {}
    fn on_io_access(&self, _addr: u64, _is_write: bool) {}
    fn on_irq_enter(&self, _irq: u32) {}
    fn on_irq_exit(&self, _irq: u32, _cycles: u64) {}
}

/// Trait representing a memory-mapped peripheral
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&self, offset: u64) -> SimResult<u8>;
    fn write(&mut self, offset: u64, value: u8) -> SimResult<()>;
    fn tick(&mut self) -> PeripheralTickResult {
        PeripheralTickResult::default()
    }
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Trait representing the system bus
pub trait Bus {
    fn read_u8(&self, addr: u64) -> SimResult<u8>;
    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()>;

    fn read_u16(&self, addr: u64) -> SimResult<u16> {
        let b0 = self.read_u8(addr)? as u16;
        let b1 = self.read_u8(addr + 1)? as u16;
        // Little Endian
        Ok(b0 | (b1 << 8))
    }

    fn read_u32(&self, addr: u64) -> SimResult<u32> {
        let b0 = self.read_u8(addr)? as u32;
        let b1 = self.read_u8(addr + 1)? as u32;
        let b2 = self.read_u8(addr + 2)? as u32;
        let b3 = self.read_u8(addr + 3)? as u32;
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(addr + 1, ((value >> 8) & 0xFF) as u8)?;
        self.write_u8(addr + 2, ((value >> 16) & 0xFF) as u8)?;
        self.write_u8(addr + 3, ((value >> 24) & 0xFF) as u8)?;
        Ok(())
    }

    fn write_u16(&mut self, addr: u64, value: u16) -> SimResult<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(addr + 1, ((value >> 8) & 0xFF) as u8)?;
        Ok(())
    }
}

/// Conditions under which a running machine gives up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopConditions {
    pub max_cycles: Option<u64>,
    pub max_console_bytes: Option<u64>,
    pub wall_time: Option<Duration>,
}

/// A single-core soft-CPU board.
///
/// Firmware runs natively against the [`Hal`] implementation below. Every
/// HAL call retires a number of simulated cycles (see [`TimingConfig`]);
/// peripherals are ticked once per cycle. Interrupts are taken at HAL call
/// boundaries in foreground context, never while a handler is running.
pub struct Machine {
    pub bus: bus::SystemBus,
    pub iic: InternalInterruptController,
    pub timing: TimingConfig,
    pub cpu_freq_hz: u32,
    pub observers: Vec<Arc<dyn SimulationObserver>>,
    pub stop_conditions: StopConditions,
    pub total_cycles: u64,
    pub console_bytes: u64,

    handlers: Vec<Option<Box<dyn IsrHandler>>>,
    active_irq: Option<u32>,
    active_slot_replaced: bool,
    started_at: Option<Instant>,
}

impl Machine {
    pub fn new(bus: bus::SystemBus) -> Self {
        Self::with_timing(bus, TimingConfig::default(), DEFAULT_CPU_FREQ_HZ)
    }

    pub fn with_timing(bus: bus::SystemBus, timing: TimingConfig, cpu_freq_hz: u32) -> Self {
        let iic = InternalInterruptController::new();
        // The runtime start-up code enables PIE before handing over to main().
        iic.restore(IrqContext::ENABLED);

        Self {
            bus,
            iic,
            timing,
            cpu_freq_hz,
            observers: Vec::new(),
            stop_conditions: StopConditions::default(),
            total_cycles: 0,
            console_bytes: 0,
            handlers: (0..IRQ_LINES).map(|_| None).collect(),
            active_irq: None,
            active_slot_replaced: false,
            started_at: None,
        }
    }

    pub fn from_config(
        chip: &irqlab_config::ChipDescriptor,
        manifest: &irqlab_config::SystemManifest,
    ) -> anyhow::Result<Self> {
        let bus = bus::SystemBus::from_config(chip, manifest)?;
        Ok(Self::with_timing(bus, chip.timing, chip.cpu_freq_hz))
    }

    /// Runs `entry` as the board's `main()` and reports start/stop to observers.
    pub fn run<F>(&mut self, entry: F) -> SimResult<()>
    where
        F: FnOnce(&mut dyn Hal) -> SimResult<()>,
    {
        self.started_at = Some(Instant::now());
        for observer in &self.observers {
            observer.on_simulation_start();
        }
        tracing::info!("Entering firmware main() at cycle {}", self.total_cycles);

        let res = entry(self);

        for observer in &self.observers {
            observer.on_simulation_stop();
        }
        match &res {
            Ok(()) => tracing::info!("Firmware returned after {} cycles", self.total_cycles),
            Err(e) => tracing::info!("Firmware stopped at cycle {}: {}", self.total_cycles, e),
        }
        res
    }

    /// Currently executing interrupt line, if in handler context.
    pub fn active_irq(&self) -> Option<u32> {
        self.active_irq
    }

    pub fn has_handler(&self, irq: u32) -> bool {
        self.handlers
            .get(irq as usize)
            .is_some_and(|slot| slot.is_some())
    }

    pub fn snapshot(&self) -> snapshot::MachineSnapshot {
        snapshot::MachineSnapshot {
            total_cycles: self.total_cycles,
            interrupts: self.iic.snapshot(),
            peripherals: self
                .bus
                .peripherals
                .iter()
                .map(|p| (p.name.clone(), p.dev.snapshot()))
                .collect(),
        }
    }

    pub fn peek_peripheral(&self, name: &str) -> Option<serde_json::Value> {
        self.bus.peek_peripheral(name)
    }

    /// Advances simulated time without taking interrupts.
    fn advance(&mut self, cycles: u32) -> SimResult<()> {
        for _ in 0..cycles {
            let lines = self.bus.tick_peripherals();
            self.iic.set_lines(lines);
            self.total_cycles += 1;

            if self.total_cycles % WALL_CHECK_INTERVAL == 0 {
                self.check_wall_time()?;
            }
        }

        // Zero-cost operations still have to honour the wall clock.
        if cycles == 0 {
            self.check_wall_time()?;
        }

        for observer in &self.observers {
            observer.on_cycles(cycles);
        }

        if let Some(limit) = self.stop_conditions.max_cycles {
            if self.total_cycles >= limit {
                return Err(SimulationError::CycleLimit(limit));
            }
        }
        Ok(())
    }

    fn check_wall_time(&self) -> SimResult<()> {
        if let (Some(limit), Some(started)) = (self.stop_conditions.wall_time, self.started_at) {
            if started.elapsed() >= limit {
                return Err(SimulationError::WallTime(limit.as_millis() as u64));
            }
        }
        Ok(())
    }

    /// Retires `cycles` and, in foreground context, services pending interrupts.
    fn retire(&mut self, cycles: u32) -> SimResult<()> {
        self.advance(cycles)?;
        if self.active_irq.is_none() {
            self.service_interrupts()?;
        }
        Ok(())
    }

    fn service_interrupts(&mut self) -> SimResult<()> {
        while let Some(irq) = self.iic.acknowledge_interrupt() {
            let Some(mut handler) = self.handlers[irq as usize].take() else {
                tracing::warn!("Spurious interrupt {} without handler; masking line", irq);
                self.iic.disable(irq);
                self.iic.complete_interrupt(irq);
                continue;
            };

            tracing::debug!("IRQ {} taken at cycle {}", irq, self.total_cycles);
            for observer in &self.observers {
                observer.on_irq_enter(irq);
            }
            let entered_at = self.total_cycles;
            self.active_irq = Some(irq);
            self.active_slot_replaced = false;

            let mut res = self.advance(self.timing.irq_entry);
            if res.is_ok() {
                res = handler.handle(self, irq);
            }
            if res.is_ok() {
                res = self.advance(self.timing.irq_exit);
            }

            if !self.active_slot_replaced {
                self.handlers[irq as usize] = Some(handler);
            }
            self.active_irq = None;
            self.iic.complete_interrupt(irq);

            let spent = self.total_cycles - entered_at;
            for observer in &self.observers {
                observer.on_irq_exit(irq, spent);
            }
            tracing::debug!("IRQ {} returned after {} cycles", irq, spent);
            res?;
        }
        Ok(())
    }

    fn note_io(&self, addr: u64, is_write: bool) {
        for observer in &self.observers {
            observer.on_io_access(addr, is_write);
        }
    }
}

impl Hal for Machine {
    fn read_u8(&mut self, addr: u64) -> SimResult<u8> {
        let val = Bus::read_u8(&self.bus, addr)?;
        self.note_io(addr, false);
        self.retire(self.timing.io_access)?;
        Ok(val)
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        Bus::write_u8(&mut self.bus, addr, value)?;
        self.note_io(addr, true);
        self.retire(self.timing.io_access)
    }

    fn read_u16(&mut self, addr: u64) -> SimResult<u16> {
        let val = Bus::read_u16(&self.bus, addr)?;
        self.note_io(addr, false);
        self.retire(self.timing.io_access)?;
        Ok(val)
    }

    fn write_u16(&mut self, addr: u64, value: u16) -> SimResult<()> {
        Bus::write_u16(&mut self.bus, addr, value)?;
        self.note_io(addr, true);
        self.retire(self.timing.io_access)
    }

    fn read_u32(&mut self, addr: u64) -> SimResult<u32> {
        let val = Bus::read_u32(&self.bus, addr)?;
        self.note_io(addr, false);
        self.retire(self.timing.io_access)?;
        Ok(val)
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        Bus::write_u32(&mut self.bus, addr, value)?;
        self.note_io(addr, true);
        self.retire(self.timing.io_access)
    }

    fn irq_disable_all(&mut self) -> IrqContext {
        self.iic.disable_all()
    }

    fn irq_enable_all(&mut self, context: IrqContext) -> SimResult<()> {
        self.iic.restore(context);
        self.retire(self.timing.nop)
    }

    fn irq_register(&mut self, id: u32, handler: Option<Box<dyn IsrHandler>>) -> SimResult<()> {
        if id >= IRQ_LINES {
            return Err(SimulationError::InvalidIrq(id));
        }

        let enable = handler.is_some();
        self.handlers[id as usize] = handler;
        if self.active_irq == Some(id) {
            self.active_slot_replaced = true;
        }

        if enable {
            self.iic.enable(id);
            tracing::debug!("Handler registered for IRQ {}", id);
        } else {
            self.iic.disable(id);
            tracing::debug!("Handler removed for IRQ {}", id);
        }
        self.retire(self.timing.io_access)
    }

    fn nop(&mut self) -> SimResult<()> {
        self.retire(self.timing.nop)
    }

    fn cpu_freq(&self) -> u32 {
        self.cpu_freq_hz
    }

    fn write_console(&mut self, bytes: &[u8]) -> SimResult<()> {
        // A console write is never split by an interrupt; pending lines are
        // serviced once the whole buffer has been pushed out.
        match self.bus.stdout {
            Some(base) => {
                for &b in bytes {
                    Bus::write_u8(&mut self.bus, base, b)?;
                    self.advance(self.timing.console_byte)?;
                }
            }
            None => tracing::trace!("No stdout device; dropping {} bytes", bytes.len()),
        }

        self.console_bytes += bytes.len() as u64;
        if let Some(limit) = self.stop_conditions.max_console_bytes {
            if self.console_bytes >= limit {
                return Err(SimulationError::ConsoleLimit(limit));
            }
        }

        self.retire(0)
    }
}
