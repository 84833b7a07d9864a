// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::interrupt::IRQ_LINES;
use crate::peripherals::jtag_uart::JtagUart;
use crate::peripherals::perf_counter::PerformanceCounter;
use crate::peripherals::pio::ParallelIo;
use crate::peripherals::timer::Timer;
use crate::{Peripheral, SimResult, SimulationError};
use anyhow::Context;
use irqlab_config::{parse_size, ChipDescriptor, SystemManifest};
use std::sync::{Arc, Mutex};

/// Timer period of the built-in board: 1 ms at 50 MHz.
pub const DEFAULT_TIMER_PERIOD: u32 = 49_999;
pub const DEFAULT_PERF_SECTIONS: usize = 3;
/// Hardware limit of the Avalon performance counter core.
pub const MAX_PERF_SECTIONS: usize = 7;

pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub irq: Option<u32>,
    pub dev: Box<dyn Peripheral>,
}

pub struct SystemBus {
    pub peripherals: Vec<PeripheralEntry>,
    /// Base address of the console data register.
    pub stdout: Option<u64>,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    /// The lab board: interval timer, JTAG UART, LED PIO and performance counter.
    pub fn new() -> Self {
        Self {
            peripherals: vec![
                PeripheralEntry {
                    name: "timer_0".to_string(),
                    base: 0x0800_1000,
                    size: 0x20,
                    irq: Some(0),
                    dev: Box::new(Timer::new(DEFAULT_TIMER_PERIOD)),
                },
                PeripheralEntry {
                    name: "jtag_uart_0".to_string(),
                    base: 0x0800_1040,
                    size: 0x8,
                    irq: Some(1),
                    dev: Box::new(JtagUart::new()),
                },
                PeripheralEntry {
                    name: "mypio_leds".to_string(),
                    base: 0x0800_1060,
                    size: 0x10,
                    irq: None,
                    dev: Box::new(ParallelIo::new(8)),
                },
                PeripheralEntry {
                    name: "performance_counter_0".to_string(),
                    base: 0x0800_1100,
                    size: 0x40,
                    irq: None,
                    dev: Box::new(PerformanceCounter::new(DEFAULT_PERF_SECTIONS)),
                },
            ],
            stdout: Some(0x0800_1040),
        }
    }

    /// A bus with no devices mapped.
    pub fn empty() -> Self {
        Self {
            peripherals: Vec::new(),
            stdout: None,
        }
    }

    /// Attach a console capture sink to any JTAG UART on this bus.
    ///
    /// When `echo_stdout` is false, console writes will no longer be printed to stdout.
    pub fn attach_console_sink(&mut self, sink: Arc<Mutex<Vec<u8>>>, echo_stdout: bool) {
        for p in &mut self.peripherals {
            let Some(any) = p.dev.as_any_mut() else {
                continue;
            };
            let Some(uart) = any.downcast_mut::<JtagUart>() else {
                continue;
            };
            uart.set_sink(Some(sink.clone()), echo_stdout);
        }
    }

    pub fn from_config(chip: &ChipDescriptor, manifest: &SystemManifest) -> anyhow::Result<Self> {
        chip.validate()?;

        let mut bus = Self::empty();
        let mut first_console = None;

        for p_cfg in &chip.peripherals {
            let dev: Box<dyn Peripheral> = match p_cfg.r#type.as_str() {
                "timer" => {
                    let period = p_cfg
                        .config_u64("period")?
                        .unwrap_or(DEFAULT_TIMER_PERIOD as u64);
                    let period = u32::try_from(period).with_context(|| {
                        format!("Timer '{}': period {} exceeds 32 bits", p_cfg.id, period)
                    })?;
                    Box::new(Timer::new(period))
                }
                "pio" => {
                    let width = p_cfg.config_u64("width")?.unwrap_or(8);
                    if !(1..=8).contains(&width) {
                        anyhow::bail!("PIO '{}': width {} outside 1..=8", p_cfg.id, width);
                    }
                    let mut pio = ParallelIo::new(width as u8);
                    if let Some(input) = p_cfg.config_u64("input")? {
                        let input = u8::try_from(input).with_context(|| {
                            format!("PIO '{}': input {} exceeds 8 bits", p_cfg.id, input)
                        })?;
                        pio.set_input(input);
                    }
                    Box::new(pio)
                }
                "performance_counter" => {
                    let sections = p_cfg
                        .config_u64("segments")?
                        .unwrap_or(DEFAULT_PERF_SECTIONS as u64);
                    if sections > MAX_PERF_SECTIONS as u64 {
                        anyhow::bail!(
                            "Performance counter '{}': {} segments, at most {} supported",
                            p_cfg.id,
                            sections,
                            MAX_PERF_SECTIONS
                        );
                    }
                    Box::new(PerformanceCounter::new(sections as usize))
                }
                "jtag_uart" => {
                    first_console.get_or_insert(p_cfg.base_address);
                    Box::new(JtagUart::new())
                }
                other => {
                    tracing::warn!(
                        "Unsupported peripheral type '{}' for id '{}'; skipping",
                        other,
                        p_cfg.id
                    );
                    continue;
                }
            };

            // Map peripheral window size from descriptor when provided.
            let size = if let Some(size) = &p_cfg.size {
                parse_size(size)
                    .with_context(|| format!("Peripheral '{}': invalid size", p_cfg.id))?
            } else {
                0x40
            };

            bus.peripherals.push(PeripheralEntry {
                name: p_cfg.id.clone(),
                base: p_cfg.base_address,
                size,
                irq: p_cfg.irq,
                dev,
            });
        }

        bus.stdout = match &manifest.stdout {
            Some(id) => {
                let entry = bus
                    .peripherals
                    .iter()
                    .find(|p| &p.name == id)
                    .ok_or_else(|| anyhow::anyhow!("stdout device '{}' is not on the bus", id))?;
                Some(entry.base)
            }
            None => first_console,
        };

        Ok(bus)
    }

    pub fn find_peripheral(&self, name: &str) -> Option<&PeripheralEntry> {
        self.peripherals.iter().find(|p| p.name == name)
    }

    /// Typed access to a named device, e.g. the LED port for a board view.
    pub fn device<T: 'static>(&self, name: &str) -> Option<&T> {
        self.find_peripheral(name)?
            .dev
            .as_any()?
            .downcast_ref::<T>()
    }

    pub fn peek_peripheral(&self, name: &str) -> Option<serde_json::Value> {
        self.find_peripheral(name).map(|p| p.dev.snapshot())
    }

    /// Ticks every device once and returns the level of each interrupt line.
    pub fn tick_peripherals(&mut self) -> u32 {
        let mut lines = 0u32;
        for p in &mut self.peripherals {
            let res = p.dev.tick();
            if res.irq {
                if let Some(irq) = p.irq.filter(|irq| *irq < IRQ_LINES) {
                    lines |= 1 << irq;
                }
            }
        }
        lines
    }
}

impl crate::Bus for SystemBus {
    fn read_u8(&self, addr: u64) -> SimResult<u8> {
        for p in &self.peripherals {
            if addr >= p.base && addr < p.base + p.size {
                return p.dev.read(addr - p.base);
            }
        }

        Err(SimulationError::MemoryViolation(addr))
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        for p in &mut self.peripherals {
            if addr >= p.base && addr < p.base + p.size {
                tracing::trace!("{}[{:#x}] <- {:#04x}", p.name, addr - p.base, value);
                return p.dev.write(addr - p.base, value);
            }
        }

        Err(SimulationError::MemoryViolation(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bus;
    use std::path::PathBuf;

    #[test]
    fn test_system_bus_from_config() {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let chip_path = root.join("tests/fixtures/test_chip.yaml");
        let manifest_path = root.join("tests/fixtures/test_system.yaml");

        let chip = ChipDescriptor::from_file(&chip_path).unwrap();
        let manifest = SystemManifest::from_file(&manifest_path).unwrap();

        let mut bus =
            SystemBus::from_config(&chip, &manifest).expect("Failed to create bus from config");

        let leds = bus.find_peripheral("leds").expect("leds not found");
        assert_eq!(leds.base, 0x10000);
        assert_eq!(leds.size, 16);
        assert_eq!(bus.stdout, Some(0x20000));

        let timer = bus.device::<Timer>("timer").expect("timer not found");
        assert_eq!(timer.period(), 99);

        bus.write_u8(0x10002, 0x3C).unwrap();
        assert_eq!(bus.device::<ParallelIo>("leds").unwrap().width(), 4);
        assert_eq!(bus.read_u8(0x10002).unwrap(), 0x3C & 0x0F);
    }

    #[test]
    fn test_unmapped_access_faults() {
        let mut bus = SystemBus::new();
        assert_eq!(
            bus.read_u8(0x0900_0000),
            Err(SimulationError::MemoryViolation(0x0900_0000))
        );
        assert!(bus.write_u16(0x0000_0000, 1).is_err());
    }

    #[test]
    fn test_unknown_stdout_rejected() {
        let chip: ChipDescriptor = serde_yaml::from_str(
            r#"
name: "no-console"
arch: "nios2"
peripherals: []
"#,
        )
        .unwrap();
        let manifest: SystemManifest = serde_yaml::from_str(
            r#"
name: "sys"
chip: "chip.yaml"
stdout: "jtag_uart_0"
"#,
        )
        .unwrap();
        let err = SystemBus::from_config(&chip, &manifest).err().unwrap();
        assert!(err.to_string().contains("jtag_uart_0"));
    }

    fn chip_with(peripheral: &str) -> ChipDescriptor {
        let yaml = format!(
            "name: \"bounds\"\narch: \"nios2\"\nperipherals:\n{}",
            peripheral
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    fn manifest() -> SystemManifest {
        serde_yaml::from_str("name: \"sys\"\nchip: \"chip.yaml\"\n").unwrap()
    }

    #[test]
    fn test_out_of_range_pio_values_rejected() {
        let wide_input = chip_with(
            "  - id: \"leds\"\n    type: \"pio\"\n    base_address: 0x0\n    config:\n      input: 300\n",
        );
        let err = SystemBus::from_config(&wide_input, &manifest()).err().unwrap();
        assert!(format!("{:#}", err).contains("input 300"));

        let too_wide = chip_with(
            "  - id: \"leds\"\n    type: \"pio\"\n    base_address: 0x0\n    config:\n      width: 12\n",
        );
        assert!(SystemBus::from_config(&too_wide, &manifest()).is_err());
    }

    #[test]
    fn test_excessive_perf_segments_rejected() {
        let chip = chip_with(
            "  - id: \"perf\"\n    type: \"performance_counter\"\n    base_address: 0x0\n    config:\n      segments: 1000000000000\n",
        );
        let err = SystemBus::from_config(&chip, &manifest()).err().unwrap();
        assert!(err.to_string().contains("at most 7"));

        let chip = chip_with(
            "  - id: \"perf\"\n    type: \"performance_counter\"\n    base_address: 0x0\n    config:\n      segments: 7\n",
        );
        let bus = SystemBus::from_config(&chip, &manifest()).unwrap();
        assert_eq!(bus.device::<PerformanceCounter>("perf").unwrap().sections(), 7);
    }

    #[test]
    fn test_timer_line_reported_on_its_irq() {
        let mut bus = SystemBus::new();
        bus.write_u16(0x0800_1008, 0).unwrap(); // periodl
        bus.write_u16(0x0800_100C, 0).unwrap(); // periodh
        bus.write_u16(0x0800_1004, 0x7).unwrap(); // ITO | CONT | START
        assert_eq!(bus.tick_peripherals(), 1 << 0);
    }
}
