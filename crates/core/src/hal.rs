// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Board support interface consumed by firmware.
//!
//! Mirrors what a soft-core vendor HAL offers bare-metal code: direct
//! register I/O, the interrupt controller primitives, an idle instruction,
//! the CPU clock and a character console. Firmware never sees the simulator
//! behind it.

use std::fmt;

use crate::SimResult;

pub use crate::interrupt::IrqContext;

/// An interrupt service routine together with the state it owns.
///
/// The handler table keeps the boxed handler alive for as long as it is
/// registered, so the state can never be dropped under a running ISR.
pub trait IsrHandler: Send {
    fn handle(&mut self, hal: &mut dyn Hal, id: u32) -> SimResult<()>;
}

impl<F> IsrHandler for F
where
    F: FnMut(&mut dyn Hal, u32) -> SimResult<()> + Send,
{
    fn handle(&mut self, hal: &mut dyn Hal, id: u32) -> SimResult<()> {
        self(hal, id)
    }
}

pub trait Hal {
    fn read_u8(&mut self, addr: u64) -> SimResult<u8>;
    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()>;
    fn read_u16(&mut self, addr: u64) -> SimResult<u16>;
    fn write_u16(&mut self, addr: u64, value: u16) -> SimResult<()>;
    fn read_u32(&mut self, addr: u64) -> SimResult<u32>;
    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()>;

    /// Masks all interrupts and returns the previous global enable state.
    fn irq_disable_all(&mut self) -> IrqContext;

    /// Restores the global enable state captured by [`Hal::irq_disable_all`].
    fn irq_enable_all(&mut self, context: IrqContext) -> SimResult<()>;

    /// Installs (`Some`) or removes (`None`) the handler for line `id` and
    /// enables or disables the line accordingly.
    fn irq_register(&mut self, id: u32, handler: Option<Box<dyn IsrHandler>>) -> SimResult<()>;

    /// One idle instruction.
    fn nop(&mut self) -> SimResult<()>;

    fn cpu_freq(&self) -> u32;

    fn write_console(&mut self, bytes: &[u8]) -> SimResult<()>;

    /// Writes `s` followed by a newline as one console write.
    fn puts(&mut self, s: &str) -> SimResult<()> {
        let mut line = Vec::with_capacity(s.len() + 1);
        line.extend_from_slice(s.as_bytes());
        line.push(b'\n');
        self.write_console(&line)
    }

    fn print_fmt(&mut self, args: fmt::Arguments<'_>) -> SimResult<()> {
        match args.as_str() {
            Some(s) => self.write_console(s.as_bytes()),
            None => self.write_console(args.to_string().as_bytes()),
        }
    }
}

/// `printf`-style console output through a [`Hal`].
#[macro_export]
macro_rules! hal_print {
    ($hal:expr, $($arg:tt)*) => {
        $crate::hal::Hal::print_fmt($hal, format_args!($($arg)*))
    };
}
