// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Number of interrupt lines of the internal interrupt controller.
pub const IRQ_LINES: u32 = 32;

/// Trait representing a generic interrupt controller.
pub trait InterruptController: Debug + Send + Sync {
    /// Signal the controller that an interrupt line has changed.
    fn set_interrupt_pending(&self, irq: u32, pending: bool);

    /// Check if a specific interrupt is enabled and pending.
    fn is_interrupt_active(&self, irq: u32) -> bool;

    /// Acknowledge an interrupt, usually called by the CPU at the start of an ISR.
    fn acknowledge_interrupt(&self) -> Option<u32>;

    /// Complete an interrupt, usually called by the CPU after an ISR finishes.
    fn complete_interrupt(&self, irq: u32);
}

/// Saved global interrupt enable state, handed out by `irq_disable_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "the context is needed to restore interrupts"]
pub struct IrqContext {
    pie: bool,
}

impl IrqContext {
    pub const ENABLED: Self = Self { pie: true };
    pub const DISABLED: Self = Self { pie: false };

    pub fn interrupts_enabled(&self) -> bool {
        self.pie
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IicSnapshot {
    pub ienable: u32,
    pub ipending: u32,
    pub pie: bool,
}

/// Nios II style internal interrupt controller: 32 level-sensitive lines,
/// a per-line enable mask (`ienable`) and the global PIE bit.
#[derive(Debug, Default)]
pub struct InternalInterruptController {
    ienable: AtomicU32,
    ipending: AtomicU32,
    pie: AtomicBool,
    in_service: AtomicU32,
}

impl InternalInterruptController {
    /// Controller in its reset state: all lines disabled, PIE clear.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&self, irq: u32) {
        if irq < IRQ_LINES {
            self.ienable.fetch_or(1 << irq, Ordering::SeqCst);
        }
    }

    pub fn disable(&self, irq: u32) {
        if irq < IRQ_LINES {
            self.ienable.fetch_and(!(1 << irq), Ordering::SeqCst);
        }
    }

    /// Replaces the sampled level of every line at once.
    pub fn set_lines(&self, levels: u32) {
        self.ipending.store(levels, Ordering::SeqCst);
    }

    pub fn disable_all(&self) -> IrqContext {
        IrqContext {
            pie: self.pie.swap(false, Ordering::SeqCst),
        }
    }

    pub fn restore(&self, context: IrqContext) {
        self.pie.store(context.pie, Ordering::SeqCst);
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.pie.load(Ordering::SeqCst)
    }

    pub fn ienable(&self) -> u32 {
        self.ienable.load(Ordering::SeqCst)
    }

    /// Lines that are both asserted and enabled.
    pub fn ipending(&self) -> u32 {
        self.ipending.load(Ordering::SeqCst) & self.ienable()
    }

    pub fn snapshot(&self) -> IicSnapshot {
        IicSnapshot {
            ienable: self.ienable(),
            ipending: self.ipending(),
            pie: self.interrupts_enabled(),
        }
    }
}

impl InterruptController for InternalInterruptController {
    fn set_interrupt_pending(&self, irq: u32, pending: bool) {
        if irq >= IRQ_LINES {
            return;
        }
        if pending {
            self.ipending.fetch_or(1 << irq, Ordering::SeqCst);
        } else {
            self.ipending.fetch_and(!(1 << irq), Ordering::SeqCst);
        }
    }

    fn is_interrupt_active(&self, irq: u32) -> bool {
        irq < IRQ_LINES && (self.ipending() & (1 << irq)) != 0
    }

    /// Takes the lowest-numbered active line and masks PIE for the handler.
    fn acknowledge_interrupt(&self) -> Option<u32> {
        if !self.interrupts_enabled() {
            return None;
        }
        let active = self.ipending();
        if active == 0 {
            return None;
        }
        let irq = active.trailing_zeros();
        self.pie.store(false, Ordering::SeqCst);
        self.in_service.fetch_or(1 << irq, Ordering::SeqCst);
        Some(irq)
    }

    /// Returns from the handler: PIE is set again, as on `eret`.
    fn complete_interrupt(&self, irq: u32) {
        if irq < IRQ_LINES {
            self.in_service.fetch_and(!(1 << irq), Ordering::SeqCst);
        }
        self.pie.store(true, Ordering::SeqCst);
    }
}
