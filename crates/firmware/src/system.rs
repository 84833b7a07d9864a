// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Board addresses as generated for the lab system (`system.h`).

pub const TIMER_0_BASE: u64 = 0x0800_1000;
pub const TIMER_0_IRQ: u32 = 0;

pub const MYPIO_LEDS_BASE: u64 = 0x0800_1060;

pub const PERFORMANCE_COUNTER_0_BASE: u64 = 0x0800_1100;
