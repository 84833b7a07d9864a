// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod jtag_uart;
pub mod perf_counter;
pub mod pio;
pub mod timer;
