// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Register-level drivers firmware links against, in the shape of the
//! vendor BSP macros.

pub mod perf;
