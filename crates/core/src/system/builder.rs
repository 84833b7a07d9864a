// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::SystemBus;
use crate::Machine;
use anyhow::Context;
use irqlab_config::{ChipDescriptor, SystemManifest};
use std::path::{Path, PathBuf};
use tracing::info;

/// Loads a system manifest and the chip descriptor it names.
///
/// The chip path is resolved relative to the manifest's directory.
pub fn load_system(sys_path: &Path) -> anyhow::Result<(ChipDescriptor, SystemManifest)> {
    info!("Loading system manifest: {:?}", sys_path);
    let mut manifest = SystemManifest::from_file(sys_path)?;
    let chip_path = resolve_relative(sys_path, &manifest.chip);
    manifest.chip = chip_path.to_string_lossy().into_owned();

    info!("Loading chip descriptor: {:?}", chip_path);
    let chip = ChipDescriptor::from_file(&chip_path)
        .with_context(|| format!("System '{}': cannot load chip", manifest.name))?;
    Ok((chip, manifest))
}

/// Builds a SystemBus from a given system manifest path.
/// If no path is provided, returns the built-in lab board.
pub fn build_system_bus(system_path: Option<&Path>) -> anyhow::Result<SystemBus> {
    let bus = if let Some(sys_path) = system_path {
        let (chip, manifest) = load_system(sys_path)?;
        SystemBus::from_config(&chip, &manifest)?
    } else {
        info!("Using default hardware configuration");
        SystemBus::new()
    };

    Ok(bus)
}

/// Like [`build_system_bus`], with the chip's clock and cycle costs applied.
pub fn build_machine(system_path: Option<&Path>) -> anyhow::Result<Machine> {
    let machine = if let Some(sys_path) = system_path {
        let (chip, manifest) = load_system(sys_path)?;
        info!(
            "Board '{}' on chip '{}' at {} Hz",
            manifest.name, chip.name, chip.cpu_freq_hz
        );
        Machine::from_config(&chip, &manifest)?
    } else {
        Machine::new(build_system_bus(None)?)
    };

    Ok(machine)
}

/// Resolves `target` against the directory containing `base_file`.
pub fn resolve_relative(base_file: &Path, target: &str) -> PathBuf {
    base_file
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(target)
}
