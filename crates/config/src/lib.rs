// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_cpu_freq_hz() -> u32 {
    50_000_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    #[serde(alias = "nios2e", alias = "nios2f", alias = "nios2s")]
    Nios2,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PeripheralConfig {
    pub id: String,
    pub r#type: String, // "timer", "pio", "performance_counter", "jtag_uart"
    pub base_address: u64,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub irq: Option<u32>,
    #[serde(default)]
    pub config: HashMap<String, serde_yaml::Value>,
}

impl PeripheralConfig {
    /// Reads an unsigned integer from the free-form `config` map.
    pub fn config_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.config.get(key) {
            None => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                anyhow::anyhow!(
                    "Field '{}' of peripheral '{}' must be an unsigned integer",
                    key,
                    self.id
                )
            }),
        }
    }
}

/// Cycle costs charged by the simulated CPU for each HAL-level operation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub io_access: u32,
    pub nop: u32,
    pub console_byte: u32,
    pub irq_entry: u32,
    pub irq_exit: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            io_access: 2,
            nop: 1,
            console_byte: 8,
            irq_entry: 12,
            irq_exit: 8,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChipDescriptor {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    pub arch: Arch,
    #[serde(default = "default_cpu_freq_hz")]
    pub cpu_freq_hz: u32,
    #[serde(default)]
    pub timing: TimingConfig,
    pub peripherals: Vec<PeripheralConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SystemManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    pub chip: String, // Reference to chip descriptor file path
    /// Peripheral id receiving console output.
    #[serde(default)]
    pub stdout: Option<String>,
}

impl ChipDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read chip descriptor at {:?}", path))?;
        let chip: Self =
            serde_yaml::from_str(&content).context("Failed to parse Chip Descriptor YAML")?;
        chip.validate()?;
        Ok(chip)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cpu_freq_hz == 0 {
            anyhow::bail!("Chip '{}': 'cpu_freq_hz' must be greater than zero", self.name);
        }

        let mut seen = std::collections::HashSet::new();
        for p in &self.peripherals {
            if !seen.insert(p.id.as_str()) {
                anyhow::bail!("Chip '{}': duplicate peripheral id '{}'", self.name, p.id);
            }
            if let Some(irq) = p.irq {
                if irq >= 32 {
                    anyhow::bail!(
                        "Peripheral '{}': irq {} out of range (0..32)",
                        p.id,
                        irq
                    );
                }
            }
        }

        // Busy-wait loops advance simulated time only through `nop`.
        if self.timing.nop == 0 {
            anyhow::bail!("Chip '{}': 'timing.nop' must be at least one cycle", self.name);
        }

        Ok(())
    }
}

impl SystemManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open system manifest at {:?}", path.as_ref()))?;
        serde_yaml::from_reader(f).context("Failed to parse System Manifest")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct RunInputs {
    #[serde(default)]
    pub system: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunLimits {
    pub max_cycles: u64,
    #[serde(default)]
    pub max_console_bytes: Option<u64>,
    #[serde(default)]
    pub wall_time_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Runner failed before simulation started (e.g. script parse/validation error).
    ConfigError,
    /// Firmware returned from its entry point.
    Completed,
    MaxCycles,
    MaxConsoleBytes,
    WallTime,
    MemoryViolation,
    InvalidIrq,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConsoleContainsAssertion {
    pub console_contains: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LedValueDetails {
    pub peripheral: String,
    pub expected_value: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LedValueAssertion {
    pub led_value: LedValueDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum RunAssertion {
    ConsoleContains(ConsoleContainsAssertion),
    ExpectedStopReason(StopReasonAssertion),
    LedValue(LedValueAssertion),
}

/// CI run script: which board to run on, when to give up, what must hold.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunScript {
    pub schema_version: String,
    #[serde(default)]
    pub inputs: RunInputs,
    pub limits: RunLimits,
    #[serde(default)]
    pub assertions: Vec<RunAssertion>,
}

impl RunScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open run script at {:?}", path.as_ref()))?;
        let script: Self = serde_yaml::from_reader(f).context("Failed to parse Run Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let script: Self = serde_yaml::from_str(yaml).context("Failed to parse Run Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.limits.max_cycles == 0 {
            anyhow::bail!("Limit 'max_cycles' must be greater than zero");
        }

        if let Some(system) = &self.inputs.system {
            if system.trim().is_empty() {
                anyhow::bail!("Input 'system' path cannot be empty");
            }
        }

        Ok(())
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
