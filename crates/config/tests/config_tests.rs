// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use irqlab_config::{ChipDescriptor, SystemManifest};
use std::path::PathBuf;

#[test]
fn test_minimal_chip_parses() {
    let yaml = r#"
name: "test-chip"
arch: "nios2"
peripherals:
  - id: "timer_0"
    type: "timer"
    base_address: 0x08001000
"#;
    let desc: ChipDescriptor = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(desc.peripherals.len(), 1);
    assert_eq!(desc.peripherals[0].id, "timer_0");
    assert_eq!(desc.peripherals[0].size, None);
    assert_eq!(desc.peripherals[0].irq, None);
}

#[test]
fn test_optional_fields_parse() {
    let yaml = r#"
name: "test-chip"
arch: "nios2f"
cpu_freq_hz: 100000000
peripherals:
  - id: "timer_0"
    type: "timer"
    base_address: 0x08001000
    size: "32B"
    irq: 3
    config:
      period: 2500
"#;
    let desc: ChipDescriptor = serde_yaml::from_str(yaml).unwrap();
    desc.validate().unwrap();
    assert_eq!(desc.cpu_freq_hz, 100_000_000);
    assert_eq!(desc.peripherals[0].size, Some("32B".to_string()));
    assert_eq!(desc.peripherals[0].irq, Some(3));
    assert_eq!(desc.peripherals[0].config_u64("period").unwrap(), Some(2500));
}

#[test]
fn test_irq_out_of_range_rejected() {
    let yaml = r#"
name: "test-chip"
arch: "nios2"
peripherals:
  - id: "timer_0"
    type: "timer"
    base_address: 0x08001000
    irq: 32
"#;
    let desc: ChipDescriptor = serde_yaml::from_str(yaml).unwrap();
    assert!(desc.validate().is_err());
}

#[test]
fn test_shipped_lab_board_loads() {
    let system_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../configs/systems/de0-nano-lab3.yaml");

    let manifest = SystemManifest::from_file(&system_path).expect("Failed to load system manifest");
    assert_eq!(manifest.stdout.as_deref(), Some("jtag_uart_0"));

    let chip_path = system_path.parent().unwrap().join(&manifest.chip);
    let chip = ChipDescriptor::from_file(&chip_path).expect("Failed to load chip descriptor");

    let ids: Vec<&str> = chip.peripherals.iter().map(|p| p.id.as_str()).collect();
    assert!(ids.contains(&"timer_0"));
    assert!(ids.contains(&"mypio_leds"));
    assert!(ids.contains(&"performance_counter_0"));
    assert!(ids.contains(&"jtag_uart_0"));
}
