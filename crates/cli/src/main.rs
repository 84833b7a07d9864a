// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info};

use irqlab_config::{RunAssertion, RunLimits, RunScript, StopReason};
use irqlab_core::metrics::PerformanceMetrics;
use irqlab_core::peripherals::pio::ParallelIo;
use irqlab_core::signals::led_row;
use irqlab_core::snapshot::MachineSnapshot;
use irqlab_core::system::builder::{build_machine, resolve_relative};
use irqlab_core::{Machine, SimResult, SimulationError};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "IrqLab timer interrupt demo on a simulated Nios II board",
    long_about = None
)]
struct Cli {
    /// Path to the system manifest (YAML). Defaults to the built-in lab board.
    #[arg(short, long)]
    system: Option<PathBuf>,

    /// Write a machine snapshot (JSON) when the run ends.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Enable interrupt dispatch tracing
    #[arg(short, long, global = true)]
    trace: bool,

    /// Stop after this many simulated cycles
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Disable console echo on stdout
    #[arg(long)]
    no_console_stdout: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deterministic, CI-friendly runner mode driven by a run script (YAML).
    Test(TestArgs),
}

#[derive(Parser, Debug)]
struct TestArgs {
    /// Path to the system manifest (YAML); overrides the script's input
    #[arg(short = 's', long)]
    system: Option<PathBuf>,

    /// Path to the run script (YAML)
    #[arg(short = 'c', long)]
    script: PathBuf,

    /// Override max cycles limit
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Disable console stdout echo (still captured for assertions/artifacts)
    #[arg(long)]
    no_console_stdout: bool,

    /// Directory to write test artifacts (result.json, console.log, snapshot.json)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TestResult {
    result_schema_version: String,
    status: String,
    cycles: u64,
    interrupts: u64,
    console_bytes: u64,
    stop_reason: StopReason,
    stop_reason_details: StopReasonDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    limits: Option<RunLimits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    assertions: Vec<AssertionResult>,
    config_hash: String,
    config: TestConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct StopReasonDetails {
    triggered_stop_condition: StopReason,
    triggered_limit: Option<NamedU64>,
    observed: Option<NamedU64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct NamedU64 {
    name: String,
    value: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct AssertionResult {
    assertion: RunAssertion,
    passed: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct TestConfig {
    system: Option<PathBuf>,
    script: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing with appropriate level based on --trace flag
    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Some(Commands::Test(args)) => run_test(args),
        None => run_interactive(cli),
    }
}

fn stop_reason_for(result: &SimResult<()>) -> StopReason {
    match result {
        Ok(()) => StopReason::Completed,
        Err(SimulationError::CycleLimit(_)) => StopReason::MaxCycles,
        Err(SimulationError::ConsoleLimit(_)) => StopReason::MaxConsoleBytes,
        Err(SimulationError::WallTime(_)) => StopReason::WallTime,
        Err(SimulationError::MemoryViolation(_)) => StopReason::MemoryViolation,
        Err(SimulationError::InvalidIrq(_)) => StopReason::InvalidIrq,
    }
}

fn run_interactive(cli: Cli) -> ExitCode {
    info!("Starting IrqLab");

    let mut machine = match build_machine(cli.system.as_deref()) {
        Ok(machine) => machine,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    if cli.no_console_stdout {
        machine
            .bus
            .attach_console_sink(Arc::new(Mutex::new(Vec::new())), false);
    }
    machine.stop_conditions.max_cycles = cli.max_cycles;

    let metrics = Arc::new(PerformanceMetrics::new());
    machine.observers.push(metrics.clone());

    let result = machine.run(irqlab_firmware::main);

    if let Some(path) = &cli.snapshot {
        if let Err(e) = write_json(path, &machine.snapshot()) {
            error!("Failed to write snapshot {:?}: {:#}", path, e);
        }
    }

    report_metrics(&machine, &metrics);
    report_leds(&machine);

    match result {
        Ok(()) => ExitCode::from(EXIT_PASS),
        Err(e) => {
            error!("Simulation stopped: {}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn report_metrics(machine: &Machine, metrics: &PerformanceMetrics) {
    info!("Simulation finished.");
    info!("Total Cycles: {}", metrics.get_cycles());
    info!(
        "Simulated time: {:.3} ms",
        machine.total_cycles as f64 * 1000.0 / machine.cpu_freq_hz as f64
    );
    info!(
        "Interrupts: {} (avg {:.1} cycles in handler)",
        metrics.get_interrupts(),
        metrics.get_avg_irq_cycles()
    );
    info!(
        "I/O accesses: {} reads, {} writes",
        metrics.get_io_reads(),
        metrics.get_io_writes()
    );
    info!("Average cycles/sec: {:.2}", metrics.get_cycles_per_sec());
}

/// Logs every parallel port as a row of LED glyphs, MSB first.
fn report_leds(machine: &Machine) {
    for p in &machine.bus.peripherals {
        let Some(pio) = p.dev.as_any().and_then(|a| a.downcast_ref::<ParallelIo>()) else {
            continue;
        };
        let row = led_row((0..pio.width()).map(|pin| pio.pin_level(pin)));
        info!("LEDs {}: [{}] = {}", p.name, row, pio.output_pattern());
    }
}

fn led_value(machine: &Machine, peripheral: &str) -> Option<u8> {
    machine
        .bus
        .device::<ParallelIo>(peripheral)
        .map(|pio| pio.output_pattern())
}

fn build_stop_reason_details(
    stop_reason: &StopReason,
    limits: &RunLimits,
    cycles: u64,
    console_bytes: u64,
    duration: Duration,
) -> StopReasonDetails {
    let (triggered_limit, observed) = match stop_reason {
        StopReason::MaxCycles => (
            Some(NamedU64 {
                name: "max_cycles".to_string(),
                value: limits.max_cycles,
            }),
            Some(NamedU64 {
                name: "cycles".to_string(),
                value: cycles,
            }),
        ),
        StopReason::MaxConsoleBytes => (
            limits.max_console_bytes.map(|v| NamedU64 {
                name: "max_console_bytes".to_string(),
                value: v,
            }),
            Some(NamedU64 {
                name: "console_bytes".to_string(),
                value: console_bytes,
            }),
        ),
        StopReason::WallTime => (
            limits.wall_time_ms.map(|v| NamedU64 {
                name: "wall_time_ms".to_string(),
                value: v,
            }),
            Some(NamedU64 {
                name: "elapsed_wall_time_ms".to_string(),
                value: duration.as_millis().min(u128::from(u64::MAX)) as u64,
            }),
        ),
        StopReason::Completed
        | StopReason::MemoryViolation
        | StopReason::InvalidIrq
        | StopReason::ConfigError => (None, None),
    };

    StopReasonDetails {
        triggered_stop_condition: stop_reason.clone(),
        triggered_limit,
        observed,
    }
}

fn run_test(args: TestArgs) -> ExitCode {
    let script = match RunScript::from_file(&args.script) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(&args, args.system.as_ref(), None, msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let mut limits = script.limits.clone();
    if let Some(max_cycles) = args.max_cycles {
        limits.max_cycles = max_cycles;
    }

    // Guard against accidentally huge runs from CI misconfiguration.
    const MAX_ALLOWED_CYCLES: u64 = 5_000_000_000;
    if limits.max_cycles > MAX_ALLOWED_CYCLES {
        let msg = format!(
            "max_cycles {} exceeds MAX_ALLOWED_CYCLES {}",
            limits.max_cycles, MAX_ALLOWED_CYCLES
        );
        error!("{}", msg);
        write_config_error_outputs(&args, args.system.as_ref(), Some(&limits), msg);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    let system_path = args.system.clone().or_else(|| {
        script
            .inputs
            .system
            .as_deref()
            .map(|s| resolve_script_path(&args.script, s))
    });

    let mut machine = match build_machine(system_path.as_deref()) {
        Ok(machine) => machine,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(&args, system_path.as_ref(), Some(&limits), msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let console = Arc::new(Mutex::new(Vec::new()));
    machine
        .bus
        .attach_console_sink(console.clone(), !args.no_console_stdout);
    machine.stop_conditions.max_cycles = Some(limits.max_cycles);
    machine.stop_conditions.max_console_bytes = limits.max_console_bytes;
    machine.stop_conditions.wall_time = limits.wall_time_ms.map(Duration::from_millis);

    let metrics = Arc::new(PerformanceMetrics::new());
    machine.observers.push(metrics.clone());

    let start = std::time::Instant::now();
    let result = machine.run(irqlab_firmware::main);
    let duration = start.elapsed();

    let stop_reason = stop_reason_for(&result);
    let sim_error_happened = matches!(
        stop_reason,
        StopReason::MemoryViolation | StopReason::InvalidIrq
    );
    if let Err(e) = &result {
        info!("Run stopped at cycle {}: {}", machine.total_cycles, e);
    }

    let console_text = {
        let bytes = console.lock().map(|g| g.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).to_string()
    };

    let mut assertion_results = Vec::new();
    let mut all_passed = true;
    let mut expected_stop_reason_matched = false;

    for assertion in &script.assertions {
        let passed = match assertion {
            RunAssertion::ConsoleContains(a) => console_text.contains(&a.console_contains),
            RunAssertion::ExpectedStopReason(a) => a.expected_stop_reason == stop_reason,
            RunAssertion::LedValue(a) => {
                led_value(&machine, &a.led_value.peripheral) == Some(a.led_value.expected_value)
            }
        };

        if matches!(assertion, RunAssertion::ExpectedStopReason(_)) && passed {
            expected_stop_reason_matched = true;
        }

        if !passed {
            all_passed = false;
            error!(
                "Assertion failed: {:?} (captured len={})",
                assertion,
                console_text.len()
            );
        }

        assertion_results.push(AssertionResult {
            assertion: assertion.clone(),
            passed,
        });
    }

    // Budget stops only pass when the script says they are expected.
    let stop_requires_assertion = matches!(
        stop_reason,
        StopReason::MaxCycles | StopReason::MaxConsoleBytes | StopReason::WallTime
    );
    let failed = !all_passed || (stop_requires_assertion && !expected_stop_reason_matched);
    let errored = sim_error_happened && !expected_stop_reason_matched;

    let status = if failed {
        "fail"
    } else if errored {
        "error"
    } else {
        "pass"
    };

    let console_bytes = console_text.len() as u64;
    let stop_reason_details = build_stop_reason_details(
        &stop_reason,
        &limits,
        machine.total_cycles,
        console_bytes,
        duration,
    );

    let test_result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        cycles: machine.total_cycles,
        interrupts: metrics.get_interrupts(),
        console_bytes,
        stop_reason,
        stop_reason_details,
        limits: Some(limits),
        message: result.err().map(|e| e.to_string()),
        assertions: assertion_results,
        config_hash: config_hash(&args.script, system_path.as_deref()),
        config: TestConfig {
            system: system_path,
            script: args.script.clone(),
        },
    };
    write_outputs(&args, &test_result, &console, Some(&machine.snapshot()));

    if failed {
        ExitCode::from(EXIT_ASSERT_FAIL)
    } else if errored {
        ExitCode::from(EXIT_RUNTIME_ERROR)
    } else {
        ExitCode::from(EXIT_PASS)
    }
}

/// SHA-256 over the run script and the system manifest it ran against.
fn config_hash(script: &Path, system: Option<&Path>) -> String {
    let mut hasher = Sha256::new();
    for path in std::iter::once(script).chain(system) {
        match std::fs::read(path) {
            Ok(bytes) => hasher.update(&bytes),
            Err(e) => error!("Failed to read {:?} for config hash: {}", path, e),
        }
    }
    format!("{:x}", hasher.finalize())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let f = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(f, value)?;
    Ok(())
}

fn write_outputs(
    args: &TestArgs,
    result: &TestResult,
    console: &Arc<Mutex<Vec<u8>>>,
    snapshot: Option<&MachineSnapshot>,
) {
    let Some(output_dir) = &args.output_dir else {
        return;
    };
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!("Failed to create output directory {:?}: {}", output_dir, e);
        return;
    }

    if let Err(e) = write_json(&output_dir.join("result.json"), result) {
        error!("Failed to write result.json: {:#}", e);
    }

    if let Some(snapshot) = snapshot {
        if let Err(e) = write_json(&output_dir.join("snapshot.json"), snapshot) {
            error!("Failed to write snapshot.json: {:#}", e);
        }
    }

    let bytes = console.lock().map(|g| g.clone()).unwrap_or_default();
    if let Err(e) = std::fs::write(output_dir.join("console.log"), bytes) {
        error!("Failed to write console.log: {}", e);
    }
}

fn write_config_error_outputs(
    args: &TestArgs,
    system_path: Option<&PathBuf>,
    limits: Option<&RunLimits>,
    message: String,
) {
    let stop_reason = StopReason::ConfigError;
    let stop_reason_details = StopReasonDetails {
        triggered_stop_condition: stop_reason.clone(),
        triggered_limit: None,
        observed: None,
    };

    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: "error".to_string(),
        cycles: 0,
        interrupts: 0,
        console_bytes: 0,
        stop_reason,
        stop_reason_details,
        limits: limits.cloned(),
        message: Some(message),
        assertions: vec![],
        config_hash: config_hash(&args.script, system_path.map(PathBuf::as_path)),
        config: TestConfig {
            system: system_path.cloned(),
            script: args.script.clone(),
        },
    };

    write_outputs(args, &result, &Arc::new(Mutex::new(Vec::new())), None);
}

fn resolve_script_path(script_path: &Path, value: &str) -> PathBuf {
    let p = PathBuf::from(value);
    if p.is_absolute() {
        return p;
    }
    resolve_relative(script_path, value)
}
