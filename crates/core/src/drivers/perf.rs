// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Performance counter driver: `PERF_*` style strobes plus the formatted
//! report.

use std::fmt;

use crate::hal::Hal;
use crate::peripherals::perf_counter::{EVENTS_WORD, SEGMENT_STRIDE, TIME_HI_WORD, TIME_LO_WORD};
use crate::SimResult;

fn segment_base(base: u64, segment: u32) -> u64 {
    base + segment as u64 * SEGMENT_STRIDE
}

/// Stops and clears every segment.
pub fn perf_reset<H: Hal + ?Sized>(hal: &mut H, base: u64) -> SimResult<()> {
    hal.write_u32(base + TIME_LO_WORD, 1)
}

/// Starts the global counter; user segments only count while it runs.
pub fn perf_start_measuring<H: Hal + ?Sized>(hal: &mut H, base: u64) -> SimResult<()> {
    hal.write_u32(base + TIME_HI_WORD, 0)
}

pub fn perf_stop_measuring<H: Hal + ?Sized>(hal: &mut H, base: u64) -> SimResult<()> {
    hal.write_u32(base + TIME_LO_WORD, 0)
}

pub fn perf_begin<H: Hal + ?Sized>(hal: &mut H, base: u64, segment: u32) -> SimResult<()> {
    hal.write_u32(segment_base(base, segment) + TIME_HI_WORD, 0)
}

pub fn perf_end<H: Hal + ?Sized>(hal: &mut H, base: u64, segment: u32) -> SimResult<()> {
    hal.write_u32(segment_base(base, segment) + TIME_LO_WORD, 0)
}

/// Accumulated clocks of `segment`.
pub fn perf_get_section_time<H: Hal + ?Sized>(
    hal: &mut H,
    base: u64,
    segment: u32,
) -> SimResult<u64> {
    let seg = segment_base(base, segment);
    let lo = hal.read_u32(seg + TIME_LO_WORD)? as u64;
    let hi = hal.read_u32(seg + TIME_HI_WORD)? as u64;
    Ok((hi << 32) | lo)
}

pub fn perf_get_total_time<H: Hal + ?Sized>(hal: &mut H, base: u64) -> SimResult<u64> {
    perf_get_section_time(hal, base, 0)
}

pub fn perf_get_num_starts<H: Hal + ?Sized>(
    hal: &mut H,
    base: u64,
    segment: u32,
) -> SimResult<u32> {
    hal.read_u32(segment_base(base, segment) + EVENTS_WORD)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionReport {
    pub label: String,
    pub clocks: u64,
    pub occurrences: u32,
}

/// Counter contents gathered for [`perf_print_formatted_report`].
#[derive(Debug, Clone, PartialEq)]
pub struct PerfReport {
    pub clock_hz: u32,
    pub total_clocks: u64,
    pub sections: Vec<SectionReport>,
}

impl PerfReport {
    fn seconds(&self, clocks: u64) -> f64 {
        if self.clock_hz == 0 {
            return 0.0;
        }
        clocks as f64 / self.clock_hz as f64
    }

    fn percent(&self, clocks: u64) -> f64 {
        if self.total_clocks == 0 {
            return 0.0;
        }
        clocks as f64 * 100.0 / self.total_clocks as f64
    }
}

const RULE: &str = "+---------------+-----+------------+---------------+-------------+";

impl fmt::Display for PerfReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--Performance Counter Report--")?;
        writeln!(
            f,
            "Total Time: {:.6} seconds  ({} clock-cycles)",
            self.seconds(self.total_clocks),
            self.total_clocks
        )?;
        writeln!(f, "{}", RULE)?;
        writeln!(
            f,
            "| {:<13} | {:>3} | {:>10} | {:>13} | {:>11} |",
            "Section", "%", "Time (sec)", "Time (clocks)", "Occurrences"
        )?;
        writeln!(f, "{}", RULE)?;
        for s in &self.sections {
            writeln!(
                f,
                "| {:<13} | {:>3.0} | {:>10.5} | {:>13} | {:>11} |",
                s.label,
                self.percent(s.clocks),
                self.seconds(s.clocks),
                s.clocks,
                s.occurrences
            )?;
        }
        writeln!(f, "{}", RULE)
    }
}

/// Reads the global counter and one entry per label, starting at segment 1.
pub fn perf_read_report<H: Hal + ?Sized>(
    hal: &mut H,
    base: u64,
    clock_hz: u32,
    labels: &[&str],
) -> SimResult<PerfReport> {
    let total_clocks = perf_get_total_time(hal, base)?;
    let mut sections = Vec::with_capacity(labels.len());
    for (i, label) in labels.iter().enumerate() {
        let segment = i as u32 + 1;
        sections.push(SectionReport {
            label: label.to_string(),
            clocks: perf_get_section_time(hal, base, segment)?,
            occurrences: perf_get_num_starts(hal, base, segment)?,
        });
    }
    Ok(PerfReport {
        clock_hz,
        total_clocks,
        sections,
    })
}

/// Prints the counter table on the console.
pub fn perf_print_formatted_report<H: Hal + ?Sized>(
    hal: &mut H,
    base: u64,
    clock_hz: u32,
    labels: &[&str],
) -> SimResult<()> {
    let report = perf_read_report(hal, base, clock_hz, labels)?;
    hal.write_console(report.to_string().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SystemBus;
    use crate::Machine;

    const PERF_BASE: u64 = 0x0800_1100;

    #[test]
    fn test_section_counts_begin_end_pairs() {
        let mut machine = Machine::new(SystemBus::new());
        let hal: &mut dyn Hal = &mut machine;

        perf_reset(hal, PERF_BASE).unwrap();
        perf_start_measuring(hal, PERF_BASE).unwrap();
        for _ in 0..4 {
            perf_begin(hal, PERF_BASE, 1).unwrap();
            hal.nop().unwrap();
            perf_end(hal, PERF_BASE, 1).unwrap();
        }
        perf_stop_measuring(hal, PERF_BASE).unwrap();

        assert_eq!(perf_get_num_starts(hal, PERF_BASE, 1).unwrap(), 4);
        let section = perf_get_section_time(hal, PERF_BASE, 1).unwrap();
        let total = perf_get_total_time(hal, PERF_BASE).unwrap();
        assert!(section > 0);
        assert!(total > section);
    }

    #[test]
    fn test_reset_clears_segments() {
        let mut machine = Machine::new(SystemBus::new());
        let hal: &mut dyn Hal = &mut machine;

        perf_start_measuring(hal, PERF_BASE).unwrap();
        perf_begin(hal, PERF_BASE, 2).unwrap();
        perf_end(hal, PERF_BASE, 2).unwrap();
        perf_reset(hal, PERF_BASE).unwrap();

        assert_eq!(perf_get_total_time(hal, PERF_BASE).unwrap(), 0);
        assert_eq!(perf_get_num_starts(hal, PERF_BASE, 2).unwrap(), 0);
    }

    #[test]
    fn test_report_layout() {
        let report = PerfReport {
            clock_hz: 50_000_000,
            total_clocks: 50_000_000,
            sections: vec![SectionReport {
                label: "ISR".to_string(),
                clocks: 5_000_000,
                occurrences: 1000,
            }],
        };
        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "--Performance Counter Report--");
        assert_eq!(lines[1], "Total Time: 1.000000 seconds  (50000000 clock-cycles)");
        assert!(lines[5].starts_with("| ISR "));
        assert!(lines[5].contains(" 10 "));
        assert!(lines[5].contains("5000000"));
        assert!(lines[5].contains("1000"));
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_report_without_clock_does_not_divide_by_zero() {
        let report = PerfReport {
            clock_hz: 0,
            total_clocks: 0,
            sections: Vec::new(),
        };
        assert!(report.to_string().contains("0.000000 seconds"));
    }
}
