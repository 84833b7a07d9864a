// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{Peripheral, PeripheralTickResult, SimResult};

/// Bytes occupied by one segment's register block.
pub const SEGMENT_STRIDE: u64 = 0x10;

/// Word 0 of a segment: time low on read, stop ("end") on write.
/// Writing 1 to segment 0's word 0 resets the whole counter.
pub const TIME_LO_WORD: u64 = 0x0;
/// Word 1 of a segment: time high on read, start ("begin") on write.
pub const TIME_HI_WORD: u64 = 0x4;
/// Word 2 of a segment: number of starts.
pub const EVENTS_WORD: u64 = 0x8;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Segment {
    pub time: u64,
    pub events: u32,
    pub running: bool,
}

/// Avalon-style performance counter. Segment 0 is the global counter;
/// the other segments only accumulate while the global counter runs.
#[derive(Debug, serde::Serialize)]
pub struct PerformanceCounter {
    segments: Vec<Segment>,
}

impl PerformanceCounter {
    /// `sections` user segments plus the global one.
    pub fn new(sections: usize) -> Self {
        Self {
            segments: vec![Segment::default(); sections + 1],
        }
    }

    pub fn sections(&self) -> usize {
        self.segments.len() - 1
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    fn reset(&mut self) {
        for s in &mut self.segments {
            *s = Segment::default();
        }
    }

    fn read_word(&self, segment: usize, word: u64) -> u32 {
        let Some(s) = self.segments.get(segment) else {
            return 0;
        };
        match word {
            TIME_LO_WORD => (s.time & 0xFFFF_FFFF) as u32,
            TIME_HI_WORD => (s.time >> 32) as u32,
            EVENTS_WORD => s.events,
            _ => 0,
        }
    }

    fn strobe(&mut self, segment: usize, word: u64, value: u8) {
        if segment == 0 && word == TIME_LO_WORD && value & 1 != 0 {
            tracing::trace!("Perf: reset");
            self.reset();
            return;
        }
        let Some(s) = self.segments.get_mut(segment) else {
            return;
        };
        match word {
            TIME_LO_WORD => s.running = false,
            TIME_HI_WORD => {
                if !s.running {
                    s.running = true;
                    s.events = s.events.wrapping_add(1);
                }
            }
            _ => {}
        }
    }
}

impl Peripheral for PerformanceCounter {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let segment = (offset / SEGMENT_STRIDE) as usize;
        let word = (offset % SEGMENT_STRIDE) & !3;
        let byte_offset = (offset & 3) as u32;
        let val = self.read_word(segment, word);
        Ok(((val >> (byte_offset * 8)) & 0xFF) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        // Registers are write strobes; only the low byte lane triggers them so
        // a word store acts exactly once.
        if offset & 3 != 0 {
            return Ok(());
        }
        let segment = (offset / SEGMENT_STRIDE) as usize;
        let word = offset % SEGMENT_STRIDE;
        self.strobe(segment, word, value);
        Ok(())
    }

    fn tick(&mut self) -> PeripheralTickResult {
        if self.segments[0].running {
            for s in &mut self.segments {
                if s.running {
                    s.time += 1;
                }
            }
        }
        PeripheralTickResult::default()
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_word(pc: &mut PerformanceCounter, offset: u64, value: u32) {
        for i in 0..4 {
            pc.write(offset + i, (value >> (i * 8)) as u8).unwrap();
        }
    }

    fn read_word(pc: &PerformanceCounter, offset: u64) -> u32 {
        (0..4).fold(0, |acc, i| acc | (pc.read(offset + i).unwrap() as u32) << (i * 8))
    }

    #[test]
    fn test_segment_counts_only_while_global_runs() {
        let mut pc = PerformanceCounter::new(3);
        write_word(&mut pc, SEGMENT_STRIDE + TIME_HI_WORD, 0); // begin 1
        pc.tick();
        assert_eq!(pc.segment(1).unwrap().time, 0);

        write_word(&mut pc, TIME_HI_WORD, 0); // global start
        pc.tick();
        pc.tick();
        write_word(&mut pc, SEGMENT_STRIDE + TIME_LO_WORD, 0); // end 1
        pc.tick();

        assert_eq!(read_word(&pc, SEGMENT_STRIDE + TIME_LO_WORD), 2);
        assert_eq!(read_word(&pc, TIME_LO_WORD), 3);
        assert_eq!(read_word(&pc, SEGMENT_STRIDE + EVENTS_WORD), 1);
    }

    #[test]
    fn test_each_begin_counts_one_event() {
        let mut pc = PerformanceCounter::new(1);
        write_word(&mut pc, TIME_HI_WORD, 0);
        for _ in 0..5 {
            write_word(&mut pc, SEGMENT_STRIDE + TIME_HI_WORD, 0);
            pc.tick();
            write_word(&mut pc, SEGMENT_STRIDE + TIME_LO_WORD, 0);
        }
        assert_eq!(pc.segment(1).unwrap().events, 5);
        assert_eq!(pc.segment(1).unwrap().time, 5);
    }

    #[test]
    fn test_reset_and_stop_on_global_word0() {
        let mut pc = PerformanceCounter::new(1);
        write_word(&mut pc, TIME_HI_WORD, 0);
        pc.tick();

        write_word(&mut pc, TIME_LO_WORD, 0); // stop
        pc.tick();
        assert_eq!(pc.segment(0).unwrap().time, 1);
        assert!(!pc.segment(0).unwrap().running);

        write_word(&mut pc, TIME_LO_WORD, 1); // reset
        assert_eq!(*pc.segment(0).unwrap(), Segment::default());
    }

    #[test]
    fn test_out_of_range_segment_ignored() {
        let mut pc = PerformanceCounter::new(1);
        write_word(&mut pc, 5 * SEGMENT_STRIDE + TIME_HI_WORD, 0);
        assert_eq!(read_word(&pc, 5 * SEGMENT_STRIDE), 0);
        assert_eq!(pc.sections(), 1);
    }
}
