// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

pub const DATA_REG: u64 = 0x00;
pub const CONTROL_REG: u64 = 0x04;

/// Free space reported in CONTROL.WSPACE; the host side never falls behind.
const WRITE_FIFO_DEPTH: u32 = 64;

/// JTAG UART console: bytes written to DATA go to the host.
#[derive(Debug, Default, serde::Serialize)]
pub struct JtagUart {
    #[serde(skip)]
    sink: Option<Arc<Mutex<Vec<u8>>>>,
    echo_stdout: bool,
    tx_count: u64,
}

impl JtagUart {
    pub fn new() -> Self {
        Self {
            sink: None,
            echo_stdout: true,
            tx_count: 0,
        }
    }

    fn push_tx(&mut self, value: u8) {
        self.tx_count += 1;

        if let Some(sink) = &self.sink {
            if let Ok(mut guard) = sink.lock() {
                guard.push(value);
            }
        }

        if self.echo_stdout {
            #[allow(unused_must_use)]
            {
                print!("{}", value as char);
                io::stdout().flush();
            }
        }
    }

    pub fn set_sink(&mut self, sink: Option<Arc<Mutex<Vec<u8>>>>, echo_stdout: bool) {
        self.sink = sink;
        self.echo_stdout = echo_stdout;
    }

    pub fn tx_count(&self) -> u64 {
        self.tx_count
    }

    fn control_value(&self) -> u32 {
        WRITE_FIFO_DEPTH << 16
    }
}

impl crate::Peripheral for JtagUart {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let reg_offset = offset & !3;
        let byte_offset = (offset % 4) as u32;
        let val = match reg_offset {
            // RVALID clear: the host never sends input.
            DATA_REG => 0,
            CONTROL_REG => self.control_value(),
            _ => 0,
        };
        Ok(((val >> (byte_offset * 8)) & 0xFF) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        if offset == DATA_REG {
            self.push_tx(value);
        }
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
