// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

/// Level seen on one output pin of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DigitalLevel {
    #[default]
    Low,
    High,
}

impl DigitalLevel {
    pub fn is_high(self) -> bool {
        self == DigitalLevel::High
    }

    /// Lit LED or dark LED.
    pub fn glyph(self) -> char {
        if self.is_high() {
            '*'
        } else {
            '.'
        }
    }
}

impl From<bool> for DigitalLevel {
    fn from(high: bool) -> Self {
        if high {
            DigitalLevel::High
        } else {
            DigitalLevel::Low
        }
    }
}

/// Renders pin levels given LSB first as an LED row with the MSB on the left.
pub fn led_row<I>(levels: I) -> String
where
    I: IntoIterator<Item = DigitalLevel>,
    I::IntoIter: DoubleEndedIterator,
{
    levels.into_iter().rev().map(DigitalLevel::glyph).collect()
}
