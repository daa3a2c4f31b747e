//! # Register map and bit layouts of the rake's A/D converter.
//!
//! These codes are the device's contract and must stay bit-for-bit identical
//! to what the converter expects.
//!
//! ```text
//! range register (RANGEA_0_3 .. RANGEB_4_7), four 2-bit fields:
//!   bit  7 6 | 5 4 | 3 2 | 1 0
//!        ch3 | ch2 | ch1 | ch0
//!
//! channel select / sequencer word:
//!   bit  8     | 7 6 5 4 | 3 2 1 0
//!        SSREN | B chan  | A chan
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::DeviceError;

/// Register addresses are 6 bits wide on the wire.
pub const ADDRESS_MASK: u8 = 0x3f;
/// Register values are 9 bits wide on the wire.
pub const VALUE_MASK: u16 = 0x1ff;

/// First sequencer stack register; entry `i` lives at `SEQUENCER_BASE + i`.
pub const SEQUENCER_BASE: u8 = 0x20;
/// Depth of the sequencer stack.
pub const SEQUENCER_DEPTH: usize = 32;
/// Marks the last entry of a sequence.
pub const SSREN: u16 = 0x100;

/// Configuration bits set by the device when a sequence is defined (BURSTEN | SEQEN | 0x01).
pub const CONFIG_BURST_SEQUENCE: u16 = 0x40 | 0x20 | 0x01;
/// Configuration bits set before starting periodic scanning.
pub const CONFIG_PERIODIC_SCAN: u16 = 0x1c;

/// Addressable converter registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    Configuration = 2,
    ChannelSelect = 3,
    RangeA0To3 = 4,
    RangeA4To7 = 5,
    RangeB0To3 = 6,
    RangeB4To7 = 7,
}

impl Register {
    /// All four input-range registers, A side first.
    pub const RANGES: [Register; 4] = [
        Register::RangeA0To3,
        Register::RangeA4To7,
        Register::RangeB0To3,
        Register::RangeB4To7,
    ];

    #[inline]
    pub const fn address(self) -> u8 {
        self as u8
    }
}

/// Allowed values of a 2-bit input-range field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum InputRange {
    PlusMinus10V = 0,
    #[default]
    PlusMinus2_5V = 1,
    PlusMinus5V = 2,
}

impl InputRange {
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Value of a range register with all four channels set to `self`.
    pub fn uniform_register(self) -> u16 {
        pack_ranges([self; 4])
    }
}

impl FromStr for InputRange {
    type Err = String;

    /// Accepts `+-10V`, `+-5V`, `+-2.5V` (case-insensitive, `±` and spaces allowed).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase()
            .replace('±', "+-");
        match norm.trim_start_matches("+-").trim_end_matches('v') {
            "10" => Ok(InputRange::PlusMinus10V),
            "5" => Ok(InputRange::PlusMinus5V),
            "2.5" => Ok(InputRange::PlusMinus2_5V),
            _ => Err(format!("unknown input range {s:?}")),
        }
    }
}

impl fmt::Display for InputRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InputRange::PlusMinus10V => "+-10V",
            InputRange::PlusMinus5V => "+-5V",
            InputRange::PlusMinus2_5V => "+-2.5V",
        };
        f.write_str(s)
    }
}

/// Packs four range fields into one register value; `ranges[0]` occupies bits 0–1.
pub fn pack_ranges(ranges: [InputRange; 4]) -> u16 {
    ranges
        .iter()
        .enumerate()
        .fold(0u16, |acc, (i, r)| acc | (u16::from(r.code()) << (2 * i)))
}

/// A converter input: physical channel 0–7 or one of the diagnostic inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel(u8);

impl Channel {
    pub const VCC: Channel = Channel(8);
    pub const VALDO: Channel = Channel(9);
    pub const SELF_TEST: Channel = Channel(11);

    #[inline]
    pub const fn code(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Channel {
    type Error = DeviceError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0..=7 | 8 | 9 | 11 => Ok(Channel(code)),
            _ => Err(DeviceError::InvalidChannel { code }),
        }
    }
}

/// Channel-select word: B channel in the high nybble, A channel in the low nybble.
#[inline]
pub fn channel_select(a: Channel, b: Channel) -> u16 {
    (u16::from(b.code() & 0xf) << 4) | u16::from(a.code() & 0xf)
}

/// Sequencer stack word for one A/B pair.
#[inline]
pub fn sequence_word(a: Channel, b: Channel, last: bool) -> u16 {
    let word = channel_select(a, b);
    if last { word | SSREN } else { word }
}

/// Validates a sequence and returns `(register, word)` writes for the sequencer stack.
pub fn sequence_writes(a: &[u8], b: &[u8]) -> Result<Vec<(u8, u16)>, DeviceError> {
    if a.len() != b.len() {
        return Err(DeviceError::SequenceMismatch {
            a: a.len(),
            b: b.len(),
        });
    }
    if a.is_empty() || a.len() > SEQUENCER_DEPTH {
        return Err(DeviceError::SequenceLength {
            len: a.len(),
            max: SEQUENCER_DEPTH,
        });
    }
    let last = a.len() - 1;
    a.iter()
        .zip(b)
        .enumerate()
        .map(|(i, (&ca, &cb))| {
            let word = sequence_word(Channel::try_from(ca)?, Channel::try_from(cb)?, i == last);
            // i < SEQUENCER_DEPTH, so the address stays within 0x20..0x40.
            Ok((SEQUENCER_BASE + i as u8, word))
        })
        .collect()
}
