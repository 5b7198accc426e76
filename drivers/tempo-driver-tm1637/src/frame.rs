/*
 *  frame.rs
 *
 *  One renderable display state: four glyphs plus the colon flag.
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 */

use core::fmt;
use core::str::FromStr;

use crate::codec::{Glyph, COLON_BIT};

/// Digits on the module.
pub const DIGIT_COUNT: usize = 4;

/// A complete segment frame.
///
/// The constructors that take numbers return `None` when the value cannot be
/// shown in four digits; nothing partial is ever produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayFrame {
    pub glyphs: [Glyph; DIGIT_COUNT],
    pub colon: bool,
}

impl DisplayFrame {
    pub const fn new(glyphs: [Glyph; DIGIT_COUNT], colon: bool) -> Self {
        Self { glyphs, colon }
    }

    pub const fn blank() -> Self {
        Self::new([Glyph::Blank; DIGIT_COUNT], false)
    }

    pub const fn dashes() -> Self {
        Self::new([Glyph::Dash; DIGIT_COUNT], false)
    }

    /// `mm:ss`, minutes 0-99 and seconds 0-59.
    pub fn time(minutes: u32, seconds: u32) -> Option<Self> {
        if minutes > 99 || seconds > 59 {
            return None;
        }
        let [m1, m0] = two_digits(minutes)?;
        let [s1, s0] = two_digits(seconds)?;
        Some(Self::new([m1, m0, s1, s0], true))
    }

    /// Plain integer, zero padded to four places; negatives lead with a dash.
    ///
    /// Accepts -999 through 9999.
    pub fn number(value: i32) -> Option<Self> {
        if !(-999..=9999).contains(&value) {
            return None;
        }
        let magnitude = value.unsigned_abs();
        let mut glyphs = [
            Glyph::digit((magnitude / 1000 % 10) as u8)?,
            Glyph::digit((magnitude / 100 % 10) as u8)?,
            Glyph::digit((magnitude / 10 % 10) as u8)?,
            Glyph::digit((magnitude % 10) as u8)?,
        ];
        if value < 0 {
            glyphs[0] = Glyph::Dash;
        }
        Some(Self::new(glyphs, false))
    }

    /// Track number as `-NN-`, 1 through 99.
    pub fn track_number(number: u32) -> Option<Self> {
        if !(1..=99).contains(&number) {
            return None;
        }
        let [t1, t0] = two_digits(number)?;
        Some(Self::new([Glyph::Dash, t1, t0, Glyph::Dash], false))
    }

    /// Volume as `--NN`, or `-100` at full scale.
    pub fn volume(percent: u32) -> Option<Self> {
        match percent {
            100 => Some(Self::new(
                [Glyph::Dash, Glyph::One, Glyph::Zero, Glyph::Zero],
                false,
            )),
            0..=99 => {
                let [v1, v0] = two_digits(percent)?;
                Some(Self::new([Glyph::Dash, Glyph::Dash, v1, v0], false))
            }
            _ => None,
        }
    }

    /// Playlist length as `NN--`. Counts above 99 show as 99.
    pub fn track_total(count: u32) -> Self {
        let [c1, c0] = two_digits(count.min(99)).unwrap_or([Glyph::Nine, Glyph::Nine]);
        Self::new([c1, c0, Glyph::Dash, Glyph::Dash], false)
    }

    /// Bytes as clocked out, colon folded into the second digit.
    pub fn segments(&self) -> [u8; DIGIT_COUNT] {
        let mut bytes = self.glyphs.map(Glyph::segments);
        if self.colon {
            bytes[1] |= COLON_BIT;
        }
        bytes
    }
}

impl Default for DisplayFrame {
    fn default() -> Self {
        Self::blank()
    }
}

fn two_digits(value: u32) -> Option<[Glyph; 2]> {
    if value > 99 {
        return None;
    }
    Some([
        Glyph::digit((value / 10) as u8)?,
        Glyph::digit((value % 10) as u8)?,
    ])
}

/// Renders as the panel reads, e.g. `01:05`, `-07-`, `----`.
impl fmt::Display for DisplayFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, glyph) in self.glyphs.iter().enumerate() {
            if i == 2 && self.colon {
                f.write_str(":")?;
            }
            write!(f, "{}", glyph.as_char())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameParseError {
    /// Not four glyphs (plus an optional colon after the second).
    Length,
    /// A character with no glyph.
    Glyph(char),
}

impl fmt::Display for FrameParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameParseError::Length => write!(f, "frame must be 4 glyphs, optionally split by ':'"),
            FrameParseError::Glyph(c) => write!(f, "no glyph for {:?}", c),
        }
    }
}

/// Inverse of `Display`: `"01:05"` is digits 0105 with the colon lit.
impl FromStr for DisplayFrame {
    type Err = FrameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut glyphs = [Glyph::Blank; DIGIT_COUNT];
        let mut colon = false;
        let mut count = 0;

        for (i, c) in s.chars().enumerate() {
            if c == ':' && i == 2 && !colon {
                colon = true;
                continue;
            }
            if count == DIGIT_COUNT {
                return Err(FrameParseError::Length);
            }
            glyphs[count] = Glyph::from_char(c).ok_or(FrameParseError::Glyph(c))?;
            count += 1;
        }

        if count != DIGIT_COUNT {
            return Err(FrameParseError::Length);
        }
        Ok(Self::new(glyphs, colon))
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::string::ToString;

    fn frame(s: &str) -> DisplayFrame {
        s.parse().unwrap()
    }

    #[test]
    fn test_time_frames() {
        assert_eq!(DisplayFrame::time(1, 5), Some(frame("01:05")));
        assert_eq!(DisplayFrame::time(59, 59), Some(frame("59:59")));
        assert_eq!(DisplayFrame::time(99, 59), Some(frame("99:59")));
        assert_eq!(DisplayFrame::time(100, 0), None);
        assert_eq!(DisplayFrame::time(0, 60), None);
    }

    #[test]
    fn test_number_bounds() {
        assert_eq!(DisplayFrame::number(42), Some(frame("0042")));
        assert_eq!(DisplayFrame::number(9999), Some(frame("9999")));
        assert_eq!(DisplayFrame::number(-5), Some(frame("-005")));
        assert_eq!(DisplayFrame::number(-999), Some(frame("-999")));
        assert_eq!(DisplayFrame::number(10000), None);
        assert_eq!(DisplayFrame::number(-1000), None);
    }

    #[test]
    fn test_track_and_volume_frames() {
        assert_eq!(DisplayFrame::track_number(7), Some(frame("-07-")));
        assert_eq!(DisplayFrame::track_number(99), Some(frame("-99-")));
        assert_eq!(DisplayFrame::track_number(0), None);
        assert_eq!(DisplayFrame::track_number(100), None);

        assert_eq!(DisplayFrame::volume(5), Some(frame("--05")));
        assert_eq!(DisplayFrame::volume(0), Some(frame("--00")));
        assert_eq!(DisplayFrame::volume(100), Some(frame("-100")));
        assert_eq!(DisplayFrame::volume(101), None);
    }

    #[test]
    fn test_track_total_clamps() {
        assert_eq!(DisplayFrame::track_total(3), frame("03--"));
        assert_eq!(DisplayFrame::track_total(150), frame("99--"));
    }

    #[test]
    fn test_colon_rides_on_second_digit() {
        let bytes = frame("12:34").segments();
        assert_eq!(bytes, [0x06, 0x5B | COLON_BIT, 0x4F, 0x66]);

        let bytes = frame("1234").segments();
        assert_eq!(bytes, [0x06, 0x5B, 0x4F, 0x66]);
    }

    #[test]
    fn test_display_and_parse_agree() {
        for s in ["01:05", "----", "    ", "-07-", "  :  "] {
            assert_eq!(frame(s).to_string(), s);
        }
        assert_eq!("123".parse::<DisplayFrame>(), Err(FrameParseError::Length));
        assert_eq!("12345".parse::<DisplayFrame>(), Err(FrameParseError::Length));
        assert_eq!("12a4".parse::<DisplayFrame>(), Err(FrameParseError::Glyph('a')));
    }
}
