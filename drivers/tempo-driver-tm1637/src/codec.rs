/*
 *  codec.rs
 *
 *  Glyph to segment pattern mapping for TM1637 modules.
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 */

/// Segment bit used for the colon (or apostrophe) on digit two.
///
/// Kept out of the glyph table; callers OR it in per frame.
pub const COLON_BIT: u8 = 0b_1000_0000;

/// Everything the panel ever draws. `encode` is total over this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Glyph {
    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Dash,
    Blank,
}

//      A
//     ---
//  F |   | B
//     -G-
//  E |   | C
//     ---
//      D
const SEG_A: u8 = 0b_0000_0001;
const SEG_B: u8 = 0b_0000_0010;
const SEG_C: u8 = 0b_0000_0100;
const SEG_D: u8 = 0b_0000_1000;
const SEG_E: u8 = 0b_0001_0000;
const SEG_F: u8 = 0b_0010_0000;
const SEG_G: u8 = 0b_0100_0000;

const DIGITS: [Glyph; 10] = [
    Glyph::Zero,
    Glyph::One,
    Glyph::Two,
    Glyph::Three,
    Glyph::Four,
    Glyph::Five,
    Glyph::Six,
    Glyph::Seven,
    Glyph::Eight,
    Glyph::Nine,
];

impl Glyph {
    /// Glyph for a single decimal digit, `None` above 9.
    pub const fn digit(value: u8) -> Option<Glyph> {
        if value < 10 {
            Some(DIGITS[value as usize])
        } else {
            None
        }
    }

    /// Parse the textual form used in frames: `0`-`9`, `-` and space.
    pub fn from_char(c: char) -> Option<Glyph> {
        match c {
            '-' => Some(Glyph::Dash),
            ' ' => Some(Glyph::Blank),
            _ => c.to_digit(10).and_then(|d| Glyph::digit(d as u8)),
        }
    }

    pub const fn as_char(self) -> char {
        match self {
            Glyph::Zero => '0',
            Glyph::One => '1',
            Glyph::Two => '2',
            Glyph::Three => '3',
            Glyph::Four => '4',
            Glyph::Five => '5',
            Glyph::Six => '6',
            Glyph::Seven => '7',
            Glyph::Eight => '8',
            Glyph::Nine => '9',
            Glyph::Dash => '-',
            Glyph::Blank => ' ',
        }
    }

    /// Segment pattern, colon bit clear.
    #[inline]
    pub const fn segments(self) -> u8 {
        encode(self)
    }
}

/// Standard common-cathode encoding, bit 0 = segment A.
pub const fn encode(glyph: Glyph) -> u8 {
    match glyph {
        Glyph::Zero => SEG_A | SEG_B | SEG_C | SEG_D | SEG_E | SEG_F,
        Glyph::One => SEG_B | SEG_C,
        Glyph::Two => SEG_A | SEG_B | SEG_D | SEG_E | SEG_G,
        Glyph::Three => SEG_A | SEG_B | SEG_C | SEG_D | SEG_G,
        Glyph::Four => SEG_B | SEG_C | SEG_F | SEG_G,
        Glyph::Five => SEG_A | SEG_C | SEG_D | SEG_F | SEG_G,
        Glyph::Six => SEG_A | SEG_C | SEG_D | SEG_E | SEG_F | SEG_G,
        Glyph::Seven => SEG_A | SEG_B | SEG_C,
        Glyph::Eight => SEG_A | SEG_B | SEG_C | SEG_D | SEG_E | SEG_F | SEG_G,
        Glyph::Nine => SEG_A | SEG_B | SEG_C | SEG_D | SEG_F | SEG_G,
        Glyph::Dash => SEG_G,
        Glyph::Blank => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph_table_is_fixed() {
        let expected: [(char, u8); 12] = [
            ('0', 0x3F),
            ('1', 0x06),
            ('2', 0x5B),
            ('3', 0x4F),
            ('4', 0x66),
            ('5', 0x6D),
            ('6', 0x7D),
            ('7', 0x07),
            ('8', 0x7F),
            ('9', 0x6F),
            ('-', 0x40),
            (' ', 0x00),
        ];

        for (c, pattern) in expected {
            let glyph = Glyph::from_char(c).unwrap();
            assert_eq!(encode(glyph), pattern, "glyph {:?}", c);
            assert_eq!(glyph.as_char(), c);
        }
    }

    #[test]
    fn test_colon_bit_not_in_table() {
        for d in 0..10 {
            assert_eq!(encode(Glyph::digit(d).unwrap()) & COLON_BIT, 0);
        }
        assert_eq!(encode(Glyph::Dash) & COLON_BIT, 0);
    }

    #[test]
    fn test_undefined_glyphs_rejected() {
        assert_eq!(Glyph::digit(10), None);
        assert_eq!(Glyph::from_char('A'), None);
        assert_eq!(Glyph::from_char(':'), None);
    }
}
