/*
 *  tempo TM1637 driver
 *
 *  A bit-banged driver for TM1637 class 4-digit 7-segment LED modules,
 *  used by the tempo MPD front panel.
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 */

//! # tempo TM1637 Display Driver
//!
//! The TM1637 has no dedicated bus controller on the Raspberry Pi, so the
//! two-wire protocol is clocked out by hand over two GPIO output lines.
//!
//! ## Features
//!
//! - 4 digit frames built from digits, dash and blank glyphs
//! - colon segment (wired to the high bit of the second digit)
//! - 8 brightness levels and display off
//! - range checked helpers for times, volume, track numbers
//!
//! ## Usage
//!
//! ```ignore
//! let mut tm = Tm1637::new(clk, dio, delay, 2)?;
//! tm.write_frame(&DisplayFrame::time(1, 5).unwrap())?;
//! ```
//!
//! Any pair of `embedded_hal::digital::OutputPin` lines and an
//! `embedded_hal::delay::DelayNs` source will do.

#![no_std]

mod codec;
mod frame;
mod protocol;

pub use codec::{encode, Glyph, COLON_BIT};
pub use frame::{DisplayFrame, FrameParseError, DIGIT_COUNT};
pub use protocol::{
    Error, Tm1637, CMD_ADDRESS_0, CMD_DATA, CMD_DISPLAY, DEFAULT_BIT_DELAY_US, DISPLAY_ON,
    MAX_BRIGHTNESS,
};
