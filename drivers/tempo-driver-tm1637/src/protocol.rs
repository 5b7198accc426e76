/*
 *  protocol.rs
 *
 *  TM1637 two-wire protocol, bit-banged over a clock and a data line.
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 */

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::frame::{DisplayFrame, DIGIT_COUNT};

/// Data command, auto-increment addressing.
pub const CMD_DATA: u8 = 0x40;
/// Address command for digit 0.
pub const CMD_ADDRESS_0: u8 = 0xC0;
/// Display control command; low three bits carry brightness.
pub const CMD_DISPLAY: u8 = 0x80;
/// Display-on flag inside the control command.
pub const DISPLAY_ON: u8 = 0x08;

pub const MAX_BRIGHTNESS: u8 = 7;

/// Settle time after every line change.
pub const DEFAULT_BIT_DELAY_US: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// A GPIO line refused a level change.
    Pin(E),
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Pin(e) => write!(f, "TM1637 pin error: {:?}", e),
        }
    }
}

/// A TM1637 module on two output lines.
///
/// The chip acknowledges every byte by pulling DIO low; since the line is
/// driven as an output the ack is clocked past and never read.
pub struct Tm1637<P, D> {
    clk: P,
    dio: P,
    delay: D,
    brightness: u8,
    bit_delay_us: u32,
}

impl<P, D> Tm1637<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    /// Take ownership of the lines, idle them high and switch the display on
    /// at `brightness` (clamped to 0-7).
    pub fn new(clk: P, dio: P, delay: D, brightness: u8) -> Result<Self, Error<P::Error>> {
        let mut tm = Self {
            clk,
            dio,
            delay,
            brightness: brightness.min(MAX_BRIGHTNESS),
            bit_delay_us: DEFAULT_BIT_DELAY_US,
        };

        tm.clk.set_high().map_err(Error::Pin)?;
        tm.dio.set_high().map_err(Error::Pin)?;
        tm.write_control()?;

        #[cfg(feature = "debug-logging")]
        log::debug!("TM1637 initialised at brightness {}", tm.brightness);

        Ok(tm)
    }

    pub fn with_bit_delay(mut self, us: u32) -> Self {
        self.bit_delay_us = us;
        self
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Change brightness without touching the digit registers. Writing the
    /// level already in force sends nothing.
    pub fn set_brightness(&mut self, level: u8) -> Result<(), Error<P::Error>> {
        let level = level.min(MAX_BRIGHTNESS);
        if level == self.brightness {
            return Ok(());
        }
        self.brightness = level;
        self.write_control()
    }

    /// Push a full frame: data command, four digit bytes from address 0,
    /// then display control.
    pub fn write_frame(&mut self, frame: &DisplayFrame) -> Result<(), Error<P::Error>> {
        self.write_segments(&frame.segments())
    }

    /// Raw segment bytes, colon already folded in.
    pub fn write_segments(&mut self, segments: &[u8; DIGIT_COUNT]) -> Result<(), Error<P::Error>> {
        self.command(&[CMD_DATA])?;

        self.start()?;
        self.write_byte(CMD_ADDRESS_0)?;
        for &seg in segments {
            self.write_byte(seg)?;
        }
        self.stop()?;

        self.command(&[CMD_DISPLAY | DISPLAY_ON | self.brightness])
    }

    pub fn clear(&mut self) -> Result<(), Error<P::Error>> {
        self.write_frame(&DisplayFrame::blank())
    }

    /// Blank the LEDs via the control register; digit registers are kept.
    pub fn display_off(&mut self) -> Result<(), Error<P::Error>> {
        self.command(&[CMD_DISPLAY | self.brightness])
    }

    /// Hand the lines and delay back.
    pub fn release(self) -> (P, P, D) {
        (self.clk, self.dio, self.delay)
    }

    // The show_* helpers leave the panel alone when the value does not fit.

    pub fn show_number(&mut self, value: i32) -> Result<(), Error<P::Error>> {
        self.write_opt(DisplayFrame::number(value))
    }

    pub fn show_time(&mut self, minutes: u32, seconds: u32) -> Result<(), Error<P::Error>> {
        self.write_opt(DisplayFrame::time(minutes, seconds))
    }

    pub fn show_volume(&mut self, percent: u32) -> Result<(), Error<P::Error>> {
        self.write_opt(DisplayFrame::volume(percent))
    }

    pub fn show_track_number(&mut self, number: u32) -> Result<(), Error<P::Error>> {
        self.write_opt(DisplayFrame::track_number(number))
    }

    pub fn show_track_total(&mut self, count: u32) -> Result<(), Error<P::Error>> {
        self.write_frame(&DisplayFrame::track_total(count))
    }

    pub fn show_dashes(&mut self) -> Result<(), Error<P::Error>> {
        self.write_frame(&DisplayFrame::dashes())
    }

    fn write_opt(&mut self, frame: Option<DisplayFrame>) -> Result<(), Error<P::Error>> {
        match frame {
            Some(frame) => self.write_frame(&frame),
            None => {
                #[cfg(feature = "debug-logging")]
                log::debug!("TM1637 value out of range, frame skipped");
                Ok(())
            }
        }
    }

    fn write_control(&mut self) -> Result<(), Error<P::Error>> {
        self.command(&[CMD_DATA])?;
        self.command(&[CMD_DISPLAY | DISPLAY_ON | self.brightness])
    }

    /// One start..stop transaction.
    fn command(&mut self, bytes: &[u8]) -> Result<(), Error<P::Error>> {
        self.start()?;
        for &b in bytes {
            self.write_byte(b)?;
        }
        self.stop()
    }

    fn start(&mut self) -> Result<(), Error<P::Error>> {
        self.dio_level(true)?;
        self.clk_level(true)?;
        self.dio_level(false)?;
        self.clk_level(false)
    }

    fn stop(&mut self) -> Result<(), Error<P::Error>> {
        self.clk_level(false)?;
        self.dio_level(false)?;
        self.clk_level(true)?;
        self.dio_level(true)
    }

    /// LSB first, then one clock for the ack.
    fn write_byte(&mut self, byte: u8) -> Result<(), Error<P::Error>> {
        let mut data = byte;
        for _ in 0..8 {
            self.clk_level(false)?;
            self.dio_level(data & 0x01 != 0)?;
            self.clk_level(true)?;
            data >>= 1;
        }

        self.clk_level(false)?;
        self.dio_level(true)?;
        self.clk_level(true)?;
        self.clk_level(false)
    }

    fn clk_level(&mut self, high: bool) -> Result<(), Error<P::Error>> {
        let result = if high {
            self.clk.set_high()
        } else {
            self.clk.set_low()
        };
        result.map_err(Error::Pin)?;
        self.delay.delay_us(self.bit_delay_us);
        Ok(())
    }

    fn dio_level(&mut self, high: bool) -> Result<(), Error<P::Error>> {
        let result = if high {
            self.dio.set_high()
        } else {
            self.dio.set_low()
        };
        result.map_err(Error::Pin)?;
        self.delay.delay_us(self.bit_delay_us);
        Ok(())
    }
}
