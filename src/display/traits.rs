/*
 *  display/traits.rs
 *
 *  tempo - MPD front panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Segment display abstraction
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use tempo_driver_tm1637::DisplayFrame;

use crate::display::error::DisplayError;

/// A 4-digit segment display that owns its lines exclusively.
///
/// Every call is a complete, uninterruptible transfer; nothing else may touch
/// the display lines while one is in progress.
pub trait DisplayDriver: Send {
    /// Push a whole frame and re-assert the display control byte.
    fn render(&mut self, frame: &DisplayFrame) -> Result<(), DisplayError>;

    /// Brightness 0-7 without retransmitting the frame. Repeating the
    /// current level is a no-op.
    fn set_brightness(&mut self, level: u8) -> Result<(), DisplayError>;

    fn brightness(&self) -> u8;

    /// Blank all four digits, colon off
    fn clear(&mut self) -> Result<(), DisplayError> {
        self.render(&DisplayFrame::blank())
    }

    /// Switch the LEDs off via display control
    fn display_off(&mut self) -> Result<(), DisplayError>;
}

/// Type alias for boxed display driver trait objects
pub type BoxedDriver = Box<dyn DisplayDriver>;
