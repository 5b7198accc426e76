/*
 *  gpio.rs
 *
 *  tempo - MPD front panel
 *	(c) 2020-26 Stuart Hunter
 *
 *	Character-device GPIO helpers. Each requested line is owned by exactly
 *	one component for the life of the process.
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::CdevPin;
use log::debug;

use crate::display::DisplayError;

const CONSUMER: &str = "tempo";

pub fn open_chip(path: &str) -> Result<Chip, DisplayError> {
    Chip::new(path).map_err(|e| {
        DisplayError::InitializationFailed(format!("cannot open {}: {}", path, e))
    })
}

/// Request `offset` as an output, driven to `initial` (0 or 1).
pub fn output_pin(chip: &mut Chip, offset: u32, initial: u8) -> Result<CdevPin, DisplayError> {
    let handle = chip
        .get_line(offset)
        .and_then(|line| line.request(LineRequestFlags::OUTPUT, initial, CONSUMER))
        .map_err(|e| DisplayError::GpioError(format!("line {}: {}", offset, e)))?;
    debug!("GPIO line {} requested as output", offset);
    Ok(CdevPin::new(handle)?)
}
