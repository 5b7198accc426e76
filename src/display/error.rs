/*
 *  display/error.rs
 *
 *  tempo - MPD front panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Error type for the panel hardware: display lines and indicator LEDs
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

use std::error::Error;
use std::fmt;

use linux_embedded_hal::gpio_cdev;

#[derive(Debug)]
pub enum DisplayError {
    /// Hardware initialization failed
    InitializationFailed(String),

    /// GPIO line request or level change failed
    GpioError(String),

    /// Invalid configuration
    InvalidConfiguration(String),
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::InitializationFailed(msg) =>
                write!(f, "Display initialization failed: {}", msg),
            DisplayError::GpioError(msg) =>
                write!(f, "GPIO error: {}", msg),
            DisplayError::InvalidConfiguration(msg) =>
                write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl Error for DisplayError {}

// Pin errors from the bit-bang driver
impl<E: fmt::Debug> From<tempo_driver_tm1637::Error<E>> for DisplayError {
    fn from(err: tempo_driver_tm1637::Error<E>) -> Self {
        DisplayError::GpioError(format!("{:?}", err))
    }
}

impl From<gpio_cdev::Error> for DisplayError {
    fn from(err: gpio_cdev::Error) -> Self {
        DisplayError::GpioError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_error_conversion() {
        let err: DisplayError = tempo_driver_tm1637::Error::Pin("line busy").into();
        assert!(matches!(&err, DisplayError::GpioError(msg) if msg.contains("line busy")));
        assert_eq!(err.to_string(), "GPIO error: Pin(\"line busy\")");
    }
}
