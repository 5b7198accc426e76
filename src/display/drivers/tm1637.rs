/*
 *  display/drivers/tm1637.rs
 *
 *  tempo - MPD front panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  TM1637 panel on two character-device GPIO lines
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

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use linux_embedded_hal::{CdevPin, Delay};
use log::{debug, info};
use std::fmt::Debug;
use tempo_driver_tm1637::{DisplayFrame, Tm1637};

use crate::display::error::DisplayError;
use crate::display::traits::DisplayDriver;
use crate::gpio;

pub struct Tm1637Driver<P, D> {
    tm: Tm1637<P, D>,
}

impl<P, D> Tm1637Driver<P, D>
where
    P: OutputPin,
    P::Error: Debug,
    D: DelayNs,
{
    /// Initialise the module: idle lines, data command, display on.
    pub fn new(clk: P, dio: P, delay: D, brightness: u8) -> Result<Self, DisplayError> {
        let tm = Tm1637::new(clk, dio, delay, brightness)
            .map_err(|e| DisplayError::InitializationFailed(format!("TM1637: {:?}", e)))?;
        Ok(Self { tm })
    }
}

impl Tm1637Driver<CdevPin, Delay> {
    /// Request `clk` and `dio` on `chip` and bring the display up.
    pub fn open(chip: &str, clk: u32, dio: u32, brightness: u8) -> Result<Self, DisplayError> {
        let mut chip_handle = gpio::open_chip(chip)?;
        let clk_pin = gpio::output_pin(&mut chip_handle, clk, 1)?;
        let dio_pin = gpio::output_pin(&mut chip_handle, dio, 1)?;

        let driver = Self::new(clk_pin, dio_pin, Delay, brightness)?;
        info!("TM1637 ...........: {} clk {} dio {}", chip, clk, dio);
        Ok(driver)
    }
}

impl<P, D> DisplayDriver for Tm1637Driver<P, D>
where
    P: OutputPin + Send,
    P::Error: Debug,
    D: DelayNs + Send,
{
    fn render(&mut self, frame: &DisplayFrame) -> Result<(), DisplayError> {
        self.tm.write_frame(frame)?;
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) -> Result<(), DisplayError> {
        if level != self.tm.brightness() {
            debug!("TM1637 brightness {} -> {}", self.tm.brightness(), level);
        }
        self.tm.set_brightness(level)?;
        Ok(())
    }

    fn brightness(&self) -> u8 {
        self.tm.brightness()
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.tm.clear()?;
        Ok(())
    }

    fn display_off(&mut self) -> Result<(), DisplayError> {
        self.tm.display_off()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::traits::BoxedDriver;
    use embedded_hal::digital::ErrorType;
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};

    /// Counts level changes on one line.
    #[derive(Clone, Default)]
    struct CountingPin {
        writes: Arc<Mutex<usize>>,
    }

    impl ErrorType for CountingPin {
        type Error = Infallible;
    }

    impl OutputPin for CountingPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            *self.writes.lock().unwrap() += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            *self.writes.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn test_driver_brightness_passthrough() {
        let clk = CountingPin::default();
        let writes = clk.writes.clone();
        let mut driver = Tm1637Driver::new(clk, CountingPin::default(), NoDelay, 9).unwrap();
        assert_eq!(driver.brightness(), 7);

        let before = *writes.lock().unwrap();
        driver.set_brightness(7).unwrap();
        assert_eq!(*writes.lock().unwrap(), before);

        driver.set_brightness(1).unwrap();
        assert!(*writes.lock().unwrap() > before);
        assert_eq!(driver.brightness(), 1);
    }

    #[test]
    fn test_driver_render_and_off() {
        let clk = CountingPin::default();
        let writes = clk.writes.clone();
        let mut driver: BoxedDriver = Box::new(
            Tm1637Driver::new(clk, CountingPin::default(), NoDelay, 2).unwrap(),
        );

        let before = *writes.lock().unwrap();
        driver.render(&"12:34".parse().unwrap()).unwrap();
        driver.clear().unwrap();
        driver.display_off().unwrap();
        assert!(*writes.lock().unwrap() > before);
    }
}
