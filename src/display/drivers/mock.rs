/*
 *  display/drivers/mock.rs
 *
 *  tempo - MPD front panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock display driver for testing and --dry-run without hardware
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

use log::debug;
use std::sync::{Arc, Mutex};
use tempo_driver_tm1637::{DisplayFrame, MAX_BRIGHTNESS};

use crate::display::error::DisplayError;
use crate::display::traits::DisplayDriver;

/// Records every operation instead of driving lines.
///
/// Clones share state, so a test can keep one handle for inspection and
/// hand the other to the scheduler.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockDriverState>>,
}

/// Internal state for the mock driver (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockDriverState {
    /// Every frame rendered, oldest first
    pub frames: Vec<DisplayFrame>,

    /// Number of times clear() was called
    pub clear_count: usize,

    /// Brightness changes that would have reached the wire
    pub brightness_writes: Vec<u8>,

    pub brightness: u8,

    /// Whether display_off() has been called since the last render
    pub is_off: bool,

    /// Simulate failures (for error testing)
    pub simulate_failure: bool,

    /// Oldest frames are dropped beyond this many
    pub history_limit: Option<usize>,
}

impl MockDriver {
    pub fn new(brightness: u8) -> Self {
        let driver = Self::default();
        driver.lock().brightness = brightness.min(MAX_BRIGHTNESS);
        driver
    }

    /// Keep only the newest `limit` frames.
    pub fn with_history(self, limit: usize) -> Self {
        self.lock().history_limit = Some(limit.max(1));
        self
    }

    /// Shared state handle for assertions.
    pub fn state(&self) -> Arc<Mutex<MockDriverState>> {
        self.state.clone()
    }

    pub fn last_frame(&self) -> Option<DisplayFrame> {
        self.lock().frames.last().copied()
    }

    /// Rendered frames in panel notation, e.g. `"01:05"`.
    pub fn rendered(&self) -> Vec<String> {
        self.lock().frames.iter().map(|f| f.to_string()).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockDriverState> {
        // a test that panicked while holding the lock already failed
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self) -> Result<(), DisplayError> {
        if self.lock().simulate_failure {
            return Err(DisplayError::GpioError("simulated failure".into()));
        }
        Ok(())
    }
}

impl DisplayDriver for MockDriver {
    fn render(&mut self, frame: &DisplayFrame) -> Result<(), DisplayError> {
        self.check()?;
        debug!("panel [{}]", frame);
        let mut state = self.lock();
        state.frames.push(*frame);
        if let Some(limit) = state.history_limit {
            let excess = state.frames.len().saturating_sub(limit);
            state.frames.drain(..excess);
        }
        state.is_off = false;
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) -> Result<(), DisplayError> {
        self.check()?;
        let level = level.min(MAX_BRIGHTNESS);
        let mut state = self.lock();
        if state.brightness != level {
            state.brightness = level;
            state.brightness_writes.push(level);
        }
        Ok(())
    }

    fn brightness(&self) -> u8 {
        self.lock().brightness
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.render(&DisplayFrame::blank())?;
        self.lock().clear_count += 1;
        Ok(())
    }

    fn display_off(&mut self) -> Result<(), DisplayError> {
        self.check()?;
        self.lock().is_off = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_driver_records_frames() {
        let mut driver = MockDriver::new(2);
        let probe = driver.clone();

        driver.render(&"01:05".parse().unwrap()).unwrap();
        driver.render(&DisplayFrame::dashes()).unwrap();

        assert_eq!(probe.rendered(), vec!["01:05", "----"]);
        assert_eq!(probe.last_frame(), Some(DisplayFrame::dashes()));
    }

    #[test]
    fn test_mock_driver_brightness() {
        let mut driver = MockDriver::new(2);

        driver.set_brightness(2).unwrap();
        driver.set_brightness(6).unwrap();
        driver.set_brightness(6).unwrap();
        driver.set_brightness(11).unwrap();

        assert_eq!(driver.state().lock().unwrap().brightness_writes, vec![6, 7]);
        assert_eq!(driver.brightness(), 7);
    }

    #[test]
    fn test_mock_driver_clear_and_off() {
        let mut driver = MockDriver::new(2);
        driver.clear().unwrap();
        driver.display_off().unwrap();

        let state = driver.state();
        let state = state.lock().unwrap();
        assert_eq!(state.clear_count, 1);
        assert_eq!(state.frames, vec![DisplayFrame::blank()]);
        assert!(state.is_off);
    }

    #[test]
    fn test_mock_driver_history_limit() {
        let mut driver = MockDriver::new(2).with_history(2);
        for frame in ["00:01", "00:02", "00:03"] {
            driver.render(&frame.parse().unwrap()).unwrap();
        }
        assert_eq!(driver.rendered(), vec!["00:02", "00:03"]);
    }

    #[test]
    fn test_mock_driver_simulated_failure() {
        let mut driver = MockDriver::new(2);

        driver.state().lock().unwrap().simulate_failure = true;
        assert!(driver.render(&DisplayFrame::blank()).is_err());

        driver.state().lock().unwrap().simulate_failure = false;
        assert!(driver.render(&DisplayFrame::blank()).is_ok());
    }
}
