/*
 *  leds.rs
 *
 *  tempo - MPD front panel
 *	(c) 2020-26 Stuart Hunter
 *
 *	Mode indicator LEDs (repeat, random, single, consume) plus an optional
 *	error LED. Hardware is only written when a channel actually changes.
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use embedded_hal::digital::OutputPin;
use log::{debug, info, warn};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use crate::display::DisplayError;
use crate::gpio;
use crate::settings::HardwareSettings;
use crate::status::LedFlags;

const CHANNEL_NAMES: [&str; 4] = ["repeat", "random", "single", "consume"];

/// One LED. `percent` 0 is off; anything else is on, dimmed where the
/// hardware can.
pub trait IndicatorLed: Send {
    fn set_level(&mut self, percent: u8) -> Result<(), DisplayError>;
}

pub type BoxedLed = Box<dyn IndicatorLed>;

/// Plain on/off LED on an output line.
pub struct DigitalLed<P> {
    pin: P,
}

impl<P> DigitalLed<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P> IndicatorLed for DigitalLed<P>
where
    P: OutputPin + Send,
    P::Error: Debug,
{
    fn set_level(&mut self, percent: u8) -> Result<(), DisplayError> {
        let result = if percent > 0 { self.pin.set_high() } else { self.pin.set_low() };
        result.map_err(|e| DisplayError::GpioError(format!("{:?}", e)))
    }
}

/// Software PWM LED via rppal, duty cycle = percent.
#[cfg(feature = "pwm-leds")]
pub struct PwmLed {
    pin: rppal::gpio::OutputPin,
    frequency: f64,
}

#[cfg(feature = "pwm-leds")]
impl PwmLed {
    pub fn open(bcm: u8, frequency: f64) -> Result<Self, DisplayError> {
        let pin = rppal::gpio::Gpio::new()
            .and_then(|gpio| gpio.get(bcm))
            .map_err(|e| DisplayError::GpioError(format!("BCM {}: {}", bcm, e)))?
            .into_output_low();
        Ok(Self { pin, frequency })
    }
}

#[cfg(feature = "pwm-leds")]
impl IndicatorLed for PwmLed {
    fn set_level(&mut self, percent: u8) -> Result<(), DisplayError> {
        let result = if percent == 0 {
            self.pin.clear_pwm().map(|_| self.pin.set_low())
        } else {
            let duty = f64::from(percent.min(100)) / 100.0;
            self.pin.set_pwm_frequency(self.frequency, duty)
        };
        result.map_err(|e| DisplayError::GpioError(e.to_string()))
    }
}

/// Records levels instead of driving hardware. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct MockLed {
    writes: Arc<Mutex<Vec<u8>>>,
    fail: Arc<Mutex<bool>>,
}

impl MockLed {
    pub fn writes(&self) -> Vec<u8> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn set_failing(&self, fail: bool) {
        if let Ok(mut f) = self.fail.lock() {
            *f = fail;
        }
    }
}

impl IndicatorLed for MockLed {
    fn set_level(&mut self, percent: u8) -> Result<(), DisplayError> {
        if self.fail.lock().map(|f| *f).unwrap_or(false) {
            return Err(DisplayError::GpioError("simulated failure".into()));
        }
        if let Ok(mut w) = self.writes.lock() {
            w.push(percent);
        }
        Ok(())
    }
}

struct Channel {
    name: &'static str,
    led: BoxedLed,
    /// Last state known to be on the hardware; `None` until the first
    /// successful write or after a failed one.
    lit: Option<bool>,
}

impl Channel {
    fn new(name: &'static str, led: BoxedLed) -> Self {
        Self { name, led, lit: None }
    }

    fn write(&mut self, on: bool, level: u8) {
        match self.led.set_level(if on { level } else { 0 }) {
            Ok(()) => self.lit = Some(on),
            Err(e) => {
                warn!("{} LED write failed: {}", self.name, e);
                self.lit = None;
            }
        }
    }

    fn sync(&mut self, on: bool, level: u8) {
        if self.lit != Some(on) {
            self.write(on, level);
        }
    }
}

/// Mirrors the playback mode flags onto four LEDs.
pub struct LedSync {
    channels: [Channel; 4],
    error: Option<Channel>,
    level: u8,
}

impl LedSync {
    /// `leds` in repeat, random, single, consume order; `level` is the duty
    /// used for lit LEDs.
    pub fn new(leds: [BoxedLed; 4], error: Option<BoxedLed>, level: u8) -> Self {
        let [repeat, random, single, consume] = leds;
        Self {
            channels: [
                Channel::new(CHANNEL_NAMES[0], repeat),
                Channel::new(CHANNEL_NAMES[1], random),
                Channel::new(CHANNEL_NAMES[2], single),
                Channel::new(CHANNEL_NAMES[3], consume),
            ],
            error: error.map(|led| Channel::new("error", led)),
            level,
        }
    }

    /// Request the configured lines and build the LEDs.
    pub fn open(hw: &HardwareSettings, level: u8) -> Result<Self, DisplayError> {
        #[cfg(feature = "pwm-leds")]
        if hw.pwm {
            return Self::open_pwm(hw, level);
        }
        #[cfg(not(feature = "pwm-leds"))]
        if hw.pwm {
            warn!("leds.pwm set but built without the pwm-leds feature; LEDs are on/off only");
        }

        let mut chip = gpio::open_chip(&hw.chip)?;
        let mut digital = |offset: u32| -> Result<BoxedLed, DisplayError> {
            Ok(Box::new(DigitalLed::new(gpio::output_pin(&mut chip, offset, 0)?)))
        };
        let leds = [
            digital(hw.leds[0])?,
            digital(hw.leds[1])?,
            digital(hw.leds[2])?,
            digital(hw.leds[3])?,
        ];
        let error = hw.error_led.map(&mut digital).transpose()?;
        info!("LEDs .............: {} lines {:?} error {:?}", hw.chip, hw.leds, hw.error_led);
        Ok(Self::new(leds, error, level))
    }

    #[cfg(feature = "pwm-leds")]
    fn open_pwm(hw: &HardwareSettings, level: u8) -> Result<Self, DisplayError> {
        let pwm = |bcm: u32| -> Result<BoxedLed, DisplayError> {
            let bcm = u8::try_from(bcm).map_err(|_| {
                DisplayError::InvalidConfiguration(format!("BCM pin {} out of range", bcm))
            })?;
            Ok(Box::new(PwmLed::open(bcm, hw.pwm_frequency)?))
        };
        let leds = [pwm(hw.leds[0])?, pwm(hw.leds[1])?, pwm(hw.leds[2])?, pwm(hw.leds[3])?];
        let error = hw.error_led.map(pwm).transpose()?;
        info!("LEDs .............: PWM {:?} at {} Hz", hw.leds, hw.pwm_frequency);
        Ok(Self::new(leds, error, level))
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Write only the channels whose state differs from the last write.
    pub fn apply(&mut self, flags: LedFlags) {
        let level = self.level;
        for (channel, on) in self.channels.iter_mut().zip(flags.channels()) {
            if channel.lit != Some(on) {
                debug!("{} LED {}", channel.name, if on { "on" } else { "off" });
            }
            channel.sync(on, level);
        }
    }

    /// Force the four mode LEDs off regardless of what was last written.
    pub fn all_off(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.write(false, 0);
        }
    }

    pub fn set_error(&mut self, on: bool) {
        let level = self.level;
        if let Some(channel) = self.error.as_mut() {
            channel.sync(on, level);
        }
    }

    /// New duty for lit LEDs; lit channels are rewritten at once.
    pub fn set_level(&mut self, level: u8) {
        if level == self.level {
            return;
        }
        debug!("LED level {}% -> {}%", self.level, level);
        self.level = level;
        for channel in self.channels.iter_mut().chain(self.error.as_mut()) {
            if channel.lit == Some(true) {
                channel.write(true, level);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bench(level: u8) -> (LedSync, [MockLed; 4], MockLed) {
        let mocks: [MockLed; 4] = Default::default();
        let error = MockLed::default();
        let leds: [BoxedLed; 4] = [
            Box::new(mocks[0].clone()),
            Box::new(mocks[1].clone()),
            Box::new(mocks[2].clone()),
            Box::new(mocks[3].clone()),
        ];
        (LedSync::new(leds, Some(Box::new(error.clone())), level), mocks, error)
    }

    fn flags(repeat: bool, random: bool, single: bool, consume: bool) -> LedFlags {
        LedFlags { repeat, random, single, consume }
    }

    #[test]
    fn test_first_apply_writes_every_channel() {
        let (mut sync, mocks, _) = bench(30);
        sync.apply(flags(true, false, false, true));
        assert_eq!(mocks[0].writes(), vec![30]);
        assert_eq!(mocks[1].writes(), vec![0]);
        assert_eq!(mocks[2].writes(), vec![0]);
        assert_eq!(mocks[3].writes(), vec![30]);
    }

    #[test]
    fn test_unchanged_flags_write_nothing() {
        let (mut sync, mocks, _) = bench(30);
        sync.apply(flags(true, false, false, false));
        sync.apply(flags(true, false, false, false));
        sync.apply(flags(true, true, false, false));

        assert_eq!(mocks[0].writes(), vec![30]);
        assert_eq!(mocks[1].writes(), vec![0, 30]);
        assert_eq!(mocks[2].writes(), vec![0]);
    }

    #[test]
    fn test_all_off_is_unconditional() {
        let (mut sync, mocks, error) = bench(30);
        sync.apply(flags(false, false, false, false));
        sync.all_off();
        for m in &mocks {
            assert_eq!(m.writes(), vec![0, 0]);
        }
        assert!(error.writes().is_empty());

        // state after all_off is "off", so an all-false apply is silent
        sync.apply(flags(false, false, false, false));
        assert_eq!(mocks[0].writes(), vec![0, 0]);
    }

    #[test]
    fn test_level_change_rewrites_lit_channels() {
        let (mut sync, mocks, error) = bench(30);
        sync.apply(flags(true, false, false, false));
        sync.set_error(true);

        sync.set_level(90);
        sync.set_level(90);

        assert_eq!(mocks[0].writes(), vec![30, 90]);
        assert_eq!(mocks[1].writes(), vec![0]);
        assert_eq!(error.writes(), vec![30, 90]);
        assert_eq!(sync.level(), 90);
    }

    #[test]
    fn test_failed_write_is_retried() {
        let (mut sync, mocks, _) = bench(30);
        mocks[2].set_failing(true);
        sync.apply(flags(false, false, true, false));
        assert!(mocks[2].writes().is_empty());

        mocks[2].set_failing(false);
        sync.apply(flags(false, false, true, false));
        assert_eq!(mocks[2].writes(), vec![30]);
    }

    #[test]
    fn test_error_led() {
        let (mut sync, _, error) = bench(45);
        sync.set_error(true);
        sync.set_error(true);
        sync.set_error(false);
        assert_eq!(error.writes(), vec![45, 0]);
    }
}
