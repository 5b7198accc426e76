/*
 *  settings.rs
 *
 *  tempo - MPD front panel
 *	(c) 2020-26 Stuart Hunter
 *
 *	Resolved, immutable configuration snapshots and the hot-reload task
 *	that publishes them.
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

use log::{debug, error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

use crate::config::{self, Cli, Config, DisplayMode};

pub const BRIGHTNESS_LEVELS: usize = 8;
pub const DEFAULT_BRIGHTNESS: u8 = 2;
pub const DEFAULT_LED_TIERS: [u8; BRIGHTNESS_LEVELS] = [10, 20, 30, 45, 60, 75, 90, 100];

const DEFAULT_BLINK_INTERVAL: f64 = 1.0;
const DEFAULT_TRACK_NUMBER_TIME: f64 = 2.0;
const DEFAULT_STOP_STEP_TIME: f64 = 2.0;
const DEFAULT_UPDATE_INTERVAL: f64 = 1.0;
const DEFAULT_VOLUME_UPDATE_INTERVAL: f64 = 0.1;
const DEFAULT_VOLUME_DISPLAY_DURATION: f64 = 3.0;

const DEFAULT_MPD_HOST: &str = "localhost";
const DEFAULT_MPD_PORT: u16 = 6600;
const DEFAULT_MPD_RETRY: f64 = 5.0;
const DEFAULT_MPD_TIMEOUT: f64 = 2.0;

const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";
const DEFAULT_CLK: u32 = 23;
const DEFAULT_DIO: u32 = 24;
/// repeat, random, single, consume
const DEFAULT_LED_PINS: [u32; 4] = [17, 27, 22, 10];
const DEFAULT_PWM_FREQUENCY: f64 = 100.0;

const WATCH_POLL: Duration = Duration::from_secs(1);

fn secs(value: Option<f64>, default: f64) -> Duration {
    value
        .and_then(|v| Duration::try_from_secs_f64(v).ok())
        .filter(|d| !d.is_zero())
        .unwrap_or_else(|| Duration::from_secs_f64(default))
}

/// Everything the tick loop reads. Replaced wholesale on reload, never
/// mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub brightness: u8,
    pub mode: DisplayMode,
    pub blink_interval: Duration,
    pub track_number_time: Duration,
    pub stop_symbol_time: Duration,
    pub track_total_time: Duration,
    pub playlist_time: Duration,
    pub update_interval: Duration,
    pub volume_update_interval: Duration,
    pub volume_display_duration: Duration,
    pub led_tiers: [u8; BRIGHTNESS_LEVELS],
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Settings {
    pub fn from_config(cfg: &Config) -> Self {
        let display = cfg.display.clone().unwrap_or_default();
        let pause = display.pause_mode.unwrap_or_default();
        let play = display.play_mode.unwrap_or_default();
        let stop = display.stop_mode.unwrap_or_default();
        let timing = cfg.timing.clone().unwrap_or_default();

        let led_tiers = cfg
            .leds
            .as_ref()
            .and_then(|l| l.brightness_tiers.as_ref())
            .and_then(|t| <[u8; BRIGHTNESS_LEVELS]>::try_from(t.as_slice()).ok())
            .map(|t| t.map(|p| p.min(100)))
            .unwrap_or(DEFAULT_LED_TIERS);

        Self {
            brightness: display.brightness.unwrap_or(DEFAULT_BRIGHTNESS).min(7),
            mode: display.mode.unwrap_or_default(),
            blink_interval: secs(pause.blink_interval, DEFAULT_BLINK_INTERVAL),
            track_number_time: secs(play.track_number_time, DEFAULT_TRACK_NUMBER_TIME),
            stop_symbol_time: secs(stop.stop_symbol_time, DEFAULT_STOP_STEP_TIME),
            track_total_time: secs(stop.track_total_time, DEFAULT_STOP_STEP_TIME),
            playlist_time: secs(stop.playlist_time, DEFAULT_STOP_STEP_TIME),
            update_interval: secs(timing.update_interval, DEFAULT_UPDATE_INTERVAL),
            volume_update_interval: secs(timing.volume_update_interval, DEFAULT_VOLUME_UPDATE_INTERVAL),
            volume_display_duration: secs(timing.volume_display_duration, DEFAULT_VOLUME_DISPLAY_DURATION),
            led_tiers,
        }
    }

    /// LED duty for the current display brightness, in percent.
    pub fn led_level(&self) -> u8 {
        self.led_tiers[usize::from(self.brightness.min(7))]
    }
}

/// Wiring, read once at startup. Changing pins needs a restart.
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareSettings {
    pub chip: String,
    pub clk: u32,
    pub dio: u32,
    /// repeat, random, single, consume
    pub leds: [u32; 4],
    pub error_led: Option<u32>,
    pub pwm: bool,
    pub pwm_frequency: f64,
}

impl HardwareSettings {
    pub fn from_config(cfg: &Config) -> Self {
        let gpio = cfg.gpio.clone().unwrap_or_default();
        let display = gpio.display.unwrap_or_default();
        let leds = gpio.leds.unwrap_or_default();
        let led_cfg = cfg.leds.clone().unwrap_or_default();

        Self {
            chip: gpio.chip.unwrap_or_else(|| DEFAULT_GPIO_CHIP.to_string()),
            clk: display.clk.unwrap_or(DEFAULT_CLK),
            dio: display.dio.unwrap_or(DEFAULT_DIO),
            leds: [
                leds.repeat.unwrap_or(DEFAULT_LED_PINS[0]),
                leds.random.unwrap_or(DEFAULT_LED_PINS[1]),
                leds.single.unwrap_or(DEFAULT_LED_PINS[2]),
                leds.consume.unwrap_or(DEFAULT_LED_PINS[3]),
            ],
            error_led: leds.error,
            pwm: led_cfg.pwm.unwrap_or(false),
            pwm_frequency: led_cfg.pwm_frequency.unwrap_or(DEFAULT_PWM_FREQUENCY),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MpdSettings {
    pub host: String,
    pub port: u16,
    pub retry_interval: Duration,
    pub timeout: Duration,
}

impl MpdSettings {
    pub fn from_config(cfg: &Config) -> Self {
        let mpd = cfg.mpd.clone().unwrap_or_default();
        Self {
            host: mpd.host.unwrap_or_else(|| DEFAULT_MPD_HOST.to_string()),
            port: mpd.port.unwrap_or(DEFAULT_MPD_PORT),
            retry_interval: secs(mpd.retry_interval, DEFAULT_MPD_RETRY),
            timeout: secs(mpd.timeout, DEFAULT_MPD_TIMEOUT),
        }
    }
}

/// Watches the config file and publishes a fresh `Settings` whenever it
/// changes on disk or SIGHUP arrives. A file that fails to load or validate
/// leaves the current snapshot in place.
pub struct ConfigWatcher {
    path: PathBuf,
    cli: Cli,
    tx: watch::Sender<Arc<Settings>>,
    last_modified: Option<SystemTime>,
    poll_every: Duration,
}

impl ConfigWatcher {
    pub fn new(path: PathBuf, cli: Cli, tx: watch::Sender<Arc<Settings>>) -> Self {
        let last_modified = modified(&path);
        Self { path, cli, tx, last_modified, poll_every: WATCH_POLL }
    }

    pub fn with_poll_interval(mut self, every: Duration) -> Self {
        self.poll_every = every;
        self
    }

    /// Reload if the modification time moved. Returns true when a new
    /// snapshot was published.
    pub fn check(&mut self) -> bool {
        let current = modified(&self.path);
        if current == self.last_modified {
            return false;
        }
        self.last_modified = current;
        debug!("{} changed on disk", self.path.display());
        self.reload()
    }

    pub fn reload(&mut self) -> bool {
        match config::reload(&self.path, &self.cli) {
            Ok(cfg) => {
                let next = Settings::from_config(&cfg);
                if **self.tx.borrow() == next {
                    debug!("Config reloaded, no effective change");
                    return false;
                }
                info!(
                    "Config reloaded: brightness {} mode {}",
                    next.brightness,
                    next.mode.as_str()
                );
                self.tx.send_replace(Arc::new(next));
                true
            }
            Err(e) => {
                error!("Config reload failed, keeping previous settings: {}", e);
                false
            }
        }
    }

    pub async fn run(mut self) -> Result<(), std::io::Error> {
        let mut sighup = signal(SignalKind::hangup())?;
        let mut ticker = tokio::time::interval(self.poll_every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check();
                }
                _ = sighup.recv() => {
                    info!("SIGHUP received. Reloading {}", self.path.display());
                    self.last_modified = modified(&self.path);
                    self.reload();
                }
            }
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
