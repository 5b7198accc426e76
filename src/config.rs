/*
 *  config.rs
 *
 *  tempo - MPD front panel
 *	(c) 2020-26 Stuart Hunter
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

use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};
use dirs_next::home_dir;
use log::info;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::settings::{self, HardwareSettings};

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// What the panel shows while a track is playing or paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Elapsed,
    Remaining,
}

impl DisplayMode {
    pub fn toggled(self) -> Self {
        match self {
            DisplayMode::Elapsed => DisplayMode::Remaining,
            DisplayMode::Remaining => DisplayMode::Elapsed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DisplayMode::Elapsed => "elapsed",
            DisplayMode::Remaining => "remaining",
        }
    }
}

/// Top-level YAML tree. Every field is optional; absent keys take the
/// defaults in `settings`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>, // e.g., "info" | "debug"
    pub display: Option<DisplayConfig>,
    pub timing: Option<TimingConfig>,
    pub mpd: Option<MpdConfig>,
    pub gpio: Option<GpioConfig>,
    pub leds: Option<LedConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub brightness: Option<u8>, // 0-7
    pub mode: Option<DisplayMode>,
    pub pause_mode: Option<PauseModeConfig>,
    pub play_mode: Option<PlayModeConfig>,
    pub stop_mode: Option<StopModeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PauseModeConfig {
    pub blink_interval: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlayModeConfig {
    pub track_number_time: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StopModeConfig {
    pub stop_symbol_time: Option<f64>,
    pub track_total_time: Option<f64>,
    #[serde(alias = "total_time_display")]
    pub playlist_time: Option<f64>,
}

/// Seconds, fractional allowed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimingConfig {
    pub update_interval: Option<f64>,
    pub volume_update_interval: Option<f64>,
    pub volume_display_duration: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MpdConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub retry_interval: Option<f64>,
    pub timeout: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GpioConfig {
    pub chip: Option<String>, // e.g. "/dev/gpiochip0"
    pub display: Option<DisplayPins>,
    pub leds: Option<LedPins>,
}

/// BCM line offsets on the gpio chip.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayPins {
    pub clk: Option<u32>,
    pub dio: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LedPins {
    pub repeat: Option<u32>,
    pub random: Option<u32>,
    pub single: Option<u32>,
    pub consume: Option<u32>,
    pub error: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LedConfig {
    pub pwm: Option<bool>,
    pub pwm_frequency: Option<f64>,
    /// Percent per display brightness level, 8 entries.
    pub brightness_tiers: Option<Vec<u8>>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "tempo", version, about = "tempo MPD front panel", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Enable debug log level
    #[arg(long, short = 'v', alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long)]
    pub brightness: Option<u8>,
    #[arg(long, value_enum)]
    pub mode: Option<DisplayMode>,
    #[arg(long)]
    pub mpd_host: Option<String>,
    #[arg(long)]
    pub mpd_port: Option<u16>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
    /// Run without GPIO; frames and LED levels are only logged
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Step the configured brightness 0 -> 2 -> 6 -> 0 and exit
    ToggleBrightness,
    /// Flip the display mode between elapsed and remaining and exit
    ToggleMode,
}

/// A validated config plus the file it came from, if any.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: Option<PathBuf>,
}

/// Public entry point: read YAML, merge CLI overrides, validate.
pub fn load(cli: &Cli) -> Result<LoadedConfig, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    let path = if let Some(p) = cli.config.as_ref() {
        if !p.exists() {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
        Some(p.clone())
    } else {
        find_config_file()
    };
    if let Some(p) = path.as_ref() {
        cfg = read_yaml(p)?;
        info!("Config loaded from {}", p.display());
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(LoadedConfig { config: cfg, path })
}

/// Re-read `path` for a running service, keeping CLI overrides on top.
pub fn reload(path: &Path, cli: &Cli) -> Result<Config, ConfigError> {
    let mut cfg = read_yaml(path)?;
    apply_cli_overrides(&mut cfg, cli);
    validate(&cfg)?;
    Ok(cfg)
}

/// Pretty YAML of the effective config.
pub fn dump(cfg: &Config) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(cfg)?)
}

/// Try common locations in order (first hit wins).
pub fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/tempo/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/tempo/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/tempo.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["tempo.yaml", "config/tempo.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn default_config_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".config/tempo/config.yaml"),
        None => PathBuf::from("tempo.yaml"),
    }
}

pub fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    if s.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some() { cfg.log_level = cli.log_level.clone(); }
    if cli.debug                { cfg.log_level = Some("debug".into()); }

    if cli.brightness.is_some() || cli.mode.is_some() {
        let display = cfg.display.get_or_insert_with(DisplayConfig::default);
        if cli.brightness.is_some() { display.brightness = cli.brightness; }
        if cli.mode.is_some()       { display.mode = cli.mode; }
    }

    if cli.mpd_host.is_some() || cli.mpd_port.is_some() {
        let mpd = cfg.mpd.get_or_insert_with(MpdConfig::default);
        if cli.mpd_host.is_some() { mpd.host = cli.mpd_host.clone(); }
        if cli.mpd_port.is_some() { mpd.port = cli.mpd_port; }
    }
}

// a day; longer holds and intervals are config typos
const MAX_SECONDS: f64 = 86_400.0;

fn check_seconds(name: &str, value: Option<f64>) -> Result<(), ConfigError> {
    match value {
        Some(v) if !v.is_finite() || v <= 0.0 || v > MAX_SECONDS => Err(ConfigError::Validation(format!(
            "{name} must be between 0 and {MAX_SECONDS} seconds, got {v}"
        ))),
        _ => Ok(()),
    }
}

/// Range checks on everything the file or CLI supplied.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(display) = cfg.display.as_ref() {
        if let Some(b) = display.brightness {
            if b > 7 {
                return Err(ConfigError::Validation("display brightness must be 0..=7".into()));
            }
        }
        if let Some(p) = display.pause_mode.as_ref() {
            check_seconds("display.pause_mode.blink_interval", p.blink_interval)?;
        }
        if let Some(p) = display.play_mode.as_ref() {
            check_seconds("display.play_mode.track_number_time", p.track_number_time)?;
        }
        if let Some(s) = display.stop_mode.as_ref() {
            check_seconds("display.stop_mode.stop_symbol_time", s.stop_symbol_time)?;
            check_seconds("display.stop_mode.track_total_time", s.track_total_time)?;
            check_seconds("display.stop_mode.playlist_time", s.playlist_time)?;
        }
    }

    if let Some(t) = cfg.timing.as_ref() {
        check_seconds("timing.update_interval", t.update_interval)?;
        check_seconds("timing.volume_update_interval", t.volume_update_interval)?;
        check_seconds("timing.volume_display_duration", t.volume_display_duration)?;
    }

    if let Some(m) = cfg.mpd.as_ref() {
        if let Some(host) = m.host.as_ref() {
            if host.trim().is_empty() {
                return Err(ConfigError::Validation("mpd host must not be empty".into()));
            }
        }
        if m.port == Some(0) {
            return Err(ConfigError::Validation("mpd port must be > 0".into()));
        }
        check_seconds("mpd.retry_interval", m.retry_interval)?;
        check_seconds("mpd.timeout", m.timeout)?;
    }

    if let Some(l) = cfg.leds.as_ref() {
        if let Some(tiers) = l.brightness_tiers.as_ref() {
            if tiers.len() != settings::BRIGHTNESS_LEVELS {
                return Err(ConfigError::Validation(format!(
                    "leds brightness_tiers needs {} entries, got {}",
                    settings::BRIGHTNESS_LEVELS,
                    tiers.len()
                )));
            }
            if tiers.iter().any(|&t| t > 100) {
                return Err(ConfigError::Validation("leds brightness_tiers are percentages 0..=100".into()));
            }
        }
        if let Some(hz) = l.pwm_frequency {
            if !hz.is_finite() || hz <= 0.0 {
                return Err(ConfigError::Validation(format!("leds pwm_frequency must be > 0 Hz, got {hz}")));
            }
        }
    }

    let hw = HardwareSettings::from_config(cfg);
    let mut lines = vec![hw.clk, hw.dio];
    lines.extend(hw.leds);
    lines.extend(hw.error_led);
    let mut seen = lines.clone();
    seen.sort_unstable();
    seen.dedup();
    if seen.len() != lines.len() {
        return Err(ConfigError::Validation(format!(
            "gpio lines must be distinct, got {:?}",
            lines
        )));
    }

    Ok(())
}

/// Brightness step used by `toggle-brightness`.
pub fn next_brightness(current: u8) -> u8 {
    if current >= 6 {
        0
    } else if current >= 2 {
        6
    } else {
        2
    }
}

/// Rewrite `display.brightness` in the config file, returning (old, new).
pub fn toggle_brightness(cli: &Cli) -> Result<(u8, u8), ConfigError> {
    let path = toggle_target(cli);
    let mut doc = read_document(&path)?;
    let display = display_section(&mut doc)?;

    let current = display
        .get("brightness")
        .and_then(Value::as_u64)
        .map(|b| b.min(7) as u8)
        .unwrap_or(settings::DEFAULT_BRIGHTNESS);
    let next = next_brightness(current);
    display.insert("brightness".into(), Value::from(next));

    write_document(&path, &doc)?;
    info!("Brightness {} -> {} in {}", current, next, path.display());
    Ok((current, next))
}

/// Flip `display.mode` in the config file, returning (old, new).
pub fn toggle_mode(cli: &Cli) -> Result<(DisplayMode, DisplayMode), ConfigError> {
    let path = toggle_target(cli);
    let mut doc = read_document(&path)?;
    let display = display_section(&mut doc)?;

    let current = match display.get("mode") {
        Some(v) => serde_yaml::from_value(v.clone())?,
        None => DisplayMode::default(),
    };
    let next = current.toggled();
    display.insert("mode".into(), Value::from(next.as_str()));

    write_document(&path, &doc)?;
    info!("Display mode {} -> {} in {}", current.as_str(), next.as_str(), path.display());
    Ok((current, next))
}

fn toggle_target(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .or_else(find_config_file)
        .unwrap_or_else(default_config_path)
}

/// Untyped document, so keys this version does not know survive a toggle.
fn read_document(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Ok(Value::Mapping(Mapping::new()));
    }
    let s = fs::read_to_string(path)?;
    if s.trim().is_empty() {
        return Ok(Value::Mapping(Mapping::new()));
    }
    Ok(serde_yaml::from_str(&s)?)
}

fn display_section(doc: &mut Value) -> Result<&mut Mapping, ConfigError> {
    let root = doc
        .as_mapping_mut()
        .ok_or_else(|| ConfigError::Validation("config root must be a mapping".into()))?;
    let display = root
        .entry(Value::from("display"))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if display.is_null() {
        *display = Value::Mapping(Mapping::new());
    }
    display
        .as_mapping_mut()
        .ok_or_else(|| ConfigError::Validation("display must be a mapping".into()))
}

fn write_document(path: &Path, doc: &Value) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_yaml::to_string(doc)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml(s: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(s.as_bytes()).unwrap();
        f
    }

    fn cli_for(path: &Path) -> Cli {
        Cli { config: Some(path.to_path_buf()), ..Default::default() }
    }

    #[test]
    fn test_load_file_and_alias() {
        let f = yaml(
            "display:\n  brightness: 5\n  mode: remaining\n  stop_mode:\n    total_time_display: 4\n",
        );
        let loaded = load(&cli_for(f.path())).unwrap();
        let display = loaded.config.display.unwrap();
        assert_eq!(display.brightness, Some(5));
        assert_eq!(display.mode, Some(DisplayMode::Remaining));
        assert_eq!(display.stop_mode.unwrap().playlist_time, Some(4.0));
        assert_eq!(loaded.path.as_deref(), Some(f.path()));
    }

    #[test]
    fn test_cli_overrides_file() {
        let f = yaml("display:\n  brightness: 5\nmpd:\n  host: music.local\n");
        let cli = Cli {
            brightness: Some(1),
            mpd_port: Some(6601),
            debug: true,
            ..cli_for(f.path())
        };
        let cfg = load(&cli).unwrap().config;
        assert_eq!(cfg.display.unwrap().brightness, Some(1));
        let mpd = cfg.mpd.unwrap();
        assert_eq!(mpd.host.as_deref(), Some("music.local"));
        assert_eq!(mpd.port, Some(6601));
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let cli = cli_for(Path::new("/nonexistent/tempo.yaml"));
        assert!(matches!(load(&cli), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        for bad in [
            "display:\n  brightness: 8\n",
            "timing:\n  update_interval: 0\n",
            "display:\n  pause_mode:\n    blink_interval: -1\n",
            "timing:\n  volume_display_duration: 1.0e+19\n",
            "display:\n  play_mode:\n    track_number_time: 86401\n",
            "leds:\n  brightness_tiers: [1, 2, 3]\n",
            "leds:\n  brightness_tiers: [0, 10, 20, 30, 40, 50, 60, 101]\n",
            "gpio:\n  display:\n    clk: 17\n",
            "mpd:\n  port: 0\n",
        ] {
            let f = yaml(bad);
            assert!(
                matches!(load(&cli_for(f.path())), Err(ConfigError::Validation(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_malformed_yaml() {
        let f = yaml("display: [unclosed\n");
        assert!(matches!(load(&cli_for(f.path())), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_brightness_steps() {
        assert_eq!(next_brightness(0), 2);
        assert_eq!(next_brightness(1), 2);
        assert_eq!(next_brightness(2), 6);
        assert_eq!(next_brightness(5), 6);
        assert_eq!(next_brightness(6), 0);
        assert_eq!(next_brightness(7), 0);
    }

    #[test]
    fn test_toggle_brightness_rewrites_file() {
        let f = yaml("display:\n  brightness: 2\nmpd:\n  host: keepme\n");
        let cli = cli_for(f.path());

        assert_eq!(toggle_brightness(&cli).unwrap(), (2, 6));
        assert_eq!(toggle_brightness(&cli).unwrap(), (6, 0));

        let cfg = read_yaml(f.path()).unwrap();
        assert_eq!(cfg.display.unwrap().brightness, Some(0));
        assert_eq!(cfg.mpd.unwrap().host.as_deref(), Some("keepme"));
    }

    #[test]
    fn test_toggle_mode_creates_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/tempo.yaml");
        let cli = Cli { config: Some(path.clone()), ..Default::default() };

        assert_eq!(toggle_mode(&cli).unwrap(), (DisplayMode::Elapsed, DisplayMode::Remaining));
        assert_eq!(toggle_mode(&cli).unwrap(), (DisplayMode::Remaining, DisplayMode::Elapsed));
        let cfg = read_yaml(&path).unwrap();
        assert_eq!(cfg.display.unwrap().mode, Some(DisplayMode::Elapsed));
    }
}
